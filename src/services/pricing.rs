//! Cost with gateway surcharge, rounded to the currency's minor unit

use rust_decimal::{Decimal, RoundingStrategy};

/// Digits after the decimal point Airtel accepts for a currency
pub fn currency_decimals(currency: &str) -> u32 {
    match currency.to_uppercase().as_str() {
        "UGX" | "RWF" | "XOF" | "XAF" => 0,
        _ => 2,
    }
}

/// `amount` plus `surcharge` percent, rounded half away from zero
pub fn rounded_cost(amount: Decimal, currency: &str, surcharge: u32) -> Decimal {
    let cost = amount * (Decimal::ONE_HUNDRED + Decimal::from(surcharge)) / Decimal::ONE_HUNDRED;
    cost.round_dp_with_strategy(
        currency_decimals(currency),
        RoundingStrategy::MidpointAwayFromZero,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_no_surcharge() {
        assert_eq!(rounded_cost(dec!(1000), "UGX", 0), dec!(1000));
        assert_eq!(rounded_cost(dec!(12.345), "KES", 0), dec!(12.35));
    }

    #[test]
    fn test_surcharge_is_applied() {
        assert_eq!(rounded_cost(dec!(1000), "UGX", 3), dec!(1030));
        assert_eq!(rounded_cost(dec!(10.00), "USD", 10), dec!(11.00));
    }

    #[test]
    fn test_zero_decimal_currencies_round_to_units() {
        assert_eq!(rounded_cost(dec!(999), "RWF", 5), dec!(1049));
        assert_eq!(rounded_cost(dec!(15), "xof", 10), dec!(17));
        assert_eq!(currency_decimals("NGN"), 2);
    }
}
