//! Human-readable messages for Airtel Africa result codes
//!
//! Unknown codes map to an empty string so callers can always display the result.

/// ESB result code sent when Airtel cannot be reached or answers garbage
pub const ESB_SOMETHING_WENT_WRONG: &str = "ESB000001";

/// Collection API result codes (`status.result_code`)
pub fn esb_message(code: &str) -> &'static str {
    match code {
        "ESB000001" => "Something went wrong.",
        "ESB000004" => "An error occurred while initiating the payment.",
        "ESB000008" => "Field validation.",
        "ESB000010" => "Your transaction has been successfully processed.",
        "ESB000011" => "Transaction failed.",
        "ESB000014" => "An error occurred while fetching the transaction status.",
        "ESB000033" => "Invalid MSISDN Length. MSISDN Length should be ",
        "ESB000034" => "Invalid Country Name.",
        "ESB000035" => "Invalid Currency Code.",
        "ESB000036" => "Invalid MSISDN Length. MSISDN Length should be ? and should start with 0.",
        "ESB000039" => "Vendor is not configured to do transaction in the country.",
        "ESB000041" => "External transaction ID already exists.",
        "ESB000045" => "No transaction found with provided transaction Id.",
        _ => "",
    }
}

/// Transaction status codes (`data.transaction.status`)
pub fn ta_message(code: &str) -> &'static str {
    match code {
        "TF" => "Transaction Failed",
        "TS" => "Transaction Success",
        "TA" => "Transaction Ambiguous",
        "TIP" => "Transaction in Progress",
        _ => "",
    }
}

/// DP008 collection response codes (`status.response_code`)
pub fn dp_message(code: &str) -> &'static str {
    match code {
        "DP00800001000" => "Transaction ambiguous",
        "DP00800001001" => "Valid pin",
        "DP00800001002" => "Invalid pin",
        "DP00800001003" => "Exceeds balance",
        "DP00800001004" => "Invalid Amount",
        "DP00800001005" => "User did not enter pin",
        "DP00800001006" => "In process",
        "DP00800001007" => "Not enough balance",
        "DP00800001008" => "Refused",
        "DP00800001009" => "Do not honor",
        "DP00800001010" => "Transaction not permitted",
        "DP00800001024" => "Transaction timed out",
        "DP00800001025" => "Transaction not found",
        "DP00800001029" => "Transaction expired",
        _ => "",
    }
}
