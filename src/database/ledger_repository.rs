//! Postgres-backed payment ledger: payables, saved payments and delivered orders

use crate::database::error::DatabaseError;
use crate::error::{AppResult, DomainError};
use crate::services::host::{NewPayment, Payable, PayableRef, PaymentLedger};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use tracing::{info, warn};

#[derive(Debug, Clone, FromRow)]
struct PayableRow {
    account_id: i64,
    amount: Decimal,
    currency: String,
}

pub struct LedgerRepository {
    pool: PgPool,
}

impl LedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_payable(&self, payable: &PayableRef) -> Result<Option<Payable>, DatabaseError> {
        let row = sqlx::query_as::<_, PayableRow>(
            "SELECT account_id, amount, currency FROM payables \
             WHERE component = $1 AND payment_area = $2 AND item_id = $3",
        )
        .bind(&payable.component)
        .bind(&payable.payment_area)
        .bind(payable.item_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(row.map(|row| Payable {
            account_id: row.account_id,
            amount: row.amount,
            currency: row.currency,
        }))
    }
}

#[async_trait]
impl PaymentLedger for LedgerRepository {
    async fn get_payable(&self, payable: &PayableRef) -> AppResult<Payable> {
        self.find_payable(payable).await?.ok_or_else(|| {
            DomainError::PayableNotFound {
                component: payable.component.clone(),
                payment_area: payable.payment_area.clone(),
                item_id: payable.item_id,
            }
            .into()
        })
    }

    async fn save_payment(&self, payment: &NewPayment) -> AppResult<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO payments \
             (account_id, component, payment_area, item_id, user_id, amount, currency, gateway, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW()) \
             RETURNING id",
        )
        .bind(payment.account_id)
        .bind(&payment.component)
        .bind(&payment.payment_area)
        .bind(payment.item_id)
        .bind(payment.user_id)
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(&payment.gateway)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_sqlx(e).with_context("save payment"))?;

        info!(payment_id = id, user_id = payment.user_id, "Payment saved");
        Ok(id)
    }

    async fn deliver_order(
        &self,
        payable: &PayableRef,
        payment_id: i64,
        user_id: i64,
    ) -> AppResult<()> {
        let result = sqlx::query(
            "INSERT INTO order_deliveries \
             (payment_id, component, payment_area, item_id, user_id, delivered_at) \
             VALUES ($1, $2, $3, $4, $5, NOW()) \
             ON CONFLICT (payment_id) DO NOTHING",
        )
        .bind(payment_id)
        .bind(&payable.component)
        .bind(&payable.payment_area)
        .bind(payable.item_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if result.rows_affected() == 0 {
            warn!(payment_id, "Order was already delivered");
        }
        Ok(())
    }
}
