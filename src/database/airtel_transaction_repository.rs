//! Tracking rows for Airtel transactions (`airtel_transactions`)

use crate::database::error::DatabaseError;
use crate::database::repository::Repository;
use crate::error::AppResult;
use crate::services::host::{NewTrackedTransaction, TrackedTransaction, TransactionStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

const COLUMNS: &str = "id, transaction_id, money_id, payment_id, item_id, component, payment_area, \
                       user_id, created_at, completed_at, delivered_at";

pub struct AirtelTransactionRepository {
    pool: PgPool,
}

impl AirtelTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        transaction: &NewTrackedTransaction,
    ) -> Result<TrackedTransaction, DatabaseError> {
        sqlx::query_as::<_, TrackedTransaction>(&format!(
            "INSERT INTO airtel_transactions \
             (id, transaction_id, item_id, component, payment_area, user_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, NOW()) \
             RETURNING {}",
            COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&transaction.transaction_id)
        .bind(transaction.item_id)
        .bind(&transaction.component)
        .bind(&transaction.payment_area)
        .bind(transaction.user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            DatabaseError::from_sqlx(e).with_context(format!(
                "insert transaction {}",
                transaction.transaction_id
            ))
        })
    }

    /// Close the row if nobody else did; `true` when this call closed it
    pub async fn complete(
        &self,
        transaction_id: &str,
        money_id: Option<&str>,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE airtel_transactions SET completed_at = NOW(), money_id = $2 \
             WHERE transaction_id = $1 AND completed_at IS NULL",
        )
        .bind(transaction_id)
        .bind(money_id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn update_payment_id(
        &self,
        transaction_id: &str,
        payment_id: i64,
    ) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE airtel_transactions SET payment_id = $2 WHERE transaction_id = $1")
            .bind(transaction_id)
            .bind(payment_id)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;
        Ok(())
    }

    pub async fn update_delivered(&self, transaction_id: &str) -> Result<(), DatabaseError> {
        sqlx::query(
            "UPDATE airtel_transactions SET delivered_at = NOW() \
             WHERE transaction_id = $1 AND delivered_at IS NULL",
        )
        .bind(transaction_id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        Ok(())
    }

    pub async fn reset_completion(&self, transaction_id: &str) -> Result<(), DatabaseError> {
        sqlx::query(
            "UPDATE airtel_transactions \
             SET completed_at = NULL, delivered_at = NULL, money_id = NULL, payment_id = NULL \
             WHERE transaction_id = $1",
        )
        .bind(transaction_id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        Ok(())
    }

    pub async fn delete_stale(&self, cutoff: DateTime<Utc>) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            "DELETE FROM airtel_transactions WHERE completed_at IS NULL AND created_at < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        debug!(deleted = result.rows_affected(), %cutoff, "Stale transactions deleted");
        Ok(result.rows_affected())
    }

    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<TrackedTransaction>, DatabaseError> {
        sqlx::query_as::<_, TrackedTransaction>(&format!(
            "SELECT {} FROM airtel_transactions WHERE user_id = $1 ORDER BY created_at DESC",
            COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn delete_for_user(&self, user_id: i64) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM airtel_transactions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        info!(user_id, deleted = result.rows_affected(), "User transactions erased");
        Ok(result.rows_affected())
    }

    pub async fn delete_for_payments(&self, payment_ids: &[i64]) -> Result<u64, DatabaseError> {
        if payment_ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM airtel_transactions WHERE payment_id = ANY($1)")
            .bind(payment_ids)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl Repository for AirtelTransactionRepository {
    type Entity = TrackedTransaction;

    async fn find_by_id(&self, id: &str) -> Result<Option<Self::Entity>, DatabaseError> {
        sqlx::query_as::<_, TrackedTransaction>(&format!(
            "SELECT {} FROM airtel_transactions WHERE transaction_id = $1",
            COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn delete(&self, id: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM airtel_transactions WHERE transaction_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl TransactionStore for AirtelTransactionRepository {
    async fn insert(&self, transaction: NewTrackedTransaction) -> AppResult<TrackedTransaction> {
        Ok(self.create(&transaction).await?)
    }

    async fn find_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> AppResult<Option<TrackedTransaction>> {
        Ok(self.find_by_id(transaction_id).await?)
    }

    async fn mark_completed(&self, transaction_id: &str, money_id: Option<&str>) -> AppResult<bool> {
        Ok(self.complete(transaction_id, money_id).await?)
    }

    async fn set_payment_id(&self, transaction_id: &str, payment_id: i64) -> AppResult<()> {
        Ok(self.update_payment_id(transaction_id, payment_id).await?)
    }

    async fn mark_delivered(&self, transaction_id: &str) -> AppResult<()> {
        Ok(self.update_delivered(transaction_id).await?)
    }

    async fn reopen(&self, transaction_id: &str) -> AppResult<()> {
        Ok(self.reset_completion(transaction_id).await?)
    }

    async fn delete_incomplete_older_than(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        Ok(self.delete_stale(cutoff).await?)
    }

    async fn find_by_user_id(&self, user_id: i64) -> AppResult<Vec<TrackedTransaction>> {
        Ok(self.list_for_user(user_id).await?)
    }

    async fn delete_by_user_id(&self, user_id: i64) -> AppResult<u64> {
        Ok(self.delete_for_user(user_id).await?)
    }

    async fn delete_by_payment_ids(&self, payment_ids: &[i64]) -> AppResult<u64> {
        Ok(self.delete_for_payments(payment_ids).await?)
    }
}
