use crate::database::error::DatabaseError;
use async_trait::async_trait;

/// Common lookups shared by the repositories
#[async_trait]
pub trait Repository: Send + Sync {
    type Entity: Send + Sync;

    /// Find an entity by its natural key
    async fn find_by_id(&self, id: &str) -> Result<Option<Self::Entity>, DatabaseError>;

    /// Delete an entity by its natural key
    async fn delete(&self, id: &str) -> Result<bool, DatabaseError>;

    async fn exists(&self, id: &str) -> Result<bool, DatabaseError> {
        match self.find_by_id(id).await {
            Ok(Some(_)) => Ok(true),
            Ok(None) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
