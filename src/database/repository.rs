use crate::database::error::DatabaseError;
use async_trait::async_trait;

/// Base repository trait defining common database operations
#[async_trait]
pub trait Repository: Send + Sync {
    /// Associated type for the entity this repository manages
    type Entity: Send + Sync;
    /// Primary key of the entity
    type Id: Send + Sync + Copy;

    /// Find an entity by its ID
    async fn find_by_id(&self, id: Self::Id) -> Result<Option<Self::Entity>, DatabaseError>;

    /// Insert the entity, or overwrite the stored copy
    async fn upsert(&self, entity: &Self::Entity) -> Result<(), DatabaseError>;

    /// Check if an entity exists by ID
    async fn exists(&self, id: Self::Id) -> Result<bool, DatabaseError> {
        Ok(self.find_by_id(id).await?.is_some())
    }
}
