use async_trait::async_trait;

use crate::domain::entities::entity::{Entity, EntityDraft};
use crate::domain::entities::errors::EntityError;

/// Remote source of truth for entities.
///
/// `update` has full-replace semantics; `delete` returns the full remaining
/// set because the server cascades removal to descendants.
#[async_trait]
pub trait EntityBackend: Send + Sync {
    async fn list(&self) -> Result<Vec<Entity>, EntityError>;

    async fn create(&self, draft: &EntityDraft) -> Result<Entity, EntityError>;

    async fn update(&self, entity: &Entity) -> Result<Entity, EntityError>;

    async fn delete(&self, id: &str) -> Result<Vec<Entity>, EntityError>;

    async fn add_tags(&self, id: &str, tag_ids: &[String]) -> Result<Entity, EntityError>;

    async fn remove_tags(&self, id: &str, tag_ids: &[String]) -> Result<Entity, EntityError>;
}
