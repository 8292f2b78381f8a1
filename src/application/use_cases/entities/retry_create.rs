use crate::application::services::entity_store::EntityStore;
use crate::domain::entities::entity::Entity;
use crate::domain::entities::errors::EntityError;

pub struct RetryCreate<'a> {
    pub store: &'a EntityStore,
}

impl<'a> RetryCreate<'a> {
    pub async fn execute(&self, id: &str) -> Result<Entity, EntityError> {
        let id = self.store.dispatch_create(id).await?;
        self.store.get(&id).await.ok_or(EntityError::NotFound(id))
    }
}
