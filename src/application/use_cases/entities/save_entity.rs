use crate::application::services::entity_store::EntityStore;
use crate::domain::entities::entity::Entity;
use crate::domain::entities::errors::EntityError;

pub struct SaveEntity<'a> {
    pub store: &'a EntityStore,
}

impl<'a> SaveEntity<'a> {
    pub async fn execute(&self, id: &str) -> Result<Entity, EntityError> {
        self.store.save(id).await?;
        self.store
            .get(id)
            .await
            .ok_or_else(|| EntityError::NotFound(id.to_string()))
    }
}
