use crate::application::services::entity_store::EntityStore;
use crate::domain::entities::errors::EntityError;

pub struct DeleteEntity<'a> {
    pub store: &'a EntityStore,
}

impl<'a> DeleteEntity<'a> {
    pub async fn execute(&self, id: &str) -> Result<(), EntityError> {
        self.store.delete(id).await
    }
}
