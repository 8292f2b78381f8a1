use crate::application::services::entity_store::EntityStore;
use crate::domain::entities::errors::OperationError;

pub struct ListOperationErrors<'a> {
    pub store: &'a EntityStore,
}

impl<'a> ListOperationErrors<'a> {
    pub async fn execute(&self) -> Vec<OperationError> {
        self.store.errors().await
    }
}
