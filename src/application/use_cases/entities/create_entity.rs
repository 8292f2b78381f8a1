use crate::application::services::entity_store::EntityStore;
use crate::domain::entities::entity::{Entity, EntityDraft};
use crate::domain::entities::errors::EntityError;

pub struct CreateEntity<'a> {
    pub store: &'a EntityStore,
}

impl<'a> CreateEntity<'a> {
    /// Inserts the draft under a temporary id. With `wait` the backend
    /// confirmation is awaited and the confirmed entity returned; otherwise
    /// confirmation runs in the background and the optimistic entity comes
    /// back immediately, already counted as in flight so children created
    /// under it wait for its server id.
    pub async fn execute(&self, draft: EntityDraft, wait: bool) -> Result<Entity, EntityError> {
        let temp_id = self.store.insert_optimistic(draft).await?;
        if wait {
            let id = self.store.dispatch_create(&temp_id).await?;
            return self
                .store
                .get(&id)
                .await
                .ok_or(EntityError::NotFound(id));
        }

        self.store.spawn_create(&temp_id).await?;
        self.store
            .get(&temp_id)
            .await
            .ok_or(EntityError::NotFound(temp_id))
    }
}
