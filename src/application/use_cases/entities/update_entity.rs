use crate::application::services::entity_store::EntityStore;
use crate::domain::entities::entity::{Entity, EntityPatch};
use crate::domain::entities::errors::EntityError;

pub struct UpdateEntity<'a> {
    pub store: &'a EntityStore,
}

impl<'a> UpdateEntity<'a> {
    /// Returns the entity after the merge and whether any field changed.
    pub async fn execute(
        &self,
        id: &str,
        patch: EntityPatch,
    ) -> Result<(Entity, bool), EntityError> {
        let changed = self.store.update(id, patch).await?;
        let entity = self
            .store
            .get(id)
            .await
            .ok_or_else(|| EntityError::NotFound(id.to_string()))?;
        Ok((entity, changed))
    }
}
