use crate::application::services::entity_store::EntityStore;
use crate::domain::entities::entity::Entity;
use crate::domain::entities::errors::EntityError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagAction {
    Add,
    Remove,
}

pub struct TagEntity<'a> {
    pub store: &'a EntityStore,
}

impl<'a> TagEntity<'a> {
    pub async fn execute(
        &self,
        id: &str,
        tag_ids: &[String],
        action: TagAction,
    ) -> Result<Entity, EntityError> {
        if tag_ids.is_empty() {
            return Err(EntityError::Validation("tag_ids must not be empty".into()));
        }
        match action {
            TagAction::Add => self.store.add_tags(id, tag_ids).await?,
            TagAction::Remove => self.store.remove_tags(id, tag_ids).await?,
        }
        self.store
            .get(id)
            .await
            .ok_or_else(|| EntityError::NotFound(id.to_string()))
    }
}
