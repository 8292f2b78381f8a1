use crate::application::services::entity_store::EntityStore;
use crate::domain::entities::entity::Entity;

pub struct ListEntities<'a> {
    pub store: &'a EntityStore,
}

impl<'a> ListEntities<'a> {
    /// Every entity, or only those carrying one of `tag_ids` when given.
    pub async fn execute(&self, tag_ids: Option<Vec<String>>) -> Vec<Entity> {
        match tag_ids {
            Some(tags) if !tags.is_empty() => self.store.entities_by_tags(&tags).await,
            _ => self.store.list().await,
        }
    }
}
