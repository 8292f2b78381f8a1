use tokio::sync::Mutex;

use crate::application::services::entity_store::EntityStore;
use crate::application::services::tabs::TabManager;
use crate::domain::entities::errors::EntityError;

pub struct OpenTab<'a> {
    pub store: &'a EntityStore,
    pub tabs: &'a Mutex<TabManager>,
}

impl<'a> OpenTab<'a> {
    pub async fn execute(&self, id: &str) -> Result<TabManager, EntityError> {
        let entity = self
            .store
            .get(id)
            .await
            .ok_or_else(|| EntityError::NotFound(id.to_string()))?;
        let mut tabs = self.tabs.lock().await;
        tabs.open(&entity.id);
        Ok(tabs.clone())
    }
}
