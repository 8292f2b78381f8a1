use tokio::sync::Mutex;

use crate::application::services::entity_store::EntityStore;
use crate::application::services::tabs::TabManager;
use crate::domain::entities::errors::EntityError;

pub struct CloseTab<'a> {
    pub store: &'a EntityStore,
    pub tabs: &'a Mutex<TabManager>,
}

impl<'a> CloseTab<'a> {
    pub async fn execute(&self, id: &str) -> Result<TabManager, EntityError> {
        let id = self.store.resolve_id(id).await;
        let mut tabs = self.tabs.lock().await;
        if !tabs.close(&id) {
            return Err(EntityError::NotFound(id));
        }
        Ok(tabs.clone())
    }
}
