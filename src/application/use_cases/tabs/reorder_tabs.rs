use tokio::sync::Mutex;

use crate::application::services::tabs::TabManager;
use crate::domain::entities::errors::EntityError;

pub struct ReorderTabs<'a> {
    pub tabs: &'a Mutex<TabManager>,
}

impl<'a> ReorderTabs<'a> {
    pub async fn execute(&self, from: usize, to: usize) -> Result<TabManager, EntityError> {
        let mut tabs = self.tabs.lock().await;
        tabs.reorder(from, to)?;
        Ok(tabs.clone())
    }
}
