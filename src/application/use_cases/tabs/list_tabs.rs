use tokio::sync::Mutex;

use crate::application::services::tabs::TabManager;

pub struct ListTabs<'a> {
    pub tabs: &'a Mutex<TabManager>,
}

impl<'a> ListTabs<'a> {
    pub async fn execute(&self) -> TabManager {
        self.tabs.lock().await.clone()
    }
}
