use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::application::linkgraph::index::LinkGraphIndex;
use crate::application::linkgraph::projector::LinkGraphProjector;
use crate::application::ports::entity_backend::EntityBackend;
use crate::application::services::entity_store::EntityStore;
use crate::application::services::tabs::{self, TabManager};
use crate::bootstrap::config::Config;

#[derive(Clone)]
pub struct AppContext {
    pub cfg: Config,
    services: Arc<AppServices>,
}

pub struct AppServices {
    store: EntityStore,
    projector: LinkGraphProjector,
    tabs: Arc<Mutex<TabManager>>,
}

impl AppServices {
    pub fn new(backend: Arc<dyn EntityBackend>, event_buffer: usize) -> Self {
        let store = EntityStore::new(backend, event_buffer);
        let projector = LinkGraphProjector::new(store.clone());
        Self {
            store,
            projector,
            tabs: Arc::new(Mutex::new(TabManager::default())),
        }
    }

    /// Subscribes the link graph projector and the tab set to store events.
    /// Must run before the first load so no event is missed.
    pub fn spawn_subscribers(&self) -> Vec<JoinHandle<()>> {
        let projector = self.projector.clone().spawn(self.store.subscribe());
        let tabs = tokio::spawn(tabs::follow_store(
            self.tabs.clone(),
            self.store.clone(),
            self.store.subscribe(),
        ));
        vec![projector, tabs]
    }
}

impl AppContext {
    pub fn new(cfg: Config, services: AppServices) -> Self {
        Self {
            cfg,
            services: Arc::new(services),
        }
    }

    pub fn store(&self) -> &EntityStore {
        &self.services.store
    }

    pub fn link_graph(&self) -> Arc<RwLock<LinkGraphIndex>> {
        self.services.projector.index()
    }

    pub fn tabs(&self) -> Arc<Mutex<TabManager>> {
        self.services.tabs.clone()
    }
}
