use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use crate::application::linkgraph::classifier::{self, ChangeDecision, ChangeScope};
use crate::application::linkgraph::index::LinkGraphIndex;
use crate::application::services::entity_store::{EntityEvent, EntityStore};

/// Keeps the link graph index in step with the entity store by applying the
/// classifier's decision for every store event.
#[derive(Clone)]
pub struct LinkGraphProjector {
    index: Arc<RwLock<LinkGraphIndex>>,
    store: EntityStore,
}

impl LinkGraphProjector {
    pub fn new(store: EntityStore) -> Self {
        Self {
            index: Arc::new(RwLock::new(LinkGraphIndex::default())),
            store,
        }
    }

    pub fn index(&self) -> Arc<RwLock<LinkGraphIndex>> {
        self.index.clone()
    }

    pub async fn rebuild(&self) {
        let snapshot = self.store.link_snapshot().await;
        let count = snapshot.len();
        self.index.write().await.rebuild_all(snapshot);
        tracing::debug!(count, "link_graph_rebuilt");
    }

    pub async fn apply(&self, event: &EntityEvent) -> ChangeScope {
        let decision = {
            let index = self.index.read().await;
            classifier::decide(event, &*index)
        };
        match &decision {
            ChangeDecision::Skip => {}
            // The store may already be ahead of this event; patch with what it holds now.
            ChangeDecision::Patch(_) => match self.store.get(&event.id).await {
                Some(entity) if entity.id == event.id => {
                    self.index.write().await.patch_one(entity.link_data())
                }
                // Already confirmed under a server id; the reassignment event follows.
                Some(_) => {}
                None => {
                    self.index.write().await.remove(&event.id);
                }
            },
            ChangeDecision::Remove(id) => {
                self.index.write().await.remove(id);
            }
            ChangeDecision::Rebuild => self.rebuild().await,
        }
        let scope = decision.scope();
        tracing::trace!(entity_id = %event.id, kind = ?event.kind, ?scope, "link_graph_event_applied");
        scope
    }

    /// Consumes store events until the channel closes. Missed events (a
    /// lagging receiver) are recovered with a full rebuild.
    pub async fn run(self, receiver: broadcast::Receiver<EntityEvent>) {
        let mut stream = BroadcastStream::new(receiver);
        while let Some(item) = stream.next().await {
            match item {
                Ok(event) => {
                    self.apply(&event).await;
                }
                Err(BroadcastStreamRecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "link_graph_events_lagged");
                    self.rebuild().await;
                }
            }
        }
        tracing::debug!("link_graph_projector_stopped");
    }

    pub fn spawn(self, receiver: broadcast::Receiver<EntityEvent>) -> JoinHandle<()> {
        tokio::spawn(self.run(receiver))
    }
}
