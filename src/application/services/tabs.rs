use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, broadcast};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use utoipa::ToSchema;

use crate::application::services::entity_store::{EntityEvent, EntityEventKind, EntityStore};
use crate::domain::entities::errors::EntityError;

/// Ordered set of open entity views, keyed by entity id.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TabManager {
    tabs: Vec<String>,
    active: Option<String>,
}

impl TabManager {
    pub fn tabs(&self) -> &[String] {
        &self.tabs
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Focuses the tab for `id`, opening it at the end if needed.
    pub fn open(&mut self, id: &str) {
        if !self.tabs.iter().any(|t| t == id) {
            self.tabs.push(id.to_string());
        }
        self.active = Some(id.to_string());
    }

    /// Returns false when no tab was open for `id`. Closing the active tab
    /// focuses the one that took its place, or the new last tab.
    pub fn close(&mut self, id: &str) -> bool {
        let Some(pos) = self.tabs.iter().position(|t| t == id) else {
            return false;
        };
        self.tabs.remove(pos);
        if self.active.as_deref() == Some(id) {
            self.active = self
                .tabs
                .get(pos)
                .or_else(|| self.tabs.last())
                .cloned();
        }
        true
    }

    pub fn reorder(&mut self, from: usize, to: usize) -> Result<(), EntityError> {
        let len = self.tabs.len();
        if from >= len || to >= len {
            return Err(EntityError::Validation(format!(
                "tab position out of range: {from} -> {to} with {len} tabs"
            )));
        }
        let tab = self.tabs.remove(from);
        self.tabs.insert(to, tab);
        Ok(())
    }

    fn rename(&mut self, from: &str, to: &str) {
        for tab in self.tabs.iter_mut().filter(|t| *t == from) {
            *tab = to.to_string();
        }
        if self.active.as_deref() == Some(from) {
            self.active = Some(to.to_string());
        }
    }

    /// Keeps tabs pointing at live ids. Returns whether anything changed.
    pub fn apply(&mut self, event: &EntityEvent) -> bool {
        match event.kind {
            EntityEventKind::Deleted => self.close(&event.id),
            EntityEventKind::IdReassigned => match event.previous_id() {
                Some(previous) if self.tabs.iter().any(|t| t == previous) => {
                    self.rename(previous, &event.id);
                    true
                }
                _ => false,
            },
            _ => false,
        }
    }

    /// Drops tabs whose entity is no longer in the store.
    pub async fn prune(&mut self, store: &EntityStore) -> usize {
        let mut stale = Vec::new();
        for id in &self.tabs {
            if store.get(id).await.is_none() {
                stale.push(id.clone());
            }
        }
        for id in &stale {
            self.close(id);
        }
        stale.len()
    }
}

/// Applies store events to the shared tab set until the channel closes.
pub async fn follow_store(
    tabs: Arc<Mutex<TabManager>>,
    store: EntityStore,
    receiver: broadcast::Receiver<EntityEvent>,
) {
    let mut stream = BroadcastStream::new(receiver);
    while let Some(item) = stream.next().await {
        match item {
            Ok(event) => {
                if tabs.lock().await.apply(&event) {
                    tracing::debug!(entity_id = %event.id, kind = ?event.kind, "tabs_updated");
                }
            }
            Err(BroadcastStreamRecvError::Lagged(missed)) => {
                let pruned = tabs.lock().await.prune(&store).await;
                tracing::warn!(missed, pruned, "tab_events_lagged");
            }
        }
    }
}
