use serde::Serialize;
use tokio::sync::RwLock;
use utoipa::ToSchema;

use crate::application::linkgraph::index::LinkGraphIndex;
use crate::application::linkgraph::parser::{links_to, parse_links};
use crate::application::services::entity_store::EntityStore;
use crate::domain::entities::errors::EntityError;
use crate::domain::linkgraph::graph::Link;

/// Side panel data for the focused entity.
#[derive(Debug, Serialize, ToSchema)]
pub struct EntityLinks {
    pub entity_id: String,
    pub outgoing: Vec<Link>,
    pub incoming: Vec<Link>,
}

pub struct GetEntityLinks<'a> {
    pub store: &'a EntityStore,
    pub index: &'a RwLock<LinkGraphIndex>,
}

impl<'a> GetEntityLinks<'a> {
    /// Parses the store's current content. The index only resolves targets:
    /// its content lags behind prose edits that leave the targets unchanged.
    pub async fn execute(&self, id: &str) -> Result<EntityLinks, EntityError> {
        let id = self.store.resolve_id(id).await;
        let snapshot = self.store.link_snapshot().await;
        let Some(focused) = snapshot.iter().find(|e| e.id == id) else {
            return Err(EntityError::NotFound(id));
        };

        let index = self.index.read().await;
        let outgoing = parse_links(
            &focused.id,
            focused.content.as_deref().unwrap_or_default(),
            &*index,
        );
        let incoming = links_to(&snapshot, &id, &*index);
        Ok(EntityLinks {
            entity_id: id,
            outgoing,
            incoming,
        })
    }
}
