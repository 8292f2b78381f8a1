use tokio::sync::RwLock;

use crate::application::linkgraph::index::LinkGraphIndex;
use crate::application::linkgraph::traversal::traverse;
use crate::application::services::entity_store::EntityStore;
use crate::domain::entities::errors::EntityError;
use crate::domain::linkgraph::graph::GraphView;

pub struct BuildGraph<'a> {
    pub store: &'a EntityStore,
    pub index: &'a RwLock<LinkGraphIndex>,
    pub default_depth: usize,
}

impl<'a> BuildGraph<'a> {
    /// `root` may still be a temporary id from an earlier response.
    pub async fn execute(
        &self,
        root: Option<&str>,
        depth: Option<usize>,
    ) -> Result<GraphView, EntityError> {
        let root = match root {
            Some(id) => Some(self.store.resolve_id(id).await),
            None => None,
        };
        let index = self.index.read().await;
        traverse(
            &index,
            root.as_deref(),
            depth.unwrap_or(self.default_depth),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::application::linkgraph::projector::LinkGraphProjector;
    use crate::domain::entities::entity::{EntityDraft, EntityType};
    use crate::infrastructure::backend::InMemoryEntityBackend;

    #[tokio::test]
    async fn temporary_root_resolves_after_confirmation() {
        let store = EntityStore::new(Arc::new(InMemoryEntityBackend::new()), 16);
        let projector = LinkGraphProjector::new(store.clone());
        let temp = store
            .insert_optimistic(
                EntityDraft::new(EntityType::Note, "Hub").with_content("[[Spoke]]"),
            )
            .await
            .unwrap();
        store.dispatch_create(&temp).await.unwrap();
        store
            .create(EntityDraft::new(EntityType::Note, "Spoke"))
            .await
            .unwrap();
        projector.rebuild().await;

        let index = projector.index();
        let uc = BuildGraph {
            store: &store,
            index: &index,
            default_depth: 2,
        };
        let view = uc.execute(Some(temp.as_str()), None).await.unwrap();
        assert_eq!(view.nodes.len(), 2);
        assert_eq!(view.nodes[0].id, "1");

        let roots_only = uc.execute(None, Some(0)).await.unwrap();
        assert_eq!(roots_only.nodes.len(), 2);
        assert!(roots_only.edges.is_empty());
    }
}
