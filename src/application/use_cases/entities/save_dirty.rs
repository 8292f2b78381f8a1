use std::collections::BTreeMap;

use futures_util::future::join_all;
use serde::Serialize;
use utoipa::ToSchema;

use crate::application::services::entity_store::EntityStore;
use crate::domain::entities::entity::is_temp_id;
use crate::domain::entities::errors::{EntityError, Operation, OperationError};

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct FlushReport {
    /// Ids as they stand after the flush; unconfirmed creates report their server id.
    pub saved: Vec<String>,
    pub failed: Vec<OperationError>,
}

pub struct SaveDirty<'a> {
    pub store: &'a EntityStore,
}

impl<'a> SaveDirty<'a> {
    /// Sends every dirty entity. Unconfirmed entities are created, the rest
    /// saved; one failure does not hold back the others. Entities go out in
    /// waves by the number of unconfirmed ancestors, so a parent is confirmed
    /// before its children are created.
    pub async fn execute(&self) -> FlushReport {
        let mut waves: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        for id in self.store.dirty_ids().await {
            let depth = self.store.unconfirmed_ancestors(&id).await;
            waves.entry(depth).or_default().push(id);
        }

        let mut results = Vec::new();
        for (_, ids) in waves {
            results.extend(
                join_all(ids.into_iter().map(|id| async move {
                    let result: Result<String, EntityError> = if is_temp_id(&id) {
                        self.store.dispatch_create(&id).await
                    } else {
                        self.store.save(&id).await.map(|_| id.clone())
                    };
                    (id, result)
                }))
                .await,
            );
        }

        let mut report = FlushReport::default();
        for (id, result) in results {
            match result {
                Ok(saved) => report.saved.push(saved),
                Err(e) => {
                    let op = if is_temp_id(&id) {
                        Operation::Create
                    } else {
                        Operation::Save
                    };
                    report.failed.push(OperationError::new(op, Some(id), &e));
                }
            }
        }
        tracing::info!(
            saved = report.saved.len(),
            failed = report.failed.len(),
            "dirty_entities_flushed"
        );
        report
    }
}
