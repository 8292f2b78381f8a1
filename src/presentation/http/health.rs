use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use utoipa::ToSchema;

use crate::bootstrap::app_context::AppContext;
use crate::domain::entities::errors::Operation;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResp {
    pub status: &'static str,
    pub entities: usize,
    pub dirty: usize,
    pub graph_generation: u64,
}

#[utoipa::path(
    get,
    path = "/api/health",
    tag = "Health",
    responses((status = 200, body = HealthResp))
)]
pub async fn health(State(ctx): State<AppContext>) -> Json<HealthResp> {
    let store = ctx.store();
    let load_failed = store
        .errors()
        .await
        .iter()
        .any(|e| e.operation == Operation::Load);
    let status = if load_failed { "degraded" } else { "ok" };
    let graph_generation = ctx.link_graph().read().await.generation();
    Json(HealthResp {
        status,
        entities: store.list().await.len(),
        dirty: store.dirty_ids().await.len(),
        graph_generation,
    })
}

pub fn routes(ctx: AppContext) -> Router {
    Router::new().route("/health", get(health)).with_state(ctx)
}
