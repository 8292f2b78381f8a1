use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use serde::Deserialize;

use crate::application::use_cases::graph::build_graph::BuildGraph;
use crate::application::use_cases::graph::get_entity_links::{EntityLinks, GetEntityLinks};
use crate::bootstrap::app_context::AppContext;
use crate::domain::linkgraph::graph::GraphView;
use crate::presentation::http::error_status;

#[derive(Debug, Deserialize)]
pub struct GraphQuery {
    pub root: Option<String>,
    pub depth: Option<usize>,
}

#[utoipa::path(get, path = "/api/graph", tag = "Graph",
    params(
        ("root" = Option<String>, Query, description = "Start entity; every root when omitted"),
        ("depth" = Option<usize>, Query, description = "Maximum hop count")
    ),
    responses((status = 200, body = GraphView), (status = 404)))]
pub async fn get_graph(
    State(ctx): State<AppContext>,
    q: Option<Query<GraphQuery>>,
) -> Result<Json<GraphView>, StatusCode> {
    let (root, depth) = q.map(|Query(v)| (v.root, v.depth)).unwrap_or((None, None));
    let index = ctx.link_graph();
    let uc = BuildGraph {
        store: ctx.store(),
        index: index.as_ref(),
        default_depth: ctx.cfg.graph_default_depth,
    };
    uc.execute(root.as_deref(), depth)
        .await
        .map(Json)
        .map_err(error_status)
}

#[utoipa::path(get, path = "/api/entities/{id}/links", tag = "Graph",
    params(("id" = String, Path, description = "Entity ID"),),
    responses((status = 200, body = EntityLinks), (status = 404)))]
pub async fn get_entity_links(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<EntityLinks>, StatusCode> {
    let index = ctx.link_graph();
    let uc = GetEntityLinks {
        store: ctx.store(),
        index: index.as_ref(),
    };
    uc.execute(&id).await.map(Json).map_err(error_status)
}

pub fn routes(ctx: AppContext) -> Router {
    Router::new()
        .route("/graph", get(get_graph))
        .route("/entities/:id/links", get(get_entity_links))
        .with_state(ctx)
}
