use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::application::services::tabs::TabManager;
use crate::application::use_cases::tabs::close_tab::CloseTab;
use crate::application::use_cases::tabs::list_tabs::ListTabs;
use crate::application::use_cases::tabs::open_tab::OpenTab;
use crate::application::use_cases::tabs::reorder_tabs::ReorderTabs;
use crate::bootstrap::app_context::AppContext;
use crate::presentation::http::error_status;

#[derive(Debug, Deserialize, ToSchema)]
pub struct OpenTabRequest {
    pub id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReorderTabsRequest {
    pub from: usize,
    pub to: usize,
}

#[utoipa::path(get, path = "/api/tabs", tag = "Tabs", responses((status = 200, body = TabManager)))]
pub async fn list_tabs(State(ctx): State<AppContext>) -> Json<TabManager> {
    let tabs = ctx.tabs();
    Json(ListTabs { tabs: &tabs }.execute().await)
}

#[utoipa::path(post, path = "/api/tabs", tag = "Tabs", request_body = OpenTabRequest,
    responses((status = 200, body = TabManager), (status = 404)))]
pub async fn open_tab(
    State(ctx): State<AppContext>,
    Json(req): Json<OpenTabRequest>,
) -> Result<Json<TabManager>, StatusCode> {
    let tabs = ctx.tabs();
    let uc = OpenTab {
        store: ctx.store(),
        tabs: &tabs,
    };
    uc.execute(&req.id).await.map(Json).map_err(error_status)
}

#[utoipa::path(delete, path = "/api/tabs/{id}", tag = "Tabs",
    params(("id" = String, Path, description = "Entity ID of the tab"),),
    responses((status = 200, body = TabManager), (status = 404)))]
pub async fn close_tab(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<TabManager>, StatusCode> {
    let tabs = ctx.tabs();
    let uc = CloseTab {
        store: ctx.store(),
        tabs: &tabs,
    };
    uc.execute(&id).await.map(Json).map_err(error_status)
}

#[utoipa::path(post, path = "/api/tabs/reorder", tag = "Tabs", request_body = ReorderTabsRequest,
    responses((status = 200, body = TabManager), (status = 400)))]
pub async fn reorder_tabs(
    State(ctx): State<AppContext>,
    Json(req): Json<ReorderTabsRequest>,
) -> Result<Json<TabManager>, StatusCode> {
    let tabs = ctx.tabs();
    ReorderTabs { tabs: &tabs }
        .execute(req.from, req.to)
        .await
        .map(Json)
        .map_err(error_status)
}

pub fn routes(ctx: AppContext) -> Router {
    Router::new()
        .route("/tabs", get(list_tabs).post(open_tab))
        .route("/tabs/reorder", post(reorder_tabs))
        .route("/tabs/:id", delete(close_tab))
        .with_state(ctx)
}
