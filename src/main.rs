use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::MatchedPath;
use dotenvy::dotenv;
use http::HeaderValue;
use tokio::task::JoinHandle;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use souzou::application::ports::entity_backend::EntityBackend;
use souzou::bootstrap::app_context::{AppContext, AppServices};
use souzou::bootstrap::config::Config;
use souzou::infrastructure::backend::{InMemoryEntityBackend, ReqwestEntityBackend};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
        paths(
            souzou::presentation::http::entities::list_entities,
            souzou::presentation::http::entities::get_entity,
            souzou::presentation::http::entities::create_entity,
            souzou::presentation::http::entities::update_entity,
            souzou::presentation::http::entities::save_entity,
            souzou::presentation::http::entities::retry_create,
            souzou::presentation::http::entities::delete_entity,
            souzou::presentation::http::entities::add_tags,
            souzou::presentation::http::entities::remove_tags,
            souzou::presentation::http::entities::save_dirty,
            souzou::presentation::http::entities::list_errors,
            souzou::presentation::http::graph::get_graph,
            souzou::presentation::http::graph::get_entity_links,
            souzou::presentation::http::tabs::list_tabs,
            souzou::presentation::http::tabs::open_tab,
            souzou::presentation::http::tabs::close_tab,
            souzou::presentation::http::tabs::reorder_tabs,
            souzou::presentation::http::health::health,
        ),
        components(schemas(
            souzou::domain::entities::entity::Entity,
            souzou::domain::entities::entity::EntityDraft,
            souzou::domain::entities::entity::EntityType,
            souzou::domain::entities::errors::ErrorKind,
            souzou::domain::entities::errors::Operation,
            souzou::domain::entities::errors::OperationError,
            souzou::domain::linkgraph::graph::Link,
            souzou::domain::linkgraph::graph::LinkKind,
            souzou::domain::linkgraph::graph::LinkStyle,
            souzou::domain::linkgraph::graph::GraphNode,
            souzou::domain::linkgraph::graph::GraphEdge,
            souzou::domain::linkgraph::graph::GraphView,
            souzou::application::services::tabs::TabManager,
            souzou::application::use_cases::entities::save_dirty::FlushReport,
            souzou::application::use_cases::graph::get_entity_links::EntityLinks,
            souzou::presentation::http::entities::EntityListResponse,
            souzou::presentation::http::entities::UpdateEntityRequest,
            souzou::presentation::http::entities::UpdateEntityResponse,
            souzou::presentation::http::entities::TagsRequest,
            souzou::presentation::http::tabs::OpenTabRequest,
            souzou::presentation::http::tabs::ReorderTabsRequest,
            souzou::presentation::http::health::HealthResp,
        )),
        tags(
            (name = "Entities", description = "Entity store operations"),
            (name = "Graph", description = "Link graph and side panel links"),
            (name = "Tabs", description = "Open entity views"),
            (name = "Health", description = "System health checks")
        )
    )]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "souzou=debug,axum=info,tower_http=info".into()),
        )
        .init();

    let cfg = Config::from_env()?;
    info!(?cfg, "Starting souzou entity graph service");

    let backend: Arc<dyn EntityBackend> = match &cfg.backend_url {
        Some(url) => {
            info!(%url, "using_http_entity_backend");
            Arc::new(ReqwestEntityBackend::new(url, cfg.backend_timeout)?)
        }
        None => {
            tracing::warn!("BACKEND_URL not set; entities are kept in memory only");
            Arc::new(InMemoryEntityBackend::new())
        }
    };

    let services = AppServices::new(backend, cfg.event_buffer);
    let subscribers = services.spawn_subscribers();
    let ctx = AppContext::new(cfg.clone(), services);

    // A failed first load is recorded on the store and reported by /api/health.
    if let Err(e) = ctx.store().load_all().await {
        error!(error = ?e, "initial_entity_load_failed");
    }

    // Build CORS
    let methods = [
        http::Method::GET,
        http::Method::POST,
        http::Method::DELETE,
        http::Method::PATCH,
        http::Method::OPTIONS,
    ];
    let cors = match cfg.frontend_url.as_deref().map(HeaderValue::from_str) {
        Some(Ok(origin)) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(methods)
            .allow_headers([http::header::CONTENT_TYPE]),
        _ if cfg.is_production => CorsLayer::new()
            .allow_origin(AllowOrigin::exact(HeaderValue::from_static("http://invalid")))
            .allow_methods(methods)
            .allow_headers([http::header::CONTENT_TYPE]),
        // Development convenience
        _ => CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(methods)
            .allow_headers([http::header::CONTENT_TYPE]),
    };

    let app = Router::new()
        .nest("/api", souzou::presentation::http::health::routes(ctx.clone()))
        .nest("/api", souzou::presentation::http::entities::routes(ctx.clone()))
        .nest("/api", souzou::presentation::http::graph::routes(ctx.clone()))
        .nest("/api", souzou::presentation::http::tabs::routes(ctx.clone()))
        .merge(SwaggerUi::new("/api/docs").url("/api/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &http::Request<_>| {
                let method = req.method().clone();
                let uri = req.uri().clone();
                let matched = req
                    .extensions()
                    .get::<MatchedPath>()
                    .map(|p| p.as_str().to_string())
                    .unwrap_or_default();
                tracing::info_span!("http", %method, %uri, matched_path = %matched)
            }),
        );

    let api_addr = SocketAddr::from(([0, 0, 0, 0], cfg.api_port));
    info!(%api_addr, "HTTP API listening");
    let listener = tokio::net::TcpListener::bind(api_addr).await?;

    let api_handle: JoinHandle<anyhow::Result<()>> = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                info!("shutdown_requested");
            })
            .await?;
        Ok(())
    });

    match api_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(?e, "API server task failed"),
        Err(e) => error!(?e, "API server task panicked"),
    }

    let dirty = ctx.store().dirty_ids().await;
    if !dirty.is_empty() {
        tracing::warn!(count = dirty.len(), "unsaved_entities_at_shutdown");
    }
    for handle in subscribers {
        handle.abort();
    }
    Ok(())
}
