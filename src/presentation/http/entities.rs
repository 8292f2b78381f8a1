use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::application::use_cases::entities::create_entity::CreateEntity;
use crate::application::use_cases::entities::delete_entity::DeleteEntity;
use crate::application::use_cases::entities::list_entities::ListEntities;
use crate::application::use_cases::entities::list_errors::ListOperationErrors;
use crate::application::use_cases::entities::retry_create::RetryCreate;
use crate::application::use_cases::entities::save_dirty::{FlushReport, SaveDirty};
use crate::application::use_cases::entities::save_entity::SaveEntity;
use crate::application::use_cases::entities::tag_entity::{TagAction, TagEntity};
use crate::application::use_cases::entities::update_entity::UpdateEntity;
use crate::bootstrap::app_context::AppContext;
use crate::domain::entities::entity::{Entity, EntityDraft, EntityPatch, EntityType};
use crate::domain::entities::errors::OperationError;
use crate::presentation::http::error_status;

#[derive(Debug, Serialize, ToSchema)]
pub struct EntityListResponse {
    pub items: Vec<Entity>,
    /// Ids with local changes not yet confirmed by the backend.
    pub dirty: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListEntitiesQuery {
    /// Comma separated tag ids.
    pub tags: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateEntityQuery {
    #[serde(default)]
    pub wait: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateEntityRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    #[schema(value_type = Option<String>)]
    pub parent: DoubleOption<String>,
    #[serde(rename = "type")]
    pub entity_type: Option<EntityType>,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<HashMap<String, Value>>,
}

#[derive(Debug, Clone, Default)]
pub enum DoubleOption<T> {
    #[default]
    NotProvided,
    Null,
    Some(T),
}

fn deserialize_double_option<'de, D, T>(deserializer: D) -> Result<DoubleOption<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(|opt| match opt {
        None => DoubleOption::Null,
        Some(value) => DoubleOption::Some(value),
    })
}

impl From<UpdateEntityRequest> for EntityPatch {
    fn from(req: UpdateEntityRequest) -> Self {
        EntityPatch {
            title: req.title,
            content: req.content,
            parent: match req.parent {
                DoubleOption::NotProvided => None,
                DoubleOption::Null => Some(None),
                DoubleOption::Some(p) => Some(Some(p)),
            },
            entity_type: req.entity_type,
            metadata: req.metadata,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UpdateEntityResponse {
    pub entity: Entity,
    pub changed: bool,
    pub dirty: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TagsRequest {
    pub tag_ids: Vec<String>,
}

#[utoipa::path(get, path = "/api/entities", tag = "Entities",
    params(("tags" = Option<String>, Query, description = "Comma separated tag ids")),
    responses((status = 200, body = EntityListResponse)))]
pub async fn list_entities(
    State(ctx): State<AppContext>,
    q: Option<Query<ListEntitiesQuery>>,
) -> Json<EntityListResponse> {
    let tags = q.and_then(|Query(v)| v.tags).map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>()
    });
    let store = ctx.store();
    let items = ListEntities { store }.execute(tags).await;
    let dirty = store.dirty_ids().await;
    Json(EntityListResponse { items, dirty })
}

#[utoipa::path(get, path = "/api/entities/{id}", tag = "Entities",
    params(("id" = String, Path, description = "Entity ID (temporary ids resolve to their server id)")),
    responses((status = 200, body = Entity), (status = 404)))]
pub async fn get_entity(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<Entity>, StatusCode> {
    ctx.store()
        .get(&id)
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

#[utoipa::path(post, path = "/api/entities", tag = "Entities", request_body = EntityDraft,
    params(("wait" = Option<bool>, Query, description = "Wait for backend confirmation")),
    responses((status = 201, body = Entity), (status = 400), (status = 502)))]
pub async fn create_entity(
    State(ctx): State<AppContext>,
    q: Option<Query<CreateEntityQuery>>,
    Json(draft): Json<EntityDraft>,
) -> Result<(StatusCode, Json<Entity>), StatusCode> {
    let wait = q.map(|Query(v)| v.wait).unwrap_or(false);
    let uc = CreateEntity { store: ctx.store() };
    let entity = uc.execute(draft, wait).await.map_err(error_status)?;
    Ok((StatusCode::CREATED, Json(entity)))
}

#[utoipa::path(patch, path = "/api/entities/{id}", tag = "Entities", request_body = UpdateEntityRequest,
    params(("id" = String, Path, description = "Entity ID"),),
    responses((status = 200, body = UpdateEntityResponse), (status = 400), (status = 404)))]
pub async fn update_entity(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Json(req): Json<UpdateEntityRequest>,
) -> Result<Json<UpdateEntityResponse>, StatusCode> {
    let store = ctx.store();
    let (entity, changed) = UpdateEntity { store }
        .execute(&id, req.into())
        .await
        .map_err(error_status)?;
    let dirty = store.is_dirty(&entity.id).await;
    Ok(Json(UpdateEntityResponse {
        entity,
        changed,
        dirty,
    }))
}

#[utoipa::path(post, path = "/api/entities/{id}/save", tag = "Entities",
    params(("id" = String, Path, description = "Entity ID"),),
    responses((status = 200, body = Entity), (status = 404), (status = 409), (status = 502)))]
pub async fn save_entity(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<Entity>, StatusCode> {
    let uc = SaveEntity { store: ctx.store() };
    uc.execute(&id).await.map(Json).map_err(error_status)
}

#[utoipa::path(post, path = "/api/entities/{id}/retry", tag = "Entities",
    params(("id" = String, Path, description = "Temporary entity ID"),),
    responses((status = 200, body = Entity), (status = 404), (status = 409), (status = 502)))]
pub async fn retry_create(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<Entity>, StatusCode> {
    let uc = RetryCreate { store: ctx.store() };
    uc.execute(&id).await.map(Json).map_err(error_status)
}

#[utoipa::path(delete, path = "/api/entities/{id}", tag = "Entities",
    params(("id" = String, Path, description = "Entity ID"),),
    responses((status = 204), (status = 404), (status = 409), (status = 502)))]
pub async fn delete_entity(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    let uc = DeleteEntity { store: ctx.store() };
    uc.execute(&id).await.map_err(error_status)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(post, path = "/api/entities/{id}/tags", tag = "Entities", request_body = TagsRequest,
    params(("id" = String, Path, description = "Entity ID"),),
    responses((status = 200, body = Entity), (status = 400), (status = 404), (status = 502)))]
pub async fn add_tags(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Json(req): Json<TagsRequest>,
) -> Result<Json<Entity>, StatusCode> {
    let uc = TagEntity { store: ctx.store() };
    uc.execute(&id, &req.tag_ids, TagAction::Add)
        .await
        .map(Json)
        .map_err(error_status)
}

#[utoipa::path(delete, path = "/api/entities/{id}/tags", tag = "Entities", request_body = TagsRequest,
    params(("id" = String, Path, description = "Entity ID"),),
    responses((status = 200, body = Entity), (status = 400), (status = 404), (status = 502)))]
pub async fn remove_tags(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Json(req): Json<TagsRequest>,
) -> Result<Json<Entity>, StatusCode> {
    let uc = TagEntity { store: ctx.store() };
    uc.execute(&id, &req.tag_ids, TagAction::Remove)
        .await
        .map(Json)
        .map_err(error_status)
}

#[utoipa::path(post, path = "/api/entities/save-dirty", tag = "Entities",
    responses((status = 200, body = FlushReport)))]
pub async fn save_dirty(State(ctx): State<AppContext>) -> Json<FlushReport> {
    Json(SaveDirty { store: ctx.store() }.execute().await)
}

#[utoipa::path(get, path = "/api/entities/errors", tag = "Entities",
    responses((status = 200, body = [OperationError])))]
pub async fn list_errors(State(ctx): State<AppContext>) -> Json<Vec<OperationError>> {
    Json(ListOperationErrors { store: ctx.store() }.execute().await)
}

pub fn routes(ctx: AppContext) -> Router {
    Router::new()
        .route("/entities", get(list_entities).post(create_entity))
        .route("/entities/save-dirty", post(save_dirty))
        .route("/entities/errors", get(list_errors))
        .route(
            "/entities/:id",
            get(get_entity)
                .patch(update_entity)
                .delete(delete_entity),
        )
        .route("/entities/:id/save", post(save_entity))
        .route("/entities/:id/retry", post(retry_create))
        .route("/entities/:id/tags", post(add_tags).delete(remove_tags))
        .with_state(ctx)
}
