use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::application::ports::entity_backend::EntityBackend;
use crate::domain::entities::entity::{Entity, EntityDraft, EntityType};
use crate::domain::entities::errors::EntityError;

/// Request body for create and full-replace update. `children` is never sent.
#[derive(Debug, Serialize)]
struct EntityPayload<'a> {
    #[serde(rename = "type")]
    entity_type: EntityType,
    title: &'a str,
    content: &'a str,
    parent: Option<&'a str>,
    tags: &'a BTreeSet<String>,
    metadata: &'a HashMap<String, Value>,
}

#[derive(Debug, Serialize)]
struct TagPayload<'a> {
    tag_ids: &'a [String],
}

pub struct ReqwestEntityBackend {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestEntityBackend {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn collection_url(&self) -> String {
        format!("{}/entities/", self.base_url)
    }

    fn entity_url(&self, id: &str) -> String {
        format!("{}/entities/{}/", self.base_url, urlencoding::encode(id))
    }

    fn action_url(&self, id: &str, action: &str) -> String {
        format!("{}{action}/", self.entity_url(id))
    }

    async fn send(
        &self,
        req: reqwest::RequestBuilder,
        subject: &str,
    ) -> Result<reqwest::Response, EntityError> {
        let resp = req
            .send()
            .await
            .map_err(|e| EntityError::Network(format!("request failed: {e}")))?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(match status.as_u16() {
            400 | 422 => EntityError::Validation(body),
            404 => EntityError::NotFound(subject.to_string()),
            409 => EntityError::Conflict(subject.to_string()),
            _ => EntityError::Network(format!("upstream returned status {status}")),
        })
    }

    async fn json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, EntityError> {
        resp.json::<T>()
            .await
            .map_err(|e| EntityError::Network(format!("failed to read body: {e}")))
    }
}

#[async_trait]
impl EntityBackend for ReqwestEntityBackend {
    async fn list(&self) -> Result<Vec<Entity>, EntityError> {
        let resp = self
            .send(self.client.get(self.collection_url()), "entities")
            .await?;
        Self::json(resp).await
    }

    async fn create(&self, draft: &EntityDraft) -> Result<Entity, EntityError> {
        let payload = EntityPayload {
            entity_type: draft.entity_type,
            title: &draft.title,
            content: &draft.content,
            parent: draft.parent.as_deref(),
            tags: &draft.tags,
            metadata: &draft.metadata,
        };
        let subject = draft.parent.as_deref().unwrap_or("entities");
        let resp = self
            .send(self.client.post(self.collection_url()).json(&payload), subject)
            .await?;
        Self::json(resp).await
    }

    async fn update(&self, entity: &Entity) -> Result<Entity, EntityError> {
        let payload = EntityPayload {
            entity_type: entity.entity_type,
            title: &entity.title,
            content: &entity.content,
            parent: entity.parent.as_deref(),
            tags: &entity.tags,
            metadata: &entity.metadata,
        };
        let resp = self
            .send(
                self.client.put(self.entity_url(&entity.id)).json(&payload),
                &entity.id,
            )
            .await?;
        Self::json(resp).await
    }

    async fn delete(&self, id: &str) -> Result<Vec<Entity>, EntityError> {
        let resp = self.send(self.client.delete(self.entity_url(id)), id).await?;
        // Some deployments answer 204 without the remaining set.
        if resp.status() == reqwest::StatusCode::NO_CONTENT {
            tracing::debug!(entity_id = %id, "delete_returned_no_content_refetching");
            return self.list().await;
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| EntityError::Network(format!("failed to read body: {e}")))?;
        if bytes.is_empty() {
            return self.list().await;
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| EntityError::Network(format!("invalid delete response: {e}")))
    }

    async fn add_tags(&self, id: &str, tag_ids: &[String]) -> Result<Entity, EntityError> {
        let resp = self
            .send(
                self.client
                    .post(self.action_url(id, "add_tags"))
                    .json(&TagPayload { tag_ids }),
                id,
            )
            .await?;
        Self::json(resp).await
    }

    async fn remove_tags(&self, id: &str, tag_ids: &[String]) -> Result<Entity, EntityError> {
        let resp = self
            .send(
                self.client
                    .delete(self.action_url(id, "remove_tags"))
                    .json(&TagPayload { tag_ids }),
                id,
            )
            .await?;
        Self::json(resp).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_built_from_trimmed_base() {
        let backend =
            ReqwestEntityBackend::new("http://localhost:8000/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(backend.collection_url(), "http://localhost:8000/api/entities/");
        assert_eq!(
            backend.entity_url("temp-a b"),
            "http://localhost:8000/api/entities/temp-a%20b/"
        );
        assert_eq!(
            backend.action_url("42", "add_tags"),
            "http://localhost:8000/api/entities/42/add_tags/"
        );
    }

    #[test]
    fn payload_omits_children() {
        let tags = BTreeSet::from(["t1".to_string()]);
        let metadata = HashMap::new();
        let payload = EntityPayload {
            entity_type: EntityType::Kanban,
            title: "Board",
            content: "",
            parent: None,
            tags: &tags,
            metadata: &metadata,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "kanban");
        assert!(json.get("children").is_none());
        assert_eq!(json["tags"], serde_json::json!(["t1"]));
    }
}
