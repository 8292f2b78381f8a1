use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::domain::entities::errors::EntityError;

pub const TITLE_MAX_CHARS: usize = 100;
pub const TEMP_ID_PREFIX: &str = "temp-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    #[default]
    Note,
    Template,
    Media,
    View,
    Widget,
    Kanban,
    Calendar,
    Canvas,
    AiChatHistory,
    Other,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Note => "note",
            EntityType::Template => "template",
            EntityType::Media => "media",
            EntityType::View => "view",
            EntityType::Widget => "widget",
            EntityType::Kanban => "kanban",
            EntityType::Calendar => "calendar",
            EntityType::Canvas => "canvas",
            EntityType::AiChatHistory => "ai_chat_history",
            EntityType::Other => "other",
        }
    }

    /// Unknown wire values map to `Other` instead of failing the whole payload.
    pub fn parse(s: &str) -> Self {
        match s {
            "note" => EntityType::Note,
            "template" => EntityType::Template,
            "media" => EntityType::Media,
            "view" => EntityType::View,
            "widget" => EntityType::Widget,
            "kanban" => EntityType::Kanban,
            "calendar" => EntityType::Calendar,
            "canvas" => EntityType::Canvas,
            "ai_chat_history" => EntityType::AiChatHistory,
            _ => EntityType::Other,
        }
    }
}

impl<'de> Deserialize<'de> for EntityType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(EntityType::parse(&raw))
    }
}

/// Canonical entity as held by the store.
///
/// `children` is derived from the `parent` pointers of the whole set and is
/// never read from the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Entity {
    pub id: String,
    #[serde(rename = "type", default)]
    pub entity_type: EntityType,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default, skip_deserializing)]
    pub children: Vec<String>,
    #[serde(default)]
    #[schema(value_type = Vec<String>)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub metadata: HashMap<String, Value>,
    #[serde(default = "chrono::Utc::now")]
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[serde(default = "chrono::Utc::now")]
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Entity {
    pub fn is_temporary(&self) -> bool {
        is_temp_id(&self.id)
    }

    pub fn link_data(&self) -> LinkEntityData {
        LinkEntityData {
            id: self.id.clone(),
            title: self.title.clone(),
            parent: self.parent.clone(),
            content: if self.content.is_empty() {
                None
            } else {
                Some(self.content.clone())
            },
            entity_type: self.entity_type,
        }
    }
}

/// Fields a caller supplies when creating an entity.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct EntityDraft {
    #[serde(rename = "type", default)]
    pub entity_type: EntityType,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    #[schema(value_type = Vec<String>)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub metadata: HashMap<String, Value>,
}

impl EntityDraft {
    pub fn new(entity_type: EntityType, title: impl Into<String>) -> Self {
        Self {
            entity_type,
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }
}

/// Partial update. `parent`: None => not provided; Some(None) => detach; Some(Some(id)) => move.
#[derive(Debug, Clone, Default)]
pub struct EntityPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub parent: Option<Option<String>>,
    pub entity_type: Option<EntityType>,
    pub metadata: Option<HashMap<String, Value>>,
}

impl EntityPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn parent(parent: Option<String>) -> Self {
        Self {
            parent: Some(parent),
            ..Default::default()
        }
    }
}

/// The link-relevant projection of an entity. Metadata and tags are left out
/// so edits to them never touch the link graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LinkEntityData {
    pub id: String,
    pub title: String,
    pub parent: Option<String>,
    pub content: Option<String>,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
}

pub fn is_temp_id(id: &str) -> bool {
    id.starts_with(TEMP_ID_PREFIX)
}

pub fn new_temp_id() -> String {
    format!("{TEMP_ID_PREFIX}{}", uuid::Uuid::new_v4())
}

pub fn validate_title(title: &str) -> Result<String, EntityError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(EntityError::Validation("title must not be empty".into()));
    }
    if trimmed.chars().count() > TITLE_MAX_CHARS {
        return Err(EntityError::Validation(format!(
            "title must be at most {TITLE_MAX_CHARS} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Rebuilds every entity's `children` in one pass by bucketing on `parent`.
/// Entities whose parent is absent from the set are left without an owner.
pub fn compute_children(entities: &mut HashMap<String, Entity>) {
    let mut buckets: HashMap<String, Vec<String>> = HashMap::new();
    for e in entities.values() {
        if let Some(parent) = &e.parent {
            buckets.entry(parent.clone()).or_default().push(e.id.clone());
        }
    }
    for e in entities.values_mut() {
        let mut children = buckets.remove(&e.id).unwrap_or_default();
        children.sort();
        e.children = children;
    }
}
