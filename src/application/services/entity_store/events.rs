use serde::Serialize;

use crate::domain::entities::entity::LinkEntityData;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityEventKind {
    Created,
    Updated,
    Saved,
    /// A temporary id was replaced by the server id. `id` is the new id and
    /// `old_value` still carries the temporary one.
    IdReassigned,
    Deleted,
    /// The whole set was replaced from the backend. `id` is empty.
    Reloaded,
}

/// Mutation notice published by the entity store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityEvent {
    pub kind: EntityEventKind,
    pub id: String,
    pub old_value: Option<LinkEntityData>,
    pub new_value: Option<LinkEntityData>,
}

impl EntityEvent {
    pub fn created(new_value: LinkEntityData) -> Self {
        Self {
            kind: EntityEventKind::Created,
            id: new_value.id.clone(),
            old_value: None,
            new_value: Some(new_value),
        }
    }

    pub fn updated(old_value: LinkEntityData, new_value: LinkEntityData) -> Self {
        Self {
            kind: EntityEventKind::Updated,
            id: new_value.id.clone(),
            old_value: Some(old_value),
            new_value: Some(new_value),
        }
    }

    pub fn saved(old_value: LinkEntityData, new_value: LinkEntityData) -> Self {
        Self {
            kind: EntityEventKind::Saved,
            id: new_value.id.clone(),
            old_value: Some(old_value),
            new_value: Some(new_value),
        }
    }

    pub fn id_reassigned(old_value: LinkEntityData, new_value: LinkEntityData) -> Self {
        Self {
            kind: EntityEventKind::IdReassigned,
            id: new_value.id.clone(),
            old_value: Some(old_value),
            new_value: Some(new_value),
        }
    }

    pub fn deleted(id: String, old_value: Option<LinkEntityData>) -> Self {
        Self {
            kind: EntityEventKind::Deleted,
            id,
            old_value,
            new_value: None,
        }
    }

    pub fn reloaded() -> Self {
        Self {
            kind: EntityEventKind::Reloaded,
            id: String::new(),
            old_value: None,
            new_value: None,
        }
    }

    /// The id the entity had before this event, if it changed.
    pub fn previous_id(&self) -> Option<&str> {
        match self.kind {
            EntityEventKind::IdReassigned => self.old_value.as_ref().map(|v| v.id.as_str()),
            _ => None,
        }
    }
}
