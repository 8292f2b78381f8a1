use serde::Serialize;
use utoipa::ToSchema;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EntityError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("backend request failed: {0}")]
    Network(String),
    #[error("entity not found: {0}")]
    NotFound(String),
    /// Reserved. Saves are last-write-wins per field; only a backend 409 maps here.
    #[error("conflicting update: {0}")]
    Conflict(String),
    #[error("create still pending for {0}")]
    Pending(String),
}

impl EntityError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EntityError::Validation(_) => ErrorKind::Validation,
            EntityError::Network(_) => ErrorKind::Network,
            EntityError::NotFound(_) => ErrorKind::NotFound,
            EntityError::Conflict(_) => ErrorKind::Conflict,
            EntityError::Pending(_) => ErrorKind::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Network,
    NotFound,
    Conflict,
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Load,
    Create,
    Save,
    Delete,
    Tag,
}

/// A failed backend operation, kept for display until the same operation succeeds.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OperationError {
    pub operation: Operation,
    pub entity_id: Option<String>,
    pub kind: ErrorKind,
    pub message: String,
    pub at: chrono::DateTime<chrono::Utc>,
}

impl OperationError {
    pub fn new(operation: Operation, entity_id: Option<String>, error: &EntityError) -> Self {
        Self {
            operation,
            entity_id,
            kind: error.kind(),
            message: error.to_string(),
            at: chrono::Utc::now(),
        }
    }
}
