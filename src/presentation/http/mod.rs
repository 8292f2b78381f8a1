use axum::http::StatusCode;

use crate::domain::entities::errors::EntityError;

pub mod entities;
pub mod graph;
pub mod health;
pub mod tabs;

/// Status code for a failed entity operation. Backend failures surface as
/// 502 since this service only fronts the entity backend.
pub fn error_status(e: EntityError) -> StatusCode {
    let status = match &e {
        EntityError::Validation(_) => StatusCode::BAD_REQUEST,
        EntityError::Network(_) => StatusCode::BAD_GATEWAY,
        EntityError::NotFound(_) => StatusCode::NOT_FOUND,
        EntityError::Conflict(_) | EntityError::Pending(_) => StatusCode::CONFLICT,
    };
    tracing::debug!(error = %e, %status, "request_failed");
    status
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_error_kinds_to_status() {
        assert_eq!(
            error_status(EntityError::Validation("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            error_status(EntityError::Network("x".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            error_status(EntityError::NotFound("x".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            error_status(EntityError::Pending("temp-1".into())),
            StatusCode::CONFLICT
        );
    }
}
