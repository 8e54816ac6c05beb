use axum::{http::StatusCode, response::IntoResponse};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    UnprocessableEntity(String),
    #[error("{0}")]
    EntityNotFound(String),
    #[error("{0}")]
    InvalidTransition(String),
    #[error("{0}")]
    MembershipConflict(String),
    #[error("{0}")]
    ResourceConflict(String),
    #[error("{0}")]
    ValidationError(#[from] garde::Report),
    #[error("failed to convert stored row into an entity: {0}")]
    ConversionEntityError(String),
    #[error("failed to execute query")]
    SpecificOperationError(#[source] sqlx::Error),
    #[error("no rows affected: {0}")]
    NoRowsAffectedError(String),
    #[error("failed to begin or commit transaction")]
    TransactionError(#[source] sqlx::Error),
    #[error("failed to serialize event payload")]
    SerializationError(#[from] serde_json::Error),
    #[error("failed to talk to redis")]
    RedisError(#[from] redis::RedisError),
}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status_code = match self {
            AppError::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::EntityNotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidTransition(_)
            | AppError::MembershipConflict(_)
            | AppError::ResourceConflict(_) => StatusCode::CONFLICT,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            e @ (AppError::ConversionEntityError(_)
            | AppError::SpecificOperationError(_)
            | AppError::NoRowsAffectedError(_)
            | AppError::TransactionError(_)
            | AppError::SerializationError(_)
            | AppError::RedisError(_)) => {
                tracing::error!(
                    error.cause_chain = ?e,
                    error.message = %e,
                    "Unexpected error happened"
                );
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        status_code.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_client_status_codes() {
        let cases = [
            (
                AppError::EntityNotFound("x".into()).into_response().status(),
                StatusCode::NOT_FOUND,
            ),
            (
                AppError::InvalidTransition("x".into())
                    .into_response()
                    .status(),
                StatusCode::CONFLICT,
            ),
            (
                AppError::MembershipConflict("x".into())
                    .into_response()
                    .status(),
                StatusCode::CONFLICT,
            ),
            (
                AppError::UnprocessableEntity("x".into())
                    .into_response()
                    .status(),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
        ];
        for (got, want) in cases {
            assert_eq!(got, want);
        }
    }
}
