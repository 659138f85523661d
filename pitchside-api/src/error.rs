use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pitchside_booking::BookingError;
use pitchside_catalog::CatalogError;
use pitchside_club::ClubError;
use pitchside_core::{CoreError, RepoError};
use pitchside_order::OrderError;
use serde_json::json;

use crate::availability::TERRAIN_TAKEN;

/// Postgres `exclusion_violation`, raised by the no-double-booking constraint.
const EXCLUSION_VIOLATION: &str = "23P01";

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    ValidationError(String),
    NotFoundError(String),
    ConflictError(String),
    InternalServerError(String),
    Anyhow(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {:#}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Anyhow(err)
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ValidationError(msg) => AppError::ValidationError(msg),
            CoreError::AuthenticationError(msg) => AppError::AuthenticationError(msg),
            CoreError::ForbiddenError(msg) => AppError::AuthorizationError(msg),
            CoreError::NotFoundError(msg) => AppError::NotFoundError(msg),
            CoreError::ConflictError(msg) => AppError::ConflictError(msg),
            CoreError::InternalError(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(msg) => AppError::NotFoundError(msg),
            CatalogError::Validation(msg) => AppError::ValidationError(msg),
            CatalogError::Conflict(msg) => AppError::ConflictError(msg),
            CatalogError::InsufficientStock { product_id, requested, available } => {
                tracing::warn!(product_id, requested, available, "Checkout refused for lack of stock");
                AppError::ConflictError(format!("Insufficient stock for product {}", product_id))
            }
        }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::NotFound(_) => AppError::NotFoundError(err.to_string()),
            OrderError::StaleStatus(_) => AppError::ConflictError(err.to_string()),
            _ => AppError::ValidationError(err.to_string()),
        }
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::Validation(msg) => AppError::ValidationError(msg),
            BookingError::NotFound(msg) => AppError::NotFoundError(msg),
            BookingError::Forbidden(msg) => AppError::AuthorizationError(msg),
            BookingError::Conflict(msg) => AppError::ConflictError(msg),
            transition @ BookingError::InvalidTransition { .. } => AppError::ValidationError(transition.to_string()),
        }
    }
}

impl From<ClubError> for AppError {
    fn from(err: ClubError) -> Self {
        match err {
            ClubError::Validation(msg) => AppError::ValidationError(msg),
            ClubError::NotFound(msg) => AppError::NotFoundError(msg),
            ClubError::Forbidden(msg) => AppError::AuthorizationError(msg),
            ClubError::Conflict(msg) => AppError::ConflictError(msg),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::NotFoundError("Resource not found".into()),
            sqlx::Error::Database(db) if db.code().as_deref() == Some(EXCLUSION_VIOLATION) => {
                AppError::ConflictError(TERRAIN_TAKEN.into())
            }
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::ConflictError("Resource already exists".into())
            }
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                AppError::ConflictError("Resource is still referenced by other records".into())
            }
            _ => AppError::InternalServerError(err.to_string()),
        }
    }
}

/// Repositories box whatever failed underneath: the driver or a rule checked inside a
/// transaction.
impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        let err = match err.downcast::<sqlx::Error>() {
            Ok(db) => return (*db).into(),
            Err(other) => other,
        };
        let err = match err.downcast::<CatalogError>() {
            Ok(e) => return (*e).into(),
            Err(other) => other,
        };
        let err = match err.downcast::<OrderError>() {
            Ok(e) => return (*e).into(),
            Err(other) => other,
        };
        let err = match err.downcast::<BookingError>() {
            Ok(e) => return (*e).into(),
            Err(other) => other,
        };
        let err = match err.downcast::<ClubError>() {
            Ok(e) => return (*e).into(),
            Err(other) => other,
        };
        match err.downcast::<CoreError>() {
            Ok(e) => (*e).into(),
            Err(other) => AppError::InternalServerError(other.to_string()),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boxed_domain_errors_keep_their_status() {
        let boxed: RepoError = Box::new(CatalogError::InsufficientStock {
            product_id: 3,
            requested: 5,
            available: 1,
        });
        match AppError::from(boxed) {
            AppError::ConflictError(msg) => assert_eq!(msg, "Insufficient stock for product 3"),
            other => panic!("unexpected {:?}", other),
        }

        let boxed: RepoError = Box::new(BookingError::Validation("Terrain is not active".into()));
        assert!(matches!(AppError::from(boxed), AppError::ValidationError(_)));
    }

    #[test]
    fn test_concurrent_status_change_is_409() {
        let boxed: RepoError = Box::new(OrderError::StaleStatus(12));
        let response = AppError::from(boxed).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_row_not_found_is_404() {
        let boxed: RepoError = Box::new(sqlx::Error::RowNotFound);
        let response = AppError::from(boxed).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_unknown_errors_hide_details() {
        let boxed: RepoError = "connection reset".into();
        let response = AppError::from(boxed).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
