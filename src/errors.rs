use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Error payload rendered to clients.
///
/// `code` carries the stable application error code the storefront frontend
/// branches on for business-rule failures (e.g. 823 for insufficient stock);
/// it is only present for errors that define one.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    pub message: String,
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Please select a valid product")]
    InvalidProduct,

    #[error("No product found")]
    ProductNotFound,

    #[error("{name} is currently unavailable")]
    OutOfStock { name: String },

    #[error("Only {available} items left in stock for {name}")]
    InsufficientStock { name: String, available: i32 },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payment gateway error: {0}")]
    PaymentGateway(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::Validation(err.to_string())
    }
}

impl ServiceError {
    /// Single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_)
            | Self::InvalidProduct
            | Self::ProductNotFound
            | Self::OutOfStock { .. }
            | Self::InsufficientStock { .. } => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::InvalidOperation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PaymentGateway(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Stable application error code, where the API contract defines one.
    pub fn app_code(&self) -> Option<u16> {
        match self {
            Self::Unauthorized(_) => Some(801),
            Self::InvalidProduct => Some(820),
            Self::ProductNotFound => Some(821),
            Self::OutOfStock { .. } => Some(822),
            Self::InsufficientStock { .. } => Some(823),
            _ => None,
        }
    }

    /// Message rendered to the client. Internal errors return a generic
    /// message; full detail stays in the server logs.
    pub fn response_message(&self) -> String {
        match self {
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::PaymentGateway(_) => "Payment gateway error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            code: self.app_code(),
            message: self.response_message(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_code_mapping() {
        assert_eq!(
            ServiceError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::Validation("x".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ServiceError::Unauthorized("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServiceError::Forbidden("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServiceError::Conflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::PaymentGateway("x".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ServiceError::InsufficientStock {
                name: "Widget".into(),
                available: 2
            }
            .status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn app_codes_follow_api_contract() {
        assert_eq!(ServiceError::Unauthorized("x".into()).app_code(), Some(801));
        assert_eq!(ServiceError::InvalidProduct.app_code(), Some(820));
        assert_eq!(ServiceError::ProductNotFound.app_code(), Some(821));
        assert_eq!(
            ServiceError::OutOfStock { name: "W".into() }.app_code(),
            Some(822)
        );
        assert_eq!(
            ServiceError::InsufficientStock {
                name: "W".into(),
                available: 1
            }
            .app_code(),
            Some(823)
        );
        assert_eq!(ServiceError::NotFound("x".into()).app_code(), None);
    }

    #[test]
    fn internal_detail_is_not_leaked() {
        assert_eq!(
            ServiceError::Internal("connection string leaked".into()).response_message(),
            "Internal server error"
        );
        assert_eq!(
            ServiceError::PaymentGateway("secret key rejected".into()).response_message(),
            "Payment gateway error"
        );
        assert_eq!(
            ServiceError::InsufficientStock {
                name: "Widget".into(),
                available: 3
            }
            .response_message(),
            "Only 3 items left in stock for Widget"
        );
    }
}
