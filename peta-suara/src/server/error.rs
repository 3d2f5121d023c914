//! Erreurs HTTP

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use rekap::RekapError;

use crate::store::is_unavailable;

#[derive(Error, Debug)]
pub enum AppError {
    /// Paramètres de requête invalides
    #[error("{0}")]
    BadRequest(String),

    /// Aucune connexion disponible dans le pool
    #[error("Database unavailable")]
    Unavailable(anyhow::Error),

    #[error("Internal error: {0}")]
    Internal(anyhow::Error),
}

impl From<RekapError> for AppError {
    fn from(err: RekapError) -> Self {
        if err.is_client_error() {
            AppError::BadRequest(err.to_string())
        } else {
            AppError::Internal(err.into())
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(domain) = err.downcast_ref::<RekapError>() {
            if domain.is_client_error() {
                return AppError::BadRequest(domain.to_string());
            }
        }
        if is_unavailable(&err) {
            AppError::Unavailable(err)
        } else {
            AppError::Internal(err)
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::BadRequest(message) => message.clone(),
            AppError::Unavailable(cause) => {
                error!(error = %format!("{:#}", cause), "Database unavailable");
                self.to_string()
            }
            AppError::Internal(cause) => {
                error!(error = %format!("{:#}", cause), "Request failed");
                "Internal server error".to_string()
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deadpool_postgres::PoolError;

    #[test]
    fn test_client_errors_are_bad_requests() {
        let err: AppError = RekapError::invalid_argument("Unknown mode: pilkada").into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Invalid argument: Unknown mode: pilkada");
    }

    #[test]
    fn test_domain_error_through_anyhow() {
        let err = anyhow::Error::new(RekapError::UnknownRegion(3204)).context("Failed to build map");
        let err: AppError = err.into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_server_side_domain_error_is_internal() {
        let err: AppError = RekapError::hierarchy(1, "cycle").into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_pool_exhaustion_is_unavailable() {
        let err = anyhow::Error::new(PoolError::Closed).context("Failed to load regions");
        let err: AppError = err.into();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);

        let err: AppError = anyhow::anyhow!("relation does not exist").into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_response_status() {
        let response = AppError::BadRequest("Invalid kab_id: x".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
