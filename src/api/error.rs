use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use snafu::Snafu;

use crate::database::StorageError;
use crate::service::StatsError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ApiError {
    #[snafu(display("Name cannot be empty"))]
    EmptyName,

    #[snafu(display("Database not available"))]
    DatabaseUnavailable,

    #[snafu(display("User not found"))]
    UserNotFound { user_id: String },

    #[snafu(display("Internal server error"))]
    Internal { source: StorageError },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::EmptyName => StatusCode::BAD_REQUEST,
            Self::DatabaseUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::UserNotFound { .. } => StatusCode::NOT_FOUND,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StatsError> for ApiError {
    fn from(err: StatsError) -> Self {
        match err {
            StatsError::StorageUnavailable { .. } => Self::DatabaseUnavailable,
            StatsError::NotFound { user_id, .. } => Self::UserNotFound { user_id },
            StatsError::ReadStats { source, .. } => Self::Internal { source },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::Internal { source } => tracing::error!("error getting user stats: {}", source),
            Self::UserNotFound { user_id } => tracing::debug!(%user_id, "no stats recorded"),
            _ => {}
        }

        (self.status(), Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
