use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;

pub type AppResult<T> = Result<T, AppErr>;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AppErr {
    #[error("{0}")]
    InvalidInput(String),

    /// Retriable once the throttle window has lapsed.
    #[error("{0}")]
    RateLimited(String),

    #[error("Room not found")]
    NotFound,

    /// The room existed but aged out; kept apart from `NotFound` for the client.
    #[error("Room expired")]
    Expired,

    #[error("{0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppErr {
    pub fn status(&self) -> StatusCode {
        match self {
            AppErr::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppErr::RateLimited(_)  => StatusCode::TOO_MANY_REQUESTS,
            AppErr::NotFound        => StatusCode::NOT_FOUND,
            AppErr::Expired         => StatusCode::GONE,
            AppErr::Forbidden(_)    => StatusCode::FORBIDDEN,
            AppErr::Internal(_)     => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Inverse of [`AppErr::status`], used by the polling client.
    pub fn from_status(status: StatusCode, message: String) -> AppErr {
        match status {
            StatusCode::BAD_REQUEST       => AppErr::InvalidInput(message),
            StatusCode::TOO_MANY_REQUESTS => AppErr::RateLimited(message),
            StatusCode::NOT_FOUND         => AppErr::NotFound,
            StatusCode::GONE              => AppErr::Expired,
            StatusCode::FORBIDDEN         => AppErr::Forbidden(message),
            _                             => AppErr::Internal(message),
        }
    }

    pub fn is_retriable(&self) -> bool {
        matches!(self, AppErr::RateLimited(_))
    }

    /// The room is gone for good; a polling client should stop.
    pub fn ends_session(&self) -> bool {
        matches!(self, AppErr::NotFound | AppErr::Expired)
    }
}

impl IntoResponse for AppErr {
    fn into_response(self) -> Response {
        let body = json!({ "success": false, "data": { "message": self.to_string() } });
        (self.status(), Json(body)).into_response()
    }
}

pub fn invalid<S: Into<String>>(msg: S) -> AppErr { AppErr::InvalidInput(msg.into()) }
pub fn forbidden<S: Into<String>>(msg: S) -> AppErr { AppErr::Forbidden(msg.into()) }
