use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::state::Shared;

pub mod origin;
pub mod room;

const BODY_LIMIT: usize = 16 * 1024;

/// Success envelope; failures use the same shape with `success: false`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data:    T,
}

pub type Reply<T> = Json<Envelope<T>>;

pub fn ok<T>(data: T) -> Reply<T> {
    Json(Envelope { success: true, data })
}

pub fn router() -> Router {
    Router::new().nest("/api", room::router())
}

/// Full application with state and middleware attached.
pub fn app(state: Shared) -> Router {
    router()
        .layer(Extension(state))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
}
