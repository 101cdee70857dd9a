//! HTTP query surface.
//!
//! A thin axum layer over the node: chain queries, balance lookups, local
//! transaction submission, and the dev faucet. Everything consensus-critical
//! lives below; this crate only translates HTTP to node calls.

pub mod handlers;
pub mod server;

pub use server::RpcServer;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("bind failed: {0}")]
    Bind(std::io::Error),

    #[error("{0}")]
    Rejected(String),
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            RpcError::Bind(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            RpcError::Rejected(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
