use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;
use crate::providers::TrackerError;

/// Anything that stops a `/work` run.
#[derive(Debug, Error)]
pub enum WorkError {
    #[error("configuration is incomplete")]
    Config(#[from] ConfigError),

    #[error("tracker request failed")]
    Tracker(#[from] TrackerError),
}

#[derive(Debug, Serialize)]
pub struct TracebackBody {
    pub traceback: String,
}

impl WorkError {
    /// Renders the error and every cause beneath it as one diagnostic string.
    pub fn traceback(self) -> String {
        format!("{:?}", anyhow::Error::new(self))
    }
}

/// Every failure maps to the same opaque 500 shape; callers only look at the status.
pub fn traceback_response(traceback: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(TracebackBody { traceback }),
    )
        .into_response()
}

impl IntoResponse for WorkError {
    fn into_response(self) -> Response {
        let traceback = self.traceback();
        tracing::error!("work run failed: {traceback}");
        traceback_response(traceback)
    }
}
