pub mod jira;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::issue::Issue;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("tracker rejected the credentials (HTTP {status})")]
    AuthFailed { status: u16 },

    #[error("tracker unavailable: {0}")]
    Unavailable(String),

    #[error("search rejected (HTTP {status}): {message}")]
    Query { status: u16, message: String },

    #[error("could not transition {key}: {message}")]
    Transition { key: String, message: String },
}

/// Opens an authenticated session against a tracker.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        server_url: &str,
        username: &str,
        password: &str,
    ) -> Result<Box<dyn Provider>, TrackerError>;
}

/// An authenticated tracker session.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    /// Runs a query in the tracker's own language, returning matches in server order.
    async fn search_issues(&self, query: &str) -> Result<Vec<Issue>, TrackerError>;

    /// Moves `issue` into the status named `target`.
    async fn transition_issue(&self, issue: &Issue, target: &str) -> Result<(), TrackerError>;
}
