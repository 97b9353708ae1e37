use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{extract::State, response::Response, routing::get, Json, Router};
use tokio::net::TcpListener;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use crate::config::ConfigSource;
use crate::error::{traceback_response, WorkError};
use crate::model::report::WorkReport;
use crate::providers::Connector;
use crate::workflow;

pub const BIND_ADDR: &str = "0.0.0.0:8080";

/// Per-process handles. Configuration is re-read from `config_source` on every request.
#[derive(Clone)]
pub struct AppState {
    pub config_source: Arc<dyn ConfigSource>,
    pub connector: Arc<dyn Connector>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/work", get(work))
        .route("/ping", get(ping))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: AppState) -> Result<()> {
    let addr: SocketAddr = BIND_ADDR.parse().context("invalid bind address")?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("listening on {addr}");

    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn work(State(state): State<AppState>) -> Result<Json<WorkReport>, WorkError> {
    let report = workflow::run(state.config_source.as_ref(), state.connector.as_ref()).await?;
    Ok(Json(report))
}

/// Keep-warm probe. Touches neither configuration nor the tracker.
async fn ping() -> Json<&'static str> {
    Json("pong")
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!("handler panicked: {detail}");
    traceback_response(format!("handler panicked: {detail}"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::config::{full_source, JIRA_TODO_COLUMN};
    use crate::model::issue::Issue;
    use crate::providers::tests::MockTracker;

    fn app(source: HashMap<String, String>, tracker: &MockTracker) -> Router {
        router(AppState {
            config_source: Arc::new(source),
            connector: Arc::new(tracker.clone()),
        })
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn work_moves_and_reports_left_behind_issues() {
        let tracker = MockTracker::with_issues(vec![
            Issue::new("PROJ-1", "Fix bug"),
            Issue::new("PROJ-2", "Add test"),
        ]);

        let (status, body) = get(app(full_source(), &tracker), "/work").await;

        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            body,
            json!({
                "forgot": 1,
                "leftBehind": [
                    {"id": "PROJ-1", "title": "Fix bug"},
                    {"id": "PROJ-2", "title": "Add test"}
                ]
            })
        );
        assert_eq!(tracker.transitions().len(), 2);
    }

    #[tokio::test]
    async fn work_with_nothing_found() {
        let tracker = MockTracker::with_issues(vec![]);
        let (status, body) = get(app(full_source(), &tracker), "/work").await;

        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body, json!({"forgot": 0}));
    }

    #[tokio::test]
    async fn work_without_config_is_a_500_traceback() {
        let mut source = full_source();
        source.remove(JIRA_TODO_COLUMN);
        let tracker = MockTracker::with_issues(vec![Issue::new("PROJ-1", "Fix bug")]);

        let (status, body) = get(app(source, &tracker), "/work").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = serde_json::from_slice(&body).unwrap();
        let traceback = body["traceback"].as_str().unwrap();
        assert!(traceback.contains("JIRA_TODO_COLUMN"));
        assert_eq!(tracker.connects(), 0);
    }

    #[tokio::test]
    async fn failed_transition_is_a_500_without_partial_report() {
        let tracker = MockTracker::with_issues(vec![
            Issue::new("PROJ-1", "Fix bug"),
            Issue::new("PROJ-2", "Add test"),
        ])
        .failing_transition_of("PROJ-2");

        let (status, body) = get(app(full_source(), &tracker), "/work").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert!(body.get("leftBehind").is_none());
        assert!(body["traceback"].as_str().unwrap().contains("PROJ-2"));
        assert_eq!(
            tracker.transitions(),
            vec![("PROJ-1".to_string(), "To Do".to_string())]
        );
    }

    #[tokio::test]
    async fn ping_ignores_config_and_tracker() {
        let tracker = MockTracker::with_issues(vec![]).refusing_connections();
        let (status, body) = get(app(HashMap::new(), &tracker), "/ping").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, br#""pong""#.to_vec());
        assert_eq!(tracker.connects(), 0);
    }

    #[test]
    fn panics_become_tracebacks() {
        let response = panic_response(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
