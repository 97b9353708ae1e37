//! The search-and-move cycle behind `GET /work`.
//!
//! One run connects to the tracker with the configured credentials, looks for
//! issues assigned to that user that still sit in the "in progress" column, and
//! moves each one back to the "todo" column. The first failure ends the run:
//! issues moved before it stay moved and are not reported.

use tracing::{debug, info, warn};

use crate::config::{ConfigSource, WorkConfig};
use crate::error::WorkError;
use crate::model::report::{LeftBehind, WorkReport};
use crate::providers::Connector;

/// Renders the search for the user's issues still sitting in the origin column.
pub fn build_jql(config: &WorkConfig) -> String {
    format!(
        r#"project={} and assignee=currentuser() and status="{}""#,
        config.project_id, config.origin_column
    )
}

/// Resolves configuration from `source`, then runs [`advance`].
pub async fn run(source: &dyn ConfigSource, connector: &dyn Connector) -> Result<WorkReport, WorkError> {
    let config = WorkConfig::from_source(source)?;
    debug!(?config, "configuration resolved");
    advance(&config, connector).await
}

pub async fn advance(config: &WorkConfig, connector: &dyn Connector) -> Result<WorkReport, WorkError> {
    let session = connector
        .connect(&config.server_url, &config.username, &config.password)
        .await
        .inspect_err(|e| warn!(server = %config.server_url, "connect failed: {e}"))?;

    let jql = build_jql(config);
    let issues = session.search_issues(&jql).await?;
    info!(count = issues.len(), %jql, "searched {}", session.name());

    let mut moved = Vec::with_capacity(issues.len());
    for issue in &issues {
        moved.push(LeftBehind::from(issue));
        session
            .transition_issue(issue, &config.target_column)
            .await
            .inspect_err(|e| {
                warn!(
                    key = %issue.key,
                    already_moved = moved.len() - 1,
                    "transition failed, earlier moves are kept: {e}"
                )
            })?;
        info!(key = %issue.key, target = %config.target_column, "moved issue");
    }

    Ok(WorkReport::from_moved(moved))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{full_source, JIRA_PASSWORD, JIRA_SERVER_URL};
    use crate::model::issue::Issue;
    use crate::providers::tests::MockTracker;
    use pretty_assertions::assert_eq;

    fn two_issues() -> Vec<Issue> {
        vec![Issue::new("PROJ-1", "Fix bug"), Issue::new("PROJ-2", "Add test")]
    }

    #[test]
    fn jql_quotes_the_origin_column() {
        let config = WorkConfig::from_source(&full_source()).unwrap();
        assert_eq!(
            build_jql(&config),
            r#"project=PROJ and assignee=currentuser() and status="In Progress""#
        );
    }

    #[tokio::test]
    async fn empty_search_reports_nothing_forgotten() {
        let tracker = MockTracker::with_issues(vec![]);
        let report = run(&full_source(), &tracker).await.unwrap();

        assert_eq!(report, WorkReport::nothing_forgotten());
        assert!(tracker.transitions().is_empty());
    }

    #[tokio::test]
    async fn every_match_is_moved_in_search_order() {
        let tracker = MockTracker::with_issues(two_issues());
        let report = run(&full_source(), &tracker).await.unwrap();

        assert_eq!(report.forgot, 1);
        assert_eq!(
            report.moved(),
            &[
                LeftBehind { id: "PROJ-1".into(), title: "Fix bug".into() },
                LeftBehind { id: "PROJ-2".into(), title: "Add test".into() },
            ]
        );
        assert_eq!(
            tracker.transitions(),
            vec![
                ("PROJ-1".to_string(), "To Do".to_string()),
                ("PROJ-2".to_string(), "To Do".to_string()),
            ]
        );
        assert_eq!(
            tracker.searches(),
            vec![r#"project=PROJ and assignee=currentuser() and status="In Progress""#.to_string()]
        );
    }

    #[tokio::test]
    async fn connects_with_configured_credentials() {
        let tracker = MockTracker::with_issues(vec![]);
        run(&full_source(), &tracker).await.unwrap();

        let log = tracker.log.lock().unwrap();
        assert_eq!(
            log.connects,
            vec![(
                "https://jira.example.com".to_string(),
                "caian".to_string(),
                "hunter2".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn missing_config_never_reaches_the_tracker() {
        for key in [JIRA_SERVER_URL, JIRA_PASSWORD] {
            let mut source = full_source();
            source.remove(key);
            let tracker = MockTracker::with_issues(two_issues());

            let err = run(&source, &tracker).await.unwrap_err();
            assert!(matches!(err, WorkError::Config(_)));
            assert_eq!(tracker.connects(), 0);
            assert!(tracker.searches().is_empty());
        }
    }

    #[tokio::test]
    async fn failed_connect_moves_nothing() {
        let tracker = MockTracker::with_issues(two_issues()).refusing_connections();
        let err = run(&full_source(), &tracker).await.unwrap_err();

        assert!(matches!(err, WorkError::Tracker(_)));
        assert!(tracker.searches().is_empty());
        assert!(tracker.transitions().is_empty());
    }

    #[tokio::test]
    async fn failed_search_moves_nothing() {
        let tracker = MockTracker::with_issues(two_issues()).failing_search();
        run(&full_source(), &tracker).await.unwrap_err();

        assert!(tracker.transitions().is_empty());
    }

    #[tokio::test]
    async fn mid_loop_failure_keeps_earlier_moves() {
        let issues = vec![
            Issue::new("PROJ-1", "Fix bug"),
            Issue::new("PROJ-2", "Add test"),
            Issue::new("PROJ-3", "Ship it"),
        ];
        let tracker = MockTracker::with_issues(issues).failing_transition_of("PROJ-2");

        let err = run(&full_source(), &tracker).await.unwrap_err();
        assert!(err.to_string().contains("tracker"));
        assert_eq!(
            tracker.transitions(),
            vec![("PROJ-1".to_string(), "To Do".to_string())]
        );
    }
}
