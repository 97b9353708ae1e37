use async_trait::async_trait;
use base64::Engine;
use reqwest::{Response, StatusCode};
use serde::Deserialize;

use super::{Connector, Provider, TrackerError};
use crate::model::issue::Issue;

const PAGE_SIZE: usize = 50;

/// Connects to Jira Server / Cloud over REST API v2 with basic auth.
///
/// Every call to [`Connector::connect`] builds its own HTTP client, so nothing
/// is pooled between requests.
#[derive(Debug, Default, Clone, Copy)]
pub struct JiraConnector;

#[async_trait]
impl Connector for JiraConnector {
    async fn connect(
        &self,
        server_url: &str,
        username: &str,
        password: &str,
    ) -> Result<Box<dyn Provider>, TrackerError> {
        let provider = JiraProvider::new(server_url, username, password);
        provider.server_info().await?;
        Ok(Box::new(provider))
    }
}

pub struct JiraProvider {
    base_url: String,
    auth_header: String,
    client: reqwest::Client,
}

impl JiraProvider {
    pub fn new(server_url: &str, username: &str, password: &str) -> Self {
        let creds = format!("{username}:{password}");
        let encoded = base64::engine::general_purpose::STANDARD.encode(creds);
        Self {
            base_url: server_url.trim_end_matches('/').to_string(),
            auth_header: format!("Basic {encoded}"),
            client: reqwest::Client::new(),
        }
    }

    async fn server_info(&self) -> Result<(), TrackerError> {
        let resp = self
            .client
            .get(format!("{}/rest/api/2/serverInfo", self.base_url))
            .header("Authorization", &self.auth_header)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(unavailable)?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(TrackerError::AuthFailed {
                status: status.as_u16(),
            });
        }
        Err(TrackerError::Unavailable(format!(
            "serverInfo returned HTTP {}: {}",
            status.as_u16(),
            error_text(resp).await
        )))
    }

    async fn search_page(&self, query: &str, start_at: usize) -> Result<SearchResponse, TrackerError> {
        let url = format!(
            "{}/rest/api/2/search?jql={}&startAt={start_at}&maxResults={PAGE_SIZE}&fields=summary",
            self.base_url,
            urlencoding::encode(query)
        );

        let resp = self
            .client
            .get(&url)
            .header("Authorization", &self.auth_header)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(unavailable)?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(TrackerError::AuthFailed {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(TrackerError::Query {
                status: status.as_u16(),
                message: error_text(resp).await,
            });
        }

        resp.json()
            .await
            .map_err(|e| TrackerError::Unavailable(format!("unreadable search response: {e}")))
    }

    async fn transitions(&self, key: &str) -> Result<Vec<JiraTransition>, TrackerError> {
        let resp = self
            .client
            .get(format!("{}/rest/api/2/issue/{key}/transitions", self.base_url))
            .header("Authorization", &self.auth_header)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(unavailable)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TrackerError::Transition {
                key: key.to_string(),
                message: format!(
                    "listing transitions returned HTTP {}: {}",
                    status.as_u16(),
                    error_text(resp).await
                ),
            });
        }

        let body: TransitionsResponse = resp.json().await.map_err(|e| TrackerError::Transition {
            key: key.to_string(),
            message: format!("unreadable transitions response: {e}"),
        })?;
        Ok(body.transitions)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    total: usize,
    #[serde(default)]
    issues: Vec<JiraIssue>,
}

#[derive(Deserialize)]
struct JiraIssue {
    key: String,
    fields: IssueFields,
}

#[derive(Deserialize)]
struct IssueFields {
    summary: Option<String>,
}

#[derive(Deserialize)]
struct TransitionsResponse {
    #[serde(default)]
    transitions: Vec<JiraTransition>,
}

#[derive(Deserialize)]
struct JiraTransition {
    id: String,
    name: String,
    to: Option<StatusField>,
}

#[derive(Deserialize)]
struct StatusField {
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    #[serde(default)]
    error_messages: Vec<String>,
    #[serde(default)]
    errors: serde_json::Map<String, serde_json::Value>,
}

fn unavailable(err: reqwest::Error) -> TrackerError {
    TrackerError::Unavailable(err.to_string())
}

/// Flattens a Jira error body into one line, falling back to the raw text.
async fn error_text(resp: Response) -> String {
    let text = resp.text().await.unwrap_or_default();
    let Ok(body) = serde_json::from_str::<ErrorBody>(&text) else {
        return text;
    };

    let mut parts = body.error_messages;
    parts.extend(body.errors.into_iter().map(|(field, msg)| match msg {
        serde_json::Value::String(s) => format!("{field}: {s}"),
        other => format!("{field}: {other}"),
    }));

    if parts.is_empty() {
        text
    } else {
        parts.join("; ")
    }
}

/// Picks the transition named `target`, or failing that the one landing in status `target`.
fn pick_transition<'a>(transitions: &'a [JiraTransition], target: &str) -> Option<&'a JiraTransition> {
    transitions.iter().find(|t| t.name == target).or_else(|| {
        transitions
            .iter()
            .find(|t| t.to.as_ref().is_some_and(|to| to.name == target))
    })
}

#[async_trait]
impl Provider for JiraProvider {
    fn name(&self) -> &str {
        "Jira"
    }

    async fn search_issues(&self, query: &str) -> Result<Vec<Issue>, TrackerError> {
        let mut issues = Vec::new();

        loop {
            let page = self.search_page(query, issues.len()).await?;
            let fetched = page.issues.len();
            issues.extend(
                page.issues
                    .into_iter()
                    .map(|i| Issue::new(i.key, i.fields.summary.unwrap_or_default())),
            );

            if fetched == 0 || issues.len() >= page.total {
                break;
            }
        }

        Ok(issues)
    }

    async fn transition_issue(&self, issue: &Issue, target: &str) -> Result<(), TrackerError> {
        let transitions = self.transitions(&issue.key).await?;
        let Some(transition) = pick_transition(&transitions, target) else {
            let available: Vec<&str> = transitions.iter().map(|t| t.name.as_str()).collect();
            return Err(TrackerError::Transition {
                key: issue.key.clone(),
                message: format!(
                    "no transition to \"{target}\" (available: {})",
                    available.join(", ")
                ),
            });
        };

        let body = serde_json::json!({ "transition": { "id": transition.id } });
        let resp = self
            .client
            .post(format!("{}/rest/api/2/issue/{}/transitions", self.base_url, issue.key))
            .header("Authorization", &self.auth_header)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(unavailable)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TrackerError::Transition {
                key: issue.key.clone(),
                message: format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    error_text(resp).await
                ),
            });
        }

        Ok(())
    }
}
