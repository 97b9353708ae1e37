use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

pub const JIRA_SERVER_URL: &str = "JIRA_SERVER_URL";
pub const JIRA_USERNAME: &str = "JIRA_USERNAME";
pub const JIRA_PASSWORD: &str = "JIRA_PASSWORD";
pub const JIRA_IN_PROGRESS_COLUMN: &str = "JIRA_IN_PROGRESS_COLUMN";
pub const JIRA_TODO_COLUMN: &str = "JIRA_TODO_COLUMN";
pub const JIRA_PROJECT_ID: &str = "JIRA_PROJECT_ID";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing configuration value {0}")]
    Missing(&'static str),
}

/// Somewhere configuration values can be looked up by name.
pub trait ConfigSource: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads straight from the process environment on every lookup.
pub struct EnvSource;

impl ConfigSource for EnvSource {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl ConfigSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

#[derive(Clone)]
pub struct WorkConfig {
    pub server_url: String,
    pub username: String,
    pub password: String,
    pub origin_column: String,
    pub target_column: String,
    pub project_id: String,
}

impl WorkConfig {
    pub fn from_source(source: &dyn ConfigSource) -> Result<Self, ConfigError> {
        let read = |key: &'static str| source.get(key).ok_or(ConfigError::Missing(key));

        Ok(Self {
            server_url: read(JIRA_SERVER_URL)?,
            username: read(JIRA_USERNAME)?,
            password: read(JIRA_PASSWORD)?,
            origin_column: read(JIRA_IN_PROGRESS_COLUMN)?,
            target_column: read(JIRA_TODO_COLUMN)?,
            project_id: read(JIRA_PROJECT_ID)?,
        })
    }
}

impl fmt::Debug for WorkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkConfig")
            .field("server_url", &self.server_url)
            .field("username", &self.username)
            .field("password", &"***")
            .field("origin_column", &self.origin_column)
            .field("target_column", &self.target_column)
            .field("project_id", &self.project_id)
            .finish()
    }
}

#[cfg(test)]
pub(crate) fn full_source() -> HashMap<String, String> {
    [
        (JIRA_SERVER_URL, "https://jira.example.com"),
        (JIRA_USERNAME, "caian"),
        (JIRA_PASSWORD, "hunter2"),
        (JIRA_IN_PROGRESS_COLUMN, "In Progress"),
        (JIRA_TODO_COLUMN, "To Do"),
        (JIRA_PROJECT_ID, "PROJ"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}
