use serde::{Deserialize, Serialize};

use super::issue::Issue;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeftBehind {
    pub id: String,
    pub title: String,
}

impl From<&Issue> for LeftBehind {
    fn from(issue: &Issue) -> Self {
        Self {
            id: issue.key.clone(),
            title: issue.summary.clone(),
        }
    }
}

/// Outcome of one `/work` run.
///
/// `forgot` is 1 when at least one issue was moved, in which case
/// `leftBehind` lists them in search order. Otherwise only `forgot: 0` is sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkReport {
    pub forgot: u8,
    #[serde(
        rename = "leftBehind",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub left_behind: Option<Vec<LeftBehind>>,
}

impl WorkReport {
    pub fn nothing_forgotten() -> Self {
        Self {
            forgot: 0,
            left_behind: None,
        }
    }

    pub fn from_moved(moved: Vec<LeftBehind>) -> Self {
        if moved.is_empty() {
            return Self::nothing_forgotten();
        }
        Self {
            forgot: 1,
            left_behind: Some(moved),
        }
    }

    pub fn moved(&self) -> &[LeftBehind] {
        self.left_behind.as_deref().unwrap_or_default()
    }
}
