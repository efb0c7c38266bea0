//! Trigger rules - decide whether an event runs the pipeline

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use thiserror::Error;

/// Kind of event that can start a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Commits pushed to a branch
    Push,
    /// Pull request opened or updated
    PullRequest,
    /// Manual invocation without parameters
    WorkflowDispatch,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [
        EventKind::Push,
        EventKind::PullRequest,
        EventKind::WorkflowDispatch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Push => "push",
            EventKind::PullRequest => "pull_request",
            EventKind::WorkflowDispatch => "workflow_dispatch",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A concrete event delivered to the runner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TriggerEvent {
    Push {
        branch: String,
    },
    PullRequest {
        /// Branch the pull request targets
        base: String,
        /// Branch the pull request comes from
        head: Option<String>,
    },
    WorkflowDispatch {
        branch: Option<String>,
    },
}

/// Errors raised while deriving an event from the environment
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TriggerError {
    #[error("Environment variable {0} is not set")]
    MissingVariable(&'static str),

    #[error("Unsupported event '{0}'")]
    UnsupportedEvent(String),

    /// Branch filters never match tags
    #[error("Push of tag '{0}' does not trigger branch pipelines")]
    TagPush(String),
}

impl TriggerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            TriggerEvent::Push { .. } => EventKind::Push,
            TriggerEvent::PullRequest { .. } => EventKind::PullRequest,
            TriggerEvent::WorkflowDispatch { .. } => EventKind::WorkflowDispatch,
        }
    }

    pub fn is_pull_request(&self) -> bool {
        matches!(self, TriggerEvent::PullRequest { .. })
    }

    /// Branch the run is associated with (the base branch for pull requests)
    pub fn branch(&self) -> Option<&str> {
        match self {
            TriggerEvent::Push { branch } => Some(branch),
            TriggerEvent::PullRequest { base, .. } => Some(base),
            TriggerEvent::WorkflowDispatch { branch } => branch.as_deref(),
        }
    }

    /// Build an event from the variables a hosted GitHub Actions job exports
    pub fn from_github_env<F>(lookup: F) -> Result<Self, TriggerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let event_name =
            non_empty("GITHUB_EVENT_NAME").ok_or(TriggerError::MissingVariable("GITHUB_EVENT_NAME"))?;

        match event_name.as_str() {
            "push" => {
                let name = non_empty("GITHUB_REF_NAME")
                    .ok_or(TriggerError::MissingVariable("GITHUB_REF_NAME"))?;
                let is_tag = non_empty("GITHUB_REF_TYPE").is_some_and(|t| t == "tag")
                    || non_empty("GITHUB_REF").is_some_and(|r| r.starts_with("refs/tags/"));
                if is_tag {
                    return Err(TriggerError::TagPush(name));
                }
                Ok(TriggerEvent::Push { branch: name })
            }
            "pull_request" | "pull_request_target" => Ok(TriggerEvent::PullRequest {
                base: non_empty("GITHUB_BASE_REF")
                    .ok_or(TriggerError::MissingVariable("GITHUB_BASE_REF"))?,
                head: non_empty("GITHUB_HEAD_REF"),
            }),
            "workflow_dispatch" => Ok(TriggerEvent::WorkflowDispatch {
                branch: non_empty("GITHUB_REF_NAME"),
            }),
            other => Err(TriggerError::UnsupportedEvent(other.to_string())),
        }
    }
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerEvent::Push { branch } => write!(f, "push to {}", branch),
            TriggerEvent::PullRequest { base, head: Some(head) } => {
                write!(f, "pull request {} -> {}", head, base)
            }
            TriggerEvent::PullRequest { base, head: None } => {
                write!(f, "pull request into {}", base)
            }
            TriggerEvent::WorkflowDispatch { branch: Some(branch) } => {
                write!(f, "manual dispatch on {}", branch)
            }
            TriggerEvent::WorkflowDispatch { branch: None } => f.write_str("manual dispatch"),
        }
    }
}

/// Branch include/exclude lists
///
/// An empty `branches` list accepts every branch. Patterns may use `*`
/// (anything but `/`) and `**` (anything).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchFilter {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub branches: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub branches_ignore: Vec<String>,
}

impl BranchFilter {
    pub fn only<I, S>(branches: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            branches: branches.into_iter().map(Into::into).collect(),
            branches_ignore: Vec::new(),
        }
    }

    pub fn matches(&self, branch: &str) -> bool {
        let included = self.branches.is_empty()
            || self.branches.iter().any(|p| branch_pattern_matches(p, branch));

        included
            && !self
                .branches_ignore
                .iter()
                .any(|p| branch_pattern_matches(p, branch))
    }
}

/// Match a branch name against an exact name or a `*`/`**` glob
pub fn branch_pattern_matches(pattern: &str, branch: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == branch;
    }

    let mut expr = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '*' {
            if chars.peek() == Some(&'*') {
                chars.next();
                expr.push_str(".*");
            } else {
                expr.push_str("[^/]*");
            }
        } else {
            expr.push_str(&regex::escape(c.encode_utf8(&mut [0; 4])));
        }
    }
    expr.push('$');

    Regex::new(&expr).map(|re| re.is_match(branch)).unwrap_or(false)
}

/// The `on:` section of a pipeline definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerConfig {
    #[serde(
        default,
        deserialize_with = "enabled_filter",
        skip_serializing_if = "Option::is_none"
    )]
    pub push: Option<BranchFilter>,

    /// Filters on the pull request's base branch
    #[serde(
        default,
        deserialize_with = "enabled_filter",
        skip_serializing_if = "Option::is_none"
    )]
    pub pull_request: Option<BranchFilter>,

    #[serde(default, deserialize_with = "enabled_flag")]
    pub workflow_dispatch: bool,
}

impl TriggerConfig {
    /// Whether the event starts a run at all
    pub fn accepts(&self, event: &TriggerEvent) -> bool {
        match event {
            TriggerEvent::Push { branch } => {
                self.push.as_ref().is_some_and(|f| f.matches(branch))
            }
            TriggerEvent::PullRequest { base, .. } => {
                self.pull_request.as_ref().is_some_and(|f| f.matches(base))
            }
            TriggerEvent::WorkflowDispatch { .. } => self.workflow_dispatch,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.push.is_none() && self.pull_request.is_none() && !self.workflow_dispatch
    }

    /// Event kinds that can start a run
    pub fn enabled_kinds(&self) -> Vec<EventKind> {
        let mut kinds = Vec::new();
        if self.push.is_some() {
            kinds.push(EventKind::Push);
        }
        if self.pull_request.is_some() {
            kinds.push(EventKind::PullRequest);
        }
        if self.workflow_dispatch {
            kinds.push(EventKind::WorkflowDispatch);
        }
        kinds
    }
}

// `pull_request:` with no body enables the trigger for every branch
fn enabled_filter<'de, D>(deserializer: D) -> Result<Option<BranchFilter>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Some(
        Option::<BranchFilter>::deserialize(deserializer)?.unwrap_or_default(),
    ))
}

fn enabled_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_yaml::Value::deserialize(deserializer)?;
    Ok(!matches!(value, serde_yaml::Value::Bool(false)))
}
