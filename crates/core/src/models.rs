use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The (installation, repository) pair every workflow operation is performed
/// against. Never inferred from stored workflow state; always passed explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoScope {
    pub installation_id: u64,
    pub repository_id: u64,
}

impl fmt::Display for RepoScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.installation_id, self.repository_id)
    }
}

impl FromStr for RepoScope {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (installation, repository) = s.split_once('/').ok_or(())?;
        Ok(Self {
            installation_id: installation.parse().map_err(|_| ())?,
            repository_id: repository.parse().map_err(|_| ())?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerEvent {
    Push,
    IssueOpened,
    IssueAssigned,
    IssueClosed,
    IssueReopened,
    PullRequestOpened,
    PullRequestDraft,
    PullRequestReady,
    PullRequestClosed,
    PullRequestMerged,
    ReviewChangesRequested,
}

pub const ALL_TRIGGER_EVENTS: &[TriggerEvent] = &[
    TriggerEvent::Push,
    TriggerEvent::IssueOpened,
    TriggerEvent::IssueAssigned,
    TriggerEvent::IssueClosed,
    TriggerEvent::IssueReopened,
    TriggerEvent::PullRequestOpened,
    TriggerEvent::PullRequestDraft,
    TriggerEvent::PullRequestReady,
    TriggerEvent::PullRequestClosed,
    TriggerEvent::PullRequestMerged,
    TriggerEvent::ReviewChangesRequested,
];

impl TriggerEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::IssueOpened => "issue.opened",
            Self::IssueAssigned => "issue.assigned",
            Self::IssueClosed => "issue.closed",
            Self::IssueReopened => "issue.reopened",
            Self::PullRequestOpened => "pull_request.opened",
            Self::PullRequestDraft => "pull_request.draft",
            Self::PullRequestReady => "pull_request.ready",
            Self::PullRequestClosed => "pull_request.closed",
            Self::PullRequestMerged => "pull_request.merged",
            Self::ReviewChangesRequested => "pull_request_review.changes_requested",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Push => "Push",
            Self::IssueOpened => "Issue opened",
            Self::IssueAssigned => "Issue assigned",
            Self::IssueClosed => "Issue closed",
            Self::IssueReopened => "Issue reopened",
            Self::PullRequestOpened => "Pull request opened",
            Self::PullRequestDraft => "Pull request drafted",
            Self::PullRequestReady => "Pull request ready for review",
            Self::PullRequestClosed => "Pull request closed",
            Self::PullRequestMerged => "Pull request merged",
            Self::ReviewChangesRequested => "Review requested changes",
        }
    }
}

impl FromStr for TriggerEvent {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "push" => Ok(Self::Push),
            "issue.opened" => Ok(Self::IssueOpened),
            "issue.assigned" => Ok(Self::IssueAssigned),
            "issue.closed" => Ok(Self::IssueClosed),
            "issue.reopened" => Ok(Self::IssueReopened),
            "pull_request.opened" => Ok(Self::PullRequestOpened),
            "pull_request.draft" => Ok(Self::PullRequestDraft),
            "pull_request.ready" => Ok(Self::PullRequestReady),
            "pull_request.closed" => Ok(Self::PullRequestClosed),
            "pull_request.merged" => Ok(Self::PullRequestMerged),
            "pull_request_review.changes_requested" => Ok(Self::ReviewChangesRequested),
            _ => Err(()),
        }
    }
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionType {
    SetProjectStatus,
    AddLabel,
    AddComment,
    RemoveLabel,
}

pub const ALL_ACTION_TYPES: &[ActionType] =
    &[ActionType::SetProjectStatus, ActionType::AddLabel, ActionType::AddComment, ActionType::RemoveLabel];

impl ActionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SetProjectStatus => "setProjectStatus",
            Self::AddLabel => "addLabel",
            Self::AddComment => "addComment",
            Self::RemoveLabel => "removeLabel",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::SetProjectStatus => "Set project status",
            Self::AddLabel => "Add label",
            Self::AddComment => "Add comment",
            Self::RemoveLabel => "Remove label",
        }
    }

    /// The param key this action type requires to be a non-blank string.
    /// `removeLabel` takes no required param.
    pub fn required_param(self) -> Option<&'static str> {
        match self {
            Self::SetProjectStatus => Some("status"),
            Self::AddLabel => Some("label"),
            Self::AddComment => Some("body"),
            Self::RemoveLabel => None,
        }
    }

    pub fn default_params(self) -> Map<String, Value> {
        let mut params = Map::new();
        match self {
            Self::SetProjectStatus => {
                params.insert("status".to_string(), Value::from("In Review"));
            }
            Self::AddLabel => {
                params.insert("label".to_string(), Value::from("wip"));
            }
            Self::AddComment => {
                params.insert("body".to_string(), Value::from("Hello from workflow"));
            }
            Self::RemoveLabel => {}
        }
        params
    }
}

impl FromStr for ActionType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "setProjectStatus" => Ok(Self::SetProjectStatus),
            "addLabel" => Ok(Self::AddLabel),
            "addComment" => Ok(Self::AddComment),
            "removeLabel" => Ok(Self::RemoveLabel),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionStep {
    #[serde(rename = "type")]
    pub ty: ActionType,
    pub params: Map<String, Value>,
}

impl ActionStep {
    pub fn new(ty: ActionType) -> Self { Self { ty, params: ty.default_params() } }

    /// Parse one loosely-typed step object. Non-objects, steps without a
    /// supported `type`, and steps whose `type` is not a string are rejected;
    /// a missing or non-object `params` becomes an empty map.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let ty = obj.get("type")?.as_str()?.parse::<ActionType>().ok()?;
        let params = match obj.get("params") {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        Some(Self { ty, params })
    }

    pub fn param(&self, key: &str) -> &str {
        self.params.get(key).and_then(Value::as_str).unwrap_or_default()
    }
}

/// Filter a raw step list down to the supported steps, preserving order.
/// Returns the kept steps and how many entries were dropped.
pub fn parse_steps(raw: &[Value]) -> (Vec<ActionStep>, usize) {
    let steps = raw.iter().filter_map(ActionStep::from_value).collect::<Vec<_>>();
    let dropped = raw.len() - steps.len();
    (steps, dropped)
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Trigger {
    pub event: String,
}

/// A workflow record as the API returns it. `trigger.event` and `steps` stay
/// loosely typed here: an unsupported server-side configuration must load
/// without error and be filtered at the editing boundary instead.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub scope: RepoScope,
    pub trigger: Trigger,
    #[serde(default)]
    pub steps: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateWorkflowPayload {
    pub name: String,
    pub enabled: bool,
    pub trigger: Trigger,
    pub steps: Vec<ActionStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Only name, description and enabled are mutable after creation. Trigger and
/// steps are fixed once a workflow exists; the edit form renders those
/// controls disabled.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PatchWorkflowPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}
