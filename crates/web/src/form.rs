use std::{
    collections::{BTreeMap, HashSet},
    sync::{Arc, Mutex, PoisonError},
};

use flowarden_core::models::{
    ALL_TRIGGER_EVENTS, ActionStep, ActionType, CreateWorkflowPayload, PatchWorkflowPayload,
    Trigger, TriggerEvent, Workflow, parse_steps,
};
use serde_json::Value;

/// Which parts of the draft the user has interacted with. Validation errors
/// render only for touched fields; saving touches everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Touched {
    pub name: bool,
    pub trigger: bool,
    pub actions: bool,
}

/// Non-fatal issues found while loading a stored workflow into the editor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DraftWarnings {
    pub dropped_steps: usize,
    pub unsupported_trigger: Option<String>,
}

impl DraftWarnings {
    pub fn is_empty(&self) -> bool {
        self.dropped_steps == 0 && self.unsupported_trigger.is_none()
    }
}

/// Validation output. `action_errors` is index-aligned with the draft's
/// actions; a `None` entry is a valid row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldErrors {
    pub name: Option<&'static str>,
    pub actions: Option<&'static str>,
    pub action_errors: Vec<Option<&'static str>>,
}

impl FieldErrors {
    pub fn is_valid(&self) -> bool {
        self.name.is_none()
            && self.actions.is_none()
            && self.action_errors.iter().all(Option::is_none)
    }
}

/// The in-progress form state for creating or editing a workflow. Pure data:
/// every operation is synchronous and the model never talks to the network.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowDraft {
    pub name: String,
    pub description: String,
    pub enabled: bool,
    pub trigger: TriggerEvent,
    pub actions: Vec<ActionStep>,
    pub touched: Touched,
}

impl Default for WorkflowDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            enabled: true,
            trigger: ALL_TRIGGER_EVENTS[0],
            actions: vec![ActionStep::new(ActionType::AddLabel)],
            touched: Touched::default(),
        }
    }
}

impl WorkflowDraft {
    /// Load a stored workflow for editing. Unsupported steps are dropped and
    /// an unsupported trigger falls back to the first supported event; both
    /// are reported as warnings so the record still opens.
    pub fn from_workflow(workflow: &Workflow) -> (Self, DraftWarnings) {
        let mut warnings = DraftWarnings::default();
        let (mut actions, dropped) = parse_steps(&workflow.steps);
        warnings.dropped_steps = dropped;
        if actions.is_empty() {
            actions.push(ActionStep::new(ActionType::AddLabel));
        }
        let trigger = match workflow.trigger.event.parse::<TriggerEvent>() {
            Ok(event) => event,
            Err(()) => {
                warnings.unsupported_trigger = Some(workflow.trigger.event.clone());
                ALL_TRIGGER_EVENTS[0]
            }
        };
        let draft = Self {
            name: workflow.name.clone(),
            description: workflow.description.clone().unwrap_or_default(),
            enabled: workflow.enabled,
            trigger,
            actions,
            touched: Touched::default(),
        };
        (draft, warnings)
    }

    /// Decode a posted form. Fields the form re-posts wholesale are assigned
    /// directly; touched state is carried by the round-tripped hidden fields
    /// rather than by the assignments here. Tampered values (unknown trigger,
    /// unknown action type, bad indices) degrade instead of failing: the
    /// trigger falls back to the first supported event and bad rows are
    /// dropped.
    pub fn from_form_pairs(pairs: &[(String, String)]) -> Self {
        let mut draft = Self { enabled: false, actions: Vec::new(), ..Self::default() };
        let mut touched = Touched::default();
        let mut rows: BTreeMap<usize, FormRow> = BTreeMap::new();
        for (field, value) in pairs {
            if let Some(index) = row_index(field, "action_type_") {
                rows.entry(index).or_default().ty = value.parse().ok();
            } else if let Some(index) = row_index(field, "action_param_") {
                rows.entry(index).or_default().param = Some(value.clone());
            } else if let Some(index) = row_index(field, "prev_type_") {
                rows.entry(index).or_default().prev = value.parse().ok();
            } else {
                match field.as_str() {
                    "name" => draft.set_name(value.clone()),
                    "description" => draft.set_description(value.clone()),
                    "enabled" => draft.set_enabled(value == "on"),
                    "trigger" => {
                        draft.set_trigger(value.parse().unwrap_or(ALL_TRIGGER_EVENTS[0]))
                    }
                    "touched_name" => touched.name = value == "true",
                    "touched_trigger" => touched.trigger = value == "true",
                    "touched_actions" => touched.actions = value == "true",
                    _ => {}
                }
            }
        }
        let mut type_changed = false;
        for row in rows.into_values() {
            let Some(ty) = row.ty else { continue };
            draft.actions.push(ActionStep::new(ty));
            if row.prev == Some(ty) {
                if let (Some(key), Some(param)) = (ty.required_param(), row.param) {
                    draft.set_action_param(draft.actions.len() - 1, key, param);
                }
            } else {
                // The type select changed since the last render; keep the new
                // type's defaults and discard the stale param text.
                type_changed = true;
            }
        }
        touched.actions |= type_changed;
        draft.touched = touched;
        draft
    }

    pub fn set_name(&mut self, name: String) {
        self.touched.name = true;
        self.name = name;
    }

    pub fn set_description(&mut self, description: String) { self.description = description; }

    pub fn set_enabled(&mut self, enabled: bool) { self.enabled = enabled; }

    pub fn set_trigger(&mut self, event: TriggerEvent) {
        self.touched.trigger = true;
        self.trigger = event;
    }

    pub fn add_action(&mut self) {
        self.touched.actions = true;
        self.actions.push(ActionStep::new(ActionType::AddLabel));
    }

    pub fn remove_action(&mut self, index: usize) {
        self.touched.actions = true;
        if index < self.actions.len() {
            self.actions.remove(index);
        }
    }

    /// Selecting a new type resets the row to that type's default params;
    /// re-selecting the current type keeps them.
    pub fn set_action_type(&mut self, index: usize, ty: ActionType) {
        self.touched.actions = true;
        if let Some(action) = self.actions.get_mut(index) {
            if action.ty != ty {
                *action = ActionStep::new(ty);
            }
        }
    }

    pub fn set_action_param(&mut self, index: usize, key: &str, value: String) {
        self.touched.actions = true;
        if let Some(action) = self.actions.get_mut(index) {
            action.params.insert(key.to_string(), Value::from(value));
        }
    }

    /// Edge moves are no-ops: the first row never moves up, the last never
    /// moves down.
    pub fn move_up(&mut self, index: usize) {
        self.touched.actions = true;
        if index > 0 && index < self.actions.len() {
            self.actions.swap(index, index - 1);
        }
    }

    pub fn move_down(&mut self, index: usize) {
        self.touched.actions = true;
        if index + 1 < self.actions.len() {
            self.actions.swap(index, index + 1);
        }
    }

    pub fn touch_all(&mut self) {
        self.touched = Touched { name: true, trigger: true, actions: true };
    }

    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::default();
        if self.name.trim().is_empty() {
            errors.name = Some("Name is required.");
        }
        if self.actions.is_empty() {
            errors.actions = Some("Add at least one action.");
        }
        errors.action_errors = self.actions.iter().map(validate_action).collect();
        errors
    }

    /// Edit saves patch only the mutable fields, so only those fields can
    /// block them.
    pub fn validate_patch(&self) -> FieldErrors {
        let mut errors = FieldErrors::default();
        if self.name.trim().is_empty() {
            errors.name = Some("Name is required.");
        }
        errors
    }

    /// Build the create payload. The name is trimmed; an empty description is
    /// omitted entirely.
    pub fn create_payload(&self) -> CreateWorkflowPayload {
        let description = self.description.trim();
        CreateWorkflowPayload {
            name: self.name.trim().to_string(),
            enabled: self.enabled,
            trigger: Trigger { event: self.trigger.as_str().to_string() },
            steps: self.actions.clone(),
            description: (!description.is_empty()).then_some(description.to_string()),
        }
    }

    /// Build the restricted patch: trigger and steps never leave the client
    /// on an edit save.
    pub fn patch_payload(&self) -> PatchWorkflowPayload {
        let description = self.description.trim();
        PatchWorkflowPayload {
            name: Some(self.name.trim().to_string()),
            description: (!description.is_empty()).then_some(description.to_string()),
            enabled: Some(self.enabled),
        }
    }
}

fn validate_action(step: &ActionStep) -> Option<&'static str> {
    let key = step.ty.required_param()?;
    if !step.param(key).trim().is_empty() {
        return None;
    }
    Some(match step.ty {
        ActionType::SetProjectStatus => "Status is required.",
        ActionType::AddLabel => "Label is required.",
        ActionType::AddComment => "Comment text is required.",
        ActionType::RemoveLabel => return None,
    })
}

#[derive(Default)]
struct FormRow {
    prev: Option<ActionType>,
    ty: Option<ActionType>,
    param: Option<String>,
}

fn row_index(field: &str, prefix: &str) -> Option<usize> {
    field.strip_prefix(prefix)?.parse().ok()
}

/// The button that submitted the form. Every button is named `op` with the
/// operation encoded in the value, so one handler serves all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormOp {
    Save,
    AddAction,
    RemoveAction(usize),
    MoveUp(usize),
    MoveDown(usize),
}

impl FormOp {
    pub fn parse(value: &str) -> Option<Self> {
        if let Some(rest) = value.strip_prefix("remove_") {
            return rest.parse().ok().map(Self::RemoveAction);
        }
        if let Some(rest) = value.strip_prefix("up_") {
            return rest.parse().ok().map(Self::MoveUp);
        }
        if let Some(rest) = value.strip_prefix("down_") {
            return rest.parse().ok().map(Self::MoveDown);
        }
        match value {
            "save" => Some(Self::Save),
            "add" => Some(Self::AddAction),
            _ => None,
        }
    }

    /// A missing or unknown op reads as a plain save.
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        pairs
            .iter()
            .find(|(field, _)| field == "op")
            .and_then(|(_, value)| Self::parse(value))
            .unwrap_or(Self::Save)
    }

    /// Apply a non-save edit to the draft. `Save` is handled by the caller.
    pub fn apply(self, draft: &mut WorkflowDraft) {
        match self {
            Self::Save => {}
            Self::AddAction => draft.add_action(),
            Self::RemoveAction(index) => draft.remove_action(index),
            Self::MoveUp(index) => draft.move_up(index),
            Self::MoveDown(index) => draft.move_down(index),
        }
    }
}

/// In-flight submit guard. While a lease is held for a key, further acquires
/// for that key fail, so a double-posted form performs exactly one API call.
#[derive(Clone, Default)]
pub struct SubmitLocks(Arc<Mutex<HashSet<String>>>);

impl SubmitLocks {
    pub fn acquire(&self, key: &str) -> Option<SubmitLease> {
        let mut held = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if !held.insert(key.to_string()) {
            return None;
        }
        Some(SubmitLease { locks: self.clone(), key: key.to_string() })
    }
}

pub struct SubmitLease {
    locks: SubmitLocks,
    key: String,
}

impl Drop for SubmitLease {
    fn drop(&mut self) {
        let mut held = self.locks.0.lock().unwrap_or_else(PoisonError::into_inner);
        held.remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn pairs(list: &[(&str, &str)]) -> Vec<(String, String)> {
        list.iter().map(|&(field, value)| (field.to_string(), value.to_string())).collect()
    }

    fn labeled(value: &str) -> ActionStep {
        let mut step = ActionStep::new(ActionType::AddLabel);
        step.params.insert("label".to_string(), Value::from(value));
        step
    }

    fn order(draft: &WorkflowDraft) -> Vec<String> {
        draft.actions.iter().map(|action| action.param("label").to_string()).collect()
    }

    #[test]
    fn test_empty_draft_reports_all_errors() {
        let draft =
            WorkflowDraft { name: "   ".to_string(), actions: Vec::new(), ..Default::default() };
        let errors = draft.validate();
        assert_eq!(errors.name, Some("Name is required."));
        assert_eq!(errors.actions, Some("Add at least one action."));
        assert!(errors.action_errors.is_empty());
        assert!(!errors.is_valid());
    }

    #[test]
    fn test_blank_required_param_errors_at_its_index() {
        let mut draft = WorkflowDraft { name: "Label PRs".to_string(), ..Default::default() };
        draft.add_action();
        draft.set_action_param(0, "label", "   ".to_string());
        let errors = draft.validate();
        assert_eq!(errors.name, None);
        assert_eq!(errors.actions, None);
        assert_eq!(errors.action_errors, vec![Some("Label is required."), None]);
        assert!(!errors.is_valid());
    }

    #[test]
    fn test_per_type_required_messages() {
        let cases: &[(ActionType, Option<&str>)] = &[
            (ActionType::AddLabel, Some("Label is required.")),
            (ActionType::AddComment, Some("Comment text is required.")),
            (ActionType::SetProjectStatus, Some("Status is required.")),
            (ActionType::RemoveLabel, None),
        ];
        for &(ty, expected) in cases {
            let mut step = ActionStep::new(ty);
            step.params.clear();
            let mut draft = WorkflowDraft {
                name: "n".to_string(),
                actions: vec![step],
                ..Default::default()
            };
            assert_eq!(draft.validate().action_errors, vec![expected], "{ty:?}");
            // The type's default params always satisfy validation
            draft.actions = vec![ActionStep::new(ty)];
            assert!(draft.validate().is_valid(), "{ty:?}");
        }
    }

    #[test]
    fn test_move_edges_are_no_ops() {
        let mut draft = WorkflowDraft {
            name: "n".to_string(),
            actions: vec![labeled("1"), labeled("2"), labeled("3")],
            ..Default::default()
        };
        draft.move_down(0);
        assert_eq!(order(&draft), ["2", "1", "3"]);
        draft.move_down(2);
        assert_eq!(order(&draft), ["2", "1", "3"]);
        draft.move_up(0);
        assert_eq!(order(&draft), ["2", "1", "3"]);
        draft.move_up(2);
        assert_eq!(order(&draft), ["2", "3", "1"]);
        assert!(draft.touched.actions);
    }

    #[test]
    fn test_set_action_type_resets_params() {
        let mut draft = WorkflowDraft { name: "n".to_string(), ..Default::default() };
        draft.set_action_param(0, "label", "urgent".to_string());
        draft.set_action_type(0, ActionType::SetProjectStatus);
        assert_eq!(draft.actions[0].param("status"), "In Review");
        assert!(!draft.actions[0].params.contains_key("label"));
        // Re-selecting the current type keeps the edited params
        draft.set_action_param(0, "status", "Done".to_string());
        draft.set_action_type(0, ActionType::SetProjectStatus);
        assert_eq!(draft.actions[0].param("status"), "Done");
    }

    #[test]
    fn test_from_workflow_filters_and_warns() {
        let workflow: Workflow = serde_json::from_value(json!({
            "id": "wf_9",
            "name": "Mixed",
            "enabled": false,
            "scope": {"installationId": 1, "repositoryId": 2},
            "trigger": {"event": "issue.locked"},
            "steps": [
                {"type": "addComment", "params": {"body": "hi"}},
                {"type": "closeIssue", "params": {}},
                "junk",
            ],
        }))
        .unwrap();
        let (draft, warnings) = WorkflowDraft::from_workflow(&workflow);
        assert_eq!(draft.trigger, ALL_TRIGGER_EVENTS[0]);
        assert_eq!(draft.actions.len(), 1);
        assert_eq!(draft.actions[0].ty, ActionType::AddComment);
        assert!(!draft.enabled);
        assert_eq!(warnings.dropped_steps, 2);
        assert_eq!(warnings.unsupported_trigger.as_deref(), Some("issue.locked"));
        assert!(!warnings.is_empty());
    }

    #[test]
    fn test_from_workflow_seeds_empty_steps() {
        let workflow: Workflow = serde_json::from_value(json!({
            "id": "wf_1",
            "name": "Bare",
            "enabled": true,
            "scope": {"installationId": 1, "repositoryId": 2},
            "trigger": {"event": "push"},
            "steps": [],
        }))
        .unwrap();
        let (draft, warnings) = WorkflowDraft::from_workflow(&workflow);
        assert_eq!(draft.trigger, TriggerEvent::Push);
        assert_eq!(draft.actions, vec![ActionStep::new(ActionType::AddLabel)]);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_form_pairs_round_trip() {
        let posted = pairs(&[
            ("name", "Label WIP PRs"),
            ("description", ""),
            ("enabled", "on"),
            ("trigger", "pull_request.opened"),
            ("touched_name", "true"),
            ("touched_actions", "false"),
            ("prev_type_0", "addLabel"),
            ("action_type_0", "addLabel"),
            ("action_param_0", "needs-review"),
            ("prev_type_1", "removeLabel"),
            ("action_type_1", "removeLabel"),
            ("op", "save"),
        ]);
        let draft = WorkflowDraft::from_form_pairs(&posted);
        assert_eq!(draft.name, "Label WIP PRs");
        assert!(draft.enabled);
        assert_eq!(draft.trigger, TriggerEvent::PullRequestOpened);
        assert_eq!(draft.actions.len(), 2);
        assert_eq!(draft.actions[0].param("label"), "needs-review");
        assert!(draft.actions[1].params.is_empty());
        assert!(draft.touched.name);
        assert!(!draft.touched.actions);
    }

    #[test]
    fn test_form_pairs_type_change_resets_params() {
        let posted = pairs(&[
            ("name", "n"),
            ("trigger", "push"),
            ("prev_type_0", "addLabel"),
            ("action_type_0", "addComment"),
            ("action_param_0", "urgent"),
        ]);
        let draft = WorkflowDraft::from_form_pairs(&posted);
        // Unchecked checkboxes post nothing
        assert!(!draft.enabled);
        assert_eq!(draft.actions[0].ty, ActionType::AddComment);
        assert_eq!(draft.actions[0].param("body"), "Hello from workflow");
        assert!(draft.touched.actions);
    }

    #[test]
    fn test_form_pairs_tampered_values_degrade() {
        let posted = pairs(&[
            ("name", "n"),
            ("trigger", "not.an.event"),
            ("action_type_0", "launchMissiles"),
            ("prev_type_1", "addLabel"),
            ("action_type_1", "addLabel"),
            ("action_param_1", "ok"),
            ("action_type_x", "addComment"),
        ]);
        let draft = WorkflowDraft::from_form_pairs(&posted);
        assert_eq!(draft.trigger, ALL_TRIGGER_EVENTS[0]);
        assert_eq!(draft.actions.len(), 1);
        assert_eq!(draft.actions[0].param("label"), "ok");
    }

    #[test]
    fn test_op_grammar() {
        let cases: &[(&str, Option<FormOp>)] = &[
            ("save", Some(FormOp::Save)),
            ("add", Some(FormOp::AddAction)),
            ("remove_0", Some(FormOp::RemoveAction(0))),
            ("up_2", Some(FormOp::MoveUp(2))),
            ("down_10", Some(FormOp::MoveDown(10))),
            ("remove_", None),
            ("up_x", None),
            ("explode", None),
        ];
        for &(value, expected) in cases {
            assert_eq!(FormOp::parse(value), expected, "{value:?}");
        }
        assert_eq!(FormOp::from_pairs(&pairs(&[("name", "n")])), FormOp::Save);
        assert_eq!(FormOp::from_pairs(&pairs(&[("op", "add")])), FormOp::AddAction);
    }

    #[test]
    fn test_apply_ops() {
        let mut draft = WorkflowDraft::default();
        FormOp::AddAction.apply(&mut draft);
        assert_eq!(draft.actions.len(), 2);
        FormOp::RemoveAction(0).apply(&mut draft);
        assert_eq!(draft.actions.len(), 1);
        FormOp::RemoveAction(9).apply(&mut draft);
        assert_eq!(draft.actions.len(), 1);
        assert!(draft.touched.actions);
    }

    #[test]
    fn test_create_payload_shape() {
        let mut draft = WorkflowDraft {
            name: "  Label WIP  ".to_string(),
            description: "  ".to_string(),
            ..Default::default()
        };
        let payload = draft.create_payload();
        assert_eq!(payload.name, "Label WIP");
        assert_eq!(payload.description, None);
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "name": "Label WIP",
                "enabled": true,
                "trigger": {"event": "push"},
                "steps": [{"type": "addLabel", "params": {"label": "wip"}}],
            })
        );
        draft.description = "Adds the wip label".to_string();
        assert_eq!(draft.create_payload().description.as_deref(), Some("Adds the wip label"));
    }

    #[test]
    fn test_patch_payload_is_restricted() {
        let draft = WorkflowDraft {
            name: " Renamed ".to_string(),
            enabled: false,
            ..Default::default()
        };
        let value = serde_json::to_value(draft.patch_payload()).unwrap();
        assert_eq!(value, json!({"name": "Renamed", "enabled": false}));
    }

    #[test]
    fn test_validate_patch_checks_name_only() {
        let draft =
            WorkflowDraft { name: String::new(), actions: Vec::new(), ..Default::default() };
        let errors = draft.validate_patch();
        assert_eq!(errors.name, Some("Name is required."));
        assert_eq!(errors.actions, None);
        assert!(!errors.is_valid());
        assert!(WorkflowDraft { name: "n".to_string(), ..draft }.validate_patch().is_valid());
    }

    #[test]
    fn test_submit_lease_blocks_second_acquire() {
        let locks = SubmitLocks::default();
        let lease = locks.acquire("sess:/workflows/new");
        assert!(lease.is_some());
        assert!(locks.acquire("sess:/workflows/new").is_none());
        assert!(locks.acquire("other:/workflows/new").is_some());
        drop(lease);
        assert!(locks.acquire("sess:/workflows/new").is_some());
    }
}
