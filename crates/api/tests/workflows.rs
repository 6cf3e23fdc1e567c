mod common;

use std::sync::{Arc, Mutex};

use anyhow::Result;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use flowarden_core::models::{
    ActionStep, ActionType, CreateWorkflowPayload, PatchWorkflowPayload, Trigger,
};
use serde_json::{Value, json};

/// Minimal in-memory rendition of the Workflows API, envelope included.
#[derive(Clone, Default)]
struct Store {
    workflows: Arc<Mutex<Vec<Value>>>,
}

fn ok(data: Value) -> Json<Value> { Json(json!({"ok": true, "data": data})) }

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "ok": false,
            "error": {"code": "WORKFLOW_NOT_FOUND", "message": "Workflow not found"},
        })),
    )
        .into_response()
}

async fn list(State(store): State<Store>) -> Json<Value> {
    let workflows = store.workflows.lock().unwrap().clone();
    ok(Value::from(workflows))
}

async fn create(State(store): State<Store>, Json(body): Json<Value>) -> Json<Value> {
    let mut workflows = store.workflows.lock().unwrap();
    let mut workflow = body;
    workflow["id"] = Value::from(format!("wf_{}", workflows.len() + 1));
    workflow["scope"] = json!({"installationId": 55, "repositoryId": 7001});
    workflows.push(workflow.clone());
    ok(workflow)
}

async fn fetch(State(store): State<Store>, Path(id): Path<String>) -> Response {
    let workflows = store.workflows.lock().unwrap();
    match workflows.iter().find(|w| w.get("id").and_then(Value::as_str) == Some(id.as_str())) {
        Some(workflow) => ok(workflow.clone()).into_response(),
        None => not_found(),
    }
}

async fn update(
    State(store): State<Store>,
    Path(id): Path<String>,
    Json(patch): Json<Value>,
) -> Response {
    let mut workflows = store.workflows.lock().unwrap();
    let Some(workflow) =
        workflows.iter_mut().find(|w| w.get("id").and_then(Value::as_str) == Some(id.as_str()))
    else {
        return not_found();
    };
    if let Some(fields) = patch.as_object() {
        for (key, value) in fields {
            workflow[key.as_str()] = value.clone();
        }
    }
    ok(workflow.clone()).into_response()
}

async fn remove(State(store): State<Store>, Path(id): Path<String>) -> Response {
    let mut workflows = store.workflows.lock().unwrap();
    let before = workflows.len();
    workflows.retain(|w| w.get("id").and_then(Value::as_str) != Some(id.as_str()));
    if workflows.len() == before {
        return not_found();
    }
    StatusCode::NO_CONTENT.into_response()
}

fn workflows_router() -> Router {
    Router::new()
        .route("/api/workflows", post(create).get(list))
        .route("/api/workflows/{id}", get(fetch).patch(update).delete(remove))
        .with_state(Store::default())
}

fn payload(name: &str, steps: Vec<ActionStep>) -> CreateWorkflowPayload {
    CreateWorkflowPayload {
        name: name.to_string(),
        enabled: true,
        trigger: Trigger { event: "pull_request.opened".to_string() },
        steps,
        description: None,
    }
}

#[tokio::test]
async fn create_then_get_preserves_step_order() -> Result<()> {
    let server = common::spawn(workflows_router()).await?;
    let client = common::client(&server);

    let steps = vec![
        ActionStep::new(ActionType::AddLabel),
        ActionStep::new(ActionType::AddComment),
        ActionStep::new(ActionType::SetProjectStatus),
    ];
    let created = client.create_workflow(common::SCOPE, &payload("Triage", steps.clone())).await?;
    assert_eq!(created.name, "Triage");

    let fetched = client.get_workflow(common::SCOPE, &created.id).await?;
    let expected =
        steps.iter().map(|s| serde_json::to_value(s).unwrap()).collect::<Vec<Value>>();
    assert_eq!(fetched.steps, expected);
    Ok(())
}

#[tokio::test]
async fn patch_updates_only_sent_fields() -> Result<()> {
    let server = common::spawn(workflows_router()).await?;
    let client = common::client(&server);

    let created = client
        .create_workflow(common::SCOPE, &payload("Label WIP", vec![ActionStep::new(ActionType::AddLabel)]))
        .await?;
    assert!(created.enabled);

    let patch = PatchWorkflowPayload { enabled: Some(false), ..Default::default() };
    let updated = client.update_workflow(common::SCOPE, &created.id, &patch).await?;
    assert!(!updated.enabled);
    assert_eq!(updated.name, "Label WIP");
    Ok(())
}

#[tokio::test]
async fn second_delete_reports_not_found() -> Result<()> {
    let server = common::spawn(workflows_router()).await?;
    let client = common::client(&server);

    let created = client
        .create_workflow(common::SCOPE, &payload("Once", vec![ActionStep::new(ActionType::AddLabel)]))
        .await?;
    client.delete_workflow(common::SCOPE, &created.id).await?;

    let err = client.delete_workflow(common::SCOPE, &created.id).await.unwrap_err();
    assert_eq!(err.status, Some(StatusCode::NOT_FOUND));
    assert_eq!(err.message, "Workflow not found");

    let remaining = client.list_workflows(common::SCOPE).await?;
    assert!(remaining.is_empty());
    Ok(())
}

#[tokio::test]
async fn get_unknown_workflow_is_typed_error() -> Result<()> {
    let server = common::spawn(workflows_router()).await?;
    let client = common::client(&server);

    let err = client.get_workflow(common::SCOPE, "wf_404").await.unwrap_err();
    assert_eq!(err.status, Some(StatusCode::NOT_FOUND));
    assert_eq!(err.message, "Workflow not found");
    Ok(())
}
