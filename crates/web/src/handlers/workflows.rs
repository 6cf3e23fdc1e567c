use axum::{
    Form,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use flowarden_api::ApiError;
use flowarden_core::{
    AppError,
    models::{ALL_ACTION_TYPES, ALL_TRIGGER_EVENTS, ActionStep, ActionType, TriggerEvent, Workflow},
};
use maud::{DOCTYPE, Markup, html};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::{
    AppState,
    form::{DraftWarnings, FieldErrors, FormOp, WorkflowDraft},
    handlers::common::TemplateContext,
    scope::{CurrentScope, scope_options, scope_selector},
};

/// One-shot flash shown at the top of the list page after a redirect.
const WORKFLOWS_MESSAGE_KEY: &str = "workflows_message";

#[derive(Debug, Serialize, Deserialize, Default)]
enum Message {
    #[default]
    None,
    Info(String),
    Error(String),
}

fn render_message(message: &Message) -> Markup {
    match message {
        Message::None => Markup::default(),
        Message::Info(msg) => html! {
            article.info-card { (msg) }
        },
        Message::Error(msg) => html! {
            article.error-card { (msg) }
        },
    }
}

pub async fn index() -> Redirect { Redirect::to("/workflows") }

pub async fn list(
    ctx: TemplateContext,
    State(state): State<AppState>,
    CurrentScope(scope): CurrentScope,
    session: Session,
) -> Result<Response, AppError> {
    let message = session.remove::<Message>(WORKFLOWS_MESSAGE_KEY).await?.unwrap_or_default();
    let result = state.api.list_workflows(scope).await;
    if let Err(e) = &result {
        tracing::warn!("Failed to list workflows: {e}");
    }
    let options = scope_options(&state.config.demo);

    let rendered = html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                title { "Workflows • flowarden" }
                (ctx.header())
            }
            body {
                header {
                    nav {
                        ul {
                            li {
                                a href="/workflows" { strong { "flowarden" } }
                            }
                            li {
                                a href="/workflows" { "Workflows" }
                            }
                        }
                        (scope_selector(&options, scope))
                    }
                }
                main {
                    .page-header {
                        h3 { "Workflows" }
                        a href="/workflows/new" role="button" { "Create Workflow" }
                    }
                    (render_message(&message))
                    @match &result {
                        Ok(workflows) => {
                            @if workflows.is_empty() {
                                article.empty-state {
                                    p { "No workflows yet." }
                                    p.muted { "Create your first automation to get started." }
                                }
                            } @else {
                                (workflow_table(workflows))
                            }
                        }
                        Err(e) => {
                            article.error-card {
                                "Error: " (e) " "
                                a href="/workflows" { "Retry" }
                            }
                        }
                    }
                }
                (ctx.footer())
            }
        }
    };
    Ok((ctx, rendered).into_response())
}

fn workflow_table(workflows: &[Workflow]) -> Markup {
    html! {
        table {
            thead {
                tr {
                    th { "Name" }
                    th { "Trigger" }
                    th { "Status" }
                    th { "Actions" }
                }
            }
            tbody {
                @for workflow in workflows {
                    tr {
                        td { (workflow.name) }
                        td { (trigger_label(&workflow.trigger.event)) }
                        td {
                            @if workflow.enabled {
                                span.status-enabled { "Enabled" }
                            } @else {
                                span.status-disabled { "Disabled" }
                            }
                        }
                        td.row-actions {
                            a href=(format!("/workflows/{}", workflow.id))
                                role="button" class="outline" { "Edit" }
                            a href=(format!("/workflows/{}/delete", workflow.id))
                                role="button" class="outline secondary" { "Delete" }
                        }
                    }
                }
            }
        }
    }
}

/// Human label for supported events, the raw event name for anything else.
fn trigger_label(event: &str) -> String {
    match event.parse::<TriggerEvent>() {
        Ok(event) => event.name().to_string(),
        Err(()) => event.to_string(),
    }
}

pub async fn new(ctx: TemplateContext) -> Result<Response, AppError> {
    Ok(render_new(ctx, &WorkflowDraft::default(), None))
}

pub async fn new_save(
    ctx: TemplateContext,
    State(state): State<AppState>,
    CurrentScope(scope): CurrentScope,
    session: Session,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let op = FormOp::from_pairs(&pairs);
    let mut draft = WorkflowDraft::from_form_pairs(&pairs);
    if op != FormOp::Save {
        op.apply(&mut draft);
        return Ok(render_new(ctx, &draft, None));
    }
    draft.touch_all();
    if !draft.validate().is_valid() {
        return Ok(render_new(ctx, &draft, Some("Fix the errors above before saving.")));
    }
    let key = submit_key(&session, "/workflows/new").await?;
    let Some(_lease) = state.locks.acquire(&key) else {
        // An identical submit is already in flight; render without repeating it
        return Ok(render_new(ctx, &draft, None));
    };
    match state.api.create_workflow(scope, &draft.create_payload()).await {
        Ok(workflow) => {
            tracing::info!(id = %workflow.id, "Created workflow");
            session
                .insert(WORKFLOWS_MESSAGE_KEY, Message::Info("Workflow created.".to_string()))
                .await?;
            Ok(Redirect::to("/workflows").into_response())
        }
        Err(e) => {
            tracing::error!("Failed to create workflow: {e}");
            Ok(render_new(ctx, &draft, Some(&e.to_string())))
        }
    }
}

fn render_new(ctx: TemplateContext, draft: &WorkflowDraft, form_error: Option<&str>) -> Response {
    let errors = draft.validate();
    let rendered = html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                title { "Create Workflow • flowarden" }
                (ctx.header())
            }
            body {
                header {
                    nav {
                        ul {
                            li {
                                a href="/workflows" { strong { "flowarden" } }
                            }
                            li {
                                a href="/workflows/new" { "Create Workflow" }
                            }
                        }
                    }
                }
                main {
                    h3 { "Create Workflow" }
                    form method="post" {
                        (draft_fields(draft, &errors, false))
                        (form_footer(form_error, "Create Workflow"))
                    }
                }
                (ctx.footer())
            }
        }
    };
    (ctx, rendered).into_response()
}

#[derive(Deserialize)]
pub struct WorkflowParams {
    workflow_id: String,
}

pub async fn edit(
    Path(params): Path<WorkflowParams>,
    ctx: TemplateContext,
    State(state): State<AppState>,
    CurrentScope(scope): CurrentScope,
) -> Result<Response, AppError> {
    match state.api.get_workflow(scope, &params.workflow_id).await {
        Ok(workflow) => {
            let (draft, warnings) = WorkflowDraft::from_workflow(&workflow);
            Ok(render_edit(ctx, &workflow, &draft, &warnings, None))
        }
        Err(e) => {
            tracing::warn!(id = %params.workflow_id, "Failed to fetch workflow: {e}");
            Ok(render_load_error(ctx, "Edit Workflow", &e))
        }
    }
}

pub async fn edit_save(
    Path(params): Path<WorkflowParams>,
    ctx: TemplateContext,
    State(state): State<AppState>,
    CurrentScope(scope): CurrentScope,
    session: Session,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let posted = WorkflowDraft::from_form_pairs(&pairs);
    // Trigger and steps are immutable, and their form controls are disabled
    // so the post carries nothing for them. Re-fetch the record for display
    // and overlay the editable fields.
    let workflow = match state.api.get_workflow(scope, &params.workflow_id).await {
        Ok(workflow) => workflow,
        Err(e) => {
            tracing::warn!(id = %params.workflow_id, "Failed to fetch workflow: {e}");
            return Ok(render_load_error(ctx, "Edit Workflow", &e));
        }
    };
    let (mut draft, warnings) = WorkflowDraft::from_workflow(&workflow);
    draft.set_name(posted.name);
    draft.set_description(posted.description);
    draft.set_enabled(posted.enabled);
    draft.touch_all();
    if !draft.validate_patch().is_valid() {
        let message = "Fix the errors above before saving.";
        return Ok(render_edit(ctx, &workflow, &draft, &warnings, Some(message)));
    }
    let key = submit_key(&session, &format!("/workflows/{}", workflow.id)).await?;
    let Some(_lease) = state.locks.acquire(&key) else {
        return Ok(render_edit(ctx, &workflow, &draft, &warnings, None));
    };
    match state.api.update_workflow(scope, &params.workflow_id, &draft.patch_payload()).await {
        Ok(updated) => {
            tracing::info!(id = %updated.id, "Updated workflow");
            session
                .insert(WORKFLOWS_MESSAGE_KEY, Message::Info("Workflow updated.".to_string()))
                .await?;
            Ok(Redirect::to("/workflows").into_response())
        }
        Err(e) => {
            tracing::error!(id = %workflow.id, "Failed to update workflow: {e}");
            Ok(render_edit(ctx, &workflow, &draft, &warnings, Some(&e.to_string())))
        }
    }
}

fn render_edit(
    ctx: TemplateContext,
    workflow: &Workflow,
    draft: &WorkflowDraft,
    warnings: &DraftWarnings,
    form_error: Option<&str>,
) -> Response {
    let errors = draft.validate_patch();
    let rendered = html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                title { "Edit " (workflow.name) " • flowarden" }
                (ctx.header())
            }
            body {
                header {
                    nav {
                        ul {
                            li {
                                a href="/workflows" { strong { "flowarden" } }
                            }
                            li {
                                a href=(format!("/workflows/{}", workflow.id)) { (workflow.name) }
                            }
                        }
                    }
                }
                main {
                    h3 { "Edit Workflow" }
                    (render_warnings(warnings))
                    form method="post" {
                        (draft_fields(draft, &errors, true))
                        (form_footer(form_error, "Save Changes"))
                    }
                }
                (ctx.footer())
            }
        }
    };
    (ctx, rendered).into_response()
}

fn render_warnings(warnings: &DraftWarnings) -> Markup {
    if warnings.is_empty() {
        return Markup::default();
    }
    html! {
        article.warning-card {
            @if let Some(event) = &warnings.unsupported_trigger {
                p { "Trigger " code { (event) } " is not supported by this editor." }
            }
            @if warnings.dropped_steps == 1 {
                p { "1 unsupported action is not shown." }
            } @else if warnings.dropped_steps > 1 {
                p { (warnings.dropped_steps) " unsupported actions are not shown." }
            }
        }
    }
}

fn render_load_error(ctx: TemplateContext, title: &str, error: &ApiError) -> Response {
    let rendered = html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                title { (title) " • flowarden" }
                (ctx.header())
            }
            body {
                header {
                    nav {
                        ul {
                            li {
                                a href="/workflows" { strong { "flowarden" } }
                            }
                        }
                    }
                }
                main {
                    h3 { (title) }
                    article.error-card { "Error: " (error) }
                    p { a href="/workflows" { "Back to workflows" } }
                }
                (ctx.footer())
            }
        }
    };
    (ctx, rendered).into_response()
}

pub async fn delete_confirm(
    Path(params): Path<WorkflowParams>,
    ctx: TemplateContext,
    State(state): State<AppState>,
    CurrentScope(scope): CurrentScope,
) -> Result<Response, AppError> {
    let workflow = match state.api.get_workflow(scope, &params.workflow_id).await {
        Ok(workflow) => workflow,
        Err(e) => {
            tracing::warn!(id = %params.workflow_id, "Failed to fetch workflow: {e}");
            return Ok(render_load_error(ctx, "Delete Workflow", &e));
        }
    };
    let delete_path = format!("/workflows/{}/delete", workflow.id);
    let rendered = html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                title { "Delete " (workflow.name) " • flowarden" }
                (ctx.header())
            }
            body {
                header {
                    nav {
                        ul {
                            li {
                                a href="/workflows" { strong { "flowarden" } }
                            }
                            li {
                                a href=(delete_path) { "Delete" }
                            }
                        }
                    }
                }
                main {
                    h3 { "Delete this workflow?" }
                    article {
                        p { strong { (workflow.name) } }
                        p.muted {
                            (trigger_label(&workflow.trigger.event))
                            " • "
                            @if workflow.enabled { "Enabled" } @else { "Disabled" }
                        }
                    }
                    form action=(delete_path) method="post" {
                        button type="submit" { "Delete" }
                        a href="/workflows" role="button" class="outline secondary" { "Cancel" }
                    }
                }
                (ctx.footer())
            }
        }
    };
    Ok((ctx, rendered).into_response())
}

pub async fn delete(
    Path(params): Path<WorkflowParams>,
    State(state): State<AppState>,
    CurrentScope(scope): CurrentScope,
    session: Session,
) -> Result<Response, AppError> {
    let key = submit_key(&session, &format!("/workflows/{}/delete", params.workflow_id)).await?;
    let Some(_lease) = state.locks.acquire(&key) else {
        return Ok(Redirect::to("/workflows").into_response());
    };
    let message = match state.api.delete_workflow(scope, &params.workflow_id).await {
        Ok(()) => {
            tracing::info!(id = %params.workflow_id, "Deleted workflow");
            Message::Info("Workflow deleted.".to_string())
        }
        Err(e) => {
            tracing::error!(id = %params.workflow_id, "Failed to delete workflow: {e}");
            Message::Error(e.to_string())
        }
    };
    session.insert(WORKFLOWS_MESSAGE_KEY, message).await?;
    Ok(Redirect::to("/workflows").into_response())
}

/// Submit-guard key for this browser and form. Forces a session id into
/// existence so every browser gets its own guard.
async fn submit_key(session: &Session, path: &str) -> Result<String, AppError> {
    if session.id().is_none() {
        session.save().await?;
    }
    match session.id() {
        Some(id) => Ok(format!("{id}:{path}")),
        None => Ok(path.to_string()),
    }
}

fn draft_fields(draft: &WorkflowDraft, errors: &FieldErrors, locked: bool) -> Markup {
    let name_error = if draft.touched.name { errors.name } else { None };
    let actions_error = if draft.touched.actions { errors.actions } else { None };
    html! {
        input type="hidden" name="touched_name" value=(draft.touched.name);
        input type="hidden" name="touched_trigger" value=(draft.touched.trigger);
        input type="hidden" name="touched_actions" value=(draft.touched.actions);
        // Enter in a text field clicks the first submit button; keep that the
        // save op rather than whichever row button renders first
        button.hidden type="submit" name="op" value="save" tabindex="-1" aria-hidden="true" {}
        fieldset {
            label {
                "Name"
                input name="name" placeholder="e.g. Label WIP PRs"
                    aria-invalid=[name_error.map(|_| "true")]
                    value=(draft.name);
                @if let Some(error) = name_error {
                    small.field-error { (error) }
                }
            }
            label {
                "Description "
                small { "(optional)" }
                input name="description" value=(draft.description);
            }
            label {
                input name="enabled" type="checkbox" role="switch" checked[draft.enabled];
                "Enabled"
            }
            label {
                "Trigger event"
                select name="trigger" disabled[locked] {
                    @for &event in ALL_TRIGGER_EVENTS {
                        option value=(event.as_str()) selected[event == draft.trigger] {
                            (event.name())
                        }
                    }
                }
                @if locked {
                    small.muted { "The trigger can't be changed after creation." }
                }
            }
        }
        section.actions {
            .section-header {
                h4 { "Actions" }
                @if !locked {
                    button type="submit" name="op" value="add" class="outline" { "Add Action" }
                }
            }
            @if let Some(error) = actions_error {
                p.field-error { (error) }
            }
            @for (index, action) in draft.actions.iter().enumerate() {
                (action_row(index, action, draft, errors, locked))
            }
            @if locked {
                small.muted { "Actions can't be changed after creation." }
            }
        }
    }
}

fn action_row(
    index: usize,
    action: &ActionStep,
    draft: &WorkflowDraft,
    errors: &FieldErrors,
    locked: bool,
) -> Markup {
    let error = if draft.touched.actions {
        errors.action_errors.get(index).copied().flatten()
    } else {
        None
    };
    let last = index + 1 == draft.actions.len();
    html! {
        article.action-row {
            .action-head {
                strong { "#" (index + 1) }
                select name=(format!("action_type_{index}")) disabled[locked] {
                    @for &ty in ALL_ACTION_TYPES {
                        option value=(ty.as_str()) selected[ty == action.ty] { (ty.name()) }
                    }
                }
                @if !locked {
                    input type="hidden" name=(format!("prev_type_{index}"))
                        value=(action.ty.as_str());
                    .action-buttons {
                        button type="submit" name="op" value=(format!("up_{index}"))
                            class="outline" disabled[index == 0] { "Up" }
                        button type="submit" name="op" value=(format!("down_{index}"))
                            class="outline" disabled[last] { "Down" }
                        button type="submit" name="op" value=(format!("remove_{index}"))
                            class="outline secondary" { "Remove" }
                    }
                }
            }
            (action_param_field(index, action, locked))
            @if let Some(error) = error {
                small.field-error { (error) }
            }
        }
    }
}

fn action_param_field(index: usize, action: &ActionStep, locked: bool) -> Markup {
    let field = format!("action_param_{index}");
    html! {
        @match action.ty {
            ActionType::AddLabel => {
                label {
                    "Label"
                    input name=(field) value=(action.param("label")) placeholder="wip"
                        disabled[locked];
                }
            }
            ActionType::AddComment => {
                label {
                    "Comment body"
                    textarea name=(field) rows="3" placeholder="Push detected (dev seed rule)"
                        disabled[locked] { (action.param("body")) }
                }
            }
            ActionType::SetProjectStatus => {
                label {
                    "Status"
                    input name=(field) value=(action.param("status")) placeholder="In Review"
                        disabled[locked];
                }
            }
            // removeLabel takes no parameters
            ActionType::RemoveLabel => {}
        }
    }
}

fn form_footer(form_error: Option<&str>, submit_label: &str) -> Markup {
    html! {
        @if let Some(message) = form_error {
            article.error-card { (message) }
        }
        .form-footer {
            button type="submit" name="op" value="save" { (submit_label) }
            a href="/workflows" role="button" class="outline secondary" { "Cancel" }
        }
    }
}
