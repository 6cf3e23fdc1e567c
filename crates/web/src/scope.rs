use std::sync::Arc;

use axum::{
    Form,
    extract::{FromRef, FromRequestParts, State},
    http::request::Parts,
    response::Redirect,
};
use flowarden_core::{
    AppError,
    config::{Config, DemoConfig},
    models::RepoScope,
};
use maud::{Markup, html};
use serde::Deserialize;
use tower_sessions::Session;

/// The one durable per-browser key: which (installation, repository) pair
/// the user last selected.
pub const SELECTED_SCOPE_KEY: &str = "selected_repo_scope";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeOption {
    pub label: String,
    pub scope: RepoScope,
}

/// The selectable repositories. Currently a single entry derived from the
/// demo configuration; an installation listing for a logged-in user would
/// slot in here without touching the pages.
pub fn scope_options(demo: &DemoConfig) -> Vec<ScopeOption> {
    let scope = demo.scope();
    vec![ScopeOption { label: format!("Demo Repo ({})", scope.repository_id), scope }]
}

/// Resolve a stored selection against the current options. A selection that
/// is no longer offered (or was never stored) falls back to the configured
/// scope.
pub fn resolve_scope(demo: &DemoConfig, stored: Option<RepoScope>) -> RepoScope {
    let options = scope_options(demo);
    stored
        .filter(|scope| options.iter().any(|option| option.scope == *scope))
        .unwrap_or_else(|| demo.scope())
}

/// The active scope for this request. Never fails: corrupt or stale session
/// state reads as the default selection.
#[derive(Debug, Clone, Copy)]
pub struct CurrentScope(pub RepoScope);

impl<S> FromRequestParts<S> for CurrentScope
where
    Arc<Config>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = Arc::<Config>::from_ref(state);
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(status, _)| AppError::Status(status))?;
        let stored = session.get::<RepoScope>(SELECTED_SCOPE_KEY).await.ok().flatten();
        Ok(Self(resolve_scope(&config.demo, stored)))
    }
}

pub fn scope_selector(options: &[ScopeOption], current: RepoScope) -> Markup {
    html! {
        form.scope-form action="/scope" method="post" {
            label {
                "Repository"
                select name="scope" {
                    @for option in options {
                        option value=(option.scope) selected[option.scope == current] {
                            (option.label)
                        }
                    }
                }
            }
            button type="submit" class="outline secondary" { "Switch" }
        }
    }
}

#[derive(Deserialize)]
pub struct ScopeForm {
    scope: String,
}

pub async fn set_scope(
    State(config): State<Arc<Config>>,
    session: Session,
    Form(form): Form<ScopeForm>,
) -> Result<Redirect, AppError> {
    let options = scope_options(&config.demo);
    // Only a currently offered scope may be stored
    if let Some(option) = form
        .scope
        .parse::<RepoScope>()
        .ok()
        .and_then(|scope| options.into_iter().find(|option| option.scope == scope))
    {
        session.insert(SELECTED_SCOPE_KEY, option.scope).await?;
    }
    Ok(Redirect::to("/workflows"))
}
