use flowarden_core::models::{CreateWorkflowPayload, PatchWorkflowPayload, RepoScope, Workflow};
use http::Method;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

use crate::{ApiClient, ApiError};

/// Characters that cannot appear literally in a URL path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b'%');

fn workflow_path(id: &str) -> String {
    format!("/api/workflows/{}", utf8_percent_encode(id, PATH_SEGMENT))
}

impl ApiClient {
    pub async fn list_workflows(&self, scope: RepoScope) -> Result<Vec<Workflow>, ApiError> {
        self.request(Method::GET, "/api/workflows", scope, None).await
    }

    pub async fn get_workflow(&self, scope: RepoScope, id: &str) -> Result<Workflow, ApiError> {
        self.request(Method::GET, &workflow_path(id), scope, None).await
    }

    pub async fn create_workflow(
        &self,
        scope: RepoScope,
        payload: &CreateWorkflowPayload,
    ) -> Result<Workflow, ApiError> {
        let body = serde_json::to_value(payload).map_err(ApiError::encode)?;
        self.request(Method::POST, "/api/workflows", scope, Some(&body)).await
    }

    pub async fn update_workflow(
        &self,
        scope: RepoScope,
        id: &str,
        payload: &PatchWorkflowPayload,
    ) -> Result<Workflow, ApiError> {
        let body = serde_json::to_value(payload).map_err(ApiError::encode)?;
        self.request(Method::PATCH, &workflow_path(id), scope, Some(&body)).await
    }

    pub async fn delete_workflow(&self, scope: RepoScope, id: &str) -> Result<(), ApiError> {
        self.request_raw(Method::DELETE, &workflow_path(id), scope, None).await?;
        Ok(())
    }
}
