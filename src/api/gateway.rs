use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::info;

use super::error::{ApiError, classify_error};
use super::transport::{ApiRequest, ApiResponse, Transport};
use crate::model::{EntityId, Photo, Project};
use crate::parse::{parse_photos, parse_projects};

/// Remote operations the engine depends on
#[async_trait]
pub trait ChecklistApi: Send + Sync {
    /// Raw checklist payload for a project, in whatever shape the API returns
    async fn fetch_checklists(&self, project_id: &EntityId, token: &str) -> Result<Value, ApiError>;

    /// Set or clear a task's completion timestamp
    async fn update_task_completion(
        &self,
        task_id: &EntityId,
        token: &str,
        completed_at: Option<&str>,
    ) -> Result<(), ApiError>;

    async fn fetch_project_photos(&self, project_id: &EntityId, token: &str) -> Result<Vec<Photo>, ApiError>;

    async fn fetch_projects(&self, limit: usize, token: &str) -> Result<Vec<Project>, ApiError>;
}

/// `ChecklistApi` over a `Transport`. Stateless apart from the transport.
pub struct Gateway<T> {
    transport: T,
}

impl<T: Transport> Gateway<T> {
    pub fn new(transport: T) -> Self {
        Gateway { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send `request`; on exactly 404 retry once against `fallback_path`.
    async fn send_with_fallback(
        &self,
        token: &str,
        request: ApiRequest,
        fallback_path: String,
    ) -> Result<ApiResponse, ApiError> {
        let response = self.transport.send(token, &request).await?;
        if response.status != 404 {
            return Ok(response);
        }
        info!(primary = %request.path, fallback = %fallback_path, "endpoint not found, trying fallback");
        self.transport.send(token, &request.with_path(fallback_path)).await
    }
}

fn ensure_success(response: ApiResponse) -> Result<ApiResponse, ApiError> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(classify_error(response.status, &response.body))
    }
}

fn decode_body(response: &ApiResponse) -> Result<Value, ApiError> {
    Ok(serde_json::from_str(&response.body)?)
}

#[async_trait]
impl<T: Transport> ChecklistApi for Gateway<T> {
    async fn fetch_checklists(&self, project_id: &EntityId, token: &str) -> Result<Value, ApiError> {
        let request = ApiRequest::get("/checklists").query("project_id", project_id);
        let response = self
            .send_with_fallback(token, request, "/todos".to_string())
            .await?;
        decode_body(&ensure_success(response)?)
    }

    async fn update_task_completion(
        &self,
        task_id: &EntityId,
        token: &str,
        completed_at: Option<&str>,
    ) -> Result<(), ApiError> {
        let task_id = urlencoding::encode(task_id.as_str());
        let request = ApiRequest::put(
            format!("/tasks/{task_id}"),
            json!({ "completed_at": completed_at }),
        );
        let response = self
            .send_with_fallback(token, request, format!("/fields/{task_id}"))
            .await?;
        ensure_success(response)?;
        Ok(())
    }

    async fn fetch_project_photos(&self, project_id: &EntityId, token: &str) -> Result<Vec<Photo>, ApiError> {
        let request = ApiRequest::get(format!(
            "/projects/{}/photos",
            urlencoding::encode(project_id.as_str())
        ));
        let response = ensure_success(self.transport.send(token, &request).await?)?;
        Ok(parse_photos(&decode_body(&response)?))
    }

    async fn fetch_projects(&self, limit: usize, token: &str) -> Result<Vec<Project>, ApiError> {
        let request = ApiRequest::get("/projects").query("limit", limit);
        let response = ensure_success(self.transport.send(token, &request).await?)?;
        Ok(parse_projects(&decode_body(&response)?))
    }
}
