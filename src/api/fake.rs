//! In-memory stand-ins for the network, used by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tokio::sync::Notify;

use super::error::{ApiError, classify_error};
use super::gateway::ChecklistApi;
use super::transport::{ApiRequest, ApiResponse, Transport};
use crate::model::{EntityId, Photo, Project};

/// Replays canned responses per (method, path). The last response for a
/// route repeats; unscripted routes fail as transport errors.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<(Method, String), VecDeque<ApiResponse>>>,
    calls: Mutex<Vec<(String, ApiRequest)>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, method: Method, path: &str, status: u16, body: &str) -> Self {
        self.routes
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(ApiResponse {
                status,
                body: body.to_string(),
            });
        self
    }

    pub fn calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().unwrap().iter().map(|(_, r)| r.clone()).collect()
    }

    pub fn tokens(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(t, _)| t.clone()).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, token: &str, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        self.calls
            .lock()
            .unwrap()
            .push((token.to_string(), request.clone()));
        let mut routes = self.routes.lock().unwrap();
        let queue = routes
            .get_mut(&(request.method.clone(), request.path.clone()))
            .ok_or_else(|| ApiError::Transport(format!("unscripted {} {}", request.method, request.path)))?;
        let response = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        response.ok_or_else(|| ApiError::Transport("empty script".into()))
    }
}

/// Programmable `ChecklistApi` that counts calls and can hold a call open
/// until a test releases it.
pub struct FakeApi {
    checklists: Mutex<Result<Value, ApiError>>,
    update_error: Mutex<Option<ApiError>>,
    photos: Mutex<Result<Vec<Photo>, ApiError>>,
    fetch_gate: Mutex<Option<Arc<Notify>>>,
    update_gate: Mutex<Option<Arc<Notify>>>,
    fetches: AtomicUsize,
    photo_fetches: AtomicUsize,
    updates: Mutex<Vec<(EntityId, Option<String>)>>,
}

impl FakeApi {
    pub fn new(checklists: Value) -> Self {
        FakeApi {
            checklists: Mutex::new(Ok(checklists)),
            update_error: Mutex::new(None),
            photos: Mutex::new(Ok(Vec::new())),
            fetch_gate: Mutex::new(None),
            update_gate: Mutex::new(None),
            fetches: AtomicUsize::new(0),
            photo_fetches: AtomicUsize::new(0),
            updates: Mutex::new(Vec::new()),
        }
    }

    pub fn set_checklists(&self, payload: Value) {
        *self.checklists.lock().unwrap() = Ok(payload);
    }

    pub fn fail_fetch(&self, status: u16, body: &str) {
        *self.checklists.lock().unwrap() = Err(classify_error(status, body));
    }

    pub fn fail_updates(&self, status: u16, body: &str) {
        *self.update_error.lock().unwrap() = Some(classify_error(status, body));
    }

    pub fn set_photos(&self, photos: Vec<Photo>) {
        *self.photos.lock().unwrap() = Ok(photos);
    }

    pub fn fail_photos(&self, status: u16) {
        *self.photos.lock().unwrap() = Err(classify_error(status, ""));
    }

    /// Hold the next fetches until the returned handle is notified
    pub fn gate_fetches(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.fetch_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn gate_updates(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.update_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn photo_fetch_count(&self) -> usize {
        self.photo_fetches.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> Vec<(EntityId, Option<String>)> {
        self.updates.lock().unwrap().clone()
    }
}

async fn pass(gate: &Mutex<Option<Arc<Notify>>>) {
    let gate = gate.lock().unwrap().take();
    if let Some(gate) = gate {
        gate.notified().await;
    }
}

#[async_trait]
impl ChecklistApi for FakeApi {
    async fn fetch_checklists(&self, _project_id: &EntityId, _token: &str) -> Result<Value, ApiError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        pass(&self.fetch_gate).await;
        self.checklists.lock().unwrap().clone()
    }

    async fn update_task_completion(
        &self,
        task_id: &EntityId,
        _token: &str,
        completed_at: Option<&str>,
    ) -> Result<(), ApiError> {
        self.updates
            .lock()
            .unwrap()
            .push((task_id.clone(), completed_at.map(str::to_string)));
        pass(&self.update_gate).await;
        match self.update_error.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn fetch_project_photos(&self, _project_id: &EntityId, _token: &str) -> Result<Vec<Photo>, ApiError> {
        self.photo_fetches.fetch_add(1, Ordering::SeqCst);
        self.photos.lock().unwrap().clone()
    }

    async fn fetch_projects(&self, _limit: usize, _token: &str) -> Result<Vec<Project>, ApiError> {
        Ok(Vec::new())
    }
}
