use serde::{Deserialize, Serialize};
use tracing::warn;

use super::store::{KvStore, StoreError, read_json, write_json};
use crate::model::Project;

pub const SESSION_KEY: &str = "session";

/// Credentials and the selected project, persisted together
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<Project>,
}

impl Session {
    pub fn new(token: impl Into<String>) -> Self {
        Session {
            token: Some(token.into()),
            project: None,
        }
    }

    pub fn with_project(mut self, project: Project) -> Self {
        self.project = Some(project);
        self
    }

    /// The token, if it is non-blank
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}

/// Load the stored session. Unreadable state is logged and yields an empty session.
pub fn load_session(store: &dyn KvStore) -> Session {
    match read_json(store, SESSION_KEY) {
        Ok(session) => session.unwrap_or_default(),
        Err(e) => {
            warn!(error = %e, "could not load session");
            Session::default()
        }
    }
}

pub fn save_session(store: &dyn KvStore, session: &Session) -> Result<(), StoreError> {
    write_json(store, SESSION_KEY, session)
}

pub fn clear_session(store: &dyn KvStore) -> Result<(), StoreError> {
    store.remove(SESSION_KEY)
}
