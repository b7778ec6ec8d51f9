use serde::{Deserialize, Serialize};

use super::id::EntityId;

pub const UNNAMED_PROJECT: &str = "Unnamed Project";
pub const NO_ADDRESS: &str = "No address provided";

/// A project on the remote service, as shown in the picker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: EntityId,
    pub name: String,
    /// Single-line address
    pub address: String,
}

impl Project {
    pub fn new(id: impl Into<EntityId>, name: impl Into<String>) -> Self {
        Project {
            id: id.into(),
            name: name.into(),
            address: NO_ADDRESS.to_string(),
        }
    }

    /// Case-insensitive prefix match on the name
    pub fn name_starts_with(&self, term: &str) -> bool {
        self.name.to_lowercase().starts_with(&term.to_lowercase())
    }

    /// Case-insensitive substring match on name or address
    pub fn mentions(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        self.name.to_lowercase().contains(&term) || self.address.to_lowercase().contains(&term)
    }
}

/// Projects matching `term`: name-prefix matches first, then other name or
/// address matches, each group in listing order. An empty term keeps the
/// first `default_count` projects.
pub fn filter_projects<'a>(projects: &'a [Project], term: &str, default_count: usize) -> Vec<&'a Project> {
    let term = term.trim();
    if term.is_empty() {
        return projects.iter().take(default_count).collect();
    }
    let (prefix, rest): (Vec<&Project>, Vec<&Project>) =
        projects.iter().partition(|p| p.name_starts_with(term));
    prefix
        .into_iter()
        .chain(rest.into_iter().filter(|p| p.mentions(term)))
        .collect()
}
