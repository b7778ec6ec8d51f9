use serde::{Deserialize, Serialize};

use super::id::EntityId;
use super::photo::Photo;

/// Label used when a task arrives with no name, title or description
pub const UNNAMED_TASK: &str = "Unnamed Task";

/// A single checklist item ("task" in the current API, "field" in the legacy one)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: EntityId,
    /// Display label
    pub text: String,
    /// Completion timestamp; `None` means the task is open
    pub completed_at: Option<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub photo_required: bool,
    #[serde(default)]
    pub photos: Vec<Photo>,
    /// Owning section, absent for sectionless tasks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_id: Option<EntityId>,
}

impl Task {
    /// Create an open task with no notes, flags or photos
    pub fn new(id: impl Into<EntityId>, text: impl Into<String>) -> Self {
        Task {
            id: id.into(),
            text: text.into(),
            completed_at: None,
            notes: String::new(),
            required: false,
            photo_required: false,
            photos: Vec::new(),
            section_id: None,
        }
    }

    pub fn completed(&self) -> bool {
        self.completed_at.is_some()
    }

    pub fn has_photos(&self) -> bool {
        !self.photos.is_empty()
    }

    pub fn photo_count(&self) -> usize {
        self.photos.len()
    }

    /// Whether the photo strip for this task is worth loading
    pub fn wants_photos(&self) -> bool {
        self.has_photos() || self.photo_required
    }
}
