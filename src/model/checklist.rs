use serde::{Deserialize, Serialize};

use super::id::EntityId;
use super::task::Task;

pub const UNNAMED_SECTION: &str = "Unnamed Section";
pub const UNNAMED_CHECKLIST: &str = "Unnamed Checklist";

/// round(100 × completed / total), 0 for an empty set.
/// Halves round up.
pub fn completion_percentage(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (completed * 200 + total) / (total * 2);
    pct.min(100) as u8
}

/// Aggregate counts reported by the API alongside a checklist
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReportedCounts {
    pub completed: f64,
    pub total: f64,
}

impl ReportedCounts {
    /// Only a positive total makes the pair usable
    pub fn percentage(&self) -> Option<u8> {
        if self.total > 0.0 && self.completed.is_finite() && self.total.is_finite() {
            let pct = (self.completed / self.total * 100.0).round();
            Some(pct.clamp(0.0, 100.0) as u8)
        } else {
            None
        }
    }
}

/// A named group of tasks within one checklist
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub name: String,
    pub tasks: Vec<Task>,
    pub completion_percentage: u8,
    /// UI-only disclosure state
    #[serde(skip)]
    pub expanded: bool,
}

impl Section {
    pub fn new(id: Option<EntityId>, name: impl Into<String>, tasks: Vec<Task>) -> Self {
        let mut section = Section {
            id,
            name: name.into(),
            tasks,
            completion_percentage: 0,
            expanded: false,
        };
        section.recompute_progress();
        section
    }

    /// (completed, total)
    pub fn task_counts(&self) -> (usize, usize) {
        count(&self.tasks)
    }

    pub fn recompute_progress(&mut self) {
        let (done, total) = self.task_counts();
        self.completion_percentage = completion_percentage(done, total);
    }
}

impl PartialEq for Section {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.tasks == other.tasks
            && self.completion_percentage == other.completion_percentage
    }
}

/// One remote checklist (or "todo") record, normalized
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checklist {
    pub id: EntityId,
    pub name: String,
    pub project_id: EntityId,
    pub sections: Vec<Section>,
    pub sectionless_tasks: Vec<Task>,
    pub completion_percentage: u8,
    /// API aggregate counts, dropped once a local mutation makes them stale
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reported_counts: Option<ReportedCounts>,
    #[serde(default)]
    pub web_url: String,
    #[serde(default)]
    pub mobile_link: String,
    #[serde(skip)]
    pub expanded: bool,
}

impl Checklist {
    /// Every task, sectionless ones first
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.sectionless_tasks
            .iter()
            .chain(self.sections.iter().flat_map(|s| s.tasks.iter()))
    }

    /// (completed, total) over sectionless and sectioned tasks
    pub fn task_counts(&self) -> (usize, usize) {
        self.tasks().fold((0, 0), |(done, total), t| {
            (done + usize::from(t.completed()), total + 1)
        })
    }

    /// Recompute section percentages, then the checklist's own.
    pub fn recompute_progress(&mut self) {
        for section in &mut self.sections {
            section.recompute_progress();
        }
        self.completion_percentage = match self.reported_counts.and_then(|c| c.percentage()) {
            Some(pct) => pct,
            None => {
                let (done, total) = self.task_counts();
                completion_percentage(done, total)
            }
        };
    }

    pub fn find_task(&self, task_id: &EntityId) -> Option<&Task> {
        self.tasks().find(|t| &t.id == task_id)
    }

    pub fn find_task_mut(&mut self, task_id: &EntityId) -> Option<&mut Task> {
        if let Some(task) = self.sectionless_tasks.iter_mut().find(|t| &t.id == task_id) {
            return Some(task);
        }
        self.sections
            .iter_mut()
            .flat_map(|s| s.tasks.iter_mut())
            .find(|t| &t.id == task_id)
    }
}

impl PartialEq for Checklist {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.project_id == other.project_id
            && self.sections == other.sections
            && self.sectionless_tasks == other.sectionless_tasks
            && self.completion_percentage == other.completion_percentage
            && self.reported_counts == other.reported_counts
            && self.web_url == other.web_url
            && self.mobile_link == other.mobile_link
    }
}

fn count(tasks: &[Task]) -> (usize, usize) {
    let done = tasks.iter().filter(|t| t.completed()).count();
    (done, tasks.len())
}
