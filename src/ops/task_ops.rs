use crate::model::{Checklist, EntityId};

/// Error type for task operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    #[error("checklist not found: {0}")]
    ChecklistNotFound(EntityId),
    #[error("task {task} not found in checklist {checklist}")]
    TaskNotFound { checklist: EntityId, task: EntityId },
}

/// Before and after `completed_at` of one task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub previous: Option<String>,
    pub next: Option<String>,
}

impl Transition {
    pub fn completes(&self) -> bool {
        self.next.is_some()
    }
}

pub fn find_checklist<'a>(checklists: &'a [Checklist], checklist_id: &EntityId) -> Option<&'a Checklist> {
    checklists.iter().find(|c| &c.id == checklist_id)
}

/// Set one task's `completed_at` and recompute progress bottom-up.
///
/// The checklist's API-reported counts no longer describe the tree after a
/// local change, so they are dropped. Returns the previous value.
pub fn set_completion(
    checklists: &mut [Checklist],
    checklist_id: &EntityId,
    task_id: &EntityId,
    completed_at: Option<String>,
) -> Result<Option<String>, TaskError> {
    let checklist = checklists
        .iter_mut()
        .find(|c| &c.id == checklist_id)
        .ok_or_else(|| TaskError::ChecklistNotFound(checklist_id.clone()))?;
    let task = checklist
        .find_task_mut(task_id)
        .ok_or_else(|| TaskError::TaskNotFound {
            checklist: checklist_id.clone(),
            task: task_id.clone(),
        })?;
    let previous = std::mem::replace(&mut task.completed_at, completed_at);
    checklist.reported_counts = None;
    checklist.recompute_progress();
    Ok(previous)
}

/// Flip a task to the inverse of `currently_completed`, stamping `now` when
/// it becomes complete.
pub fn toggle_completion(
    checklists: &mut [Checklist],
    checklist_id: &EntityId,
    task_id: &EntityId,
    currently_completed: bool,
    now: &str,
) -> Result<Transition, TaskError> {
    let next = if currently_completed {
        None
    } else {
        Some(now.to_string())
    };
    let previous = set_completion(checklists, checklist_id, task_id, next.clone())?;
    Ok(Transition { previous, next })
}

/// Flip every UI expansion flag matching `checklist_id` (and `section` when given).
/// Returns false when nothing matched.
pub fn toggle_expanded(checklists: &mut [Checklist], checklist_id: &EntityId, section: Option<&EntityId>) -> bool {
    let Some(checklist) = checklists.iter_mut().find(|c| &c.id == checklist_id) else {
        return false;
    };
    match section {
        None => {
            checklist.expanded = !checklist.expanded;
            true
        }
        Some(section_id) => match checklist.sections.iter_mut().find(|s| s.id.as_ref() == Some(section_id)) {
            Some(section) => {
                section.expanded = !section.expanded;
                true
            }
            None => false,
        },
    }
}
