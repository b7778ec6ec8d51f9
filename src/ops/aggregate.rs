use std::cmp::Ordering;

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use crate::model::{Checklist, EntityId, Task, completion_percentage};

/// Summary group for tasks that belong to no section
pub const GENERAL_ITEMS: &str = "General Items";

/// One checklist's share of a section summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChecklistBreakdown {
    pub checklist_id: EntityId,
    pub checklist_name: String,
    pub completed_tasks: usize,
    pub total_tasks: usize,
    pub completion_percentage: u8,
    pub is_fully_completed: bool,
}

/// A task in a summary, tagged with the checklist that owns it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryTask {
    pub checklist_id: EntityId,
    pub checklist_name: String,
    #[serde(flatten)]
    pub task: Task,
}

/// All sections sharing one name, consolidated across checklists
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionSummary {
    pub name: String,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub completion_percentage: u8,
    /// Distinct owning checklist names, first-seen order
    pub checklist_names: Vec<String>,
    pub checklist_details: Vec<ChecklistBreakdown>,
    pub completed_checklists: Vec<String>,
    pub tasks: Vec<SummaryTask>,
}

impl SectionSummary {
    fn new(name: &str) -> Self {
        SectionSummary {
            name: name.to_string(),
            total_tasks: 0,
            completed_tasks: 0,
            completion_percentage: 0,
            checklist_names: Vec::new(),
            checklist_details: Vec::new(),
            completed_checklists: Vec::new(),
            tasks: Vec::new(),
        }
    }

    pub fn checklists_count(&self) -> usize {
        self.checklist_names.len()
    }

    fn absorb(&mut self, checklist: &Checklist, tasks: &[Task], names: &mut IndexSet<String>) {
        names.insert(checklist.name.clone());
        let completed = tasks.iter().filter(|t| t.completed()).count();
        let total = tasks.len();
        let is_fully_completed = total > 0 && completed == total;
        if is_fully_completed {
            self.completed_checklists.push(checklist.name.clone());
        }
        self.checklist_details.push(ChecklistBreakdown {
            checklist_id: checklist.id.clone(),
            checklist_name: checklist.name.clone(),
            completed_tasks: completed,
            total_tasks: total,
            completion_percentage: completion_percentage(completed, total),
            is_fully_completed,
        });
        self.completed_tasks += completed;
        self.total_tasks += total;
        self.tasks.extend(tasks.iter().map(|task| SummaryTask {
            checklist_id: checklist.id.clone(),
            checklist_name: checklist.name.clone(),
            task: task.clone(),
        }));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    Name,
    #[default]
    Percentage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// Task totals across every loaded checklist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct OverallStats {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub completion_percentage: u8,
}

/// Group sections by exact name across checklists. Sectionless tasks go under
/// "General Items". Sorted by ascending completion, ties in first-seen order.
pub fn aggregate_by_name(checklists: &[Checklist]) -> Vec<SectionSummary> {
    let mut groups: IndexMap<String, (SectionSummary, IndexSet<String>)> = IndexMap::new();

    for checklist in checklists {
        for section in &checklist.sections {
            let (summary, names) = groups
                .entry(section.name.clone())
                .or_insert_with(|| (SectionSummary::new(&section.name), IndexSet::new()));
            summary.absorb(checklist, &section.tasks, names);
        }
        if !checklist.sectionless_tasks.is_empty() {
            let (summary, names) = groups
                .entry(GENERAL_ITEMS.to_string())
                .or_insert_with(|| (SectionSummary::new(GENERAL_ITEMS), IndexSet::new()));
            summary.absorb(checklist, &checklist.sectionless_tasks, names);
        }
    }

    let mut summaries: Vec<SectionSummary> = groups
        .into_values()
        .map(|(mut summary, names)| {
            summary.completion_percentage = completion_percentage(summary.completed_tasks, summary.total_tasks);
            summary.checklist_names = names.into_iter().collect();
            summary
        })
        .collect();
    sort_summaries(&mut summaries, SortKey::Percentage, SortDirection::Ascending);
    summaries
}

fn ordered(ord: Ordering, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Ascending => ord,
        SortDirection::Descending => ord.reverse(),
    }
}

/// Stable re-sort of summaries
pub fn sort_summaries(summaries: &mut [SectionSummary], key: SortKey, direction: SortDirection) {
    summaries.sort_by(|a, b| {
        let ord = match key {
            SortKey::Name => a.name.cmp(&b.name),
            SortKey::Percentage => a.completion_percentage.cmp(&b.completion_percentage),
        };
        ordered(ord, direction)
    });
}

/// Stable re-sort of one summary's per-checklist rows
pub fn sort_breakdown(summary: &mut SectionSummary, key: SortKey, direction: SortDirection) {
    summary.checklist_details.sort_by(|a, b| {
        let ord = match key {
            SortKey::Name => a.checklist_name.cmp(&b.checklist_name),
            SortKey::Percentage => a.completion_percentage.cmp(&b.completion_percentage),
        };
        ordered(ord, direction)
    });
}

pub fn overall_stats(checklists: &[Checklist]) -> OverallStats {
    let (completed, total) = checklists.iter().fold((0, 0), |(done, total), c| {
        let (d, t) = c.task_counts();
        (done + d, total + t)
    });
    OverallStats {
        total_tasks: total,
        completed_tasks: completed,
        completion_percentage: completion_percentage(completed, total),
    }
}
