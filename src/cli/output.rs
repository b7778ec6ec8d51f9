use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::io::cache::CacheStatus;
use crate::model::{Checklist, EntityId, Photo, PhotoKind, Project, Section, Task};
use crate::ops::aggregate::{OverallStats, SectionSummary};
use crate::ops::notice::Notice;
use crate::util::unicode::{display_width, pad_to_width, truncate_to_width};

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct TaskJson {
    pub id: EntityId,
    pub text: String,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub notes: String,
    pub required: bool,
    pub photo_required: bool,
    pub photo_count: usize,
}

#[derive(Serialize)]
pub struct SectionJson {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub name: String,
    pub completion_percentage: u8,
    pub tasks: Vec<TaskJson>,
}

#[derive(Serialize)]
pub struct ChecklistJson {
    pub id: EntityId,
    pub name: String,
    pub completion_percentage: u8,
    pub web_url: String,
    pub mobile_link: String,
    pub sectionless_tasks: Vec<TaskJson>,
    pub sections: Vec<SectionJson>,
}

#[derive(Serialize)]
pub struct ShowJson {
    pub project: Project,
    pub cache_status: CacheStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    pub stats: OverallStats,
    pub checklists: Vec<ChecklistJson>,
}

#[derive(Serialize)]
pub struct ToggleJson {
    pub checklist_id: EntityId,
    pub task_id: EntityId,
    pub completed: bool,
    pub confirmed: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notices: Vec<String>,
}

#[derive(Serialize)]
pub struct PhotoJson {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub url: String,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

pub fn task_to_json(task: &Task) -> TaskJson {
    TaskJson {
        id: task.id.clone(),
        text: task.text.clone(),
        completed: task.completed(),
        completed_at: task.completed_at.clone(),
        notes: task.notes.clone(),
        required: task.required,
        photo_required: task.photo_required,
        photo_count: task.photo_count(),
    }
}

fn section_to_json(section: &Section) -> SectionJson {
    SectionJson {
        id: section.id.clone(),
        name: section.name.clone(),
        completion_percentage: section.completion_percentage,
        tasks: section.tasks.iter().map(task_to_json).collect(),
    }
}

pub fn checklist_to_json(checklist: &Checklist) -> ChecklistJson {
    ChecklistJson {
        id: checklist.id.clone(),
        name: checklist.name.clone(),
        completion_percentage: checklist.completion_percentage,
        web_url: checklist.web_url.clone(),
        mobile_link: checklist.mobile_link.clone(),
        sectionless_tasks: checklist.sectionless_tasks.iter().map(task_to_json).collect(),
        sections: checklist.sections.iter().map(section_to_json).collect(),
    }
}

/// Photos that have a URL for `kind` (or a fallback variant)
pub fn photos_to_json(photos: &[Photo], kind: PhotoKind) -> Vec<PhotoJson> {
    photos
        .iter()
        .filter_map(|p| {
            p.url(kind).map(|url| PhotoJson {
                id: p.id.clone(),
                url: url.to_string(),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

const BAR_CELLS: usize = 20;
const NAME_CELLS: usize = 32;

/// `[#####---------------]`
pub fn progress_bar(percentage: u8) -> String {
    let filled = (usize::from(percentage.min(100)) * BAR_CELLS).div_ceil(100);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(BAR_CELLS - filled))
}

/// Format a single task as a one-line summary
pub fn format_task_line(task: &Task, updating: bool) -> String {
    let mut line = format!("[{}] {} {}", if task.completed() { 'x' } else { ' ' }, task.id, task.text);
    if task.required {
        line.push_str(" *");
    }
    if task.photo_required {
        let status = if task.has_photos() { "photos attached" } else { "photo required" };
        line.push_str(&format!(" ({status})"));
    } else if task.has_photos() {
        line.push_str(&format!(" ({} photos)", task.photo_count()));
    }
    if updating {
        line.push_str(" ...");
    }
    line
}

fn push_task(lines: &mut Vec<String>, task: &Task, indent: &str, updating: &[EntityId]) {
    lines.push(format!("{indent}{}", format_task_line(task, updating.contains(&task.id))));
    for note in task.notes.lines().filter(|l| !l.trim().is_empty()) {
        lines.push(format!("{indent}    {note}"));
    }
}

/// Format a checklist with its sections and tasks, indented
pub fn format_checklist(checklist: &Checklist, updating: &[EntityId]) -> Vec<String> {
    let mut lines = vec![format!(
        "== {} ({}) {} {}% ==",
        checklist.name,
        checklist.id,
        progress_bar(checklist.completion_percentage),
        checklist.completion_percentage
    )];
    for task in &checklist.sectionless_tasks {
        push_task(&mut lines, task, "  ", updating);
    }
    for section in &checklist.sections {
        lines.push(format!("  -- {} {}% --", section.name, section.completion_percentage));
        for task in &section.tasks {
            push_task(&mut lines, task, "    ", updating);
        }
    }
    lines
}

/// `cached, updated 2024-05-01 12:00:00 UTC`
pub fn format_status_line(status: CacheStatus, last_updated: Option<DateTime<Utc>>) -> String {
    match last_updated {
        Some(at) => format!("{}, updated {}", status, at.format("%Y-%m-%d %H:%M:%S UTC")),
        None => status.to_string(),
    }
}

pub fn format_stats(stats: &OverallStats) -> String {
    format!(
        "{}/{} tasks complete {} {}%",
        stats.completed_tasks,
        stats.total_tasks,
        progress_bar(stats.completion_percentage),
        stats.completion_percentage
    )
}

/// One aligned row per section summary
pub fn format_summary_rows(summaries: &[SectionSummary]) -> Vec<String> {
    summaries
        .iter()
        .map(|s| {
            format!(
                "{} {:>3}% {} {}/{} tasks, {} checklists",
                pad_to_width(&truncate_to_width(&s.name, NAME_CELLS), NAME_CELLS),
                s.completion_percentage,
                progress_bar(s.completion_percentage),
                s.completed_tasks,
                s.total_tasks,
                s.checklists_count()
            )
        })
        .collect()
}

/// A section summary broken down by checklist
pub fn format_section_detail(summary: &SectionSummary) -> Vec<String> {
    let mut lines = format_summary_rows(std::slice::from_ref(summary));
    for detail in &summary.checklist_details {
        let mark = if detail.is_fully_completed { " done" } else { "" };
        lines.push(format!(
            "  {} {:>3}% {}/{}{}",
            pad_to_width(&truncate_to_width(&detail.checklist_name, NAME_CELLS - 2), NAME_CELLS - 2),
            detail.completion_percentage,
            detail.completed_tasks,
            detail.total_tasks,
            mark
        ));
    }
    lines
}

pub fn format_project_line(project: &Project) -> String {
    let id = project.id.to_string();
    let gap = 8usize.saturating_sub(display_width(&id)).max(1);
    format!("{id}{}{}  {}", " ".repeat(gap), project.name, project.address)
}

pub fn format_notice(notice: &Notice) -> String {
    notice.message.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Checklist {
        let mut paint = Task::new("10", "Paint");
        paint.required = true;
        paint.notes = "two coats".into();
        let mut tile = Task::new("20", "Tile");
        tile.completed_at = Some("2024-01-01".into());
        tile.photo_required = true;
        tile.photos = vec![Photo::from_url("https://img/a.jpg")];
        let mut checklist = Checklist {
            id: "1".into(),
            name: "Punch List".into(),
            project_id: "5".into(),
            sections: vec![Section::new(Some("s".into()), "Kitchen", vec![tile])],
            sectionless_tasks: vec![paint],
            completion_percentage: 0,
            reported_counts: None,
            web_url: String::new(),
            mobile_link: String::new(),
            expanded: false,
        };
        checklist.recompute_progress();
        checklist
    }

    #[test]
    fn bar_widths() {
        assert_eq!(progress_bar(0), format!("[{}]", "-".repeat(20)));
        assert_eq!(progress_bar(100), format!("[{}]", "#".repeat(20)));
        assert_eq!(progress_bar(50), format!("[{}{}]", "#".repeat(10), "-".repeat(10)));
        assert_eq!(progress_bar(1), format!("[#{}]", "-".repeat(19)));
    }

    #[test]
    fn checklist_lines() {
        let lines = format_checklist(&sample(), &["10".into()]);
        assert_eq!(
            lines,
            vec![
                format!("== Punch List (1) {} 50% ==", progress_bar(50)),
                "  [ ] 10 Paint * ...".to_string(),
                "      two coats".to_string(),
                "  -- Kitchen 100% --".to_string(),
                "    [x] 20 Tile (photos attached)".to_string(),
            ]
        );
    }

    #[test]
    fn status_line() {
        use chrono::TimeZone;
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(
            format_status_line(CacheStatus::Cached, Some(at)),
            "cached, updated 2024-05-01 12:00:00 UTC"
        );
        assert_eq!(format_status_line(CacheStatus::Expired, None), "expired");
    }

    #[test]
    fn task_json_flags() {
        let checklist = sample();
        let json = checklist_to_json(&checklist);
        assert!(!json.sectionless_tasks[0].completed);
        assert!(json.sections[0].tasks[0].completed);
        assert_eq!(json.sections[0].tasks[0].photo_count, 1);
        let value = serde_json::to_value(&json.sectionless_tasks[0]).unwrap();
        assert!(value.get("completed_at").is_none());
        assert_eq!(value["notes"], "two coats");
    }

    #[test]
    fn photo_json_skips_photos_without_urls() {
        let bare = Photo {
            id: Some("p2".into()),
            uris: Vec::new(),
            legacy_url: None,
        };
        let photos = vec![Photo::from_url("https://img/a.jpg"), bare];
        let json = photos_to_json(&photos, PhotoKind::Web);
        assert_eq!(json.len(), 1);
        assert_eq!(json[0].url, "https://img/a.jpg");
    }
}
