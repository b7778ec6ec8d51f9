use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::lenient;
use super::payload::decode_checklist_payload;
use super::photo_parser::parse_photo_list;
use crate::model::{
    Checklist, EntityId, ReportedCounts, Section, Task, UNNAMED_CHECKLIST, UNNAMED_SECTION,
    UNNAMED_TASK,
};

/// Builds the deep links attached to each checklist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecklistLinks {
    /// Root of the web app, without a trailing slash
    pub web_base: String,
}

impl Default for ChecklistLinks {
    fn default() -> Self {
        ChecklistLinks {
            web_base: "https://app.companycam.com".to_string(),
        }
    }
}

impl ChecklistLinks {
    pub fn new(web_base: &str) -> Self {
        ChecklistLinks {
            web_base: web_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn web_url(&self, project_id: &EntityId, checklist_id: &EntityId) -> String {
        format!("{}/projects/{}/todos/{}", self.web_base, project_id, checklist_id)
    }

    pub fn mobile_link(&self, project_id: &EntityId) -> String {
        format!("ccam://projects/{}", project_id)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawChecklist {
    #[serde(deserialize_with = "lenient::id")]
    id: Option<EntityId>,
    #[serde(deserialize_with = "lenient::id")]
    project_id: Option<EntityId>,
    #[serde(deserialize_with = "lenient::text")]
    name: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    title: Option<String>,
    #[serde(deserialize_with = "lenient::list")]
    tasks: Option<Vec<Value>>,
    /// Legacy name for `tasks`
    #[serde(deserialize_with = "lenient::list")]
    fields: Option<Vec<Value>>,
    #[serde(deserialize_with = "lenient::list")]
    sections: Option<Vec<Value>>,
    #[serde(deserialize_with = "lenient::list")]
    sectionless_tasks: Option<Vec<Value>>,
    #[serde(deserialize_with = "lenient::number")]
    completed_tasks_count: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    tasks_count: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSection {
    #[serde(deserialize_with = "lenient::id")]
    id: Option<EntityId>,
    #[serde(deserialize_with = "lenient::text")]
    name: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    title: Option<String>,
    #[serde(deserialize_with = "lenient::list")]
    tasks: Option<Vec<Value>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawTask {
    #[serde(deserialize_with = "lenient::id")]
    id: Option<EntityId>,
    #[serde(deserialize_with = "lenient::text")]
    name: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    title: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    description: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    notes: Option<String>,
    #[serde(deserialize_with = "lenient::stamp")]
    completed_at: Option<String>,
    #[serde(deserialize_with = "lenient::flag")]
    required: bool,
    #[serde(deserialize_with = "lenient::flag")]
    photo_required: bool,
    #[serde(deserialize_with = "lenient::list")]
    photos: Option<Vec<Value>>,
    #[serde(deserialize_with = "lenient::id")]
    section_id: Option<EntityId>,
}

impl RawTask {
    fn into_task(self) -> Option<Task> {
        let Some(id) = self.id else {
            debug!("skipping task record without id");
            return None;
        };
        let text = self
            .name
            .or(self.title)
            .or_else(|| self.description.clone())
            .unwrap_or_else(|| UNNAMED_TASK.to_string());
        Some(Task {
            id,
            text,
            completed_at: self.completed_at,
            notes: self.notes.or(self.description).unwrap_or_default(),
            required: self.required,
            photo_required: self.photo_required,
            photos: parse_photo_list(self.photos.as_deref().unwrap_or_default()),
            section_id: self.section_id,
        })
    }
}

fn parse_tasks(items: &[Value]) -> impl Iterator<Item = Task> + '_ {
    items
        .iter()
        .filter(|v| v.is_object())
        .filter_map(|v| RawTask::deserialize(v).ok())
        .filter_map(RawTask::into_task)
}

/// Normalize a checklist payload for the given project with default links.
pub fn normalize(raw: &Value, project_id: &EntityId) -> Vec<Checklist> {
    normalize_with(raw, project_id, &ChecklistLinks::default())
}

/// Reduce any accepted payload shape to canonical checklists for one project.
///
/// Records belonging to other projects, records that are not objects, and
/// records without an id are dropped. Never fails and never touches `raw`.
pub fn normalize_with(raw: &Value, project_id: &EntityId, links: &ChecklistLinks) -> Vec<Checklist> {
    let decoded = decode_checklist_payload(raw);
    let checklists: Vec<Checklist> = decoded
        .records
        .iter()
        .filter(|v| v.is_object())
        .filter_map(|v| RawChecklist::deserialize(v).ok())
        .filter(|c| c.project_id.as_ref() == Some(project_id))
        .filter_map(|c| build_checklist(c, project_id, links))
        .collect();
    debug!(
        shape = ?decoded.shape,
        records = decoded.records.len(),
        kept = checklists.len(),
        project = %project_id,
        "normalized checklist payload"
    );
    checklists
}

fn build_checklist(raw: RawChecklist, project_id: &EntityId, links: &ChecklistLinks) -> Option<Checklist> {
    let Some(id) = raw.id else {
        debug!("skipping checklist record without id");
        return None;
    };

    let raw_sections: Vec<RawSection> = raw
        .sections
        .as_deref()
        .unwrap_or_default()
        .iter()
        .filter(|v| v.is_object())
        .filter_map(|v| RawSection::deserialize(v).ok())
        .collect();

    // `fields` only stands in when there is no `tasks` array
    let top_level = raw.tasks.as_deref().or(raw.fields.as_deref()).unwrap_or_default();
    let mut pool: Vec<Task> = parse_tasks(top_level).collect();
    for section in &raw_sections {
        let tasks = section.tasks.as_deref().unwrap_or_default();
        pool.extend(parse_tasks(tasks).map(|mut task| {
            task.section_id = section.id.clone();
            task
        }));
    }

    let (mut sectionless_tasks, sectioned): (Vec<Task>, Vec<Task>) =
        pool.into_iter().partition(|t| t.section_id.is_none());
    let dedicated = raw.sectionless_tasks.as_deref().unwrap_or_default();
    sectionless_tasks.extend(parse_tasks(dedicated).map(|mut task| {
        task.section_id = None;
        task
    }));

    let sections: Vec<Section> = raw_sections
        .into_iter()
        .map(|s| {
            let tasks = match &s.id {
                Some(sid) => sectioned
                    .iter()
                    .filter(|t| t.section_id.as_ref() == Some(sid))
                    .cloned()
                    .collect(),
                None => Vec::new(),
            };
            let name = s.name.or(s.title).unwrap_or_else(|| UNNAMED_SECTION.to_string());
            Section::new(s.id, name, tasks)
        })
        .collect();

    let orphans = sectioned
        .iter()
        .filter(|t| !sections.iter().any(|s| s.id.is_some() && s.id == t.section_id))
        .count();
    if orphans > 0 {
        debug!(checklist = %id, orphans, "dropping tasks whose section is missing");
    }

    let reported_counts = match (raw.completed_tasks_count, raw.tasks_count) {
        (Some(completed), Some(total)) => Some(ReportedCounts { completed, total }),
        _ => None,
    }
    .filter(|c| c.percentage().is_some());

    let mut checklist = Checklist {
        web_url: links.web_url(project_id, &id),
        mobile_link: links.mobile_link(project_id),
        id,
        name: raw.name.or(raw.title).unwrap_or_else(|| UNNAMED_CHECKLIST.to_string()),
        project_id: project_id.clone(),
        sections,
        sectionless_tasks,
        completion_percentage: 0,
        reported_counts,
        expanded: false,
    };
    checklist.recompute_progress();
    Some(checklist)
}
