use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::lenient::{self, text_of};
use super::payload::list_records;
use crate::model::{EntityId, NO_ADDRESS, Project, UNNAMED_PROJECT};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawProject {
    #[serde(deserialize_with = "lenient::id")]
    id: Option<EntityId>,
    #[serde(deserialize_with = "lenient::text")]
    name: Option<String>,
    address: Value,
}

/// Render an address value on one line.
///
/// Strings pass through. Objects join street lines, then
/// `city, state postal_code`, then country, all comma-separated.
pub fn format_address(address: &Value) -> String {
    match address {
        Value::String(s) if !s.is_empty() => s.clone(),
        Value::Object(_) => {
            let field = |key: &str| address.get(key).and_then(text_of);
            let mut parts: Vec<String> = Vec::new();
            parts.extend(field("street_address_1"));
            parts.extend(field("street_address_2"));

            let mut locality = String::new();
            if let Some(city) = field("city") {
                locality.push_str(&city);
            }
            if let Some(state) = field("state") {
                if !locality.is_empty() {
                    locality.push_str(", ");
                }
                locality.push_str(&state);
            }
            if let Some(postal) = field("postal_code") {
                if !locality.is_empty() {
                    locality.push(' ');
                }
                locality.push_str(&postal);
            }
            if !locality.is_empty() {
                parts.push(locality);
            }
            parts.extend(field("country"));

            if parts.is_empty() {
                NO_ADDRESS.to_string()
            } else {
                parts.join(", ")
            }
        }
        _ => NO_ADDRESS.to_string(),
    }
}

/// Parse one project record; records without an id are skipped.
pub fn parse_project(raw: &Value) -> Option<Project> {
    if !raw.is_object() {
        return None;
    }
    let project = RawProject::deserialize(raw).ok()?;
    let Some(id) = project.id else {
        debug!("skipping project record without id");
        return None;
    };
    Some(Project {
        id,
        name: project.name.unwrap_or_else(|| UNNAMED_PROJECT.to_string()),
        address: format_address(&project.address),
    })
}

/// Parse a project listing (bare array or `{data: [...]}`)
pub fn parse_projects(raw: &Value) -> Vec<Project> {
    list_records(raw).iter().filter_map(parse_project).collect()
}
