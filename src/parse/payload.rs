use serde_json::Value;
use tracing::warn;

use super::lenient::is_truthy;

/// The top-level layout a checklist payload arrived in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    /// `[ {...}, ... ]`
    BareArray,
    /// `{ "data": [ ... ] }`
    DataArray,
    /// `{ "checklists": [ ... ] }`, optionally wrapped in a `data` object
    Checklists,
    /// `{ "todos": [ ... ] }`, optionally wrapped in a `data` object
    Todos,
    Unrecognized,
}

/// Candidate records found in a payload, tagged with the shape that matched
#[derive(Debug, Clone, Copy)]
pub struct DecodedPayload<'a> {
    pub shape: PayloadShape,
    pub records: &'a [Value],
}

type ShapeParser = for<'a> fn(&'a Value) -> Option<&'a [Value]>;

/// Tried in order; the first parser that matches decides the shape.
const SHAPE_PARSERS: &[(PayloadShape, ShapeParser)] = &[
    (PayloadShape::BareArray, bare_array),
    (PayloadShape::DataArray, data_array),
    (PayloadShape::Checklists, checklists_array),
    (PayloadShape::Todos, todos_array),
];

/// Identify the payload's shape and borrow its record list.
/// Unknown shapes decode to `Unrecognized` with no records.
pub fn decode_checklist_payload(raw: &Value) -> DecodedPayload<'_> {
    for (shape, parser) in SHAPE_PARSERS {
        if let Some(records) = parser(raw) {
            return DecodedPayload {
                shape: *shape,
                records,
            };
        }
    }
    warn!("unrecognized checklist payload shape");
    DecodedPayload {
        shape: PayloadShape::Unrecognized,
        records: &[],
    }
}

/// Record list of a list endpoint (projects, photos): a bare array or `data` array.
pub fn list_records(raw: &Value) -> &[Value] {
    envelope(raw).as_array().map(Vec::as_slice).unwrap_or(&[])
}

/// `data` when it is present and truthy, otherwise the payload itself
fn envelope(raw: &Value) -> &Value {
    match raw.get("data") {
        Some(data) if is_truthy(data) => data,
        _ => raw,
    }
}

fn bare_array(raw: &Value) -> Option<&[Value]> {
    raw.as_array().map(Vec::as_slice)
}

fn data_array(raw: &Value) -> Option<&[Value]> {
    raw.get("data")?.as_array().map(Vec::as_slice)
}

fn checklists_array(raw: &Value) -> Option<&[Value]> {
    envelope(raw).get("checklists")?.as_array().map(Vec::as_slice)
}

fn todos_array(raw: &Value) -> Option<&[Value]> {
    envelope(raw).get("todos")?.as_array().map(Vec::as_slice)
}
