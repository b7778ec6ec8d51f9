pub mod lenient;
pub mod normalize;
pub mod payload;
pub mod photo_parser;
pub mod project_parser;

pub use normalize::{ChecklistLinks, normalize, normalize_with};
pub use payload::{PayloadShape, decode_checklist_payload};
pub use photo_parser::{parse_photo, parse_photos};
pub use project_parser::{format_address, parse_project, parse_projects};
