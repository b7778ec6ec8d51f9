pub mod id;
pub mod task;
pub mod photo;
pub mod checklist;
pub mod project;
pub mod config;

pub use id::*;
pub use task::*;
pub use photo::*;
pub use checklist::*;
pub use project::*;
pub use config::*;
