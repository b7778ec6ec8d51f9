pub mod error;
pub mod gateway;
pub mod transport;

#[cfg(test)]
pub mod fake;

pub use error::{ApiError, ErrorKind, classify_error};
pub use gateway::{ChecklistApi, Gateway};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Transport};
