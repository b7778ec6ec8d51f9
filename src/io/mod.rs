pub mod cache;
pub mod config_io;
pub mod session;
pub mod snapshot;
pub mod store;

pub use cache::{CacheEntry, CacheStatus, ChecklistCache};
pub use config_io::{ConfigError, read_config};
pub use session::{Session, load_session, save_session};
pub use store::{FileStore, KvStore, StoreError};
