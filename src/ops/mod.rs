pub mod aggregate;
pub mod export;
pub mod notice;
pub mod reconcile;
pub mod task_ops;
