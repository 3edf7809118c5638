//! CLI command handlers, one per file.

mod completions;
mod export;
mod get;
mod ready;
mod remove;
mod resume;
mod status;

pub use completions::run_completions;
pub use export::run_export;
pub use get::run_get;
pub use ready::run_ready;
pub use remove::run_remove;
pub use resume::run_resume;
pub use status::run_status;
