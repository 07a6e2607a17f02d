//! CLI command handlers

pub mod delete;
pub mod ingest;
pub mod list;

pub use delete::run_delete;
pub use ingest::{run_ingest_file, run_ingest_url};
pub use list::run_list;
