//! Concrete persistence collaborators backed by the service database

pub mod catalog;
pub mod error_log;
pub mod history;

pub use catalog::{validate_catalog_width, SpeciesCatalog};
pub use error_log::ErrorSink;
pub use history::HistoryRecorder;
