pub mod agent;
pub mod api;
pub mod classifier;
pub mod config;
pub mod error;
pub mod file_logger;
pub mod log_event;
pub mod log_source;
pub mod reporter;
pub mod run;
