//! HTTP service for Feedlens: streaming analysis runs and saved reports

pub mod api;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod services;
pub mod streaming;

pub use api::v1::{create_app, start_server, AppState};
pub use errors::ApiError;
pub use repositories::PgReportStore;
