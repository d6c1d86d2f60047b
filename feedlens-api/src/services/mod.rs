pub mod analysis_service;
pub mod monitoring;

pub use analysis_service::{AnalysisService, PreparedRun, SharedAnalyzer};
pub use monitoring::{HealthService, ServiceMetrics};
