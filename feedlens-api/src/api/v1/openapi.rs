use crate::models::*;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::v1::analyze::analyze_endpoint,
        crate::api::v1::reports::save_report,
        crate::api::v1::reports::get_report,
        crate::api::v1::reports::list_user_reports,
        crate::api::v1::compare::compare_reports
    ),
    components(
        schemas(
            AnalyzeRequest,
            ColumnMappingBody,
            SaveReportRequest,
            SaveReportResponse,
            AnalysisDetailsBody,
            ReportResponse,
            ReportSummaryBody,
            CompareResponse
        )
    ),
    tags(
        (name = "analyze", description = "Feedback analysis runs"),
        (name = "reports", description = "Saved reports and comparisons")
    ),
    info(
        title = "Feedlens API",
        version = "1.0.0",
        description = "Sentiment and topic analysis of customer feedback CSVs",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
pub struct ApiDoc;
