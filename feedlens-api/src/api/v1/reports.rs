use crate::errors::ApiError;
use crate::models::{ReportResponse, ReportSummaryBody, SaveReportRequest, SaveReportResponse};
use crate::services::ServiceMetrics;
use actix_web::{get, post, web, HttpResponse};
use feedlens_core::{NewReport, ReportStore, StoredReport, StoredReportRecord};
use std::sync::Arc;
use tracing::info;
use validator::Validate;

/// Fetch a report or fail with 404.
pub(crate) async fn load_record(
    store: &dyn ReportStore,
    id: &str,
) -> Result<StoredReportRecord, ApiError> {
    store
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(id.to_string()))
}

/// Save an analysis report
#[utoipa::path(
    post,
    path = "/api/v1/reports",
    tag = "reports",
    request_body = SaveReportRequest,
    responses(
        (status = 201, description = "Report saved", body = SaveReportResponse),
        (status = 400, description = "Missing name or malformed report")
    )
)]
#[post("/reports")]
pub async fn save_report(
    req: web::Json<SaveReportRequest>,
    store: web::Data<Arc<dyn ReportStore>>,
    metrics: web::Data<ServiceMetrics>,
) -> Result<HttpResponse, ApiError> {
    req.validate()?;
    let req = req.into_inner();

    let report = NewReport {
        user_id: req.user_id,
        analysis_name: req.analysis_name,
        source_file_name: req.source_file_name,
        processed_data: StoredReport::from_value(req.processed_data)?,
    };
    let analysis_id = store.save(report).await?;
    metrics.reports_saved_total.inc();
    info!("Saved report {}", analysis_id);

    Ok(HttpResponse::Created().json(SaveReportResponse {
        analysis_id,
        message: "Analysis saved successfully".to_string(),
    }))
}

/// Load one saved report
#[utoipa::path(
    get,
    path = "/api/v1/reports/{id}",
    tag = "reports",
    params(("id" = String, Path, description = "Storage id")),
    responses(
        (status = 200, description = "Report found", body = ReportResponse),
        (status = 404, description = "No valid report with that id")
    )
)]
#[get("/reports/{id}")]
pub async fn get_report(
    path: web::Path<String>,
    store: web::Data<Arc<dyn ReportStore>>,
) -> Result<HttpResponse, ApiError> {
    let record = load_record(store.get_ref().as_ref(), &path).await?;
    let response = ReportResponse::from_record(record)
        .map_err(|e| ApiError::InternalError(e.to_string()))?;
    Ok(HttpResponse::Ok().json(response))
}

/// List a user's saved reports, newest first
#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}/reports",
    tag = "reports",
    params(("user_id" = String, Path, description = "Client identity")),
    responses(
        (status = 200, description = "Report summaries", body = [ReportSummaryBody])
    )
)]
#[get("/users/{user_id}/reports")]
pub async fn list_user_reports(
    path: web::Path<String>,
    store: web::Data<Arc<dyn ReportStore>>,
) -> Result<HttpResponse, ApiError> {
    let summaries: Vec<ReportSummaryBody> = store
        .list_by_user(&path)
        .await?
        .into_iter()
        .map(ReportSummaryBody::from)
        .collect();
    Ok(HttpResponse::Ok().json(summaries))
}
