use crate::api::v1::reports::load_record;
use crate::errors::ApiError;
use crate::models::CompareResponse;
use actix_web::{get, web, HttpResponse};
use feedlens_core::{compare, ReportStore};
use std::sync::Arc;

/// Compare two saved reports
///
/// `current` minus `previous` for total, per-sentiment and labeled counts.
#[utoipa::path(
    get,
    path = "/api/v1/compare/{current}/vs/{previous}",
    tag = "reports",
    params(
        ("current" = String, Path, description = "Storage id of the newer report"),
        ("previous" = String, Path, description = "Storage id of the baseline report")
    ),
    responses(
        (status = 200, description = "Per-metric deltas", body = CompareResponse),
        (status = 404, description = "Either report is missing")
    )
)]
#[get("/compare/{current}/vs/{previous}")]
pub async fn compare_reports(
    path: web::Path<(String, String)>,
    store: web::Data<Arc<dyn ReportStore>>,
) -> Result<HttpResponse, ApiError> {
    let (current_id, previous_id) = path.into_inner();
    let current = load_record(store.get_ref().as_ref(), &current_id).await?;
    let previous = load_record(store.get_ref().as_ref(), &previous_id).await?;

    let comparison = compare(
        &current.processed_data.to_report()?,
        &previous.processed_data.to_report()?,
    );

    Ok(HttpResponse::Ok().json(CompareResponse {
        current: current.details().into(),
        previous: previous.details().into(),
        comparison,
    }))
}
