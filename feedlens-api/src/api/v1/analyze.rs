use crate::errors::ApiError;
use crate::models::AnalyzeRequest;
use crate::services::AnalysisService;
use crate::streaming::SseStream;
use actix_web::{post, rt, web, Responder};
use validator::Validate;

/// Analyze a CSV upload
///
/// Classifies every feedback row, summarizes, aggregates and streams progress as
/// Server-Sent Events. The final `complete` event carries the report in storage form
/// together with the run summary; a run that cannot finish ends with an `error` event.
#[utoipa::path(
    post,
    path = "/api/v1/analyze",
    tag = "analyze",
    request_body = AnalyzeRequest,
    responses(
        (status = 200, description = "Analysis started, streaming progress", content_type = "text/event-stream"),
        (status = 400, description = "Malformed CSV or unknown feedback column")
    )
)]
#[post("/analyze")]
pub async fn analyze_endpoint(
    req: web::Json<AnalyzeRequest>,
    analysis: web::Data<AnalysisService>,
) -> Result<impl Responder, ApiError> {
    req.validate()?;
    let prepared = analysis.prepare(&req)?;

    let (sse_stream, sender) = SseStream::new(64);
    let service = analysis.into_inner();
    rt::spawn(async move {
        service.run(prepared, sender).await;
    });

    Ok(sse_stream.into_sse())
}
