use crate::middleware::{MetricsMiddleware, RequestIdMiddleware};
use crate::services::{AnalysisService, HealthService, ServiceMetrics, SharedAnalyzer};
use actix_web::{
    body::MessageBody,
    dev::{ServiceFactory, ServiceRequest, ServiceResponse},
    middleware::Logger,
    web, App, Error, HttpServer,
};
use feedlens_core::ReportStore;
use std::sync::Arc;
use tracing_actix_web::TracingLogger;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod analyze;
pub mod compare;
pub mod monitoring;
pub mod openapi;
pub mod reports;

use self::openapi::ApiDoc;

/// Everything the handlers share, cloned into each worker.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ReportStore>,
    pub analysis: Arc<AnalysisService>,
    pub metrics: ServiceMetrics,
    pub health: Arc<HealthService>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ReportStore>,
        analyzer: SharedAnalyzer,
        classification_progress_share: f64,
    ) -> anyhow::Result<Self> {
        let metrics = ServiceMetrics::new()?;
        let analysis = Arc::new(AnalysisService::new(
            Arc::new(analyzer),
            metrics.clone(),
            classification_progress_share,
        ));
        let health = Arc::new(HealthService::new(
            env!("CARGO_PKG_VERSION").to_string(),
            Arc::clone(&store),
        ));

        Ok(Self {
            store,
            analysis,
            metrics,
            health,
        })
    }
}

pub fn create_app(
    state: AppState,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = Error,
        InitError = (),
    >,
> {
    let openapi = ApiDoc::openapi();

    App::new()
        .wrap(MetricsMiddleware)
        .wrap(RequestIdMiddleware)
        .wrap(TracingLogger::default())
        .wrap(Logger::default())
        .app_data(web::Data::new(state.store))
        .app_data(web::Data::from(state.analysis))
        .app_data(web::Data::new(state.metrics))
        .app_data(web::Data::from(state.health))
        .service(
            web::scope("/api/v1")
                .service(analyze::analyze_endpoint)
                .service(reports::save_report)
                .service(reports::get_report)
                .service(reports::list_user_reports)
                .service(compare::compare_reports),
        )
        .service(
            web::scope("/monitoring")
                .route("/metrics", web::get().to(monitoring::metrics))
                .route("/health", web::get().to(monitoring::health)),
        )
        .service(SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", openapi))
}

pub async fn start_server(bind_address: &str, state: AppState) -> std::io::Result<()> {
    HttpServer::new(move || create_app(state.clone()))
        .bind(bind_address)?
        .run()
        .await
}
