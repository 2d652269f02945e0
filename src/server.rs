use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{DefaultBodyLimit, Request},
    handler::HandlerWithoutStateExt,
    http::{Method, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::post,
    Router,
};
use tower_http::services::ServeDir;

use crate::config::Config;
use crate::handlers::analyze_receipt;
use crate::services::ReceiptAnalyzer;

pub const ANALYZE_RECEIPT_PATH: &str = "/api/analyze-receipt";

#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<dyn ReceiptAnalyzer>,
}

/// Analysis route plus static files from `config.static_dir` for everything else.
pub fn create_router(analyzer: Arc<dyn ReceiptAnalyzer>, config: &Config) -> Router {
    let state = AppState { analyzer };

    // POSTs that miss the analysis route land in the fallback too, so they get a 404.
    // Other methods on the analysis path are served like any other static path.
    let static_files = ServeDir::new(&config.static_dir)
        .call_fallback_on_method_not_allowed(true)
        .fallback(not_found.into_service());

    Router::new()
        .route(
            ANALYZE_RECEIPT_PATH,
            post(analyze_receipt).fallback_service(static_files.clone()),
        )
        .fallback_service(static_files)
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(middleware::from_fn(log_post_requests))
        .with_state(state)
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Static asset GETs are too noisy to log; only POSTs are.
async fn log_post_requests(request: Request, next: Next) -> Response {
    if request.method() != Method::POST {
        return next.run(request).await;
    }

    let path = request.uri().path().to_string();
    let started = Instant::now();
    let response = next.run(request).await;

    log::info!(
        "📨 POST {} -> {} ({} ms)",
        path,
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}
