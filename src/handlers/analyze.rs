use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::models::{AnalysisRequest, ErrorResult};
use crate::server::AppState;
use crate::services::AnalysisError;

/// Problems with the inbound request itself, before anything is sent upstream.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("Could not read request body")]
    Body {
        status: StatusCode,
        message: String,
    },

    #[error("Invalid request body")]
    InvalidJson(String),
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            RequestError::Body { status, message } => (*status, message.clone()),
            RequestError::InvalidJson(message) => (StatusCode::BAD_REQUEST, message.clone()),
        };
        let body = ErrorResult::new(self.to_string()).with_detail(detail);
        (status, Json(body)).into_response()
    }
}

impl IntoResponse for AnalysisError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_GATEWAY, Json(self.to_error_result())).into_response()
    }
}

/// `POST /api/analyze-receipt`
pub async fn analyze_receipt(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let request = match parse_request(body) {
        Ok(request) => request,
        Err(e) => {
            log::warn!("⚠️ Rejected analyze request: {:?}", e);
            return e.into_response();
        }
    };

    match state.analyzer.analyze(&request).await {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(e) => {
            log::error!("❌ Receipt analysis failed: {}", e);
            e.into_response()
        }
    }
}

/// An empty body counts as `{}`; anything else must be a JSON object.
fn parse_request(body: Result<Bytes, BytesRejection>) -> Result<AnalysisRequest, RequestError> {
    let bytes = body.map_err(|rejection| RequestError::Body {
        status: rejection.status(),
        message: rejection.body_text(),
    })?;

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(AnalysisRequest::default());
    }

    let value: serde_json::Value = serde_json::from_slice(&bytes)
        .map_err(|e| RequestError::InvalidJson(e.to_string()))?;
    if !value.is_object() {
        return Err(RequestError::InvalidJson(
            "expected a JSON object".to_string(),
        ));
    }

    serde_json::from_value(value).map_err(|e| RequestError::InvalidJson(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReceiptRecord;
    use crate::services::ReceiptAnalyzer;
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    struct StubAnalyzer {
        result: fn() -> Result<ReceiptRecord, AnalysisError>,
        seen: Mutex<Vec<AnalysisRequest>>,
    }

    #[async_trait::async_trait]
    impl ReceiptAnalyzer for StubAnalyzer {
        async fn analyze(&self, request: &AnalysisRequest) -> Result<ReceiptRecord, AnalysisError> {
            self.seen.lock().unwrap().push(request.clone());
            (self.result)()
        }
    }

    fn state_with(
        result: fn() -> Result<ReceiptRecord, AnalysisError>,
    ) -> (AppState, Arc<StubAnalyzer>) {
        let stub = Arc::new(StubAnalyzer {
            result,
            seen: Mutex::new(Vec::new()),
        });
        (AppState { analyzer: stub.clone() }, stub)
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_success_passes_record_through() {
        let (state, stub) = state_with(|| Ok(ReceiptRecord(json!({"total": 9, "extra": true}))));

        let response = analyze_receipt(
            State(state),
            Ok(Bytes::from_static(br#"{"image":"aGVsbG8="}"#)),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "application/json");
        assert_eq!(json_body(response).await, json!({"total": 9, "extra": true}));

        let seen = stub.seen.lock().unwrap();
        assert_eq!(seen[0], AnalysisRequest::new("aGVsbG8=", "image/jpeg"));
    }

    #[tokio::test]
    async fn test_analysis_error_is_bad_gateway() {
        let (state, _) = state_with(|| {
            Err(AnalysisError::UpstreamStatus {
                status: 500,
                body: "upstream exploded".to_string(),
            })
        });

        let response =
            analyze_receipt(State(state), Ok(Bytes::from_static(br#"{"image":""}"#))).await;

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(response.headers()["content-type"], "application/json");
        let body = json_body(response).await;
        assert!(body["error"].as_str().unwrap().contains("HTTP 500"));
        assert_eq!(body["detail"], "upstream exploded");
    }

    #[tokio::test]
    async fn test_empty_body_uses_defaults() {
        let (state, stub) = state_with(|| Ok(ReceiptRecord(json!({"total": 1}))));

        let response = analyze_receipt(State(state), Ok(Bytes::new())).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(stub.seen.lock().unwrap()[0], AnalysisRequest::default());
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let (state, stub) = state_with(|| Ok(ReceiptRecord(json!({"total": 1}))));

        let response = analyze_receipt(State(state), Ok(Bytes::from_static(b"{nope"))).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"], "Invalid request body");
        assert!(stub.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_parse_request_rejects_non_objects() {
        let err = parse_request(Ok(Bytes::from_static(b"[\"abc\"]"))).unwrap_err();
        assert!(matches!(err, RequestError::InvalidJson(_)));
    }
}
