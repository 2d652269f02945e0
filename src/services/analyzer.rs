use crate::models::{AnalysisRequest, ErrorResult, ReceiptRecord};

/// Every way a receipt analysis can fail. All of them are terminal for the request.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// DNS, TLS, timeout, connection reset and friends.
    #[error("{0}")]
    Transport(String),

    #[error("Claude API HTTP {status}")]
    UpstreamStatus { status: u16, body: String },

    /// Upstream answered 2xx but the body was not a Messages API response.
    #[error("{0}")]
    InvalidResponse(String),

    #[error("No text in Claude response")]
    NoText,

    #[error("Failed to parse Claude JSON")]
    Parse { raw: String },

    #[error("Receipt failed validation")]
    SchemaViolation(String),
}

impl AnalysisError {
    pub fn to_error_result(&self) -> ErrorResult {
        let result = ErrorResult::new(self.to_string());
        match self {
            AnalysisError::UpstreamStatus { body, .. } => result.with_detail(body.clone()),
            AnalysisError::Parse { raw } => result.with_raw(raw.clone()),
            AnalysisError::SchemaViolation(reason) => result.with_detail(reason.clone()),
            _ => result,
        }
    }
}

/// Turns a receipt image into a receipt record.
#[async_trait::async_trait]
pub trait ReceiptAnalyzer: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<ReceiptRecord, AnalysisError>;
}
