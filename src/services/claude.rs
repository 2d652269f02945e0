use anyhow::Result;
use base64::{engine::general_purpose, Engine};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::Semaphore;

use super::analyzer::{AnalysisError, ReceiptAnalyzer};
use crate::config::{Config, ANTHROPIC_VERSION};
use crate::models::{AnalysisRequest, ReceiptRecord, ServiceType};

/// Outbound Messages API request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferencePayload {
    model: String,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ContentPart>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ContentPart {
    Image { source: ImageSource },
    Text { text: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    source_type: String,
    media_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct InferenceResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

/// Receipt analyzer backed by the Anthropic Messages API.
pub struct ClaudeVisionService {
    api_key: String,
    model: String,
    endpoint: String,
    max_tokens: u32,
    strict: bool,
    timeout: Duration,
    client: reqwest::Client,
    in_flight: Semaphore,
}

impl ClaudeVisionService {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            endpoint: config.endpoint.clone(),
            max_tokens: config.max_tokens,
            strict: config.strict_receipts,
            timeout: config.timeout,
            client,
            in_flight: Semaphore::new(config.max_concurrent_requests.max(1)),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn build_payload(&self, request: &AnalysisRequest) -> InferencePayload {
        InferencePayload {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: vec![
                    ContentPart::Image {
                        source: ImageSource {
                            source_type: "base64".to_string(),
                            media_type: request.media_type.clone(),
                            data: request.image.clone(),
                        },
                    },
                    ContentPart::Text {
                        text: receipt_instructions(),
                    },
                ],
            }],
        }
    }

    /// POST the payload upstream and decode the reply. Non-2xx statuses are returned as errors
    /// carrying the upstream body.
    async fn send(&self, payload: &InferencePayload) -> Result<InferenceResponse, AnalysisError> {
        // waiting for a slot counts against the same timeout as the call itself
        let _permit = tokio::time::timeout(self.timeout, self.in_flight.acquire())
            .await
            .map_err(|_| {
                log::warn!("⚠️ No upstream slot free within {:?}", self.timeout);
                AnalysisError::Transport(format!(
                    "timed out after {:?} waiting for an upstream slot",
                    self.timeout
                ))
            })?
            .map_err(|e| AnalysisError::Transport(e.to_string()))?;

        log::info!("🤖 Sending receipt to Claude with model: {}", self.model);

        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                log::error!("❌ Claude request failed: {}", e);
                AnalysisError::Transport(e.to_string())
            })?;

        let status = response.status();
        log::debug!("📥 Claude response status: {}", status);

        let body = response
            .text()
            .await
            .map_err(|e| AnalysisError::Transport(e.to_string()))?;

        if !status.is_success() {
            log::error!("❌ Claude API error ({}): {}", status, body);
            return Err(AnalysisError::UpstreamStatus {
                status: status.as_u16(),
                body,
            });
        }

        log::debug!("📄 Raw Claude response size: {} bytes", body.len());

        serde_json::from_str(&body).map_err(|e| {
            log::error!("❌ Claude response is not a Messages API reply: {}", e);
            AnalysisError::InvalidResponse(e.to_string())
        })
    }

    fn interpret(&self, response: &InferenceResponse) -> Result<ReceiptRecord, AnalysisError> {
        let text = extract_text(&response.content)?;
        log::debug!("💬 Claude response text: {}", text);

        let cleaned = strip_markdown_fences(text);
        let record = parse_receipt(&cleaned)?;

        if self.strict {
            record.validate().map_err(|reason| {
                log::warn!("⚠️ Receipt failed validation: {}", reason);
                AnalysisError::SchemaViolation(reason)
            })?;
        }

        Ok(record)
    }
}

#[async_trait::async_trait]
impl ReceiptAnalyzer for ClaudeVisionService {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<ReceiptRecord, AnalysisError> {
        if log::log_enabled!(log::Level::Debug) {
            match general_purpose::STANDARD.decode(&request.image) {
                Ok(bytes) => log::debug!(
                    "📸 Receipt image: {} bytes ({}), {} bytes base64",
                    bytes.len(),
                    request.media_type,
                    request.image.len()
                ),
                Err(e) => log::debug!("📸 Receipt image is not valid base64 ({}), sending anyway", e),
            }
        }

        let payload = self.build_payload(request);
        let response = self.send(&payload).await?;
        let record = self.interpret(&response)?;

        log::info!(
            "✅ Receipt analyzed: total={:?}, service={:?}, venue={:?}",
            record.total(),
            record.service_type(),
            record.venue_name()
        );
        Ok(record)
    }
}

/// Instruction text sent alongside the image.
fn receipt_instructions() -> String {
    let categories = ServiceType::ALL
        .iter()
        .map(|t| format!("\"{}\"", t))
        .collect::<Vec<_>>()
        .join(",");

    format!(
        "Analyze this receipt image. Return ONLY a JSON object with these fields:\n\
         - \"total\": number (the final total amount charged, required)\n\
         - \"subtotal\": number or null\n\
         - \"tax\": number or null\n\
         - \"serviceType\": one of {} or null\n\
         - \"numberOfGuests\": integer or null (look for guest/cover count)\n\
         - \"venueName\": string or null\n\
         Return ONLY valid JSON, no markdown, no explanation.",
        categories
    )
}

/// Text of the first `text` block. Blocks of other kinds before it are skipped.
fn extract_text(blocks: &[ContentBlock]) -> Result<&str, AnalysisError> {
    let text = blocks
        .iter()
        .find(|block| block.kind.as_deref() == Some("text"))
        .and_then(|block| block.text.as_deref())
        .unwrap_or("");

    if text.is_empty() {
        return Err(AnalysisError::NoText);
    }
    Ok(text)
}

/// Remove a surrounding ```` ``` ```` code fence, if the model added one anyway.
pub fn strip_markdown_fences(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }

    // opening fence may carry a language tag
    let mut lines: Vec<&str> = trimmed.split('\n').skip(1).collect();
    if lines.last().is_some_and(|line| line.trim() == "```") {
        lines.pop();
    }
    lines.join("\n").trim().to_string()
}

pub fn parse_receipt(cleaned: &str) -> Result<ReceiptRecord, AnalysisError> {
    serde_json::from_str::<Value>(cleaned)
        .map(ReceiptRecord)
        .map_err(|e| {
            log::warn!("⚠️ Claude returned invalid JSON: {}", e);
            AnalysisError::Parse {
                raw: cleaned.to_string(),
            }
        })
}
