use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_MEDIA_TYPE: &str = "image/jpeg";

/// Body of `POST /api/analyze-receipt`.
///
/// Missing or `null` fields fall back to defaults: an empty image and `image/jpeg`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawAnalysisRequest")]
pub struct AnalysisRequest {
    pub image: String,
    pub media_type: String,
}

#[derive(Deserialize)]
struct RawAnalysisRequest {
    #[serde(default)]
    image: Option<String>,
    #[serde(rename = "mediaType", default)]
    media_type: Option<String>,
}

impl From<RawAnalysisRequest> for AnalysisRequest {
    fn from(raw: RawAnalysisRequest) -> Self {
        Self {
            image: raw.image.unwrap_or_default(),
            media_type: raw
                .media_type
                .unwrap_or_else(|| DEFAULT_MEDIA_TYPE.to_string()),
        }
    }
}

impl Default for AnalysisRequest {
    fn default() -> Self {
        Self::new("", DEFAULT_MEDIA_TYPE)
    }
}

impl AnalysisRequest {
    pub fn new(image: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            media_type: media_type.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    Restaurant,
    Bar,
    Cafe,
    Delivery,
    Rideshare,
    Salon,
    Spa,
    Tattoo,
    Valet,
    Hotel,
    Movers,
    Other,
}

impl ServiceType {
    pub const ALL: [ServiceType; 12] = [
        ServiceType::Restaurant,
        ServiceType::Bar,
        ServiceType::Cafe,
        ServiceType::Delivery,
        ServiceType::Rideshare,
        ServiceType::Salon,
        ServiceType::Spa,
        ServiceType::Tattoo,
        ServiceType::Valet,
        ServiceType::Hotel,
        ServiceType::Movers,
        ServiceType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Restaurant => "restaurant",
            ServiceType::Bar => "bar",
            ServiceType::Cafe => "cafe",
            ServiceType::Delivery => "delivery",
            ServiceType::Rideshare => "rideshare",
            ServiceType::Salon => "salon",
            ServiceType::Spa => "spa",
            ServiceType::Tattoo => "tattoo",
            ServiceType::Valet => "valet",
            ServiceType::Hotel => "hotel",
            ServiceType::Movers => "movers",
            ServiceType::Other => "other",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

impl std::fmt::Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Receipt fields as returned by the model.
///
/// Kept as raw JSON so whatever the model produced is passed through untouched;
/// the typed accessors and [`ReceiptRecord::validate`] only read from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReceiptRecord(pub Value);

impl ReceiptRecord {
    pub fn total(&self) -> Option<f64> {
        self.0.get("total").and_then(Value::as_f64)
    }

    pub fn service_type(&self) -> Option<ServiceType> {
        self.0
            .get("serviceType")
            .and_then(Value::as_str)
            .and_then(ServiceType::from_string)
    }

    pub fn venue_name(&self) -> Option<&str> {
        self.0.get("venueName").and_then(Value::as_str)
    }

    /// Check the record against the schema the model was asked to produce.
    pub fn validate(&self) -> Result<(), String> {
        let fields = self
            .0
            .as_object()
            .ok_or_else(|| "expected a JSON object".to_string())?;

        match fields.get("total") {
            Some(v) if v.is_number() => {}
            Some(Value::Null) | None => return Err("missing required field \"total\"".to_string()),
            Some(_) => return Err("\"total\" must be a number".to_string()),
        }

        for key in ["subtotal", "tax"] {
            match fields.get(key) {
                None | Some(Value::Null) => {}
                Some(v) if v.is_number() => {}
                Some(_) => return Err(format!("\"{}\" must be a number or null", key)),
            }
        }

        match fields.get("serviceType") {
            None | Some(Value::Null) => {}
            Some(Value::String(s)) if ServiceType::from_string(s).is_some() => {}
            Some(other) => return Err(format!("unknown serviceType {}", other)),
        }

        match fields.get("numberOfGuests") {
            None | Some(Value::Null) => {}
            Some(v) if v.is_i64() || v.is_u64() => {}
            Some(_) => return Err("\"numberOfGuests\" must be an integer or null".to_string()),
        }

        match fields.get("venueName") {
            None | Some(Value::Null) | Some(Value::String(_)) => {}
            Some(_) => return Err("\"venueName\" must be a string or null".to_string()),
        }

        Ok(())
    }
}

/// JSON error body returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResult {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl ErrorResult {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            detail: None,
            raw: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = Some(raw.into());
        self
    }
}
