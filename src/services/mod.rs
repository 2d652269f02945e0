pub mod analyzer;
pub mod claude; // Anthropic Messages API

pub use analyzer::{AnalysisError, ReceiptAnalyzer};
pub use claude::ClaudeVisionService;
