pub mod analyze;

pub use analyze::analyze_receipt;
