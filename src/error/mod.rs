//! Error handling and classification module
//!
//! This module converts heterogeneous failures into a single structured
//! record, [`EnhancedError`], tagged with a taxonomy code and a retryable
//! flag that drives the operation coordinator.

pub mod classification;
pub mod classifier;
pub mod raw;

// Re-export main types for convenient access
pub use classification::{EnhancedError, ErrorCode, Severity};
pub use classifier::ErrorClassifier;
pub use raw::RawError;
