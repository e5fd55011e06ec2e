// Scanned government document translation service.
//
// Upload flow: decode the scan, extract text regions through an OCR
// fallback ladder, translate them (direct per-region calls or the
// multi-agent pipeline), park everything in a review session, then
// finalize the session into percent-positioned overlay descriptors.

pub mod core;
pub mod extraction;
pub mod layout;
pub mod orchestration;
pub mod pipeline;
pub mod services;
pub mod session;
pub mod translation;
pub mod utils;

pub use crate::core::config::Config;
pub use crate::orchestration::processor::DocumentProcessor;
pub use crate::utils::metrics::Metrics;
