pub mod processor;

pub use processor::{DocumentProcessor, ModelsResponse, UploadOptions, UploadResponse};
