pub mod config;

pub use config::Config;
pub mod errors;
pub mod language;
pub mod types;
