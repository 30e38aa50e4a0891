mod http;

pub use http::HttpBackend;

use crate::core::backend::AnswerBackend;
use crate::core::config::AppConfig;
use std::sync::Arc;

/// Backend for the configured question endpoint.
pub fn create_backend(config: &AppConfig) -> Arc<dyn AnswerBackend> {
    Arc::new(HttpBackend::new(config.endpoint.clone()))
}
