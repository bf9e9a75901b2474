//! Application state management

use std::sync::Arc;

use crate::config::Config;
use crate::pipeline::ConversionPipeline;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    pipeline: ConversionPipeline,
}

impl AppState {
    pub fn new(config: Config, pipeline: ConversionPipeline) -> Self {
        Self {
            inner: Arc::new(AppStateInner { config, pipeline }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the conversion pipeline
    pub fn pipeline(&self) -> &ConversionPipeline {
        &self.inner.pipeline
    }
}
