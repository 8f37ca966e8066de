use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::analysis::PalmReader;
use crate::services::gemini::{GeminiClient, VisionModel};
use crate::session::SessionStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub reader: Arc<PalmReader>,
    pub sessions: Arc<SessionStore>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let model = Arc::new(GeminiClient::new(config.gemini.clone()));
        Self::with_model(config, model)
    }

    /// Build state around any model; tests pass a mock here.
    pub fn with_model(config: AppConfig, model: Arc<dyn VisionModel>) -> Self {
        let reader = PalmReader::new(config.gemini.clone(), model);
        Self {
            config: Arc::new(config),
            reader: Arc::new(reader),
            sessions: Arc::new(SessionStore::new()),
        }
    }
}
