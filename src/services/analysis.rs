use std::path::Path;
use std::sync::Arc;

use crate::config::GeminiConfig;
use crate::error::{AnalysisError, ImageLoadError, RemoteError};
use crate::services::gemini::{InlineImage, VisionModel};

const PALM_PROMPT: &str = "You are an expert palm reader. Analyze the palm image provided and give a detailed reading covering \
the major lines (heart, head, life, fate), mounts, and any special markings. \
Provide insights about personality, career, relationships, and potential future based on palmistry principles.";

/// Outcome of one analysis: the model's text, or the error message in its place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reading {
    pub text: String,
    pub image_filename: String,
}

impl Reading {
    pub fn from_outcome(outcome: Result<String, AnalysisError>, image_filename: String) -> Self {
        let text = match outcome {
            Ok(text) => text,
            Err(e) => e.to_string(),
        };
        Self {
            text,
            image_filename,
        }
    }
}

pub struct PalmReader {
    config: GeminiConfig,
    model: Arc<dyn VisionModel>,
}

impl PalmReader {
    pub fn new(config: GeminiConfig, model: Arc<dyn VisionModel>) -> Self {
        Self { config, model }
    }

    /// Analyze a stored image. Never fails: every error becomes the reading text.
    pub async fn read_palm(&self, image_path: &Path) -> Reading {
        let image_filename = image_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let outcome = self.analyze(image_path).await;
        if let Err(e) = &outcome {
            tracing::warn!(file = %image_filename, error = %e, "Palm analysis failed");
        }
        Reading::from_outcome(outcome, image_filename)
    }

    pub async fn analyze(&self, image_path: &Path) -> Result<String, AnalysisError> {
        let image = load_image(image_path).await?;

        if !self.config.has_credential() {
            return Err(AnalysisError::MissingCredential);
        }

        self.model
            .generate(PALM_PROMPT, &image)
            .await
            .map_err(|e| classify_remote_error(&e, &self.config.model))
    }
}

/// Read the file and make sure it decodes as an image.
pub async fn load_image(path: &Path) -> Result<InlineImage, ImageLoadError> {
    let data = tokio::fs::read(path).await?;
    let format = image::guess_format(&data)?;
    image::load_from_memory_with_format(&data, format)?;

    Ok(InlineImage {
        mime_type: format.to_mime_type(),
        data,
    })
}

/// Map a remote failure to a user-facing category by its message text.
///
/// Case-insensitive substring match, first hit wins: "api key", then "model",
/// then "quota"/"limit". Anything else is passed through verbatim.
pub fn classify_remote_error(error: &RemoteError, model: &str) -> AnalysisError {
    let message = error.message.to_lowercase();

    if message.contains("api key") {
        AnalysisError::InvalidCredential
    } else if message.contains("model") {
        AnalysisError::ModelUnavailable {
            model: model.to_string(),
        }
    } else if message.contains("quota") || message.contains("limit") {
        AnalysisError::QuotaExceeded
    } else {
        AnalysisError::UnknownRemote(error.message.clone())
    }
}
