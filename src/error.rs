/// Rejections of an upload. The `Display` text is the notice shown on the
/// upload form.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("No file part")]
    MissingFile,

    #[error("No selected file")]
    EmptyFilename,

    #[error("Allowed file types are png, jpg, jpeg")]
    DisallowedExtension,

    #[error("File too large (max {} MB)", .max_bytes / (1024 * 1024))]
    TooLarge { max_bytes: usize },

    #[error("Failed to read upload: {0}")]
    Malformed(String),

    #[error("Failed to save upload")]
    Storage(#[source] std::io::Error),
}

/// Why a stored image could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum ImageLoadError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Decode(#[from] image::ImageError),
}

/// Failures of a palm analysis. The `Display` text is stored as the reading.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("Error: Google Gemini API key is not set. Please configure your API key.")]
    MissingCredential,

    #[error("Error: Invalid Google Gemini API key. Please check your API key configuration.")]
    InvalidCredential,

    #[error(
        "Error: The model '{model}' may not be available. Please check your model configuration."
    )]
    ModelUnavailable { model: String },

    #[error(
        "Error: Your Google Gemini account has exceeded its quota or doesn't have sufficient credits. Please check your billing details."
    )]
    QuotaExceeded,

    #[error("Error: Failed to analyze palm image with Gemini: {0}")]
    UnknownRemote(String),

    #[error("Error: Failed to read or process image file: {0}")]
    ImageDecode(#[from] ImageLoadError),
}

/// An error reported by the remote model or its transport. Only the message
/// is inspected.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct RemoteError {
    pub message: String,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// The request URL names the model, which would skew message classification.
impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        Self::new(e.without_url().to_string())
    }
}
