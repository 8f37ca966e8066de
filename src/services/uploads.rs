use std::path::{Path, PathBuf};

use axum::body::Bytes;

use crate::error::UploadError;

/// Form field carrying the palm photo.
pub const FILE_FIELD: &str = "palm_image";

pub const ALLOWED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// A validated upload, ready to be written to the storage directory.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub original_filename: String,
    pub filename: String,
    pub path: PathBuf,
    pub data: Bytes,
}

impl UploadedImage {
    /// Validate the client-supplied name and pick the storage path for it.
    pub fn prepare(
        storage_dir: &Path,
        original_filename: String,
        data: Bytes,
    ) -> Result<Self, UploadError> {
        validate_filename(&original_filename)?;

        let filename = sanitize_filename(&original_filename);
        let path = storage_dir.join(&filename);
        Ok(Self {
            original_filename,
            filename,
            path,
            data,
        })
    }

    /// Write the bytes to storage, replacing any file with the same name.
    pub async fn store(&self) -> Result<&Path, UploadError> {
        tokio::fs::write(&self.path, &self.data)
            .await
            .map_err(UploadError::Storage)?;
        Ok(&self.path)
    }
}

/// Create the storage directory if it does not exist yet.
pub async fn ensure_storage_dir(dir: &Path) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await
}

/// Pull the palm image out of a multipart form.
/// Returns (filename, bytes); a file input left empty yields an empty filename.
pub async fn extract_palm_image(
    mut multipart: axum::extract::Multipart,
    max_bytes: usize,
) -> Result<(String, Bytes), UploadError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::Malformed(e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or("").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| UploadError::Malformed(e.body_text()))?;

        if data.len() > max_bytes {
            return Err(UploadError::TooLarge { max_bytes });
        }

        return Ok((filename, data));
    }

    Err(UploadError::MissingFile)
}

/// Reject empty names and anything outside the extension allow-list.
pub fn validate_filename(filename: &str) -> Result<(), UploadError> {
    if filename.is_empty() {
        return Err(UploadError::EmptyFilename);
    }
    if !allowed_file(filename) {
        return Err(UploadError::DisallowedExtension);
    }
    Ok(())
}

/// Extension is the text after the last `.`, compared case-insensitively.
pub fn allowed_file(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| {
            ALLOWED_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}

/// Reduce a client-supplied filename to a single safe path component.
///
/// Path separators become spaces, whitespace runs become `_`, anything
/// outside `[A-Za-z0-9._-]` is dropped and leading/trailing `.`/`_` are
/// trimmed, so the result can never name a parent or absolute path.
pub fn sanitize_filename(name: &str) -> String {
    let spaced = name.replace(['/', '\\'], " ");
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let filtered: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    let trimmed = filtered.trim_matches(|c| c == '.' || c == '_');

    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.to_string()
    }
}
