//! Media storage for avatars and cover images.
//!
//! The workflow only needs "store these bytes, give me a URL back", so storage
//! sits behind the [`MediaStore`] trait. [`LocalMediaStore`] writes files to a
//! directory that the server exposes under `/media`.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, error};
use url::Url;

/// Upper bound for a single uploaded image.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// A file received from a client, not yet stored.
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Raster image types accepted for upload, as (extension, content type).
/// Nothing here can carry script, so stored files are inert when served.
const IMAGE_TYPES: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("avif", "image/avif"),
];

impl MediaFile {
    /// Lower-cased extension taken from the client's file name, if it is a plain one.
    fn extension(&self) -> Option<String> {
        let name = self.file_name.as_deref()?;
        let ext = Path::new(name).extension()?.to_str()?;
        if ext.is_empty() || ext.len() > 8 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }

    /// Extension to store the file under. A file name extension must name an
    /// accepted image type; without one the declared content type decides.
    fn image_extension(&self) -> Result<&'static str, MediaError> {
        if let Some(ext) = self.extension() {
            return IMAGE_TYPES
                .iter()
                .find(|(known, _)| *known == ext)
                .map(|(known, _)| *known)
                .ok_or(MediaError::UnsupportedType(ext));
        }

        let declared = self
            .content_type
            .as_deref()
            .map(|ct| ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
            .unwrap_or_default();
        IMAGE_TYPES
            .iter()
            .find(|(_, ct)| *ct == declared)
            .map(|(ext, _)| *ext)
            .ok_or(MediaError::UnsupportedType(declared))
    }
}

/// Where a stored file ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMedia {
    pub url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Uploaded file is empty")]
    Empty,
    #[error("Uploaded file is too large")]
    TooLarge,
    #[error("Unsupported image type: {0:?}")]
    UnsupportedType(String),
    #[error("Failed to store file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to build media URL: {0}")]
    Url(#[from] url::ParseError),
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn upload(&self, file: MediaFile) -> Result<StoredMedia, MediaError>;
}

/// Stores uploads in a local directory under random names.
#[derive(Debug, Clone)]
pub struct LocalMediaStore {
    root: PathBuf,
    base_url: Url,
}

impl LocalMediaStore {
    /// `base_url` is the public URL the `root` directory is served from,
    /// e.g. `http://localhost:8000/media/`.
    pub fn new(root: impl Into<PathBuf>, base_url: Url) -> Self {
        Self {
            root: root.into(),
            base_url,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn upload(&self, file: MediaFile) -> Result<StoredMedia, MediaError> {
        if file.bytes.is_empty() {
            return Err(MediaError::Empty);
        }
        if file.bytes.len() > MAX_UPLOAD_BYTES {
            return Err(MediaError::TooLarge);
        }

        let name = format!("{}.{}", uuid::Uuid::new_v4(), file.image_extension()?);

        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.root.join(&name);
        if let Err(e) = tokio::fs::write(&path, &file.bytes).await {
            error!(path = %path.display(), error = %e, "Failed to write media file");
            return Err(e.into());
        }

        let url = self.base_url.join(&name)?;
        debug!(path = %path.display(), url = %url, "Stored media file");

        Ok(StoredMedia {
            url: url.to_string(),
        })
    }
}

/// Whether `name` looks like a file produced by [`LocalMediaStore`].
pub fn is_stored_name(name: &str) -> bool {
    let stem = name.split_once('.').map(|(stem, _)| stem).unwrap_or(name);
    uuid::Uuid::parse_str(stem).is_ok()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
}

/// Content type for a stored file, from its extension. Anything that is not
/// an accepted image type is served as opaque bytes.
pub fn content_type_for(name: &str) -> &'static str {
    let ext = name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
    IMAGE_TYPES
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, ct)| *ct)
        .unwrap_or("application/octet-stream")
}
