//! Image uploads attached to posts.
//!
//! The blob store takes an uploaded image and hands back a URL the post can
//! refer to. The local implementation writes into the uploads directory, which
//! the router serves under `/uploads`.

use async_trait::async_trait;
use bytes::Bytes;
use mime_guess::mime::{self, Mime};
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("Only jpeg, jpg and png images are allowed")]
    UnsupportedType,

    #[error("Image upload is empty")]
    Empty,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl ImageUpload {
    /// File extension to store the image under, if it is an accepted type.
    pub fn extension(&self) -> Option<&'static str> {
        let declared = self
            .content_type
            .as_deref()
            .and_then(|ct| ct.parse::<Mime>().ok());
        let guessed = self
            .file_name
            .as_deref()
            .and_then(|name| mime_guess::from_path(name).first());

        [declared, guessed]
            .into_iter()
            .flatten()
            .find_map(|m| image_extension(&m))
    }
}

fn image_extension(m: &Mime) -> Option<&'static str> {
    if *m == mime::IMAGE_JPEG {
        Some("jpg")
    } else if *m == mime::IMAGE_PNG {
        Some("png")
    } else {
        None
    }
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Persist the image and return the URL it can be fetched from.
    async fn put_image(&self, upload: ImageUpload) -> Result<String, BlobError>;
}

pub struct LocalBlobStore {
    root: PathBuf,
    public_base: String,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, public_base: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base: public_base.into(),
        }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put_image(&self, upload: ImageUpload) -> Result<String, BlobError> {
        if upload.data.is_empty() {
            return Err(BlobError::Empty);
        }
        let ext = upload.extension().ok_or(BlobError::UnsupportedType)?;

        tokio::fs::create_dir_all(&self.root).await?;
        let name = format!("{}.{}", uuid::Uuid::now_v7(), ext);
        tokio::fs::write(self.root.join(&name), &upload.data).await?;

        tracing::info!("Stored image {} ({} bytes)", name, upload.data.len());
        Ok(format!("{}/{}", self.public_base.trim_end_matches('/'), name))
    }
}
