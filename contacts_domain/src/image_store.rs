use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ImageStoreError {
    #[error("Unsupported image type: {0}")]
    UnsupportedType(String),

    #[error("Image is empty")]
    Empty,

    #[error("Image storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Object store for user images. Returns the public URL of the upload.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn upload(
        &self,
        bytes: &[u8],
        public_id: &str,
        content_type: &str,
    ) -> Result<String, ImageStoreError>;
}

/// Stores images on the local filesystem, served under `public_base`
pub struct FsImageStore {
    root: PathBuf,
    public_base: String,
}

impl FsImageStore {
    pub fn new(root: impl Into<PathBuf>, public_base: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base: public_base.into(),
        }
    }
}

const EXTENSIONS: [&str; 4] = ["png", "jpg", "gif", "webp"];

fn extension_for(content_type: &str) -> Result<&'static str, ImageStoreError> {
    match content_type {
        "image/png" => Ok("png"),
        "image/jpeg" | "image/jpg" => Ok("jpg"),
        "image/gif" => Ok("gif"),
        "image/webp" => Ok("webp"),
        other => Err(ImageStoreError::UnsupportedType(other.to_string())),
    }
}

#[async_trait]
impl ImageStore for FsImageStore {
    async fn upload(
        &self,
        bytes: &[u8],
        public_id: &str,
        content_type: &str,
    ) -> Result<String, ImageStoreError> {
        if bytes.is_empty() {
            return Err(ImageStoreError::Empty);
        }
        let extension = extension_for(content_type)?;
        let file_name = format!("{}.{}", public_id, extension);

        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.root.join(&file_name), bytes).await?;

        // a new upload replaces the image under any other extension
        for stale in EXTENSIONS.iter().filter(|ext| **ext != extension) {
            let path = self.root.join(format!("{}.{}", public_id, stale));
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!("Removed replaced image {}", path.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(format!(
            "{}/{}",
            self.public_base.trim_end_matches('/'),
            file_name
        ))
    }
}
