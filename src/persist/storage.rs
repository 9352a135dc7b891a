use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage is unavailable: {0}")]
    Unavailable(String),
    #[error("failed to write \"{0}\": {1}")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("invalid public base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),
}

/// Durable storage for generated media.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stores `bytes` under `filename` and returns a stable URL to them.
    async fn upload(&self, bytes: Bytes, filename: &str, mime_type: &str)
        -> Result<String, StorageError>;
}

/// Stores files in a local directory. Files are served from `public_base_url`
/// when one is configured, otherwise `file://` URLs are handed out.
pub struct LocalDirectoryStorage {
    directory: PathBuf,
    public_base_url: Option<Url>,
}

impl LocalDirectoryStorage {
    pub fn new<P: Into<PathBuf>>(directory: P) -> LocalDirectoryStorage {
        LocalDirectoryStorage {
            directory: directory.into(),
            public_base_url: None,
        }
    }

    pub fn with_public_base_url(mut self, base: &str) -> Result<Self, StorageError> {
        let mut base = Url::parse(base)?;

        // A base without a trailing slash would have its last segment replaced
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }

        self.public_base_url = Some(base);

        Ok(self)
    }

    async fn url_for(&self, path: &Path, filename: &str) -> Result<String, StorageError> {
        match &self.public_base_url {
            Some(base) => Ok(base.join(filename)?.to_string()),
            None => {
                let path = tokio::fs::canonicalize(path)
                    .await
                    .map_err(|e| StorageError::Io(path.to_path_buf(), e))?;

                Url::from_file_path(&path).map(String::from).map_err(|_| {
                    StorageError::Unavailable(format!("\"{}\" has no file URL", path.display()))
                })
            }
        }
    }
}

#[async_trait]
impl ObjectStorage for LocalDirectoryStorage {
    async fn upload(
        &self,
        bytes: Bytes,
        filename: &str,
        _mime_type: &str,
    ) -> Result<String, StorageError> {
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| StorageError::Io(self.directory.clone(), e))?;

        let path = self.directory.join(filename);

        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| StorageError::Io(path.clone(), e))?;

        tracing::debug!(path = %path.display(), size = bytes.len(), "stored media");

        self.url_for(&path, filename).await
    }
}
