use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use super::mime::{self, Disallowed};
use super::storage::ObjectStorage;
use crate::media::{CanonicalMediaResult, MediaPayload};

/// A result which can be handed to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persisted {
    /// Always a remote URL or a data URI
    pub media: CanonicalMediaResult,
    /// Set when storage failed and the bytes were inlined as a data URI
    pub warning: Option<String>,
}

/// Gives inline bytes a stable reference. References produced by the vendor
/// are passed through unchanged.
pub struct PersistenceBridge {
    storage: Arc<dyn ObjectStorage>,
    timeout: Duration,
}

impl PersistenceBridge {
    pub fn new(storage: Arc<dyn ObjectStorage>, timeout: Duration) -> PersistenceBridge {
        PersistenceBridge { storage, timeout }
    }

    /// Fails only when the bytes are not an allowed media type. Storage
    /// failures degrade to a data URI with a warning.
    pub async fn persist(&self, media: CanonicalMediaResult) -> Result<Persisted, Disallowed> {
        let bytes = match media.payload() {
            MediaPayload::InlineBytes(bytes) => bytes.clone(),
            MediaPayload::RemoteUrl(_) | MediaPayload::DataUri(_) => {
                return Ok(Persisted {
                    media,
                    warning: None,
                })
            }
        };

        let mime_type = mime::resolve(&bytes, media.mime_type())?;

        // `resolve` only returns allowed types
        let extension = mime::extension(mime_type).unwrap_or("bin");

        let filename = format!("{}.{}", Uuid::new_v4(), extension);

        let upload = self.storage.upload(bytes.clone(), &filename, mime_type);

        let failure = match tokio::time::timeout(self.timeout, upload).await {
            Ok(Ok(url)) => {
                return Ok(Persisted {
                    media: CanonicalMediaResult::remote_url(url, mime_type),
                    warning: None,
                })
            }
            Ok(Err(err)) => err.to_string(),
            Err(_) => format!("storage timed out after {}s", self.timeout.as_secs_f32()),
        };

        tracing::warn!(error = %failure, "storage failed, returning the media inline");

        Ok(Persisted {
            media: CanonicalMediaResult::encoded_data_uri(&bytes, mime_type),
            warning: Some(failure),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::media::MediaKind;
    use crate::persist::storage::StorageError;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    pub(crate) const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    /// Records uploads in memory.
    #[derive(Default)]
    pub(crate) struct MemoryStorage {
        pub uploads: Mutex<Vec<(String, Bytes, String)>>,
    }

    #[async_trait]
    impl ObjectStorage for MemoryStorage {
        async fn upload(
            &self,
            bytes: Bytes,
            filename: &str,
            mime_type: &str,
        ) -> Result<String, StorageError> {
            self.uploads
                .lock()
                .unwrap()
                .push((filename.to_string(), bytes, mime_type.to_string()));

            Ok(format!("https://cdn.example.com/{}", filename))
        }
    }

    /// Fails every upload.
    #[derive(Default)]
    pub(crate) struct FailingStorage {
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl ObjectStorage for FailingStorage {
        async fn upload(&self, _: Bytes, _: &str, _: &str) -> Result<String, StorageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            Err(StorageError::Unavailable("bucket is gone".to_string()))
        }
    }

    struct StalledStorage;

    #[async_trait]
    impl ObjectStorage for StalledStorage {
        async fn upload(&self, _: Bytes, _: &str, _: &str) -> Result<String, StorageError> {
            std::future::pending().await
        }
    }

    fn bridge(storage: Arc<dyn ObjectStorage>) -> PersistenceBridge {
        PersistenceBridge::new(storage, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_references_pass_through() {
        let storage = Arc::new(MemoryStorage::default());
        let bridge = bridge(storage.clone());

        let remote = CanonicalMediaResult::remote_url("https://vendor.example.com/a.mp4", "video/mp4");
        let persisted = bridge.persist(remote.clone()).await.unwrap();
        assert_eq!(persisted.media, remote);

        let data = CanonicalMediaResult::data_uri("data:image/webp;base64,AAAA").unwrap();
        let persisted = bridge.persist(data.clone()).await.unwrap();
        assert_eq!(persisted.media, data);

        assert!(storage.uploads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_inline_bytes_are_uploaded() {
        let storage = Arc::new(MemoryStorage::default());
        let bridge = bridge(storage.clone());

        // The declared type is wrong, the bytes are a PNG
        let persisted = bridge
            .persist(CanonicalMediaResult::inline_bytes(PNG, "image/jpeg"))
            .await
            .unwrap();

        assert_eq!(persisted.media.kind(), MediaKind::RemoteUrl);
        assert_eq!(persisted.media.mime_type(), "image/png");
        assert!(persisted.warning.is_none());

        let uploads = storage.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        assert!(uploads[0].0.ends_with(".png"));
        assert_eq!(uploads[0].2, "image/png");
        assert_eq!(
            persisted.media.reference(),
            Some(format!("https://cdn.example.com/{}", uploads[0].0).as_str())
        );
    }

    #[tokio::test]
    async fn test_storage_failure_falls_back_to_data_uri() {
        let storage = Arc::new(FailingStorage::default());
        let bridge = bridge(storage.clone());

        let persisted = bridge
            .persist(CanonicalMediaResult::inline_bytes(PNG, "image/png"))
            .await
            .unwrap();

        assert_eq!(persisted.media.kind(), MediaKind::DataUri);
        assert_eq!(persisted.media.mime_type(), "image/png");
        assert!(persisted
            .media
            .reference()
            .unwrap()
            .starts_with("data:image/png;base64,"));
        assert!(persisted.warning.unwrap().contains("bucket is gone"));
        assert_eq!(storage.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_storage_timeout_falls_back_to_data_uri() {
        let bridge = PersistenceBridge::new(Arc::new(StalledStorage), Duration::from_millis(20));

        let persisted = bridge
            .persist(CanonicalMediaResult::inline_bytes(PNG, "image/png"))
            .await
            .unwrap();

        assert_eq!(persisted.media.kind(), MediaKind::DataUri);
        assert!(persisted.warning.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_disallowed_bytes_are_rejected() {
        let storage = Arc::new(MemoryStorage::default());
        let bridge = bridge(storage.clone());

        let err = bridge
            .persist(CanonicalMediaResult::inline_bytes(&b"<html></html>"[..], "text/html"))
            .await
            .unwrap_err();

        assert_eq!(err.declared, "text/html");
        assert!(storage.uploads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_declared_type_is_not_trusted() {
        let storage = Arc::new(MemoryStorage::default());
        let bridge = bridge(storage.clone());

        let err = bridge
            .persist(CanonicalMediaResult::inline_bytes(
                &b"upstream error: quota exhausted"[..],
                "image/png",
            ))
            .await
            .unwrap_err();

        assert_eq!(err.sniffed, None);
        assert!(storage.uploads.lock().unwrap().is_empty());
    }
}
