//! Object storage for uploaded images
//!
//! Objects are content-addressed: `uploads/{sha256}.{ext}`, so re-uploading
//! the same bytes is idempotent.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::error::BoxError;

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store the bytes and return a public URL
    async fn upload(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> Result<String, BoxError>;
}

fn object_key(bytes: &[u8], filename: &str, content_type: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let hash = hex::encode(hasher.finalize());

    let ext = std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .or_else(|| {
            mime_guess::get_mime_extensions_str(content_type)
                .and_then(|exts| exts.first())
                .map(|e| e.to_string())
        })
        .unwrap_or_else(|| "bin".into());

    format!("uploads/{hash}.{ext}")
}

pub struct S3Storage {
    client: S3Client,
    bucket: String,
    public_base_url: String,
}

impl S3Storage {
    pub fn new(client: S3Client, bucket: String, public_base_url: String) -> Self {
        Self {
            client,
            bucket,
            public_base_url,
        }
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> Result<String, BoxError> {
        let key = object_key(&bytes, filename, content_type);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(bytes.into())
            .content_type(content_type)
            .send()
            .await?;

        tracing::info!(key = %key, "Object uploaded to S3");
        Ok(format!("{}/{key}", self.public_base_url.trim_end_matches('/')))
    }
}

/// In-process storage for development and tests
#[derive(Clone, Default)]
pub struct MemoryStorage {
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().await.get(key).cloned()
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> Result<String, BoxError> {
        let key = object_key(&bytes, filename, content_type);
        self.objects.lock().await.insert(key.clone(), bytes);
        Ok(format!("memory://{key}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_extension() {
        let key = object_key(b"abc", "Tank.PNG", "image/png");
        assert!(key.starts_with("uploads/"));
        assert!(key.ends_with(".png"));

        let key = object_key(b"abc", "blob", "image/jpeg");
        assert!(!key.ends_with(".bin"));
    }

    #[tokio::test]
    async fn test_memory_upload_is_content_addressed() {
        let storage = MemoryStorage::new();
        let a = storage.upload(b"fish".to_vec(), "a.jpg", "image/jpeg").await.unwrap();
        let b = storage.upload(b"fish".to_vec(), "b.jpg", "image/jpeg").await.unwrap();
        assert_eq!(a, b);

        let key = a.trim_start_matches("memory://");
        assert_eq!(storage.get(key).await.unwrap(), b"fish");
    }
}
