use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use service_core::error::AppError;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Object storage holding servable artifacts. One instance per bucket
/// (public or protected).
#[async_trait]
pub trait Storage: Send + Sync {
    async fn upload(&self, key: &str, data: Vec<u8>) -> Result<(), AppError>;
    async fn download(&self, key: &str) -> Result<Vec<u8>, AppError>;
    async fn delete(&self, key: &str) -> Result<(), AppError>;
    /// All keys currently stored, relative to the bucket root.
    async fn list(&self) -> Result<Vec<String>, AppError>;
    /// Human-readable bucket identifier for status reporting.
    fn bucket(&self) -> &str;
}

pub struct LocalStorage {
    base_path: PathBuf,
    label: String,
}

impl LocalStorage {
    pub async fn new(base_path: impl Into<PathBuf>, label: &str) -> Result<Self, AppError> {
        let base_path = base_path.into();
        if !base_path.exists() {
            fs::create_dir_all(&base_path).await?;
        }
        Ok(Self {
            base_path,
            label: label.to_string(),
        })
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, AppError> {
        // Keys come from slugs and content types; reject anything that
        // would escape the bucket root.
        if key.split('/').any(|part| part == ".." || part.is_empty()) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Invalid storage key: {}",
                key
            )));
        }
        Ok(self.base_path.join(key))
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn upload(&self, key: &str, data: Vec<u8>) -> Result<(), AppError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, data).await?;
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>, AppError> {
        let path = self.resolve(key)?;
        if !path.exists() {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "No stored object at {}",
                key
            )));
        }
        let data = fs::read(path).await?;
        Ok(data)
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let path = self.resolve(key)?;
        if path.exists() {
            fs::remove_file(path).await?;
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, AppError> {
        let mut keys = Vec::new();
        collect_keys(&self.base_path, &self.base_path, &mut keys).await?;
        keys.sort();
        Ok(keys)
    }

    fn bucket(&self) -> &str {
        &self.label
    }
}

/// Walk the bucket directory without recursion (async fn cannot recurse
/// directly).
async fn collect_keys(
    root: &Path,
    start: &Path,
    keys: &mut Vec<String>,
) -> Result<(), AppError> {
    let mut pending = vec![start.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if let Ok(rel) = path.strip_prefix(root) {
                keys.push(rel.to_string_lossy().replace('\\', "/"));
            }
        }
    }
    Ok(())
}

pub struct S3Storage {
    client: S3Client,
    bucket: String,
}

impl S3Storage {
    pub fn new(client: S3Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn upload(&self, key: &str, data: Vec<u8>) -> Result<(), AppError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| AppError::UpstreamError(format!("S3 upload failed: {}", e)))?;
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>, AppError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::UpstreamError(format!("S3 download failed: {}", e)))?;

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| AppError::UpstreamError(format!("S3 body collection failed: {}", e)))?
            .into_bytes()
            .to_vec();

        Ok(data)
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::UpstreamError(format!("S3 delete failed: {}", e)))?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, AppError> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut req = self.client.list_objects_v2().bucket(&self.bucket);
            if let Some(token) = &continuation {
                req = req.continuation_token(token);
            }
            let output = req
                .send()
                .await
                .map_err(|e| AppError::UpstreamError(format!("S3 list failed: {}", e)))?;

            for object in output.contents() {
                if let Some(key) = object.key() {
                    keys.push(key.to_string());
                }
            }

            match output.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }

        Ok(keys)
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}
