use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use uuid::Uuid;

/// Object body together with the content type recorded at upload time.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

#[async_trait]
pub trait ObjectStorage: Send + Sync + 'static {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<String>,
        content_disposition: Option<String>,
    ) -> Result<()>;

    async fn get_object(&self, key: &str) -> Result<StoredFile>;

    async fn delete_object(&self, key: &str) -> Result<()>;
}

/// Storage key for an uploaded trip document. The file name is reduced to a
/// safe character set so it can be used verbatim as a key segment.
pub fn document_key(trip_id: Uuid, document_id: Uuid, file_name: &str) -> String {
    let sanitized: String = file_name
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    let sanitized = sanitized.trim_matches('.');
    let segment = if sanitized.is_empty() { "file" } else { sanitized };
    format!("trips/{trip_id}/documents/{document_id}/{segment}")
}

pub struct S3Storage {
    client: S3Client,
    bucket: String,
}

impl S3Storage {
    pub fn new(client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<String>,
        content_disposition: Option<String>,
    ) -> Result<()> {
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes));

        if let Some(content_type) = content_type {
            request = request.content_type(content_type);
        }

        if let Some(content_disposition) = content_disposition {
            request = request.content_disposition(content_disposition);
        }

        request
            .send()
            .await
            .context("failed to upload object to S3")?;

        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<StoredFile> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .context("failed to download object from S3")?;

        let content_type = response.content_type().map(|value| value.to_string());
        let bytes = response
            .body
            .collect()
            .await
            .context("failed to read object stream")?
            .into_bytes()
            .to_vec();

        Ok(StoredFile {
            bytes,
            content_type,
        })
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .context("failed to delete object from S3")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::document_key;
    use uuid::Uuid;

    #[test]
    fn document_key_keeps_safe_file_names() {
        let trip = Uuid::nil();
        let doc = Uuid::nil();
        let key = document_key(trip, doc, "boarding-pass_1.pdf");
        assert_eq!(
            key,
            format!("trips/{trip}/documents/{doc}/boarding-pass_1.pdf")
        );
    }

    #[test]
    fn document_key_replaces_unsafe_characters() {
        let key = document_key(Uuid::nil(), Uuid::nil(), "../my passport.pdf");
        assert!(key.ends_with("/_my_passport.pdf"));
        assert!(!key.contains(".."));
    }

    #[test]
    fn document_key_falls_back_for_empty_names() {
        let key = document_key(Uuid::nil(), Uuid::nil(), "...");
        assert!(key.ends_with("/file"));
    }
}
