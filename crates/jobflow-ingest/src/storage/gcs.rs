//! Google Cloud Storage through the S3-compatible XML API
//!
//! Authenticates with HMAC keys (`GCS_HMAC_ACCESS_KEY` / `GCS_HMAC_SECRET`)
//! against `https://storage.googleapis.com`. GCS rejects the flexible
//! checksum headers newer S3 clients send by default, so checksums are only
//! computed when an operation requires them.

use super::{upload_result, ObjectStore, UploadResult};
use crate::config::StorageConfig;
use crate::error::{IngestError, Result};
use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Credentials, Region, RequestChecksumCalculation},
    error::DisplayErrorContext,
    primitives::ByteStream,
    Client,
};
use tracing::{debug, info, instrument};

#[derive(Clone)]
pub struct GcsStore {
    client: Client,
    bucket: String,
}

impl GcsStore {
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) else {
            return Err(IngestError::Config(
                "GCS_HMAC_ACCESS_KEY and GCS_HMAC_SECRET must be set for the gcs backend".into(),
            ));
        };

        let credentials = Credentials::new(access_key, secret_key, None, None, "jobflow-gcs-hmac");

        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version_latest()
            .credentials_provider(credentials)
            .region(Region::new(config.region.clone()))
            .endpoint_url(&config.endpoint)
            .force_path_style(true)
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
            .build();

        info!(
            bucket = %config.bucket,
            endpoint = %config.endpoint,
            project = config.project.as_deref().unwrap_or("-"),
            "GCS client initialized"
        );

        Ok(Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

/// Client errors other than timeouts and throttling fail the same way on retry
fn is_permanent_status(status: u16) -> bool {
    (400..500).contains(&status) && status != 408 && status != 429
}

fn storage_error(action: &str, key: &str, status: Option<u16>, err: impl std::fmt::Display) -> IngestError {
    let message = format!("{} {}: {}", action, key, err);
    match status {
        Some(status) if is_permanent_status(status) => IngestError::StorageRejected { status, message },
        _ => IngestError::Storage(message),
    }
}

#[async_trait]
impl ObjectStore for GcsStore {
    fn uri(&self, key: &str) -> String {
        format!("gs://{}/{}", self.bucket, key)
    }

    #[instrument(skip(self, data))]
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<UploadResult> {
        let result = upload_result(self.uri(key), key, &data);
        debug!(size = result.size, "Uploading to {}", result.uri);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| {
                let status = e.raw_response().map(|r| r.status().as_u16());
                storage_error("upload", key, status, DisplayErrorContext(e))
            })?;

        info!(size = result.size, checksum = %result.checksum, "Uploaded {}", result.uri);
        Ok(result)
    }

    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let response = match self.client.get_object().bucket(&self.bucket).key(key).send().await {
            Ok(response) => response,
            Err(e) => {
                let status = e.raw_response().map(|r| r.status().as_u16());
                let service = e.into_service_error();
                if service.is_no_such_key() {
                    return Err(IngestError::NotFound(self.uri(key)));
                }
                return Err(storage_error("download", key, status, DisplayErrorContext(service)));
            },
        };

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| storage_error("read body of", key, None, e))?
            .into_bytes()
            .to_vec();

        debug!(size = data.len(), "Downloaded {}", self.uri(key));
        Ok(data)
    }

    #[instrument(skip(self))]
    async fn exists(&self, key: &str) -> Result<bool> {
        match self.client.head_object().bucket(&self.bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                let status = e.raw_response().map(|r| r.status().as_u16());
                let service = e.into_service_error();
                if service.is_not_found() {
                    Ok(false)
                } else {
                    Err(storage_error("check", key, status, DisplayErrorContext(service)))
                }
            },
        }
    }

    #[instrument(skip(self))]
    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let response = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| {
                    let status = e.raw_response().map(|r| r.status().as_u16());
                    storage_error("list", prefix, status, DisplayErrorContext(e))
                })?;

            keys.extend(
                response
                    .contents()
                    .iter()
                    .filter_map(|obj| obj.key().map(str::to_string)),
            );

            match response.next_continuation_token() {
                Some(token) if response.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                },
                _ => break,
            }
        }

        keys.sort();
        debug!(count = keys.len(), "Listed gs://{}/{}", self.bucket, prefix);
        Ok(keys)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::StorageBackend;
    use wiremock::{
        matchers::{body_bytes, header, method, path, path_regex, query_param, query_param_is_missing},
        Mock, MockServer, ResponseTemplate,
    };

    fn config() -> StorageConfig {
        StorageConfig {
            backend: StorageBackend::Gcs,
            bucket: "jobs-bucket".into(),
            access_key: Some("GOOG1EXAMPLE".into()),
            secret_key: Some("secret".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_uri() {
        let store = GcsStore::new(&config()).unwrap();
        assert_eq!(store.bucket(), "jobs-bucket");
        assert_eq!(
            store.uri("raw/adzuna/ingest_date=2025-10-14/adzuna_jobs_000000.json"),
            "gs://jobs-bucket/raw/adzuna/ingest_date=2025-10-14/adzuna_jobs_000000.json"
        );
    }

    #[test]
    fn test_requires_hmac_keys() {
        let config = StorageConfig {
            secret_key: None,
            ..config()
        };
        assert!(matches!(GcsStore::new(&config), Err(IngestError::Config(_))));
    }

    // ========================================================================
    // Requests against a mock S3-compatible endpoint
    // ========================================================================

    async fn mock_store() -> (MockServer, GcsStore) {
        let server = MockServer::start().await;
        let store = GcsStore::new(&StorageConfig {
            endpoint: server.uri(),
            ..config()
        })
        .unwrap();
        (server, store)
    }

    fn xml(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .insert_header("content-type", "application/xml")
            .set_body_string(body)
    }

    fn error_xml(status: u16, code: &str) -> ResponseTemplate {
        ResponseTemplate::new(status)
            .insert_header("content-type", "application/xml")
            .set_body_string(format!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Error><Code>{}</Code><Message>{}</Message></Error>",
                code, code
            ))
    }

    #[tokio::test]
    async fn test_list_follows_continuation_tokens() {
        let (server, store) = mock_store().await;

        Mock::given(method("GET"))
            .and(path_regex(r"^/jobs-bucket/?$"))
            .and(query_param("list-type", "2"))
            .and(query_param("prefix", "processed/"))
            .and(query_param_is_missing("continuation-token"))
            .respond_with(xml(
                r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>jobs-bucket</Name>
  <Prefix>processed/</Prefix>
  <KeyCount>2</KeyCount>
  <MaxKeys>2</MaxKeys>
  <IsTruncated>true</IsTruncated>
  <NextContinuationToken>page-2</NextContinuationToken>
  <Contents><Key>processed/locations/locations.parquet</Key><Size>10</Size></Contents>
  <Contents><Key>processed/jobs/jobs.parquet</Key><Size>20</Size></Contents>
</ListBucketResult>"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path_regex(r"^/jobs-bucket/?$"))
            .and(query_param("list-type", "2"))
            .and(query_param("continuation-token", "page-2"))
            .respond_with(xml(
                r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>jobs-bucket</Name>
  <Prefix>processed/</Prefix>
  <KeyCount>1</KeyCount>
  <MaxKeys>2</MaxKeys>
  <IsTruncated>false</IsTruncated>
  <Contents><Key>processed/categories/categories.parquet</Key><Size>5</Size></Contents>
</ListBucketResult>"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let keys = store.list("processed/").await.unwrap();
        assert_eq!(
            keys,
            vec![
                "processed/categories/categories.parquet",
                "processed/jobs/jobs.parquet",
                "processed/locations/locations.parquet",
            ]
        );
    }

    #[tokio::test]
    async fn test_get_missing_key_is_not_found() {
        let (server, store) = mock_store().await;

        Mock::given(method("GET"))
            .and(path("/jobs-bucket/raw/missing.json"))
            .respond_with(error_xml(404, "NoSuchKey"))
            .mount(&server)
            .await;

        match store.get("raw/missing.json").await {
            Err(IngestError::NotFound(uri)) => assert_eq!(uri, "gs://jobs-bucket/raw/missing.json"),
            other => panic!("expected NotFound, got {:?}", other.map(|d| d.len())),
        }
    }

    #[tokio::test]
    async fn test_get_returns_body() {
        let (server, store) = mock_store().await;

        Mock::given(method("GET"))
            .and(path("/jobs-bucket/raw/snapshot.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/json")
                    .set_body_string("[{\"id\":\"1\"}]"),
            )
            .mount(&server)
            .await;

        assert_eq!(store.get("raw/snapshot.json").await.unwrap(), b"[{\"id\":\"1\"}]");
    }

    #[tokio::test]
    async fn test_exists_maps_404_to_false() {
        let (server, store) = mock_store().await;

        Mock::given(method("HEAD"))
            .and(path("/jobs-bucket/processed/jobs/jobs.parquet"))
            .respond_with(ResponseTemplate::new(200).insert_header("content-length", "20"))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/jobs-bucket/processed/jobs/absent.parquet"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        assert!(store.exists("processed/jobs/jobs.parquet").await.unwrap());
        assert!(!store.exists("processed/jobs/absent.parquet").await.unwrap());
    }

    #[tokio::test]
    async fn test_put_sends_body_and_content_type() {
        let (server, store) = mock_store().await;

        Mock::given(method("PUT"))
            .and(path("/jobs-bucket/processed/jobs/jobs.csv"))
            .and(header("content-type", "text/csv"))
            .and(body_bytes(b"job_id\n1\n".to_vec()))
            .respond_with(ResponseTemplate::new(200).insert_header("etag", "\"abc\""))
            .expect(1)
            .mount(&server)
            .await;

        let result = store
            .put("processed/jobs/jobs.csv", b"job_id\n1\n".to_vec(), "text/csv")
            .await
            .unwrap();
        assert_eq!(result.uri, "gs://jobs-bucket/processed/jobs/jobs.csv");
        assert_eq!(result.size, 9);
    }

    #[tokio::test]
    async fn test_access_denied_is_permanent() {
        let (server, store) = mock_store().await;

        Mock::given(method("PUT"))
            .and(path("/jobs-bucket/processed/jobs/jobs.csv"))
            .respond_with(error_xml(403, "AccessDenied"))
            .expect(1)
            .mount(&server)
            .await;

        let err = store
            .put("processed/jobs/jobs.csv", b"job_id\n".to_vec(), "text/csv")
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::StorageRejected { status: 403, .. }));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_permanent_statuses() {
        assert!(is_permanent_status(403));
        assert!(is_permanent_status(404));
        assert!(!is_permanent_status(408));
        assert!(!is_permanent_status(429));
        assert!(!is_permanent_status(503));
    }
}
