//! Azure Blob Storage adapter.
//!
//! Talks to the Blob service REST API directly with Shared Key
//! authorization. Requests are signed with HMAC-SHA256 over the canonical
//! string-to-sign using the base64-decoded account key.
//!
//! Only the two operations the service needs are implemented:
//! `Get Blob` and `Put Blob` (block blob, overwrite).

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client as HttpClient, Method, Url};
use sha2::Sha256;

use super::BlobStore;
use crate::error::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

const API_VERSION: &str = "2021-08-06";

pub struct AzureBlobStore {
    http_client: HttpClient,
    account: String,
    key: Vec<u8>,
    container: String,
    endpoint: String,
}

impl AzureBlobStore {
    /// Creates a client for one container.
    ///
    /// `endpoint` defaults to `https://<account>.blob.core.windows.net`.
    pub fn new(
        account: String,
        account_key: &str,
        container: String,
        endpoint: Option<String>,
        timeout: Duration,
    ) -> AppResult<Self> {
        let key = STANDARD.decode(account_key.trim()).map_err(|e| {
            AppError::Config(format!("BLOB_ACCOUNT_KEY is not valid base64: {}", e))
        })?;
        let endpoint = endpoint
            .unwrap_or_else(|| format!("https://{}.blob.core.windows.net", account))
            .trim_end_matches('/')
            .to_string();
        let http_client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            account,
            key,
            container,
            endpoint,
        })
    }

    fn blob_url(&self, name: &str) -> AppResult<Url> {
        let raw = format!("{}/{}/{}", self.endpoint, self.container, name);
        Url::parse(&raw).map_err(|e| AppError::Internal(format!("invalid blob URL {}: {}", raw, e)))
    }

    fn sign(&self, string_to_sign: &str) -> AppResult<String> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| AppError::Internal(format!("invalid signing key: {}", e)))?;
        mac.update(string_to_sign.as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }

    async fn send(
        &self,
        method: Method,
        name: &str,
        body: Option<Bytes>,
    ) -> AppResult<reqwest::Response> {
        let url = self.blob_url(name)?;
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let content_length = body.as_ref().map(Bytes::len).unwrap_or(0);
        let content_type = if body.is_some() {
            "application/octet-stream"
        } else {
            ""
        };

        let mut ms_headers = vec![
            ("x-ms-date".to_string(), date),
            ("x-ms-version".to_string(), API_VERSION.to_string()),
        ];
        if body.is_some() {
            ms_headers.push(("x-ms-blob-type".to_string(), "BlockBlob".to_string()));
        }

        let canonical_resource = format!("/{}{}", self.account, url.path());
        let to_sign = string_to_sign(
            method.as_str(),
            content_length,
            content_type,
            &ms_headers,
            &canonical_resource,
        );
        let authorization = format!("SharedKey {}:{}", self.account, self.sign(&to_sign)?);

        let mut request = self
            .http_client
            .request(method, url)
            .header("Authorization", authorization);
        for (header, value) in &ms_headers {
            request = request.header(header.as_str(), value.as_str());
        }
        if let Some(body) = body {
            request = request.header("Content-Type", content_type).body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("request for blob {} failed: {}", name, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Storage(format!(
                "blob {} returned status {}: {}",
                name,
                status,
                body.chars().take(500).collect::<String>()
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    async fn download(&self, name: &str) -> AppResult<Bytes> {
        let response = self.send(Method::GET, name, None).await?;
        let data = response
            .bytes()
            .await
            .map_err(|e| AppError::Storage(format!("reading blob {} failed: {}", name, e)))?;
        tracing::debug!(blob = name, bytes = data.len(), "Downloaded blob");
        Ok(data)
    }

    async fn upload(&self, name: &str, data: Bytes) -> AppResult<()> {
        let size = data.len();
        self.send(Method::PUT, name, Some(data)).await?;
        tracing::debug!(blob = name, bytes = size, "Uploaded blob");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("azure:{}/{}", self.endpoint, self.container)
    }
}

/// Shared Key string-to-sign for the Blob service.
///
/// Standard headers the service never sends are left empty. Content-Length
/// is empty when zero, as required since API version 2015-02-21.
fn string_to_sign(
    verb: &str,
    content_length: usize,
    content_type: &str,
    ms_headers: &[(String, String)],
    canonical_resource: &str,
) -> String {
    let length = if content_length == 0 {
        String::new()
    } else {
        content_length.to_string()
    };

    let mut headers: Vec<(String, &str)> = ms_headers
        .iter()
        .map(|(k, v)| (k.to_lowercase(), v.trim()))
        .collect();
    headers.sort_by(|a, b| a.0.cmp(&b.0));
    let canonical_headers: String = headers
        .iter()
        .map(|(k, v)| format!("{}:{}\n", k, v))
        .collect();

    format!(
        "{}\n\n\n{}\n\n{}\n\n\n\n\n\n\n{}{}",
        verb, length, content_type, canonical_headers, canonical_resource
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(endpoint: Option<String>) -> AzureBlobStore {
        AzureBlobStore::new(
            "acct".to_string(),
            &STANDARD.encode(b"secret"),
            "mycontentdata".to_string(),
            endpoint,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_string_to_sign_get() {
        let headers = vec![
            ("x-ms-version".to_string(), API_VERSION.to_string()),
            (
                "x-ms-date".to_string(),
                "Mon, 19 Oct 2026 10:00:00 GMT".to_string(),
            ),
        ];
        let s = string_to_sign("GET", 0, "", &headers, "/acct/mycontentdata/clicks_sample.csv");
        assert_eq!(
            s,
            "GET\n\n\n\n\n\n\n\n\n\n\n\n\
             x-ms-date:Mon, 19 Oct 2026 10:00:00 GMT\n\
             x-ms-version:2021-08-06\n\
             /acct/mycontentdata/clicks_sample.csv"
        );
    }

    #[test]
    fn test_string_to_sign_put_includes_length_and_type() {
        let headers = vec![("x-ms-blob-type".to_string(), "BlockBlob".to_string())];
        let s = string_to_sign(
            "PUT",
            12,
            "application/octet-stream",
            &headers,
            "/acct/c/b",
        );
        assert!(s.starts_with("PUT\n\n\n12\n\napplication/octet-stream\n"));
        assert!(s.ends_with("x-ms-blob-type:BlockBlob\n/acct/c/b"));
    }

    #[test]
    fn test_default_endpoint() {
        let store = store(None);
        let url = store.blob_url("articles_metadata.csv").unwrap();
        assert_eq!(
            url.as_str(),
            "https://acct.blob.core.windows.net/mycontentdata/articles_metadata.csv"
        );
    }

    #[test]
    fn test_endpoint_override_trims_slash() {
        let store = store(Some("http://127.0.0.1:10000/acct/".to_string()));
        assert_eq!(store.describe(), "azure:http://127.0.0.1:10000/acct/mycontentdata");
    }

    #[test]
    fn test_signature_is_deterministic() {
        let store = store(None);
        let a = store.sign("payload").unwrap();
        let b = store.sign("payload").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, store.sign("other").unwrap());
    }

    #[test]
    fn test_invalid_key_rejected() {
        let result = AzureBlobStore::new(
            "acct".to_string(),
            "not base64!!",
            "c".to_string(),
            None,
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_storage_error() {
        let store = store(Some("http://127.0.0.1:1/acct".to_string()));
        let result = store.download("clicks_sample.csv").await;
        assert!(matches!(result, Err(AppError::Storage(_))));

        let result = store
            .upload("articles_metadata.csv", Bytes::from_static(b"a"))
            .await;
        assert!(matches!(result, Err(AppError::Storage(_))));
    }
}
