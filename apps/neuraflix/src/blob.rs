//! # Blob Stores
//!
//! Durable homes for staged posters. Each store takes a local file and a
//! blob name and returns the URL the graph will carry as `thumbnail`.
//!
//! - [`AzureBlobStore`]: Put Blob against a container, authorized by the
//!   SAS token or the Shared Key account key from the connection string
//! - [`LocalBlobStore`]: copy into a directory

use crate::error::{ConfigError, StageError};
use async_trait::async_trait;
use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upload-by-name storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store the file at `path` as `name`; return its public URL.
    async fn upload(
        &self,
        name: &str,
        path: &Path,
        content_type: Option<&str>,
    ) -> Result<String, StageError>;

    /// Short description for logs.
    fn describe(&self) -> String;
}

// =============================================================================
// AZURE
// =============================================================================

const AZURE_API_VERSION: &str = "2021-08-06";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

type HmacSha256 = Hmac<Sha256>;

/// How requests to the storage account are authorized.
#[derive(Clone, PartialEq, Eq)]
pub enum AzureCredential {
    /// SAS token without the leading `?`, appended to every request URL.
    Sas(String),
    /// Account name and decoded account key, used for Shared Key signing.
    SharedKey { account: String, key: Vec<u8> },
}

impl std::fmt::Debug for AzureCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sas(_) => f.write_str("Sas(<redacted>)"),
            Self::SharedKey { account, .. } => f
                .debug_struct("SharedKey")
                .field("account", account)
                .field("key", &"<redacted>")
                .finish(),
        }
    }
}

/// Parsed `AZURE_STORAGE_CONNECTION_STRING`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AzureConnection {
    /// `https://<account>.blob.core.windows.net`, no trailing slash.
    pub endpoint: String,
    pub credential: AzureCredential,
}

impl AzureConnection {
    /// Parse `Key=Value;Key=Value` pairs.
    ///
    /// The blob endpoint comes from `BlobEndpoint`, or is built from
    /// `DefaultEndpointsProtocol`, `AccountName` and `EndpointSuffix`.
    /// A `SharedAccessSignature` wins over `AccountName` + `AccountKey`.
    pub fn parse(connection_string: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::Invalid {
            key: crate::config::AZURE_STORAGE_CONNECTION_STRING.to_string(),
            reason: reason.to_string(),
        };

        // Values may contain '=' (base64 keys, SAS signatures); split once.
        let pairs: HashMap<&str, &str> = connection_string
            .split(';')
            .filter_map(|part| part.split_once('='))
            .map(|(k, v)| (k.trim(), v.trim()))
            .filter(|(_, v)| !v.is_empty())
            .collect();

        let endpoint = match pairs.get("BlobEndpoint") {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => {
                let account = pairs
                    .get("AccountName")
                    .ok_or_else(|| invalid("needs BlobEndpoint or AccountName"))?;
                let protocol = pairs.get("DefaultEndpointsProtocol").unwrap_or(&"https");
                let suffix = pairs.get("EndpointSuffix").unwrap_or(&"core.windows.net");
                format!("{protocol}://{account}.blob.{suffix}")
            }
        };

        let credential = match (
            pairs.get("SharedAccessSignature"),
            pairs.get("AccountName"),
            pairs.get("AccountKey"),
        ) {
            (Some(sas), _, _) => AzureCredential::Sas(sas.trim_start_matches('?').to_string()),
            (None, Some(account), Some(key)) => AzureCredential::SharedKey {
                account: (*account).to_string(),
                key: BASE64_STANDARD
                    .decode(key)
                    .map_err(|e| invalid(&format!("AccountKey is not base64: {e}")))?,
            },
            _ => {
                return Err(invalid(
                    "needs a SharedAccessSignature, or AccountName and AccountKey",
                ));
            }
        };

        Ok(Self {
            endpoint,
            credential,
        })
    }
}

/// Canonical string a Put Blob request is signed over.
///
/// Standard headers in the fixed Shared Key order (only Content-Length and
/// Content-Type are sent), then the `x-ms-` headers sorted, then the
/// resource. A zero length signs as empty.
fn put_blob_string_to_sign(
    canonical_resource: &str,
    content_length: usize,
    content_type: &str,
    date: &str,
) -> String {
    let length = if content_length == 0 {
        String::new()
    } else {
        content_length.to_string()
    };
    format!(
        "PUT\n\n\n{length}\n\n{content_type}\n\n\n\n\n\n\n\
         x-ms-blob-type:BlockBlob\nx-ms-date:{date}\nx-ms-version:{AZURE_API_VERSION}\n\
         {canonical_resource}"
    )
}

/// Base64 HMAC-SHA256 of `string_to_sign` under the account key.
fn shared_key_signature(key: &[u8], string_to_sign: &str) -> Result<String, StageError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| StageError::Upload(format!("account key: {e}")))?;
    mac.update(string_to_sign.as_bytes());
    Ok(BASE64_STANDARD.encode(mac.finalize().into_bytes()))
}

/// A container in Azure Blob Storage.
#[derive(Clone)]
pub struct AzureBlobStore {
    http: reqwest::Client,
    connection: AzureConnection,
    container: String,
    timeout: Duration,
}

impl AzureBlobStore {
    pub fn new(connection: AzureConnection, container: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            connection,
            container: container.into(),
            timeout,
        }
    }

    /// Public URL of a blob (no SAS).
    #[must_use]
    pub fn blob_url(&self, name: &str) -> String {
        format!("{}/{}/{}", self.connection.endpoint, self.container, name)
    }

    /// `Authorization` header value for a Put Blob of `url`.
    fn authorization(
        &self,
        account: &str,
        key: &[u8],
        url: &str,
        content_length: usize,
        content_type: &str,
        date: &str,
    ) -> Result<String, StageError> {
        // The canonical resource is the account followed by the encoded path
        // exactly as sent; emulator endpoints carry the account in the path too.
        let path = reqwest::Url::parse(url)
            .map_err(|e| StageError::Upload(format!("{url}: {e}")))?
            .path()
            .to_string();
        let string_to_sign =
            put_blob_string_to_sign(&format!("/{account}{path}"), content_length, content_type, date);
        let signature = shared_key_signature(key, &string_to_sign)?;
        Ok(format!("SharedKey {account}:{signature}"))
    }
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    async fn upload(
        &self,
        name: &str,
        path: &Path,
        content_type: Option<&str>,
    ) -> Result<String, StageError> {
        let bytes = tokio::fs::read(path).await?;
        let url = self.blob_url(name);
        let content_type = content_type.unwrap_or(DEFAULT_CONTENT_TYPE);
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();

        let request = match &self.connection.credential {
            AzureCredential::Sas(sas) => self.http.put(format!("{url}?{sas}")),
            AzureCredential::SharedKey { account, key } => {
                let authorization =
                    self.authorization(account, key, &url, bytes.len(), content_type, &date)?;
                self.http
                    .put(&url)
                    .header(reqwest::header::AUTHORIZATION, authorization)
            }
        };

        let response = request
            .header("x-ms-blob-type", "BlockBlob")
            .header("x-ms-date", &date)
            .header("x-ms-version", AZURE_API_VERSION)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .timeout(self.timeout)
            .body(bytes)
            .send()
            .await
            .map_err(|e| StageError::Upload(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let code = body
                .split("<Code>")
                .nth(1)
                .and_then(|rest| rest.split("</Code>").next())
                .unwrap_or("");
            return Err(StageError::Upload(format!("HTTP {} {code}", status.as_u16())));
        }
        Ok(url)
    }

    fn describe(&self) -> String {
        format!("azure {}/{}", self.connection.endpoint, self.container)
    }
}

// =============================================================================
// LOCAL DIRECTORY
// =============================================================================

/// Posters copied into a directory.
///
/// URLs are `{base_url}/{name}` when a base URL is configured (e.g. a static
/// file server in front of the directory), otherwise `file://` URLs.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    dir: PathBuf,
    base_url: Option<String>,
}

impl LocalBlobStore {
    pub fn new(dir: impl Into<PathBuf>, base_url: Option<String>) -> Self {
        Self {
            dir: dir.into(),
            base_url: base_url.map(|u| u.trim_end_matches('/').to_string()),
        }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn upload(
        &self,
        name: &str,
        path: &Path,
        _content_type: Option<&str>,
    ) -> Result<String, StageError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StageError::Upload(format!("{}: {e}", self.dir.display())))?;
        let target = self.dir.join(name);
        tokio::fs::copy(path, &target)
            .await
            .map_err(|e| StageError::Upload(format!("{}: {e}", target.display())))?;

        Ok(match &self.base_url {
            Some(base) => format!("{base}/{name}"),
            None => {
                let absolute = tokio::fs::canonicalize(&target).await.unwrap_or(target);
                format!("file://{}", absolute.display())
            }
        })
    }

    fn describe(&self) -> String {
        format!("local {}", self.dir.display())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_with_blob_endpoint() {
        let conn = AzureConnection::parse(
            "BlobEndpoint=https://acct.blob.core.windows.net/;SharedAccessSignature=?sv=2022&sig=a%3D=",
        )
        .expect("parse");
        assert_eq!(conn.endpoint, "https://acct.blob.core.windows.net");
        assert_eq!(conn.credential, AzureCredential::Sas("sv=2022&sig=a%3D=".to_string()));
    }

    #[test]
    fn connection_from_account_name() {
        let conn = AzureConnection::parse(
            "DefaultEndpointsProtocol=http;AccountName=devstore;EndpointSuffix=local.test;SharedAccessSignature=sv=1",
        )
        .expect("parse");
        assert_eq!(conn.endpoint, "http://devstore.blob.local.test");
    }

    #[test]
    fn account_key_connection_string() {
        let conn = AzureConnection::parse(
            "DefaultEndpointsProtocol=https;AccountName=neuraflix;AccountKey=abc123==;EndpointSuffix=core.windows.net",
        )
        .expect("parse");
        assert_eq!(conn.endpoint, "https://neuraflix.blob.core.windows.net");
        assert_eq!(
            conn.credential,
            AzureCredential::SharedKey {
                account: "neuraflix".to_string(),
                key: BASE64_STANDARD.decode("abc123==").expect("base64"),
            }
        );
        assert!(!format!("{conn:?}").contains("abc123"));
    }

    #[test]
    fn connection_without_credentials_is_rejected() {
        let err = AzureConnection::parse("AccountName=a;EndpointSuffix=core.windows.net")
            .expect_err("no credential");
        assert!(err.to_string().contains("AccountKey"));

        let err = AzureConnection::parse("AccountName=a;AccountKey=not base64!")
            .expect_err("bad key");
        assert!(err.to_string().contains("base64"));
    }

    #[test]
    fn put_blob_signature_matches_reference() {
        let key = BASE64_STANDARD
            .decode("bmV1cmFmbGl4LXRlc3QtYWNjb3VudC1rZXktMDEyMzQ1Njc4OQ==")
            .expect("base64");
        let date = "Sun, 18 Oct 2026 09:30:00 GMT";
        let string_to_sign =
            put_blob_string_to_sign("/neuraflix/posters/abc-toy.jpg", 12, "image/jpeg", date);

        assert!(string_to_sign.starts_with("PUT\n\n\n12\n\nimage/jpeg\n"));
        assert!(string_to_sign.ends_with("x-ms-version:2021-08-06\n/neuraflix/posters/abc-toy.jpg"));
        assert_eq!(
            shared_key_signature(&key, &string_to_sign).expect("sign"),
            "mR0cTkBcan52cLca/+gzPhd8/yOUxHe5pQ+wHqbS4UY="
        );

        let store = AzureBlobStore::new(
            AzureConnection {
                endpoint: "https://neuraflix.blob.core.windows.net".to_string(),
                credential: AzureCredential::SharedKey {
                    account: "neuraflix".to_string(),
                    key: key.clone(),
                },
            },
            "posters",
            Duration::from_secs(5),
        );
        let header = store
            .authorization("neuraflix", &key, &store.blob_url("abc-toy.jpg"), 12, "image/jpeg", date)
            .expect("authorization");
        assert_eq!(header, "SharedKey neuraflix:mR0cTkBcan52cLca/+gzPhd8/yOUxHe5pQ+wHqbS4UY=");
    }

    #[test]
    fn empty_body_signs_empty_length() {
        let signed = put_blob_string_to_sign("/a/c/b", 0, "image/png", "d");
        assert!(signed.starts_with("PUT\n\n\n\n\nimage/png\n"));
    }

    #[test]
    fn blob_url_has_no_sas() {
        let store = AzureBlobStore::new(
            AzureConnection {
                endpoint: "https://acct.blob.core.windows.net".to_string(),
                credential: AzureCredential::Sas("sig=secret".to_string()),
            },
            "posters",
            Duration::from_secs(5),
        );
        assert_eq!(
            store.blob_url("abc-toy.jpg"),
            "https://acct.blob.core.windows.net/posters/abc-toy.jpg"
        );
        assert!(!store.describe().contains("secret"));
    }

    #[tokio::test]
    async fn local_store_copies_and_builds_url() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let source = dir.path().join("in.jpg");
        std::fs::write(&source, b"jpeg").expect("write");

        let store = LocalBlobStore::new(dir.path().join("out"), Some("https://cdn.test/".to_string()));
        let url = store.upload("id-in.jpg", &source, None).await.expect("upload");

        assert_eq!(url, "https://cdn.test/id-in.jpg");
        assert_eq!(std::fs::read(dir.path().join("out/id-in.jpg")).expect("read"), b"jpeg");
    }

    #[tokio::test]
    async fn local_store_without_base_url_uses_file_scheme() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let source = dir.path().join("in.jpg");
        std::fs::write(&source, b"jpeg").expect("write");

        let store = LocalBlobStore::new(dir.path().join("out"), None);
        let url = store.upload("x.jpg", &source, None).await.expect("upload");
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("/out/x.jpg"));
    }
}
