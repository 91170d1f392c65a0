/// Blob store clients
///
/// [`AzureBlobStore`] talks to the Azure Blob Storage REST API directly with
/// `reqwest`, authenticating every request with a Shared Key signature:
///
/// ```text
/// StringToSign = VERB + "\n" + Content-Encoding + "\n" + Content-Language + "\n"
///              + Content-Length + "\n" + Content-MD5 + "\n" + Content-Type + "\n"
///              + Date + "\n" + If-Modified-Since + "\n" + If-Match + "\n"
///              + If-None-Match + "\n" + If-Unmodified-Since + "\n" + Range + "\n"
///              + CanonicalizedHeaders + CanonicalizedResource
///
/// Authorization: SharedKey {account}:base64(HMAC-SHA256(base64decode(key), StringToSign))
/// ```
///
/// The target container is created on first upload if it does not exist.
/// Backups and task attachments share the container under separate prefixes.
///
/// # Example
///
/// ```no_run
/// use taskboard_shared::storage::{AzureBlobStore, AzureStorageConfig, BlobStore};
///
/// # async fn example() -> Result<(), taskboard_shared::storage::StorageError> {
/// let store = AzureBlobStore::new(AzureStorageConfig {
///     account_name: "myaccount".to_string(),
///     account_key: "c2VjcmV0".to_string(),
///     container: "backups".to_string(),
///     endpoint: None,
/// })?;
///
/// store.put("hello.json", "application/json", "{}".into()).await?;
/// # Ok(())
/// # }
/// ```

use crate::storage::StorageError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, StatusCode, Url};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

type HmacSha256 = Hmac<Sha256>;

/// Blob service REST API version
const API_VERSION: &str = "2021-08-06";

/// Timeout for a single storage request
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Blob sink; content is written and removed, never read back
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Where blobs go, for logs (never includes secrets)
    fn describe(&self) -> String;

    /// Uploads `body` as blob `name`, replacing any existing blob
    async fn put(&self, name: &str, content_type: &str, body: Bytes) -> Result<(), StorageError>;

    /// Removes blob `name`; `false` when it did not exist
    async fn delete(&self, name: &str) -> Result<bool, StorageError>;
}

/// Azure storage account settings
#[derive(Clone, Serialize, Deserialize)]
pub struct AzureStorageConfig {
    pub account_name: String,

    /// Base64 account key
    pub account_key: String,

    pub container: String,

    /// Endpoint override, e.g. an emulator; defaults to
    /// `https://{account}.blob.core.windows.net`
    pub endpoint: Option<String>,
}

impl fmt::Debug for AzureStorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureStorageConfig")
            .field("account_name", &self.account_name)
            .field("account_key", &"<redacted>")
            .field("container", &self.container)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Azure Blob Storage client using Shared Key auth
pub struct AzureBlobStore {
    client: Client,
    account: String,
    key: Vec<u8>,
    container: String,
    endpoint: String,
    container_ready: OnceCell<()>,
}

impl AzureBlobStore {
    /// Creates a client
    ///
    /// # Errors
    ///
    /// `InvalidCredentials` if the key is not base64 or the endpoint is not a URL.
    pub fn new(config: AzureStorageConfig) -> Result<Self, StorageError> {
        let key = STANDARD
            .decode(config.account_key.trim())
            .map_err(|e| StorageError::InvalidCredentials(format!("account key is not base64: {}", e)))?;

        let endpoint = config
            .endpoint
            .unwrap_or_else(|| format!("https://{}.blob.core.windows.net", config.account_name))
            .trim_end_matches('/')
            .to_string();
        Url::parse(&endpoint)
            .map_err(|e| StorageError::InvalidCredentials(format!("invalid endpoint {}: {}", endpoint, e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            account: config.account_name,
            key,
            container: config.container,
            endpoint,
            container_ready: OnceCell::new(),
        })
    }

    fn url(&self, path: &str) -> Result<Url, StorageError> {
        let raw = format!("{}/{}/{}", self.endpoint, self.container, path);
        let raw = raw.trim_end_matches('/');
        Url::parse(raw).map_err(|e| StorageError::InvalidCredentials(format!("invalid blob url {}: {}", raw, e)))
    }

    /// `/{account}{path}` followed by sorted, lowercased query parameters
    fn canonicalized_resource(&self, url: &Url) -> String {
        let mut resource = format!("/{}{}", self.account, url.path());

        let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, value) in url.query_pairs() {
            params
                .entry(name.to_ascii_lowercase())
                .or_default()
                .push(value.into_owned());
        }
        for (name, mut values) in params {
            values.sort();
            resource.push_str(&format!("\n{}:{}", name, values.join(",")));
        }

        resource
    }

    /// Signs the string with the decoded account key
    fn sign(&self, string_to_sign: &str) -> Result<String, StorageError> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| StorageError::InvalidCredentials(e.to_string()))?;
        mac.update(string_to_sign.as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        content_type: Option<&str>,
        body: Bytes,
        mut ms_headers: Vec<(&'static str, String)>,
    ) -> Result<reqwest::Response, StorageError> {
        ms_headers.push(("x-ms-date", Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()));
        ms_headers.push(("x-ms-version", API_VERSION.to_string()));
        ms_headers.sort_by(|a, b| a.0.cmp(b.0));

        let content_length = if body.is_empty() {
            String::new()
        } else {
            body.len().to_string()
        };
        let to_sign = string_to_sign(
            method.as_str(),
            &content_length,
            content_type.unwrap_or(""),
            &ms_headers,
            &self.canonicalized_resource(&url),
        );
        let authorization = format!("SharedKey {}:{}", self.account, self.sign(&to_sign)?);

        let mut request = self
            .client
            .request(method, url)
            .header("Authorization", authorization)
            .body(body);
        if let Some(content_type) = content_type {
            request = request.header("Content-Type", content_type);
        }
        for (name, value) in ms_headers {
            request = request.header(name, value);
        }

        Ok(request.send().await?)
    }

    async fn ensure_container(&self) -> Result<(), StorageError> {
        self.container_ready
            .get_or_try_init(|| async {
                let mut url = self.url("")?;
                url.set_query(Some("restype=container"));

                let response = self
                    .send(Method::PUT, url, None, Bytes::new(), Vec::new())
                    .await?;

                match response.status() {
                    StatusCode::CREATED => {
                        info!(container = %self.container, "Created blob container");
                        Ok(())
                    }
                    StatusCode::CONFLICT => {
                        debug!(container = %self.container, "Blob container already exists");
                        Ok(())
                    }
                    status => Err(StorageError::Rejected {
                        status: status.as_u16(),
                        body: response.text().await.unwrap_or_default(),
                    }),
                }
            })
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    fn describe(&self) -> String {
        format!("azure:{}/{}", self.account, self.container)
    }

    async fn put(&self, name: &str, content_type: &str, body: Bytes) -> Result<(), StorageError> {
        self.ensure_container().await?;

        let size = body.len();
        let response = self
            .send(
                Method::PUT,
                self.url(name)?,
                Some(content_type),
                body,
                vec![("x-ms-blob-type", "BlockBlob".to_string())],
            )
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Rejected {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        debug!(blob = %name, size, "Uploaded blob");
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<bool, StorageError> {
        let response = self
            .send(Method::DELETE, self.url(name)?, None, Bytes::new(), Vec::new())
            .await?;

        match response.status() {
            StatusCode::ACCEPTED | StatusCode::OK => {
                debug!(blob = %name, "Deleted blob");
                Ok(true)
            }
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(StorageError::Rejected {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }
}

/// Builds the Shared Key string-to-sign for a request without conditional headers
pub fn string_to_sign(
    verb: &str,
    content_length: &str,
    content_type: &str,
    ms_headers: &[(&str, String)],
    canonicalized_resource: &str,
) -> String {
    let standard = [
        verb,
        "", // Content-Encoding
        "", // Content-Language
        content_length,
        "", // Content-MD5
        content_type,
        "", // Date (x-ms-date is used instead)
        "", // If-Modified-Since
        "", // If-Match
        "", // If-None-Match
        "", // If-Unmodified-Since
        "", // Range
    ];

    let mut out = standard.join("\n");
    out.push('\n');
    for (name, value) in ms_headers {
        out.push_str(&format!("{}:{}\n", name.to_ascii_lowercase(), value.trim()));
    }
    out.push_str(canonicalized_resource);
    out
}

/// In-process blob store
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, (String, Bytes)>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored body of a blob
    pub fn get(&self, name: &str) -> Option<Bytes> {
        self.blobs
            .lock()
            .ok()
            .and_then(|blobs| blobs.get(name).map(|(_, body)| body.clone()))
    }

    /// Content type a blob was stored with
    pub fn content_type(&self, name: &str) -> Option<String> {
        self.blobs
            .lock()
            .ok()
            .and_then(|blobs| blobs.get(name).map(|(content_type, _)| content_type.clone()))
    }

    /// Stored blob names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .blobs
            .lock()
            .map(|blobs| blobs.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    async fn put(&self, name: &str, content_type: &str, body: Bytes) -> Result<(), StorageError> {
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|_| StorageError::Unavailable("memory blob store lock poisoned".to_string()))?;
        blobs.insert(name.to_string(), (content_type.to_string(), body));
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<bool, StorageError> {
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|_| StorageError::Unavailable("memory blob store lock poisoned".to_string()))?;
        Ok(blobs.remove(name).is_some())
    }
}
