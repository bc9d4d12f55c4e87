use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use url::Url;

use super::{ObjectStore, ObjectStoreError, StoredObject};

const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
const SCOPE: &str = "https://www.googleapis.com/auth/devstorage.read_write";

/// Refresh tokens this long before the provider says they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Google Cloud Storage object store backend (JSON API).
pub struct GcsStore {
    bucket: String,
    client: Client,
    endpoint: Url,
    access_token: tokio::sync::RwLock<Option<AccessToken>>,
    credentials_file: Option<String>,
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

impl AccessToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + TOKEN_EXPIRY_MARGIN < self.expires_at
    }
}

#[derive(Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    token_uri: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListObjectsResponse {
    #[serde(default)]
    items: Vec<ObjectResource>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct ObjectResource {
    name: String,
}

impl GcsStore {
    /// Connect to `bucket`, authenticating with the service account key at
    /// `credentials_file` or, without one, the GCE metadata server.
    /// Fails if no initial access token can be obtained.
    pub async fn new(bucket: &str, credentials_file: Option<&str>) -> Result<Self, anyhow::Error> {
        let client = Client::builder().build()?;

        let store = Self {
            bucket: bucket.to_string(),
            client,
            endpoint: Url::parse(DEFAULT_ENDPOINT)?,
            access_token: tokio::sync::RwLock::new(None),
            credentials_file: credentials_file.map(|s| s.to_string()),
        };

        store.token().await?;
        Ok(store)
    }

    /// Current access token, refreshed when close to expiry.
    async fn token(&self) -> Result<String, anyhow::Error> {
        if let Some(token) = self.access_token.read().await.as_ref() {
            if token.is_fresh() {
                return Ok(token.value.clone());
            }
        }

        let mut lock = self.access_token.write().await;
        // Another request may have refreshed while we waited for the lock
        if let Some(token) = lock.as_ref() {
            if token.is_fresh() {
                return Ok(token.value.clone());
            }
        }

        let resp = if let Some(ref creds_path) = self.credentials_file {
            self.token_from_service_account(creds_path).await?
        } else {
            self.token_from_metadata_server().await?
        };
        tracing::debug!(expires_in = resp.expires_in, "Refreshed GCS access token");

        let value = resp.access_token.clone();
        *lock = Some(AccessToken {
            value: resp.access_token,
            expires_at: Instant::now() + Duration::from_secs(resp.expires_in),
        });
        Ok(value)
    }

    async fn authorized_token(&self) -> Result<String, ObjectStoreError> {
        self.token()
            .await
            .map_err(|e| ObjectStoreError::Backend(format!("GCS authentication failed: {e}")))
    }

    async fn token_from_service_account(&self, path: &str) -> Result<TokenResponse, anyhow::Error> {
        let key_json = tokio::fs::read_to_string(path).await?;
        let key: ServiceAccountKey = serde_json::from_str(&key_json)?;

        let now = chrono::Utc::now().timestamp();
        let claims = serde_json::json!({
            "iss": key.client_email,
            "scope": SCOPE,
            "aud": key.token_uri,
            "iat": now,
            "exp": now + 3600,
        });

        // Build JWT (header.claims.signature)
        let header = base64_url_encode(&serde_json::to_vec(&serde_json::json!({
            "alg": "RS256",
            "typ": "JWT"
        }))?);
        let payload = base64_url_encode(&serde_json::to_vec(&claims)?);
        let unsigned = format!("{header}.{payload}");

        let signature = sign_rs256(unsigned.as_bytes(), &key.private_key)?;
        let jwt = format!("{unsigned}.{}", base64_url_encode(&signature));

        let resp = self
            .client
            .post(&key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", &jwt),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(resp)
    }

    async fn token_from_metadata_server(&self) -> Result<TokenResponse, anyhow::Error> {
        let resp = self
            .client
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(resp)
    }
}

#[async_trait]
impl ObjectStore for GcsStore {
    async fn list(&self, prefix: &str) -> Result<Vec<String>, ObjectStoreError> {
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let token = self.authorized_token().await?;
            let url = list_url(&self.endpoint, &self.bucket, prefix, page_token.as_deref())?;

            let resp = self
                .client
                .get(url)
                .bearer_auth(&token)
                .send()
                .await
                .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

            if !resp.status().is_success() {
                return Err(backend_failure("list", resp).await);
            }

            let page: ListObjectsResponse = resp
                .json()
                .await
                .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

            names.extend(page.items.into_iter().map(|item| item.name));

            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        Ok(names)
    }

    async fn get(&self, key: &str) -> Result<StoredObject, ObjectStoreError> {
        let token = self.authorized_token().await?;
        let url = media_url(&self.endpoint, &self.bucket, key)?;

        let resp = self
            .client
            .get(url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(ObjectStoreError::NotFound(key.to_string()));
        }

        if !resp.status().is_success() {
            return Err(backend_failure("download", resp).await);
        }

        let content_type = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let data = resp
            .bytes()
            .await
            .map_err(|e| ObjectStoreError::Read(e.to_string()))?;

        Ok(StoredObject { data, content_type })
    }

    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        let token = self.authorized_token().await?;
        let url = upload_url(&self.endpoint, &self.bucket, key)?;

        let resp = self
            .client
            .post(url)
            .bearer_auth(&token)
            .header(header::CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(backend_failure("upload", resp).await);
        }

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        let token = self.authorized_token().await?;
        let url = object_url(&self.endpoint, &self.bucket, key)?;

        let resp = self
            .client
            .delete(url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(ObjectStoreError::NotFound(key.to_string()));
        }

        if !resp.status().is_success() {
            return Err(backend_failure("delete", resp).await);
        }

        Ok(())
    }
}

async fn backend_failure(op: &str, resp: reqwest::Response) -> ObjectStoreError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    ObjectStoreError::Backend(format!("GCS {op} failed ({status}): {body}"))
}

// ============================================================================
// URL building
// ============================================================================

/// Append path segments to `endpoint`, percent-encoding each one (including `/`).
fn endpoint_with_segments(endpoint: &Url, segments: &[&str]) -> Result<Url, ObjectStoreError> {
    let mut url = endpoint.clone();
    url.path_segments_mut()
        .map_err(|_| ObjectStoreError::Backend(format!("invalid GCS endpoint: {endpoint}")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn object_url(endpoint: &Url, bucket: &str, key: &str) -> Result<Url, ObjectStoreError> {
    endpoint_with_segments(endpoint, &["storage", "v1", "b", bucket, "o", key])
}

fn media_url(endpoint: &Url, bucket: &str, key: &str) -> Result<Url, ObjectStoreError> {
    let mut url = object_url(endpoint, bucket, key)?;
    url.query_pairs_mut().append_pair("alt", "media");
    Ok(url)
}

fn upload_url(endpoint: &Url, bucket: &str, key: &str) -> Result<Url, ObjectStoreError> {
    let mut url = endpoint_with_segments(endpoint, &["upload", "storage", "v1", "b", bucket, "o"])?;
    url.query_pairs_mut()
        .append_pair("uploadType", "media")
        .append_pair("name", key);
    Ok(url)
}

fn list_url(
    endpoint: &Url,
    bucket: &str,
    prefix: &str,
    page_token: Option<&str>,
) -> Result<Url, ObjectStoreError> {
    let mut url = endpoint_with_segments(endpoint, &["storage", "v1", "b", bucket, "o"])?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("fields", "items(name),nextPageToken");
        if !prefix.is_empty() {
            query.append_pair("prefix", prefix);
        }
        if let Some(page_token) = page_token {
            query.append_pair("pageToken", page_token);
        }
    }
    Ok(url)
}

// ============================================================================
// JWT signing
// ============================================================================

fn base64_url_encode(data: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(data)
}

fn sign_rs256(data: &[u8], private_key_pem: &str) -> Result<Vec<u8>, anyhow::Error> {
    use base64::Engine;

    // Strip PEM armor and decode the PKCS#8 DER body
    let der_b64: String = private_key_pem
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with("-----"))
        .collect();
    let der = base64::engine::general_purpose::STANDARD.decode(der_b64)?;

    let key_pair = ring::signature::RsaKeyPair::from_pkcs8(&der)
        .map_err(|e| anyhow::anyhow!("Failed to parse RSA key: {e}"))?;

    let mut signature = vec![0u8; key_pair.public().modulus_len()];
    key_pair
        .sign(
            &ring::signature::RSA_PKCS1_SHA256,
            &ring::rand::SystemRandom::new(),
            data,
            &mut signature,
        )
        .map_err(|e| anyhow::anyhow!("Failed to sign: {e}"))?;

    Ok(signature)
}
