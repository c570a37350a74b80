use crate::{
    environment::Environment,
    storage::{validate_key, BlobStore, StorageError},
};

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{header::CONTENT_TYPE, Client, StatusCode};
use sha2::{Digest, Sha256};
use std::{env, time::Duration};
use time::{macros::format_description, OffsetDateTime, UtcOffset};
use tracing::{debug, error, info};
use url::Url;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";
const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";
const OCTET_STREAM: &str = "application/octet-stream";

/// Static credentials of an S3 account.
#[derive(Clone, PartialEq, Eq)]
pub struct S3Credentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

impl std::fmt::Debug for S3Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("S3Credentials")
            .field("access_key_id", &self.access_key_id)
            .finish_non_exhaustive()
    }
}

impl S3Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    /// Reads `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and the optional `AWS_SESSION_TOKEN`.
    pub fn from_env() -> Option<Self> {
        let access_key_id = env::var("AWS_ACCESS_KEY_ID").ok()?;
        let secret_access_key = env::var("AWS_SECRET_ACCESS_KEY").ok()?;
        let credentials = Self::new(access_key_id, secret_access_key);
        match env::var("AWS_SESSION_TOKEN") {
            Ok(token) if !token.is_empty() => Some(credentials.with_session_token(token)),
            _ => Some(credentials),
        }
    }
}

///
/// A bucket of an S3-compatible object store, addressed over HTTP.
///
/// Reads are anonymous unless credentials are configured. Writes go through
/// query-string presigned URLs, so a contributor only ever needs the URL
/// handed out by the coordinator.
///
#[derive(Debug, Clone)]
pub struct S3 {
    client: Client,
    bucket: String,
    region: String,
    endpoint: Option<Url>,
    credentials: Option<S3Credentials>,
    presign_lifetime: Duration,
}

impl S3 {
    /// Loads the bucket of the environment.
    pub fn load(environment: &Environment) -> Result<Self, StorageError> {
        let bucket = environment
            .bucket()
            .ok_or_else(|| StorageError::Unsupported("no bucket is configured".to_string()))?;
        Self::new(environment, bucket)
    }

    pub fn new(environment: &Environment, bucket: &str) -> Result<Self, StorageError> {
        if bucket.is_empty() || bucket.contains('/') {
            return Err(StorageError::InvalidKey(bucket.to_string()));
        }
        let endpoint = environment
            .custom_endpoint()
            .map(|endpoint| {
                Url::parse(endpoint).map_err(|error| StorageError::Request {
                    url: endpoint.to_string(),
                    reason: error.to_string(),
                })
            })
            .transpose()?;
        let client = Client::builder()
            .timeout(environment.http_timeout())
            .build()
            .map_err(|error| StorageError::Request {
                url: bucket.to_string(),
                reason: error.to_string(),
            })?;

        Ok(Self {
            client,
            bucket: bucket.to_string(),
            region: environment.region().to_string(),
            endpoint,
            credentials: None,
            presign_lifetime: environment.presign_lifetime(),
        })
    }

    pub fn with_credentials(mut self, credentials: S3Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Returns the unsigned URL of `key`.
    ///
    /// A custom endpoint uses path-style addressing, otherwise the bucket is a virtual host.
    pub fn object_url(&self, key: &str) -> Result<Url, StorageError> {
        validate_key(key)?;
        match &self.endpoint {
            Some(endpoint) => {
                let mut url = endpoint.clone();
                url.set_query(None);
                url.path_segments_mut()
                    .map_err(|_| StorageError::InvalidKey(endpoint.to_string()))?
                    .pop_if_empty()
                    .push(&self.bucket)
                    .push(key);
                Ok(url)
            }
            None => {
                let url = format!("https://{}.s3.{}.amazonaws.com/{}", self.bucket, self.region, key);
                Url::parse(&url).map_err(|_| StorageError::InvalidKey(url))
            }
        }
    }

    /// Returns a URL that authorizes one `PUT` of `key` until the presign lifetime elapses.
    pub fn presign_put(&self, key: &str, now: OffsetDateTime) -> Result<String, StorageError> {
        let credentials = self.credentials()?;
        let url = self.object_url(key)?;
        let signed = presign("PUT", &url, credentials, &self.region, now, self.presign_lifetime)?;
        Ok(signed.into())
    }

    fn credentials(&self) -> Result<&S3Credentials, StorageError> {
        self.credentials.as_ref().ok_or_else(|| {
            StorageError::MissingCredentials("set AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY".to_string())
        })
    }
}

#[async_trait]
impl BlobStore for S3 {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let url = match &self.credentials {
            Some(credentials) => presign(
                "GET",
                &self.object_url(key)?,
                credentials,
                &self.region,
                OffsetDateTime::now_utc(),
                self.presign_lifetime,
            )?,
            None => self.object_url(key)?,
        };
        debug!("Downloading {} from bucket {}", key, self.bucket);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|error| request_error(&url, error))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(key.to_string()));
        }
        let body = response.bytes().await.map_err(|error| request_error(&url, error))?;
        if !status.is_success() {
            return Err(status_error(&url, status, &body));
        }
        info!("Downloaded {} ({} bytes)", key, body.len());
        Ok(body.to_vec())
    }

    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let url = self.presign_put(key, OffsetDateTime::now_utc())?;
        self.put_via_authorized_url(&url, bytes).await
    }

    async fn put_via_authorized_url(&self, url: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let parsed = Url::parse(url).map_err(|error| StorageError::Request {
            url: url.to_string(),
            reason: error.to_string(),
        })?;
        debug!("Uploading {} bytes to {}", bytes.len(), parsed.path());

        let response = self
            .client
            .put(parsed.clone())
            .header(CONTENT_TYPE, OCTET_STREAM)
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|error| request_error(&parsed, error))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            return Err(status_error(&parsed, status, &body));
        }
        info!("Uploaded {} bytes to {}", bytes.len(), parsed.path());
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        self.object_url(key)
            .map(String::from)
            .unwrap_or_else(|_| format!("{}/{}", self.bucket, key))
    }
}

/// Strips the signature from a URL before it is logged or reported.
fn redact(url: &Url) -> String {
    let mut redacted = url.clone();
    redacted.set_query(None);
    redacted.into()
}

fn request_error(url: &Url, error: reqwest::Error) -> StorageError {
    error!("Request to {} failed: {}", redact(url), error);
    StorageError::Request {
        url: redact(url),
        reason: error.to_string(),
    }
}

fn status_error(url: &Url, status: StatusCode, body: &[u8]) -> StorageError {
    error!("Request to {} returned {}", redact(url), status);
    StorageError::Status {
        url: redact(url),
        status: status.as_u16(),
        body: String::from_utf8_lossy(body).trim().to_string(),
    }
}

/// Everything but the unreserved characters is percent-encoded, as SigV4 requires.
const SIGV4_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

fn uri_encode(input: &str) -> String {
    utf8_percent_encode(input, SIGV4_ENCODE_SET).to_string()
}

fn hmac_sha256(key: &[u8], message: &[u8]) -> Result<Vec<u8>, StorageError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|error| StorageError::Unsupported(format!("invalid signing key: {}", error)))?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}

///
/// Signs `url` for `method` with AWS Signature Version 4 in the query string.
///
/// Only the `host` header is signed and the payload is left unsigned, so the
/// URL can be used by any HTTP client within `expires` of `timestamp`.
///
pub fn presign(
    method: &str,
    url: &Url,
    credentials: &S3Credentials,
    region: &str,
    timestamp: OffsetDateTime,
    expires: Duration,
) -> Result<Url, StorageError> {
    let timestamp = timestamp.to_offset(UtcOffset::UTC);
    let format_error = |error: time::error::Format| StorageError::Unsupported(format!("invalid signing date: {}", error));
    let amz_date = timestamp
        .format(format_description!("[year][month][day]T[hour][minute][second]Z"))
        .map_err(format_error)?;
    let date = timestamp
        .format(format_description!("[year][month][day]"))
        .map_err(format_error)?;

    let host = url
        .host_str()
        .ok_or_else(|| StorageError::InvalidKey(url.to_string()))?;
    let host = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };
    let scope = format!("{}/{}/{}/aws4_request", date, region, SERVICE);

    let mut query = vec![
        ("X-Amz-Algorithm", ALGORITHM.to_string()),
        ("X-Amz-Credential", format!("{}/{}", credentials.access_key_id, scope)),
        ("X-Amz-Date", amz_date.clone()),
        ("X-Amz-Expires", expires.as_secs().to_string()),
        ("X-Amz-SignedHeaders", "host".to_string()),
    ];
    if let Some(token) = &credentials.session_token {
        query.push(("X-Amz-Security-Token", token.clone()));
    }
    let mut query = query
        .into_iter()
        .map(|(name, value)| (uri_encode(name), uri_encode(&value)))
        .collect::<Vec<_>>();
    query.sort();
    let canonical_query = query
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("&");

    let canonical_request = format!(
        "{}\n{}\n{}\nhost:{}\n\nhost\n{}",
        method,
        url.path(),
        canonical_query,
        host,
        UNSIGNED_PAYLOAD
    );
    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        amz_date,
        scope,
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let secret = format!("AWS4{}", credentials.secret_access_key);
    let signing_key = hmac_sha256(secret.as_bytes(), date.as_bytes())?;
    let signing_key = hmac_sha256(&signing_key, region.as_bytes())?;
    let signing_key = hmac_sha256(&signing_key, SERVICE.as_bytes())?;
    let signing_key = hmac_sha256(&signing_key, b"aws4_request")?;
    let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes())?);

    let mut signed = url.clone();
    signed.set_query(Some(&format!("{}&X-Amz-Signature={}", canonical_query, signature)));
    Ok(signed)
}
