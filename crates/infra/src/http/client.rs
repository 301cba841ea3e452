use std::time::Duration;

use ksef_domain::{KsefError, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response};
use tracing::debug;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const ERROR_BODY_LIMIT: usize = 500;

/// Thin JSON-over-HTTP transport with a bounded per-request timeout.
///
/// Retry policy deliberately lives in the callers: the handshake and the
/// fetcher have their own, very different recovery rules (poll loops,
/// re-authentication, quota backoff), so the transport stays dumb.
#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
}

impl HttpClient {
    /// Client with the standard 30 s timeout used by the auth endpoints.
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Client with an explicit timeout (the bulk query endpoint gets a
    /// longer one).
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .default_headers(json_headers())
            .build()
            .map_err(|err| KsefError::Internal(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { client })
    }

    /// Create a request builder using the underlying reqwest client.
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client.request(method, url)
    }

    /// Execute the request, mapping transport failures to `Network`.
    /// Non-success statuses are returned as-is for the caller to judge.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let request = builder
            .build()
            .map_err(|err| KsefError::Internal(format!("invalid request: {err}")))?;

        let method = request.method().clone();
        let url = request.url().clone();
        debug!(%method, %url, "sending HTTP request");

        let response = self
            .client
            .execute(request)
            .await
            .map_err(|err| KsefError::Network(format!("{method} {url}: {err}")))?;

        debug!(%method, %url, status = response.status().as_u16(), "received HTTP response");
        Ok(response)
    }
}

/// Content-type and accept headers shared by every KSeF call.
#[must_use]
pub fn json_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers
}

/// Decode a non-success response into [`KsefError::Http`], preferring the
/// JSON body and falling back to raw text truncated to 500 characters.
pub async fn status_error(response: Response) -> KsefError {
    let status = response.status().as_u16();
    let raw = response.text().await.unwrap_or_default();
    let body = match serde_json::from_str::<serde_json::Value>(&raw) {
        Ok(json) => json.to_string(),
        Err(_) => raw.chars().take(ERROR_BODY_LIMIT).collect(),
    };
    KsefError::Http { status, body }
}
