//! The KSeF token handshake.
//!
//! Exchanges the long-lived KSeF token for a short-lived access/refresh
//! pair through six ordered steps: key discovery, challenge, credential
//! encryption, submission, confirmation polling, redemption. Each step
//! fails fast with its own error kind so a broken run names the step.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ksef_core::extract::{first_millis, first_string, resolve_token};
use ksef_core::time::Clock;
use ksef_domain::{
    AppConfig, Challenge, KsefError, PendingAuth, Result, SessionTokens,
};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::crypto;
use crate::http::{json_headers, status_error, HttpClient};

const POLL_MAX_ATTEMPTS: u32 = 15;
const POLL_INTERVAL: Duration = Duration::from_millis(1500);

/// Candidate fields for the DER blob in a certificate entry, in priority
/// order. The order is a contract; see `ksef_core::extract`.
const CERT_FIELDS: &[&str] = &["certificate", "value", "publicKey"];
/// Candidate fields for the challenge identifier.
const CHALLENGE_FIELDS: &[&str] = &["challenge", "referenceNumber", "challengeKey"];
/// Candidate fields for the challenge timestamp (milliseconds).
const TIMESTAMP_FIELDS: &[&str] = &["timestampMs", "timestamp"];

/// Owns the identity-proving handshake and the resulting session tokens.
///
/// Externally the session is either unauthenticated (`tokens` empty) or
/// authenticated; only `authenticate` and `refresh` mutate the credential,
/// and at most one handshake is in flight per instance (`&mut self`).
pub struct AuthSession {
    nip: String,
    token: String,
    base_url: String,
    http: HttpClient,
    clock: Arc<dyn Clock>,
    tokens: Option<SessionTokens>,
}

impl AuthSession {
    /// Session for an explicit base URL (tests point this at a mock server).
    pub fn new(
        nip: impl Into<String>,
        token: impl Into<String>,
        base_url: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        Ok(Self {
            nip: nip.into(),
            token: token.into(),
            base_url: base_url.into(),
            http: HttpClient::new()?,
            clock,
            tokens: None,
        })
    }

    /// Production wiring from the loaded configuration.
    pub fn from_config(config: &AppConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        Self::new(
            config.nip.clone(),
            config.token.clone(),
            config.environment.base_url(),
            clock,
        )
    }

    /// Run the full handshake and return the access token.
    ///
    /// On success the session holds the new token pair; on any error the
    /// previous state (if any) is left untouched.
    pub async fn authenticate(&mut self) -> Result<String> {
        info!("step 1/6: fetching public key material");
        let der = self.fetch_public_key().await?;

        info!("step 2/6: requesting challenge");
        let challenge = self.fetch_challenge().await?;
        debug!(challenge = %challenge.id, timestamp_ms = challenge.timestamp_ms, "challenge received");

        info!("step 3/6: encrypting KSeF token (RSA-OAEP SHA-256)");
        let key = crypto::load_public_key(&der)?;
        let encrypted = crypto::encrypt_credential(&key, &self.token, challenge.timestamp_ms)?;

        info!("step 4/6: submitting encrypted token");
        let pending = self.submit_token(&challenge, &encrypted).await?;

        info!("step 5/6: waiting for confirmation");
        self.wait_for_confirmation(&pending).await?;

        info!("step 6/6: redeeming session tokens");
        let tokens = self.redeem(&pending).await?;
        let access = tokens.access_token.clone();
        self.tokens = Some(tokens);
        info!("authentication complete");
        Ok(access)
    }

    /// Rotate the access token using the held refresh token. Requires a
    /// prior successful `authenticate`.
    pub async fn refresh(&mut self) -> Result<String> {
        let refresh_token = self
            .tokens
            .as_ref()
            .and_then(|t| t.refresh_token.clone())
            .ok_or(KsefError::NotAuthenticated)?;

        let url = format!("{}/auth/token/refresh", self.base_url);
        let request =
            self.http.request(Method::POST, &url).json(&json!({ "refreshToken": refresh_token }));
        let response = self.http.send(request).await?;
        if !response.status().is_success() {
            return Err(KsefError::Refresh(status_error(response).await.to_string()));
        }
        let data: Value = response
            .json()
            .await
            .map_err(|err| KsefError::Refresh(format!("malformed response: {err}")))?;

        let access_token = data
            .get("accessToken")
            .and_then(resolve_token)
            .or_else(|| data.get("token").and_then(resolve_token))
            .ok_or_else(|| KsefError::Refresh("no access token in response".to_string()))?;
        // Keep the old refresh token when the server does not rotate it.
        let refresh_token =
            data.get("refreshToken").and_then(resolve_token).or(Some(refresh_token));

        self.tokens = Some(SessionTokens { access_token: access_token.clone(), refresh_token });
        info!("access token refreshed");
        Ok(access_token)
    }

    /// Bearer header set for the bulk query endpoint, reflecting the
    /// latest token after any `refresh` or re-authentication.
    pub fn auth_headers(&self) -> Result<HeaderMap> {
        let tokens = self.tokens.as_ref().ok_or(KsefError::NotAuthenticated)?;
        let mut headers = json_headers();
        headers.insert(AUTHORIZATION, bearer(&tokens.access_token)?);
        Ok(headers)
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.tokens.is_some()
    }

    async fn fetch_public_key(&self) -> Result<Vec<u8>> {
        let url = format!("{}/security/public-key-certificates", self.base_url);
        let response = self.http.send(self.http.request(Method::GET, &url)).await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        let data: Value = response
            .json()
            .await
            .map_err(|err| KsefError::KeyFetch(format!("malformed response: {err}")))?;

        // The endpoint has served both a bare list and {"certificates": [...]}.
        let empty = Vec::new();
        let certificates = match &data {
            Value::Array(list) => list,
            other => other.get("certificates").and_then(Value::as_array).unwrap_or(&empty),
        };
        let first = certificates
            .first()
            .ok_or_else(|| KsefError::KeyFetch("no certificates in response".to_string()))?;

        let der_b64 = first_string(first, CERT_FIELDS).ok_or_else(|| {
            KsefError::KeyFetch(format!("no certificate data among fields {CERT_FIELDS:?}"))
        })?;
        BASE64
            .decode(der_b64.as_bytes())
            .map_err(|err| KsefError::KeyFetch(format!("certificate is not valid base64: {err}")))
    }

    async fn fetch_challenge(&self) -> Result<Challenge> {
        let url = format!("{}/auth/challenge", self.base_url);
        let response =
            self.http.send(self.http.request(Method::POST, &url).json(&json!({}))).await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        let data: Value = response
            .json()
            .await
            .map_err(|err| KsefError::Challenge(format!("malformed response: {err}")))?;

        let id = first_string(&data, CHALLENGE_FIELDS).ok_or_else(|| {
            KsefError::Challenge(format!("no challenge id among fields {CHALLENGE_FIELDS:?}"))
        })?;
        let timestamp_ms =
            first_millis(&data, TIMESTAMP_FIELDS).unwrap_or_else(|| self.clock.now_millis());
        Ok(Challenge { id, timestamp_ms })
    }

    async fn submit_token(&self, challenge: &Challenge, encrypted: &str) -> Result<PendingAuth> {
        let url = format!("{}/auth/ksef-token", self.base_url);
        let body = json!({
            "challenge": challenge.id,
            "contextIdentifier": { "type": "Nip", "value": self.nip },
            "encryptedToken": encrypted,
        });
        let response = self.http.send(self.http.request(Method::POST, &url).json(&body)).await?;
        if !response.status().is_success() {
            return Err(KsefError::Submit(status_error(response).await.to_string()));
        }
        let data: Value = response
            .json()
            .await
            .map_err(|err| KsefError::Submit(format!("malformed response: {err}")))?;

        let reference_number = first_string(&data, &["referenceNumber", "challenge"])
            .unwrap_or_else(|| challenge.id.clone());
        let auth_token = data
            .get("authenticationToken")
            .and_then(resolve_token)
            .or_else(|| data.get("token").and_then(resolve_token))
            .ok_or_else(|| KsefError::Submit("no authentication token in response".to_string()))?;
        Ok(PendingAuth { reference_number, auth_token })
    }

    /// Poll the status endpoint until the handshake is confirmed.
    ///
    /// HTTP 200 with embedded `status.code == 200` confirms; an embedded
    /// code >= 400 is a final rejection; everything else (HTTP 202
    /// included, and any embedded code strictly between 200 and 400) means
    /// keep polling.
    async fn wait_for_confirmation(&self, pending: &PendingAuth) -> Result<()> {
        let url = format!("{}/auth/{}", self.base_url, pending.reference_number);
        for attempt in 1..=POLL_MAX_ATTEMPTS {
            let request = self
                .http
                .request(Method::GET, &url)
                .header(AUTHORIZATION, bearer(&pending.auth_token)?);
            let response = self.http.send(request).await?;
            let http_status = response.status();

            if http_status == StatusCode::OK {
                let data: Value = response.json().await.unwrap_or(Value::Null);
                let status = data.get("status").cloned().unwrap_or(Value::Null);
                let code = status.get("code").and_then(Value::as_i64).unwrap_or(0);

                if code == 200 {
                    info!(attempt, "authentication confirmed");
                    return Ok(());
                }
                if code >= 400 {
                    let description = status
                        .get("description")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    let details = status
                        .get("details")
                        .and_then(Value::as_array)
                        .map(|items| {
                            items
                                .iter()
                                .map(|d| match d.as_str() {
                                    Some(s) => s.to_string(),
                                    None => d.to_string(),
                                })
                                .collect()
                        })
                        .unwrap_or_default();
                    return Err(KsefError::Rejected { code, description, details });
                }
                debug!(attempt, code, "authentication in progress");
            } else {
                debug!(attempt, status = http_status.as_u16(), "authentication pending");
            }

            self.clock.sleep(POLL_INTERVAL).await;
        }
        warn!(attempts = POLL_MAX_ATTEMPTS, "confirmation polling exhausted");
        Err(KsefError::Timeout)
    }

    async fn redeem(&self, pending: &PendingAuth) -> Result<SessionTokens> {
        let url = format!("{}/auth/token/redeem", self.base_url);
        let request = self
            .http
            .request(Method::POST, &url)
            .header(AUTHORIZATION, bearer(&pending.auth_token)?)
            .json(&json!({}));
        let response = self.http.send(request).await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        let data: Value = response
            .json()
            .await
            .map_err(|err| KsefError::Redeem(format!("malformed response: {err}")))?;

        let access_token = data
            .get("accessToken")
            .and_then(resolve_token)
            .or_else(|| data.get("token").and_then(resolve_token))
            .ok_or_else(|| KsefError::Redeem("no access token in response".to_string()))?;
        let refresh_token = data.get("refreshToken").and_then(resolve_token);
        Ok(SessionTokens { access_token, refresh_token })
    }
}

fn bearer(token: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|err| KsefError::Internal(format!("token is not a valid header value: {err}")))
}
