//! OAuth token lifecycle against the sheet API's authorization server.
//!
//! The manager holds no token state of its own — everything lives in the
//! injected key-value store, so any number of instances can share one
//! cache. Acquisition walks: cached access token → refresh exchange →
//! fresh authorization (human completes the consent screen out-of-band
//! while we poll the cache for the callback handler's write).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::{self, KvStore};
use crate::config::Config;
use crate::errors::AppError;

pub const ACCESS_TOKEN_KEY: &str = "google_access_token";
pub const REFRESH_TOKEN_KEY: &str = "google_refresh_token";
pub const CSRF_TOKEN_KEY: &str = "google_oauth_csrf";

const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
/// Five minutes comfortably covers a consent screen round-trip.
const CSRF_TTL: Duration = Duration::from_secs(300);
/// Defensive floor when the provider reports an already-past expiry.
const MIN_REFRESH_TTL_SECS: i64 = 3600;

/// Access token as cached, with its absolute expiry so readers can check
/// validity without trusting the cache's own TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedAccessToken {
    pub value: String,
    /// Epoch seconds.
    pub expires_at: i64,
}

impl CachedAccessToken {
    pub fn is_valid(&self) -> bool {
        self.expires_at > Utc::now().timestamp()
    }
}

/// Token endpoint response; refresh_token only appears on first-time
/// authorization with offline access.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

pub struct TokenManager {
    store: Arc<dyn KvStore>,
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    auth_url: Url,
    token_url: String,
    redirect_uri: String,
    poll_interval: Duration,
    poll_attempts: u32,
}

impl TokenManager {
    pub fn new(cfg: &Config, store: Arc<dyn KvStore>) -> Result<Self, AppError> {
        let (client_id, client_secret) = cfg
            .client_credentials()
            .map_err(|e| AppError::Configuration(e.to_string()))?;
        let auth_url = Url::parse(&cfg.oauth_auth_url)
            .map_err(|e| AppError::Configuration(format!("bad OAUTH_AUTH_URL: {}", e)))?;

        Ok(Self {
            store,
            http: reqwest::Client::new(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            auth_url,
            token_url: cfg.oauth_token_url.clone(),
            redirect_uri: cfg.oauth_redirect_uri.clone(),
            poll_interval: Duration::from_secs(3),
            poll_attempts: 5,
        })
    }

    /// Shrink the authorization poll for tests.
    pub fn with_poll(mut self, interval: Duration, attempts: u32) -> Self {
        self.poll_interval = interval;
        self.poll_attempts = attempts;
        self
    }

    /// Obtain a usable access token, refreshing or re-authorizing as
    /// needed. May suspend for up to `poll_interval * poll_attempts`
    /// while waiting for a human to complete the consent screen.
    pub async fn acquire_access_token(&self) -> Result<String, AppError> {
        if let Some(cached) =
            cache::get_json::<CachedAccessToken>(self.store.as_ref(), ACCESS_TOKEN_KEY).await?
        {
            if cached.is_valid() {
                return Ok(cached.value);
            }
            tracing::debug!("cached access token expired, evicting");
            self.store.delete(ACCESS_TOKEN_KEY).await?;
        }

        if let Some(refresh_token) = self.store.get(REFRESH_TOKEN_KEY).await? {
            return self.refresh_access_token(&refresh_token).await;
        }

        // No usable credentials at all: open a fresh authorization request
        // and wait for the callback handler to deposit a token.
        let auth_url = self.start_authorization().await?;
        tracing::warn!(%auth_url, "no refresh token; user authorization required");

        for attempt in 1..=self.poll_attempts {
            tokio::time::sleep(self.poll_interval).await;
            if let Some(cached) =
                cache::get_json::<CachedAccessToken>(self.store.as_ref(), ACCESS_TOKEN_KEY).await?
            {
                if cached.is_valid() {
                    tracing::info!(attempt, "authorization completed while polling");
                    return Ok(cached.value);
                }
            }
        }

        Err(AppError::AuthorizationTimeout { auth_url })
    }

    /// Exchange a refresh token for a new access token and cache it with
    /// a TTL equal to its remaining lifetime (floor one hour if the
    /// provider reports an expiry already in the past).
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<String, AppError> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let resp = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::Authentication(format!("refresh request failed: {}", e)))?;

        let status = resp.status();
        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| AppError::MalformedProvider(e.to_string()))?;

        if !status.is_success() {
            let detail = body
                .error_description
                .or(body.error)
                .unwrap_or_else(|| status.to_string());
            return Err(AppError::Authentication(format!(
                "refresh token exchange rejected: {}",
                detail
            )));
        }

        let access_token = body
            .access_token
            .ok_or_else(|| AppError::MalformedProvider("access_token missing".into()))?;
        let expires_in = body
            .expires_in
            .ok_or_else(|| AppError::MalformedProvider("expires_in missing".into()))?;

        let ttl_secs = if expires_in > 0 {
            expires_in
        } else {
            MIN_REFRESH_TTL_SECS
        };
        self.cache_access_token(&access_token, ttl_secs).await?;
        tracing::info!(ttl_secs, "access token refreshed");

        Ok(access_token)
    }

    /// Generate and cache the anti-forgery nonce, returning the consent
    /// URL a human must visit. Does not itself obtain a token.
    pub async fn start_authorization(&self) -> Result<String, AppError> {
        let state = anti_forgery_token();
        self.store
            .put(CSRF_TOKEN_KEY, &state, Some(CSRF_TTL))
            .await?;
        Ok(self.authorization_url(&state))
    }

    pub fn authorization_url(&self, state: &str) -> String {
        let mut url = self.auth_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", SHEETS_SCOPE)
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent")
            .append_pair("state", state);
        url.to_string()
    }

    /// Complete the authorization-code exchange from the callback route.
    ///
    /// Fails closed: a missing or mismatching `state` caches nothing.
    /// The nonce is single-use and removed after a successful exchange.
    pub async fn complete_authorization(&self, code: &str, state: &str) -> Result<(), AppError> {
        let expected = self
            .store
            .get(CSRF_TOKEN_KEY)
            .await?
            .ok_or_else(|| AppError::Provider("no pending authorization request".into()))?;
        if expected != state {
            tracing::warn!("callback state does not match cached anti-forgery token");
            return Err(AppError::CsrfMismatch);
        }

        let params = [
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let resp = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::Authentication(format!("code exchange failed: {}", e)))?;

        let status = resp.status();
        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| AppError::MalformedProvider(e.to_string()))?;

        if !status.is_success() {
            let detail = body
                .error_description
                .or(body.error)
                .unwrap_or_else(|| status.to_string());
            return Err(AppError::Provider(detail));
        }

        let access_token = body
            .access_token
            .ok_or_else(|| AppError::MalformedProvider("access_token missing".into()))?;
        let expires_in = body
            .expires_in
            .ok_or_else(|| AppError::MalformedProvider("expires_in missing".into()))?;

        self.cache_access_token(&access_token, expires_in.max(1))
            .await?;

        // Refresh tokens are long-lived: retained until superseded, so no
        // TTL — they must survive access-token eviction.
        if let Some(refresh_token) = body.refresh_token {
            self.store.put(REFRESH_TOKEN_KEY, &refresh_token, None).await?;
            tracing::info!("refresh token stored");
        }

        self.store.delete(CSRF_TOKEN_KEY).await?;
        tracing::info!("authorization completed, access token cached");
        Ok(())
    }

    async fn cache_access_token(&self, value: &str, ttl_secs: i64) -> Result<(), AppError> {
        let token = CachedAccessToken {
            value: value.to_string(),
            expires_at: Utc::now().timestamp() + ttl_secs,
        };
        cache::put_json(
            self.store.as_ref(),
            ACCESS_TOKEN_KEY,
            &token,
            Some(Duration::from_secs(ttl_secs as u64)),
        )
        .await?;
        Ok(())
    }
}

/// 32 random bytes, hex-encoded.
fn anti_forgery_token() -> String {
    let mut buf = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}
