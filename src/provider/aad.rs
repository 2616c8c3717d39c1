//! Microsoft identity platform (Azure AD v2.0) client

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::IdentityProvider;
use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::payload::{DeviceFlow, TokenPayload};

// Requested alongside the caller's scopes so that a refresh token is issued
const RESERVED_SCOPES: &[&str] = &["offline_access", "openid", "profile"];
const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
const SLOW_DOWN_STEP: Duration = Duration::from_secs(5);

/// What to do after a device-flow poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PollStep {
    /// The flow resolved, successfully or not
    Done,
    /// Still pending; poll again after the given interval
    Wait(Duration),
}

pub(crate) fn next_poll_step(payload: &TokenPayload, interval: Duration) -> PollStep {
    match payload.error_code() {
        Some("authorization_pending") => PollStep::Wait(interval),
        Some("slow_down") => PollStep::Wait(interval + SLOW_DOWN_STEP),
        _ => PollStep::Done,
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

/// Callback that presents the authorization URL to the user
///
/// Replaces the system browser in the interactive flow.
pub type UrlOpener = Arc<dyn Fn(&str) -> AuthResult<()> + Send + Sync>;

/// Public-client OAuth 2.0 against `{authority}/oauth2/v2.0/*`
#[derive(Clone)]
pub struct AadClient {
    pub(super) config: AuthConfig,
    pub(super) url_opener: Option<UrlOpener>,
    http_client: reqwest::Client,
}

impl std::fmt::Debug for AadClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AadClient")
            .field("config", &self.config)
            .field("url_opener", &self.url_opener.as_ref().map(|_| "<callback>"))
            .field("http_client", &self.http_client)
            .finish()
    }
}

impl AadClient {
    /// Create a client for `config`
    ///
    /// # Errors
    ///
    /// Returns an error if the authority is invalid or the HTTP client cannot
    /// be built.
    pub fn new(config: AuthConfig) -> AuthResult<Self> {
        config.authority_url()?;
        let http_client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;
        Ok(Self {
            config,
            url_opener: None,
            http_client,
        })
    }

    /// Present the authorization URL through `opener` instead of the system
    /// browser
    #[must_use]
    pub fn with_url_opener<F>(mut self, opener: F) -> Self
    where
        F: Fn(&str) -> AuthResult<()> + Send + Sync + 'static,
    {
        self.url_opener = Some(Arc::new(opener));
        self
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Space separated `scope` parameter with the reserved OIDC scopes added
    pub(crate) fn scope_param(scopes: &[String]) -> String {
        let mut all: Vec<&str> = scopes.iter().map(String::as_str).collect();
        for reserved in RESERVED_SCOPES {
            if !all.contains(reserved) {
                all.push(reserved);
            }
        }
        all.join(" ")
    }

    /// POST a form to an endpoint and return the JSON object it answers with.
    /// Error statuses still carry a JSON body (`error`, `error_description`),
    /// so the status is only consulted when the body is not an object.
    async fn post_form(
        &self,
        endpoint: &str,
        form: &[(&str, &str)],
    ) -> AuthResult<Map<String, Value>> {
        let url = self.config.endpoint(endpoint)?;
        tracing::debug!(%url, "Calling identity provider");

        let response = self.http_client.post(url).form(form).send().await?;
        let status = response.status();
        let response_text = response.text().await?;

        match serde_json::from_str::<Value>(&response_text) {
            Ok(Value::Object(map)) => Ok(map),
            _ => Err(AuthError::invalid_response(format!(
                "HTTP {status} from {endpoint} endpoint: {response_text}"
            ))),
        }
    }

    /// Call the token endpoint
    pub(super) async fn redeem(&self, form: &[(&str, &str)]) -> AuthResult<TokenPayload> {
        let payload = TokenPayload::new(self.post_form("token", form).await?);
        if let Some(code) = payload.error_code() {
            tracing::debug!(error = code, "Token endpoint returned an error");
        }
        Ok(payload)
    }
}

#[async_trait]
impl IdentityProvider for AadClient {
    async fn initiate_device_flow(
        &self,
        client_id: &str,
        scopes: &[String],
    ) -> AuthResult<DeviceFlow> {
        let scope = Self::scope_param(scopes);
        let map = self
            .post_form("devicecode", &[("client_id", client_id), ("scope", &scope)])
            .await?;
        Ok(DeviceFlow::new(map).with_expiry_from(SystemTime::now()))
    }

    async fn acquire_token_by_device_flow(
        &self,
        client_id: &str,
        flow: &DeviceFlow,
    ) -> AuthResult<TokenPayload> {
        let device_code = flow
            .device_code()
            .ok_or_else(|| AuthError::invalid_response("device flow has no device_code"))?;
        let mut interval =
            Duration::from_secs(flow.interval().unwrap_or(DEFAULT_POLL_INTERVAL_SECS));

        loop {
            if flow.expires_at().is_some_and(|expires_at| unix_now() >= expires_at) {
                tracing::warn!("Device code expired before sign-in completed");
                return Ok(TokenPayload::error(
                    "expired_token",
                    "The device code expired before the user completed sign-in.",
                ));
            }

            let payload = self
                .redeem(&[
                    ("grant_type", DEVICE_CODE_GRANT),
                    ("client_id", client_id),
                    ("device_code", device_code),
                ])
                .await?;

            match next_poll_step(&payload, interval) {
                PollStep::Done => return Ok(payload),
                PollStep::Wait(next) => {
                    interval = next;
                    tracing::trace!(interval_secs = interval.as_secs(), "Sign-in pending");
                    tokio::time::sleep(interval).await;
                }
            }
        }
    }

    async fn acquire_token_interactive(
        &self,
        client_id: &str,
        scopes: &[String],
    ) -> AuthResult<TokenPayload> {
        self.run_interactive_flow(client_id, scopes).await
    }

    async fn acquire_token_by_refresh_token(
        &self,
        client_id: &str,
        refresh_token: &str,
        scopes: &[String],
    ) -> AuthResult<TokenPayload> {
        let scope = Self::scope_param(scopes);
        self.redeem(&[
            ("grant_type", "refresh_token"),
            ("client_id", client_id),
            ("refresh_token", refresh_token),
            ("scope", &scope),
        ])
        .await
    }
}
