//! Authenticated session holding the token payload

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::error::{AuthError, AuthResult};
use crate::payload::TokenPayload;
use crate::provider::IdentityProvider;

// Treat the token as expired this long before the provider says it is
const EXPIRY_SKEW: Duration = Duration::from_secs(60);

/// Result of a successful login
///
/// Owns the token payload exclusively. The payload always contains
/// `access_token`; [`refresh`](Self::refresh) replaces it wholesale and only
/// after the new payload passes the same check.
pub struct AuthenticationSession {
    client_id: String,
    scopes: Vec<String>,
    payload: TokenPayload,
    acquired_at: SystemTime,
    provider: Arc<dyn IdentityProvider>,
}

impl AuthenticationSession {
    /// Wrap `payload`, rejecting it if it has no access token
    pub(crate) fn new(
        client_id: String,
        scopes: Vec<String>,
        payload: TokenPayload,
        provider: Arc<dyn IdentityProvider>,
    ) -> AuthResult<Self> {
        if !payload.has_access_token() {
            return Err(AuthError::authentication(payload.failure_message()));
        }
        Ok(Self {
            client_id,
            scopes,
            payload,
            acquired_at: SystemTime::now(),
            provider,
        })
    }

    /// The access token
    #[must_use]
    pub fn access_token(&self) -> &str {
        self.payload.access_token().unwrap_or_default()
    }

    /// The full token payload as returned by the identity provider
    #[must_use]
    pub fn access_token_details(&self) -> &TokenPayload {
        &self.payload
    }

    /// Client id the token was issued to
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Scopes requested for the token
    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// `Authorization` header value for the reporting API
    #[must_use]
    pub fn authorization_header(&self) -> String {
        let token_type = self.payload.token_type().unwrap_or("Bearer");
        format!("{token_type} {}", self.access_token())
    }

    /// When the access token expires, if the payload says
    ///
    /// A lifetime too large to represent is treated as unknown.
    #[must_use]
    pub fn expires_at(&self) -> Option<SystemTime> {
        self.payload
            .expires_in()
            .and_then(|secs| self.acquired_at.checked_add(Duration::from_secs(secs)))
    }

    /// Check if the token is expired (with 60 second buffer)
    #[must_use]
    pub fn is_expired(&self) -> bool {
        match self.expires_at() {
            Some(expires_at) => SystemTime::now() + EXPIRY_SKEW >= expires_at,
            None => false,
        }
    }

    /// Get remaining validity duration, if known
    #[must_use]
    pub fn remaining_validity(&self) -> Option<Duration> {
        self.expires_at()
            .and_then(|expires_at| expires_at.duration_since(SystemTime::now()).ok())
    }

    /// Acquire a new token set with the stored refresh token and scopes
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Authentication` with the provider's
    /// `error_description` if the response has no access token, or if the
    /// current payload has no refresh token. The current payload is kept in
    /// both cases.
    pub async fn refresh(&mut self) -> AuthResult<()> {
        let refresh_token = self.payload.refresh_token().ok_or_else(|| {
            AuthError::authentication("token payload has no refresh_token to refresh with")
        })?;

        tracing::debug!(client_id = %self.client_id, "Refreshing access token");
        let payload = self
            .provider
            .acquire_token_by_refresh_token(&self.client_id, refresh_token, &self.scopes)
            .await?;

        if !payload.has_access_token() {
            let message = payload.failure_message();
            tracing::warn!("Token refresh failed: {message}");
            return Err(AuthError::authentication(message));
        }

        self.payload = payload;
        self.acquired_at = SystemTime::now();
        Ok(())
    }
}

impl fmt::Debug for AuthenticationSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticationSession")
            .field("client_id", &self.client_id)
            .field("scopes", &self.scopes)
            .field("access_token", &"<redacted>")
            .field("acquired_at", &self.acquired_at)
            .finish_non_exhaustive()
    }
}
