//! Token and device-flow payloads returned by the identity provider
//!
//! Both types wrap the raw JSON object the provider answered with. The crate
//! only looks up the handful of keys it needs; everything else is carried
//! through untouched so callers see exactly what the provider sent.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::{AuthError, AuthResult};

/// Key the session invariant hinges on
pub const ACCESS_TOKEN_KEY: &str = "access_token";

fn str_field<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key).and_then(Value::as_str)
}

/// Numeric field that some endpoints send as a string
fn u64_field(map: &Map<String, Value>, key: &str) -> Option<u64> {
    match map.get(key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn object_from_value(value: Value) -> AuthResult<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(AuthError::invalid_response(format!(
            "expected a JSON object, got: {other}"
        ))),
    }
}

/// Token result mapping (`access_token`, `refresh_token`, `expires_in`, ...)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenPayload(Map<String, Value>);

impl TokenPayload {
    /// Wrap a raw JSON object
    #[must_use]
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Build from an arbitrary JSON value, which must be an object
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidResponse` if `value` is not an object.
    pub fn from_value(value: Value) -> AuthResult<Self> {
        object_from_value(value).map(Self)
    }

    /// Parse a JSON object from text
    ///
    /// # Errors
    ///
    /// Returns an error if `text` is not valid JSON or not an object.
    pub fn from_json(text: &str) -> AuthResult<Self> {
        Self::from_value(serde_json::from_str(text)?)
    }

    /// Payload describing a failure, shaped like a provider error response
    #[must_use]
    pub fn error(error: &str, description: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert("error".to_string(), Value::from(error));
        map.insert(
            "error_description".to_string(),
            Value::String(description.into()),
        );
        Self(map)
    }

    /// Access token, if present
    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        str_field(&self.0, ACCESS_TOKEN_KEY)
    }

    /// Whether the payload carries an access token
    #[must_use]
    pub fn has_access_token(&self) -> bool {
        self.0.contains_key(ACCESS_TOKEN_KEY)
    }

    /// Refresh token, if present
    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        str_field(&self.0, "refresh_token")
    }

    /// Token type, usually `Bearer`
    #[must_use]
    pub fn token_type(&self) -> Option<&str> {
        str_field(&self.0, "token_type")
    }

    /// Provider error code (`invalid_grant`, `authorization_pending`, ...)
    #[must_use]
    pub fn error_code(&self) -> Option<&str> {
        str_field(&self.0, "error")
    }

    /// Human readable error description
    #[must_use]
    pub fn error_description(&self) -> Option<&str> {
        str_field(&self.0, "error_description")
    }

    /// Lifetime of the access token in seconds
    #[must_use]
    pub fn expires_in(&self) -> Option<u64> {
        u64_field(&self.0, "expires_in")
    }

    /// Raw lookup
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Borrow the underlying map
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Unwrap into the underlying map
    #[must_use]
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }

    /// Message to surface when this payload has no access token
    #[must_use]
    pub fn failure_message(&self) -> String {
        self.error_description()
            .or_else(|| self.error_code())
            .unwrap_or("identity provider returned no access token")
            .to_string()
    }
}

impl From<Map<String, Value>> for TokenPayload {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Device-code flow state returned when the flow is initiated
///
/// Holds `device_code`, `user_code`, `verification_uri`, `message`,
/// `interval` and `expires_in` as sent by the provider, plus an `expires_at`
/// key (unix seconds) added at initiation time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceFlow(Map<String, Value>);

impl DeviceFlow {
    /// Wrap a raw flow-start mapping
    #[must_use]
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Build from an arbitrary JSON value, which must be an object
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidResponse` if `value` is not an object.
    pub fn from_value(value: Value) -> AuthResult<Self> {
        object_from_value(value).map(Self)
    }

    /// Stamp `expires_at` from `expires_in` relative to `now`
    #[must_use]
    pub fn with_expiry_from(mut self, now: SystemTime) -> Self {
        if let Some(expires_in) = u64_field(&self.0, "expires_in") {
            let now = now
                .duration_since(UNIX_EPOCH)
                .unwrap_or(Duration::ZERO)
                .as_secs();
            self.0.insert(
                "expires_at".to_string(),
                Value::from(now.saturating_add(expires_in)),
            );
        }
        self
    }

    /// Code the user types at the verification page
    #[must_use]
    pub fn user_code(&self) -> Option<&str> {
        str_field(&self.0, "user_code")
    }

    /// Code the client polls with
    #[must_use]
    pub fn device_code(&self) -> Option<&str> {
        str_field(&self.0, "device_code")
    }

    /// Instructions to show the user
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        str_field(&self.0, "message")
    }

    /// Page where the user enters the code
    #[must_use]
    pub fn verification_uri(&self) -> Option<&str> {
        str_field(&self.0, "verification_uri")
    }

    /// Polling interval in seconds
    #[must_use]
    pub fn interval(&self) -> Option<u64> {
        u64_field(&self.0, "interval")
    }

    /// Unix time after which the device code is no longer valid
    #[must_use]
    pub fn expires_at(&self) -> Option<u64> {
        u64_field(&self.0, "expires_at")
    }

    /// Borrow the underlying map
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Pretty-printed JSON, used in flow initiation errors
    #[must_use]
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(&self.0).unwrap_or_else(|_| format!("{:?}", self.0))
    }
}

impl From<Map<String, Value>> for DeviceFlow {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
