//! Authentication configuration

use std::time::Duration;
use typed_builder::TypedBuilder;
use url::Url;

use crate::error::{AuthError, AuthResult};

/// Client id of the "Microsoft Azure Cross-platform Command Line Interface"
/// app, a well-known public client registered for all Azure services
pub const DEFAULT_CLIENT_ID: &str = "04b07795-8ddb-461a-bbee-02f9e1bf7b46";

/// Work and school accounts of any tenant
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com/organizations";

/// Power BI default permissions
pub const DEFAULT_SCOPES: &[&str] = &["https://analysis.windows.net/powerbi/api/.default"];

/// Power BI permissions needed to create reports
pub const CREATE_REPORT_SCOPES: &[&str] = &[
    "https://analysis.windows.net/powerbi/api/Dataset.ReadWrite.All",
    "https://analysis.windows.net/powerbi/api/Content.Create",
    "https://analysis.windows.net/powerbi/api/Workspace.ReadWrite.All",
];

/// Environment variable overriding the client id
pub const ENV_CLIENT_ID: &str = "POWERBI_CLIENT_ID";
/// Environment variable overriding the authority
pub const ENV_AUTHORITY: &str = "POWERBI_AUTHORITY";
/// Environment variable overriding the scopes (space separated)
pub const ENV_SCOPES: &str = "POWERBI_SCOPES";

const DEFAULT_INTERACTIVE_TIMEOUT: Duration = Duration::from_secs(300);
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

fn to_owned_scopes(scopes: &[&str]) -> Vec<String> {
    scopes.iter().map(|s| (*s).to_string()).collect()
}

/// Configuration for the identity provider and the login flows
///
/// # Example
///
/// ```
/// use powerbi_auth::AuthConfig;
/// use std::time::Duration;
///
/// let config = AuthConfig::builder()
///     .authority("https://login.microsoftonline.com/contoso.onmicrosoft.com")
///     .interactive_timeout(Duration::from_secs(120))
///     .build();
/// assert_eq!(config.resolved_scopes().len(), 1);
/// ```
#[derive(Debug, Clone, TypedBuilder)]
pub struct AuthConfig {
    /// Application (client) id registered with Azure AD. Empty means default.
    #[builder(default = DEFAULT_CLIENT_ID.to_string(), setter(into))]
    pub client_id: String,

    /// Authority URL, `https://login.microsoftonline.com/<tenant>`
    #[builder(default = DEFAULT_AUTHORITY.to_string(), setter(into))]
    pub authority: String,

    /// Scopes to request. Empty means [`DEFAULT_SCOPES`].
    #[builder(default = to_owned_scopes(DEFAULT_SCOPES))]
    pub scopes: Vec<String>,

    /// How long the interactive flow waits for the browser redirect
    #[builder(default = DEFAULT_INTERACTIVE_TIMEOUT)]
    pub interactive_timeout: Duration,

    /// Per-request HTTP timeout
    #[builder(default = DEFAULT_HTTP_TIMEOUT)]
    pub http_timeout: Duration,

    /// Launch the system browser for the interactive flow (default: true)
    #[builder(default = true)]
    pub open_browser: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl AuthConfig {
    /// Configuration requesting [`CREATE_REPORT_SCOPES`]
    #[must_use]
    pub fn for_report_creation() -> Self {
        Self::builder()
            .scopes(to_owned_scopes(CREATE_REPORT_SCOPES))
            .build()
    }

    /// Defaults overridden by `POWERBI_CLIENT_ID`, `POWERBI_AUTHORITY` and
    /// `POWERBI_SCOPES` where set
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(client_id) = lookup(ENV_CLIENT_ID) {
            config.client_id = client_id;
        }
        if let Some(authority) = lookup(ENV_AUTHORITY) {
            config.authority = authority;
        }
        if let Some(scopes) = lookup(ENV_SCOPES) {
            config.scopes = scopes.split_whitespace().map(str::to_string).collect();
        }
        config
    }

    /// Client id with the default applied when unset
    #[must_use]
    pub fn resolved_client_id(&self) -> String {
        let trimmed = self.client_id.trim();
        if trimmed.is_empty() {
            DEFAULT_CLIENT_ID.to_string()
        } else {
            trimmed.to_string()
        }
    }

    /// Scopes with the default applied when unset
    #[must_use]
    pub fn resolved_scopes(&self) -> Vec<String> {
        let scopes: Vec<String> = self
            .scopes
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if scopes.is_empty() {
            to_owned_scopes(DEFAULT_SCOPES)
        } else {
            scopes
        }
    }

    /// Parsed authority URL
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidConfig` if the authority is not an absolute
    /// http(s) URL.
    pub fn authority_url(&self) -> AuthResult<Url> {
        let url = Url::parse(self.authority.trim_end_matches('/')).map_err(|e| {
            AuthError::invalid_config(format!("invalid authority '{}': {e}", self.authority))
        })?;
        match url.scheme() {
            "https" | "http" => Ok(url),
            other => Err(AuthError::invalid_config(format!(
                "authority must use https, got scheme '{other}'"
            ))),
        }
    }

    /// URL of an OAuth 2.0 v2 endpoint under the authority
    /// (`devicecode`, `token`, `authorize`)
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidConfig` if the authority is invalid.
    pub fn endpoint(&self, name: &str) -> AuthResult<Url> {
        let base = self.authority_url()?;
        let joined = format!("{}/oauth2/v2.0/{name}", base.as_str().trim_end_matches('/'));
        Url::parse(&joined)
            .map_err(|e| AuthError::invalid_config(format!("invalid endpoint '{joined}': {e}")))
    }
}
