//! Login flows producing an [`AuthenticationSession`]

use std::fmt;
use std::sync::Arc;

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::payload::TokenPayload;
use crate::provider::{AadClient, IdentityProvider};
use crate::session::AuthenticationSession;

const LOGGED_IN_MESSAGE: &str =
    "You have logged in.\nInteractive authentication successfully completed.";

/// Runs login flows for one client id and scope set
///
/// # Example
///
/// ```no_run
/// use powerbi_auth::{AuthConfig, Authenticator};
///
/// # async fn example() -> powerbi_auth::AuthResult<()> {
/// let authenticator = Authenticator::new(&AuthConfig::default())?;
/// let session = authenticator.device_code_login().await?;
/// println!("{}", session.authorization_header());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Authenticator {
    client_id: String,
    scopes: Vec<String>,
    provider: Arc<dyn IdentityProvider>,
}

impl Authenticator {
    /// Authenticator backed by the Microsoft identity platform
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: &AuthConfig) -> AuthResult<Self> {
        let provider = AadClient::new(config.clone())?;
        Ok(Self::with_provider(config, Arc::new(provider)))
    }

    /// Authenticator backed by a custom identity provider
    #[must_use]
    pub fn with_provider(config: &AuthConfig, provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            client_id: config.resolved_client_id(),
            scopes: config.resolved_scopes(),
            provider,
        }
    }

    /// Client id used for every flow
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Scopes requested by every flow
    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Wrap a token payload acquired elsewhere
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Authentication` if the payload has no access token.
    pub fn session_from_payload(&self, payload: TokenPayload) -> AuthResult<AuthenticationSession> {
        AuthenticationSession::new(
            self.client_id.clone(),
            self.scopes.clone(),
            payload,
            Arc::clone(&self.provider),
        )
    }

    /// Sign in with the device-code flow
    ///
    /// Prints the provider's instructions, then waits until the user has
    /// entered the code on another device or the code expires.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::FlowInitiation` if the provider did not hand out a
    /// user code, and `AuthError::Authentication` if the flow ended without
    /// an access token.
    pub async fn device_code_login(&self) -> AuthResult<AuthenticationSession> {
        let flow = self
            .provider
            .initiate_device_flow(&self.client_id, &self.scopes)
            .await?;

        let Some(user_code) = flow.user_code() else {
            return Err(AuthError::flow_initiation(flow.to_pretty_json()));
        };

        let message = flow.message().map(str::to_string).unwrap_or_else(|| {
            format!(
                "To sign in, use a web browser to open the page {} and enter the code {user_code} to authenticate.",
                flow.verification_uri().unwrap_or("https://microsoft.com/devicelogin")
            )
        });
        println!(
            "Performing interactive authentication. Please follow the instructions on the terminal.\n {message}"
        );
        tracing::info!(client_id = %self.client_id, "Waiting for device code sign-in");

        let payload = self
            .provider
            .acquire_token_by_device_flow(&self.client_id, &flow)
            .await?;
        self.finish(payload)
    }

    /// Sign in through a local browser window
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Authentication` if sign-in ended without an access
    /// token, and `AuthError::Timeout` if the browser never redirected back.
    pub async fn interactive_login(&self) -> AuthResult<AuthenticationSession> {
        println!("A local browser window will be open for interactive sign in.");
        tracing::info!(client_id = %self.client_id, "Starting interactive sign-in");

        let payload = self
            .provider
            .acquire_token_interactive(&self.client_id, &self.scopes)
            .await?;
        self.finish(payload)
    }

    fn finish(&self, payload: TokenPayload) -> AuthResult<AuthenticationSession> {
        let session = self.session_from_payload(payload)?;
        println!("{LOGGED_IN_MESSAGE}");
        Ok(session)
    }
}

impl fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authenticator")
            .field("client_id", &self.client_id)
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}

/// Sign in with the device-code flow using `config`
///
/// # Errors
///
/// See [`Authenticator::device_code_login`].
pub async fn device_code_login(config: &AuthConfig) -> AuthResult<AuthenticationSession> {
    Authenticator::new(config)?.device_code_login().await
}

/// Sign in through a local browser using `config`
///
/// # Errors
///
/// See [`Authenticator::interactive_login`].
pub async fn interactive_login(config: &AuthConfig) -> AuthResult<AuthenticationSession> {
    Authenticator::new(config)?.interactive_login().await
}

/// Wrap a pre-acquired token payload, refreshable through the Microsoft
/// identity platform
///
/// # Errors
///
/// See [`Authenticator::session_from_payload`].
pub fn session_from_payload(
    config: &AuthConfig,
    payload: TokenPayload,
) -> AuthResult<AuthenticationSession> {
    Authenticator::new(config)?.session_from_payload(payload)
}
