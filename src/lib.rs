//! # Power BI authentication for Rust
//!
//! Signs a user in to Azure AD and exposes the access token a Power BI
//! reporting client needs. Async/await, tokio-based.
//!
//! ## Quick Start
//!
//! Device-code sign-in with the default public client and Power BI scopes:
//!
//! ```no_run
//! use powerbi_auth::{AuthConfig, device_code_login};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = device_code_login(&AuthConfig::default()).await?;
//!     println!("Token: {}", session.access_token());
//!     Ok(())
//! }
//! ```
//!
//! ## Flows
//!
//! All flows produce an [`AuthenticationSession`], which exposes the token,
//! the full token payload and [`refresh`](AuthenticationSession::refresh).
//!
//! - **Device code** - [`Authenticator::device_code_login`] prints a code
//!   to enter at the provider's verification page, then waits for sign-in.
//! - **Interactive browser** - [`Authenticator::interactive_login`] opens the
//!   system browser and captures the redirect on a loopback port (PKCE).
//! - **Bring your own token** - [`Authenticator::session_from_payload`] wraps
//!   a token payload acquired elsewhere.
//!
//! Report creation needs elevated scopes:
//!
//! ```no_run
//! # use powerbi_auth::{AuthConfig, Authenticator};
//! # async fn example() -> powerbi_auth::AuthResult<()> {
//! let authenticator = Authenticator::new(&AuthConfig::for_report_creation())?;
//! let mut session = authenticator.interactive_login().await?;
//! session.refresh().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! The network side lives behind the [`IdentityProvider`] trait.
//! [`Authenticator::with_provider`] accepts any implementation, which makes
//! the flows easy to drive from tests.
//!
//! ## Logging
//!
//! This crate uses [`tracing`](https://crates.io/crates/tracing) for structured logging.
//! Tracing events are always emitted but are zero-cost when no subscriber is attached.
//! User instructions for the login flows are printed to stdout.
//!
//! ## Error Handling
//!
//! All fallible operations return [`AuthResult<T>`]:
//!
//! ```no_run
//! # use powerbi_auth::{AuthConfig, AuthError, device_code_login};
//! # async fn example() {
//! match device_code_login(&AuthConfig::default()).await {
//!     Ok(session) => { /* ... */ }
//!     Err(AuthError::FlowInitiation(details)) => {
//!         eprintln!("Could not start sign-in: {details}");
//!     }
//!     Err(AuthError::Authentication(reason)) => {
//!         eprintln!("Sign-in failed: {reason}");
//!     }
//!     Err(e) => {
//!         eprintln!("Error: {e}");
//!     }
//! }
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod login;
pub mod payload;
pub mod provider;
pub mod session;

pub use config::{
    AuthConfig, CREATE_REPORT_SCOPES, DEFAULT_AUTHORITY, DEFAULT_CLIENT_ID, DEFAULT_SCOPES,
};
pub use error::{AuthError, AuthResult};
pub use login::{Authenticator, device_code_login, interactive_login, session_from_payload};
pub use payload::{DeviceFlow, TokenPayload};
pub use provider::{AadClient, IdentityProvider};
pub use session::AuthenticationSession;

/// Version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
