//! Identity provider abstraction
//!
//! Every login flow delegates its network and protocol work to an
//! [`IdentityProvider`]. Each operation answers with the provider's raw
//! mapping: either it carries `access_token` (or `user_code` for flow
//! initiation), or it describes the failure through `error` and
//! `error_description`. Interpreting that mapping is left to the caller, so a
//! provider only returns `Err` for transport or local failures.
//!
//! [`AadClient`] is the implementation for the Microsoft identity platform.
//! Tests and embedders can supply their own.

mod aad;
mod interactive;
mod loopback;

pub use aad::{AadClient, UrlOpener};
pub use interactive::PkceChallenge;
pub use loopback::{LoopbackListener, RedirectParams};

use async_trait::async_trait;

use crate::error::AuthResult;
use crate::payload::{DeviceFlow, TokenPayload};

/// OAuth 2.0 operations the login flows need from an identity provider
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Start a device-code flow for `scopes`
    async fn initiate_device_flow(
        &self,
        client_id: &str,
        scopes: &[String],
    ) -> AuthResult<DeviceFlow>;

    /// Wait until the user completes (or abandons) a device-code flow
    async fn acquire_token_by_device_flow(
        &self,
        client_id: &str,
        flow: &DeviceFlow,
    ) -> AuthResult<TokenPayload>;

    /// Sign the user in through a local browser
    async fn acquire_token_interactive(
        &self,
        client_id: &str,
        scopes: &[String],
    ) -> AuthResult<TokenPayload>;

    /// Redeem a refresh token for a new token set
    async fn acquire_token_by_refresh_token(
        &self,
        client_id: &str,
        refresh_token: &str,
        scopes: &[String],
    ) -> AuthResult<TokenPayload>;
}
