//! Authorization code flow with PKCE through the system browser

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use sha2::{Digest, Sha256};
use url::Url;

use super::aad::AadClient;
use super::loopback::LoopbackListener;
use crate::error::{AuthError, AuthResult};
use crate::payload::TokenPayload;

fn random_urlsafe(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// PKCE code challenge data
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    /// Code verifier (random string)
    pub verifier: String,
    /// Code challenge (SHA-256 hash of verifier, base64url encoded)
    pub challenge: String,
}

impl PkceChallenge {
    /// Generate a new verifier and its S256 challenge
    #[must_use]
    pub fn generate() -> Self {
        // 32 bytes gives a 43 character verifier
        let verifier = random_urlsafe(32);
        let challenge = Self::challenge_for(&verifier);
        Self {
            verifier,
            challenge,
        }
    }

    /// BASE64URL(SHA256(verifier))
    #[must_use]
    pub fn challenge_for(verifier: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    }
}

/// Generate a state parameter (24 random bytes, 32 characters)
fn generate_state() -> String {
    random_urlsafe(24)
}

/// Open URL in default browser
fn open_browser(url: &str) -> AuthResult<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open")
            .arg(url)
            .spawn()
            .map_err(|e| AuthError::browser_open(e.to_string()))?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open")
            .arg(url)
            .spawn()
            .map_err(|e| AuthError::browser_open(e.to_string()))?;
    }

    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", "", url])
            .spawn()
            .map_err(|e| AuthError::browser_open(e.to_string()))?;
    }

    Ok(())
}

impl AadClient {
    /// Build the authorization URL with PKCE challenge
    pub(crate) fn authorize_url(
        &self,
        client_id: &str,
        scopes: &[String],
        redirect_uri: &str,
        code_challenge: &str,
        state: &str,
    ) -> AuthResult<Url> {
        let mut url = self.config.endpoint("authorize")?;
        url.query_pairs_mut()
            .append_pair("client_id", client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("scope", &Self::scope_param(scopes))
            .append_pair("code_challenge", code_challenge)
            .append_pair("code_challenge_method", "S256")
            .append_pair("state", state)
            .append_pair("prompt", "select_account");
        Ok(url)
    }

    pub(super) async fn run_interactive_flow(
        &self,
        client_id: &str,
        scopes: &[String],
    ) -> AuthResult<TokenPayload> {
        let listener = LoopbackListener::bind().await?;
        let redirect_uri = listener.redirect_uri();
        let pkce = PkceChallenge::generate();
        let state = generate_state();
        let auth_url =
            self.authorize_url(client_id, scopes, &redirect_uri, &pkce.challenge, &state)?;

        if let Some(opener) = &self.url_opener {
            opener(auth_url.as_str())?;
        } else if self.config.open_browser {
            if let Err(e) = open_browser(auth_url.as_str()) {
                tracing::debug!("Could not open browser: {e}");
                println!("Could not open a browser automatically. Please open this URL to sign in:");
                println!("  {auth_url}");
            }
        } else {
            println!("Please open this URL to sign in:");
            println!("  {auth_url}");
        }

        let timeout = self.config.interactive_timeout;
        let redirect = tokio::time::timeout(timeout, listener.accept_redirect())
            .await
            .map_err(|_| {
                AuthError::timeout(format!(
                    "no sign-in redirect received within {} seconds",
                    timeout.as_secs()
                ))
            })??;

        if redirect.state.as_deref() != Some(state.as_str()) {
            return Err(AuthError::StateMismatch);
        }

        if let Some(error) = redirect.error.as_deref() {
            tracing::debug!(error, "Authorization endpoint returned an error");
            return Ok(TokenPayload::error(
                error,
                redirect.error_description.clone().unwrap_or_default(),
            ));
        }

        let code = redirect
            .code
            .as_deref()
            .ok_or_else(|| AuthError::invalid_response("redirect carried no authorization code"))?;

        let scope = Self::scope_param(scopes);
        self.redeem(&[
            ("grant_type", "authorization_code"),
            ("client_id", client_id),
            ("code", code),
            ("redirect_uri", &redirect_uri),
            ("code_verifier", &pkce.verifier),
            ("scope", &scope),
        ])
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;

    #[test]
    fn test_pkce_challenge_generation() {
        let pkce = PkceChallenge::generate();
        // 32 bytes base64url encoded
        assert_eq!(pkce.verifier.len(), 43);
        assert_eq!(pkce.challenge.len(), 43);
        assert_eq!(PkceChallenge::challenge_for(&pkce.verifier), pkce.challenge);
    }

    #[test]
    fn test_pkce_verifier_is_valid_base64url() {
        let pkce = PkceChallenge::generate();
        assert!(
            pkce.verifier
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
        assert_ne!(pkce.verifier, PkceChallenge::generate().verifier);
    }

    #[test]
    fn test_pkce_rfc7636_vector() {
        // Appendix B of RFC 7636
        assert_eq!(
            PkceChallenge::challenge_for("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_state_length() {
        assert_eq!(generate_state().len(), 32);
    }

    #[test]
    fn test_authorize_url() {
        let client = AadClient::new(AuthConfig::default()).unwrap();
        let scopes = vec!["https://analysis.windows.net/powerbi/api/.default".to_string()];
        let url = client
            .authorize_url(
                "client-1",
                &scopes,
                "http://localhost:4567",
                "challenge",
                "state-1",
            )
            .unwrap();

        assert_eq!(
            url.path(),
            "/organizations/oauth2/v2.0/authorize"
        );
        let pairs: std::collections::HashMap<String, String> =
            url.query_pairs().into_owned().collect();
        assert_eq!(pairs["client_id"], "client-1");
        assert_eq!(pairs["redirect_uri"], "http://localhost:4567");
        assert_eq!(pairs["code_challenge_method"], "S256");
        assert_eq!(pairs["state"], "state-1");
        assert!(pairs["scope"].contains("offline_access"));
    }
}
