//! Azure AD client against a mock identity platform

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use powerbi_auth::{
    AadClient, AuthConfig, AuthError, Authenticator, DeviceFlow, IdentityProvider, TokenPayload,
};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use url::Url;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SCOPE: &str = "https://analysis.windows.net/powerbi/api/.default";

fn config(server: &MockServer) -> AuthConfig {
    AuthConfig::builder()
        .authority(format!("{}/contoso", server.uri()))
        .client_id("test-client")
        .open_browser(false)
        .build()
}

fn scopes() -> Vec<String> {
    vec![SCOPE.to_string()]
}

fn flow(interval: u64, expires_at: Option<u64>) -> DeviceFlow {
    let mut value = json!({
        "user_code": "ABCD1234",
        "device_code": "device-1",
        "interval": interval
    });
    if let Some(expires_at) = expires_at {
        value["expires_at"] = json!(expires_at);
    }
    DeviceFlow::from_value(value).unwrap()
}

/// Stands in for the browser: follows the authorization URL back to the
/// loopback redirect with the query built from the request's `state`.
fn browser_redirect(
    query: fn(&str) -> String,
) -> impl Fn(&str) -> powerbi_auth::AuthResult<()> + Send + Sync + 'static {
    move |auth_url: &str| {
        let auth_url = Url::parse(auth_url).expect("authorize url");
        let pairs: HashMap<String, String> = auth_url.query_pairs().into_owned().collect();
        let port = Url::parse(&pairs["redirect_uri"])
            .expect("redirect uri")
            .port()
            .expect("redirect port");
        let request = format!(
            "GET /?{} HTTP/1.1\r\nHost: localhost\r\n\r\n",
            query(&pairs["state"])
        );

        tokio::spawn(async move {
            let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
            stream.write_all(request.as_bytes()).await.unwrap();
            let mut reply = String::new();
            let _ = stream.read_to_string(&mut reply).await;
        });
        Ok(())
    }
}

fn far_future() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs()
        + 900
}

#[tokio::test]
async fn initiate_device_flow_posts_client_and_scopes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/contoso/oauth2/v2.0/devicecode"))
        .and(body_string_contains("client_id=test-client"))
        .and(body_string_contains("offline_access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user_code": "ABCD1234",
            "device_code": "device-1",
            "verification_uri": "https://microsoft.com/devicelogin",
            "expires_in": 900,
            "interval": 5,
            "message": "To sign in, use a web browser to open the page https://microsoft.com/devicelogin and enter the code ABCD1234 to authenticate."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = AadClient::new(config(&server)).unwrap();
    let flow = client
        .initiate_device_flow("test-client", &scopes())
        .await
        .expect("device flow");

    assert_eq!(flow.user_code(), Some("ABCD1234"));
    assert_eq!(flow.interval(), Some(5));
    assert!(flow.expires_at().expect("expires_at stamped") > far_future() - 60);
}

#[tokio::test]
async fn initiate_device_flow_passes_error_mapping_through() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/contoso/oauth2/v2.0/devicecode"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_scope",
            "error_description": "AADSTS70011: The provided value for scope is not valid."
        })))
        .mount(&server)
        .await;

    let client = AadClient::new(config(&server)).unwrap();
    let flow = client
        .initiate_device_flow("test-client", &scopes())
        .await
        .expect("mapping, not transport error");

    assert!(flow.user_code().is_none());
    assert_eq!(flow.as_map()["error"], json!("invalid_scope"));
}

#[tokio::test]
async fn device_flow_polls_until_authorized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/contoso/oauth2/v2.0/token"))
        .and(body_string_contains("device_code=device-1"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "authorization_pending",
            "error_description": "AADSTS70016: OAuth 2.0 device flow error. Authorization is pending."
        })))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/contoso/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "access_token": "device-access",
            "refresh_token": "device-refresh",
            "expires_in": 3599
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = AadClient::new(config(&server)).unwrap();
    let payload = client
        .acquire_token_by_device_flow("test-client", &flow(0, Some(far_future())))
        .await
        .expect("token");

    assert_eq!(payload.access_token(), Some("device-access"));
}

#[tokio::test]
async fn device_flow_stops_on_terminal_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/contoso/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "authorization_declined",
            "error_description": "AADSTS70000: The user declined"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = AadClient::new(config(&server)).unwrap();
    let payload = client
        .acquire_token_by_device_flow("test-client", &flow(0, None))
        .await
        .expect("mapping");

    assert!(!payload.has_access_token());
    assert_eq!(payload.error_code(), Some("authorization_declined"));
}

#[tokio::test]
async fn expired_device_flow_is_not_polled() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = AadClient::new(config(&server)).unwrap();
    let payload = client
        .acquire_token_by_device_flow("test-client", &flow(0, Some(1)))
        .await
        .expect("mapping");

    assert_eq!(payload.error_code(), Some("expired_token"));
}

#[tokio::test]
async fn device_code_login_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/contoso/oauth2/v2.0/devicecode"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user_code": "ABCD1234",
            "device_code": "device-1",
            "verification_uri": "https://microsoft.com/devicelogin",
            "expires_in": 900,
            "interval": 0
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/contoso/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "access_token": "e2e-access",
            "refresh_token": "e2e-refresh",
            "expires_in": 3599
        })))
        .mount(&server)
        .await;

    let session = powerbi_auth::device_code_login(&config(&server))
        .await
        .expect("login");

    assert_eq!(session.access_token(), "e2e-access");
    assert_eq!(session.client_id(), "test-client");
}

#[tokio::test]
async fn refresh_error_status_surfaces_description() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/contoso/oauth2/v2.0/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=old-refresh"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "AADSTS50173: The provided grant has expired."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = config(&server);
    let provider: Arc<dyn IdentityProvider> = Arc::new(AadClient::new(config.clone()).unwrap());
    let mut session = Authenticator::with_provider(&config, provider)
        .session_from_payload(
            TokenPayload::from_value(json!({
                "access_token": "old-access",
                "refresh_token": "old-refresh"
            }))
            .unwrap(),
        )
        .unwrap();

    let err = session.refresh().await.unwrap_err();

    assert!(matches!(
        err,
        AuthError::Authentication(ref m) if m == "AADSTS50173: The provided grant has expired."
    ));
    assert_eq!(session.access_token(), "old-access");
}

#[tokio::test]
async fn non_json_response_is_invalid() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/contoso/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
        .mount(&server)
        .await;

    let client = AadClient::new(config(&server)).unwrap();
    let err = client
        .acquire_token_by_refresh_token("test-client", "r", &scopes())
        .await
        .unwrap_err();

    match err {
        AuthError::InvalidResponse(msg) => assert!(msg.contains("502")),
        other => panic!("expected InvalidResponse, got {other:?}"),
    }
}

#[tokio::test]
async fn interactive_flow_times_out_without_redirect() {
    let server = MockServer::start().await;
    let config = AuthConfig::builder()
        .authority(format!("{}/contoso", server.uri()))
        .open_browser(false)
        .interactive_timeout(Duration::from_millis(50))
        .build();

    let client = AadClient::new(config).unwrap();
    let err = client
        .acquire_token_interactive("test-client", &scopes())
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Timeout(_)));
}

#[tokio::test]
async fn interactive_flow_redeems_code_with_verifier() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/contoso/oauth2/v2.0/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=auth-code"))
        .and(body_string_contains("code_verifier="))
        .and(body_string_contains("redirect_uri=http%3A%2F%2Flocalhost%3A"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "access_token": "browser-access",
            "refresh_token": "browser-refresh",
            "expires_in": 3599
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = AadClient::new(config(&server))
        .unwrap()
        .with_url_opener(browser_redirect(|state| {
            format!("code=auth-code&state={state}")
        }));
    let payload = client
        .acquire_token_interactive("test-client", &scopes())
        .await
        .expect("token");

    assert_eq!(payload.access_token(), Some("browser-access"));
    assert_eq!(payload.refresh_token(), Some("browser-refresh"));
}

#[tokio::test]
async fn interactive_flow_rejects_forged_state() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = AadClient::new(config(&server))
        .unwrap()
        .with_url_opener(browser_redirect(|_| {
            "code=auth-code&state=forged".to_string()
        }));
    let err = client
        .acquire_token_interactive("test-client", &scopes())
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::StateMismatch));
}

#[tokio::test]
async fn interactive_login_surfaces_denied_consent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = config(&server);
    let client = AadClient::new(config.clone())
        .unwrap()
        .with_url_opener(browser_redirect(|state| {
            format!(
                "error=access_denied&error_description=AADSTS65004%3A+User+declined+to+consent.&state={state}"
            )
        }));
    let provider: Arc<dyn IdentityProvider> = Arc::new(client);

    let err = Authenticator::with_provider(&config, provider)
        .interactive_login()
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AuthError::Authentication(ref m) if m == "AADSTS65004: User declined to consent."
    ));
}
