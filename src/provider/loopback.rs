//! One-shot loopback HTTP listener that captures the OAuth redirect

use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use url::Url;

use crate::error::{AuthError, AuthResult};

const MAX_REQUEST_HEAD: usize = 16 * 1024;
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(5);

const SUCCESS_PAGE: &str = "<html><body><h3>Authentication complete.</h3>\
<p>You can close this window and return to the application.</p></body></html>";
const FAILURE_PAGE: &str = "<html><body><h3>Authentication failed.</h3>\
<p>Return to the application for details.</p></body></html>";

/// Query parameters of the authorization redirect
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedirectParams {
    /// Authorization code
    pub code: Option<String>,
    /// Echoed `state`
    pub state: Option<String>,
    /// Error code, when sign-in failed
    pub error: Option<String>,
    /// Error description
    pub error_description: Option<String>,
}

impl RedirectParams {
    /// Parse the request target (`/?code=...&state=...`) of a redirect.
    /// Returns `None` for requests that are not the redirect, such as a
    /// browser asking for `/favicon.ico`.
    #[must_use]
    pub fn from_request_target(target: &str) -> Option<Self> {
        let base = Url::parse("http://localhost/").ok()?;
        let url = base.join(target).ok()?;

        let mut params = Self::default();
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => params.code = Some(value.into_owned()),
                "state" => params.state = Some(value.into_owned()),
                "error" => params.error = Some(value.into_owned()),
                "error_description" => params.error_description = Some(value.into_owned()),
                _ => {}
            }
        }

        if params.code.is_some() || params.error.is_some() {
            Some(params)
        } else {
            None
        }
    }
}

/// Listener on the loopback interface with an ephemeral port
///
/// Binds `127.0.0.1` and, when available, `::1` on the same port so that a
/// browser resolving `localhost` to either family reaches it.
#[derive(Debug)]
pub struct LoopbackListener {
    v4: TcpListener,
    v6: Option<TcpListener>,
    port: u16,
}

impl LoopbackListener {
    /// Bind to an ephemeral loopback port
    ///
    /// # Errors
    ///
    /// Returns an error if no port could be bound on `127.0.0.1`.
    pub async fn bind() -> AuthResult<Self> {
        let v4 = TcpListener::bind(("127.0.0.1", 0)).await?;
        let port = v4.local_addr()?.port();
        let v6 = match TcpListener::bind(("::1", port)).await {
            Ok(listener) => Some(listener),
            Err(e) => {
                tracing::debug!(port, "IPv6 loopback unavailable: {e}");
                None
            }
        };
        tracing::debug!(port, ipv6 = v6.is_some(), "Listening for OAuth redirect");
        Ok(Self { v4, v6, port })
    }

    /// Bound port
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Whether `::1` is bound alongside `127.0.0.1`
    #[must_use]
    pub fn listens_on_ipv6(&self) -> bool {
        self.v6.is_some()
    }

    /// Redirect URI to register with the authorization request
    #[must_use]
    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}", self.port)
    }

    /// Serve requests until one carries the redirect parameters
    ///
    /// Each connection is handled on its own task with a read deadline, so
    /// an idle or slow client cannot hold up the redirect.
    ///
    /// # Errors
    ///
    /// Returns an error if accepting a connection fails.
    pub async fn accept_redirect(self) -> AuthResult<RedirectParams> {
        let (tx, mut rx) = mpsc::channel::<RedirectParams>(1);

        loop {
            let accepted = tokio::select! {
                Some(params) = rx.recv() => return Ok(params),
                result = self.v4.accept() => result,
                result = accept_on(self.v6.as_ref()) => result,
            };
            let (stream, peer) = accepted?;
            tokio::spawn(handle_connection(stream, peer, tx.clone()));
        }
    }
}

async fn accept_on(listener: Option<&TcpListener>) -> std::io::Result<(TcpStream, SocketAddr)> {
    match listener {
        Some(listener) => listener.accept().await,
        None => std::future::pending().await,
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    tx: mpsc::Sender<RedirectParams>,
) {
    let target = match timeout(REQUEST_READ_TIMEOUT, read_request_target(&mut stream)).await {
        Ok(Ok(target)) => target,
        Ok(Err(e)) => {
            tracing::debug!(%peer, "Ignoring malformed request: {e}");
            return;
        }
        Err(_) => {
            tracing::debug!(%peer, "Dropping idle connection");
            return;
        }
    };

    match RedirectParams::from_request_target(&target) {
        Some(params) => {
            let page = if params.error.is_some() {
                FAILURE_PAGE
            } else {
                SUCCESS_PAGE
            };
            if let Err(e) = write_response(&mut stream, "200 OK", page).await {
                tracing::debug!(%peer, "Could not answer redirect: {e}");
            }
            if tx.send(params).await.is_err() {
                tracing::debug!(%peer, "Redirect arrived after the listener finished");
            }
        }
        None => {
            if let Err(e) = write_response(&mut stream, "404 Not Found", "").await {
                tracing::debug!(%peer, %target, "Could not answer request: {e}");
            }
        }
    }
}

/// Read the request head and return the target of `GET <target> HTTP/1.1`
async fn read_request_target(stream: &mut TcpStream) -> AuthResult<String> {
    let mut head = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        head.extend_from_slice(&chunk[..n]);
        if head.len() > MAX_REQUEST_HEAD {
            return Err(AuthError::invalid_response("redirect request head too large"));
        }
    }

    let head = String::from_utf8_lossy(&head);
    let request_line = head.lines().next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("GET"), Some(target)) => Ok(target.to_string()),
        _ => Err(AuthError::invalid_response(format!(
            "unexpected request line: {request_line}"
        ))),
    }
}

async fn write_response(stream: &mut TcpStream, status: &str, body: &str) -> std::io::Result<()> {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}
