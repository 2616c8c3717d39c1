//! Shared test doubles

#![allow(dead_code)]

use async_trait::async_trait;
use powerbi_auth::{AuthResult, DeviceFlow, IdentityProvider, TokenPayload};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Mutex;

/// A call made against [`MockProvider`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    InitiateDeviceFlow { client_id: String, scopes: Vec<String> },
    DeviceFlow { client_id: String, device_code: String },
    Interactive { client_id: String, scopes: Vec<String> },
    Refresh { client_id: String, refresh_token: String, scopes: Vec<String> },
}

/// Identity provider answering with canned mappings
pub struct MockProvider {
    device_flow: Value,
    device_result: Value,
    interactive_result: Value,
    refresh_results: Mutex<VecDeque<Value>>,
    calls: Mutex<Vec<Call>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            device_flow: json!({
                "user_code": "ABCD1234",
                "device_code": "device-1",
                "verification_uri": "https://microsoft.com/devicelogin",
                "message": "To sign in, use a web browser to open the page https://microsoft.com/devicelogin and enter the code ABCD1234 to authenticate.",
                "interval": 5,
                "expires_in": 900
            }),
            device_result: token("device-access", Some("device-refresh")),
            interactive_result: token("browser-access", Some("browser-refresh")),
            refresh_results: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device_flow(mut self, flow: Value) -> Self {
        self.device_flow = flow;
        self
    }

    pub fn with_device_result(mut self, result: Value) -> Self {
        self.device_result = result;
        self
    }

    pub fn with_interactive_result(mut self, result: Value) -> Self {
        self.interactive_result = result;
        self
    }

    pub fn with_refresh_result(self, result: Value) -> Self {
        self.refresh_results.lock().unwrap().push_back(result);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

/// Token payload shaped like a successful Azure AD response
pub fn token(access: &str, refresh: Option<&str>) -> Value {
    let mut value = json!({
        "token_type": "Bearer",
        "scope": "https://analysis.windows.net/powerbi/api/.default",
        "expires_in": 3599,
        "ext_expires_in": 3599,
        "access_token": access
    });
    if let Some(refresh) = refresh {
        value["refresh_token"] = json!(refresh);
    }
    value
}

pub fn payload(value: Value) -> TokenPayload {
    TokenPayload::from_value(value).expect("object payload")
}

#[async_trait]
impl IdentityProvider for MockProvider {
    async fn initiate_device_flow(
        &self,
        client_id: &str,
        scopes: &[String],
    ) -> AuthResult<DeviceFlow> {
        self.record(Call::InitiateDeviceFlow {
            client_id: client_id.to_string(),
            scopes: scopes.to_vec(),
        });
        DeviceFlow::from_value(self.device_flow.clone())
    }

    async fn acquire_token_by_device_flow(
        &self,
        client_id: &str,
        flow: &DeviceFlow,
    ) -> AuthResult<TokenPayload> {
        self.record(Call::DeviceFlow {
            client_id: client_id.to_string(),
            device_code: flow.device_code().unwrap_or_default().to_string(),
        });
        TokenPayload::from_value(self.device_result.clone())
    }

    async fn acquire_token_interactive(
        &self,
        client_id: &str,
        scopes: &[String],
    ) -> AuthResult<TokenPayload> {
        self.record(Call::Interactive {
            client_id: client_id.to_string(),
            scopes: scopes.to_vec(),
        });
        TokenPayload::from_value(self.interactive_result.clone())
    }

    async fn acquire_token_by_refresh_token(
        &self,
        client_id: &str,
        refresh_token: &str,
        scopes: &[String],
    ) -> AuthResult<TokenPayload> {
        self.record(Call::Refresh {
            client_id: client_id.to_string(),
            refresh_token: refresh_token.to_string(),
            scopes: scopes.to_vec(),
        });
        let next = self
            .refresh_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| json!({"error": "invalid_grant", "error_description": "no canned refresh result"}));
        TokenPayload::from_value(next)
    }
}
