//! Integration tests for the device authorization flow.
//!
//! The flow is driven by a scripted authorizer and a [`ManualClock`], so
//! every test runs instantly while still exercising real interval and
//! expiry arithmetic.

use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_string_contains, method, path},
};
use yoto_core::{
    ClientConfig, Credentials, DeviceAuthorizer, DeviceFlow, FlowEvent, FlowState, ManualClock,
    TokenGrant, TokenPair, YotoClient, YotoError,
    model::{DeviceCodeResponse, TokenResponse},
};

/// Authorizer that answers polls from a script; an exhausted script keeps
/// answering `authorization_pending`.
struct ScriptedAuthorizer {
    device: DeviceCodeResponse,
    script: Mutex<VecDeque<Result<TokenGrant, YotoError>>>,
    polls: Mutex<u32>,
}

impl ScriptedAuthorizer {
    fn new(expires_in: u64, interval: u64) -> Self {
        Self {
            device: DeviceCodeResponse {
                device_code: "dev-123".to_string(),
                user_code: "ABCD-EFGH".to_string(),
                verification_uri: "https://login.example.com/activate".to_string(),
                verification_uri_complete: "https://login.example.com/activate?user_code=ABCD-EFGH"
                    .to_string(),
                expires_in,
                interval: Some(interval),
            },
            script: Mutex::new(VecDeque::new()),
            polls: Mutex::new(0),
        }
    }

    fn then(self, answer: Result<TokenGrant, YotoError>) -> Self {
        self.script.lock().unwrap().push_back(answer);
        self
    }

    fn polls(&self) -> u32 {
        *self.polls.lock().unwrap()
    }
}

#[async_trait]
impl DeviceAuthorizer for ScriptedAuthorizer {
    async fn init_device_flow(&self, _client_id: &str) -> Result<DeviceCodeResponse, YotoError> {
        Ok(self.device.clone())
    }

    async fn poll_for_token(
        &self,
        credentials: &Credentials,
        device_code: &str,
    ) -> Result<TokenGrant, YotoError> {
        assert_eq!(device_code, "dev-123");
        assert_eq!(credentials.client_id(), "test-client-id");
        *self.polls.lock().unwrap() += 1;

        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(oauth("authorization_pending")))
    }
}

fn oauth(code: &str) -> YotoError {
    YotoError::Auth {
        code: code.to_string(),
        description: None,
    }
}

fn granted(access: &str) -> TokenGrant {
    TokenGrant {
        response: TokenResponse {
            access_token: access.to_string(),
            refresh_token: "refresh".to_string(),
            token_type: Some("Bearer".to_string()),
            expires_in: Some(86400),
            scope: None,
            id_token: None,
        },
        credentials: Credentials::new("test-client-id")
            .with_tokens(TokenPair::new(access, "refresh")),
    }
}

fn describe(event: FlowEvent<'_>) -> String {
    match event {
        FlowEvent::Started(device) => format!("started {}", device.user_code),
        FlowEvent::Pending => "pending".to_string(),
        FlowEvent::SlowDown { interval } => format!("slow_down {}", interval.as_secs()),
    }
}

#[tokio::test]
async fn test_pending_then_success() {
    let authorizer = ScriptedAuthorizer::new(900, 5)
        .then(Err(oauth("authorization_pending")))
        .then(Err(oauth("authorization_pending")))
        .then(Ok(granted("access-1")));
    let clock = ManualClock::new();
    let mut events = Vec::new();

    let grant = DeviceFlow::new(&authorizer, &clock, "test-client-id")
        .run(|event| events.push(describe(event)))
        .await
        .unwrap();

    assert_eq!(grant.credentials.access_token().unwrap().expose(), "access-1");
    assert_eq!(authorizer.polls(), 3);
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(5); 3]);
    assert_eq!(events, vec!["started ABCD-EFGH", "pending", "pending"]);
}

#[tokio::test]
async fn test_times_out_without_polling_after_expiry() {
    let authorizer = ScriptedAuthorizer::new(12, 5);
    let clock = ManualClock::new();

    let result = DeviceFlow::new(&authorizer, &clock, "test-client-id")
        .run(|_| {})
        .await;

    match result {
        Err(YotoError::Timeout { message }) => {
            assert_eq!(message, "Authorization timed out. Please try again.");
        }
        other => panic!("Expected timeout, got {:?}", other.map(|g| g.response)),
    }

    // Polls at t=5 and t=10; the sleep to t=15 crosses the deadline.
    assert_eq!(authorizer.polls(), 2);
    assert_eq!(clock.elapsed(), Duration::from_secs(15));
}

#[tokio::test]
async fn test_unexpected_error_fails_immediately() {
    let authorizer = ScriptedAuthorizer::new(900, 5)
        .then(Err(oauth("authorization_pending")))
        .then(Err(YotoError::Auth {
            code: "access_denied".to_string(),
            description: Some("User refused".to_string()),
        }));
    let clock = ManualClock::new();

    let err = DeviceFlow::new(&authorizer, &clock, "test-client-id")
        .run(|_| {})
        .await
        .unwrap_err();

    assert_eq!(err.oauth_code(), Some("access_denied"));
    assert_eq!(err.to_string(), "User refused");
    assert_eq!(authorizer.polls(), 2);
}

#[tokio::test]
async fn test_slow_down_lengthens_interval() {
    let authorizer = ScriptedAuthorizer::new(900, 5)
        .then(Err(oauth("slow_down")))
        .then(Err(oauth("authorization_pending")))
        .then(Ok(granted("access-2")));
    let clock = ManualClock::new();
    let mut events = Vec::new();

    DeviceFlow::new(&authorizer, &clock, "test-client-id")
        .run(|event| events.push(describe(event)))
        .await
        .unwrap();

    assert_eq!(
        clock.sleeps(),
        vec![
            Duration::from_secs(5),
            Duration::from_secs(10),
            Duration::from_secs(10)
        ]
    );
    assert_eq!(events, vec!["started ABCD-EFGH", "slow_down 10", "pending"]);
}

#[tokio::test]
async fn test_slow_down_with_zero_increment_keeps_interval() {
    let authorizer = ScriptedAuthorizer::new(900, 5)
        .then(Err(oauth("slow_down")))
        .then(Ok(granted("access-3")));
    let clock = ManualClock::new();

    DeviceFlow::new(&authorizer, &clock, "test-client-id")
        .with_slow_down_increment(Duration::ZERO)
        .run(|_| {})
        .await
        .unwrap();

    assert_eq!(clock.sleeps(), vec![Duration::from_secs(5); 2]);
}

#[tokio::test]
async fn test_step_walks_states() {
    let authorizer = ScriptedAuthorizer::new(900, 5).then(Ok(granted("access-4")));
    let clock = ManualClock::new();
    let flow = DeviceFlow::new(&authorizer, &clock, "test-client-id");
    let mut ignore = |_: FlowEvent<'_>| {};

    let state = flow.step(FlowState::Init, &mut ignore).await;
    assert!(matches!(state, FlowState::Polling { .. }));
    assert!(!state.is_terminal());
    assert_eq!(authorizer.polls(), 0);

    let state = flow.step(state, &mut ignore).await;
    assert!(matches!(state, FlowState::Authenticated(_)));
    assert!(state.is_terminal());

    let state = flow.step(state, &mut ignore).await;
    assert!(matches!(state, FlowState::Authenticated(_)));
    assert_eq!(authorizer.polls(), 1);
}

#[tokio::test]
async fn test_flow_against_mock_server() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/device/code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "device_code": "dev-xyz",
            "user_code": "WXYZ-1234",
            "verification_uri": "https://login.example.com/activate",
            "verification_uri_complete": "https://login.example.com/activate?user_code=WXYZ-1234",
            "expires_in": 300,
            "interval": 2
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("device_code=dev-xyz"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": "authorization_pending"
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("device_code=dev-xyz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "server-access",
            "refresh_token": "server-refresh",
            "token_type": "Bearer",
            "expires_in": 86400
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = YotoClient::new(ClientConfig::with_base_url(server.uri()));
    let clock = ManualClock::new();

    let grant = DeviceFlow::new(&client, &clock, "test-client-id")
        .run(|_| {})
        .await
        .unwrap();

    assert_eq!(grant.credentials.client_id(), "test-client-id");
    assert_eq!(grant.credentials.refresh_token().unwrap().expose(), "server-refresh");
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(2); 2]);
}
