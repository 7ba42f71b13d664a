//! Device Authorization Grant flow (RFC 8628).
//!
//! # Flow Overview
//!
//! 1. Request device and user codes from the authorization server
//! 2. Show the verification URL and user code to the user
//! 3. The user approves the request in a browser on another device
//! 4. Poll the token endpoint until approval, denial, or expiry
//!
//! The flow is an explicit state machine:
//!
//! ```text
//! Init ──► Polling ──► Authenticated
//!            │  ▲
//!            └──┘ authorization_pending / slow_down
//!            ├──► TimedOut
//!            └──► Failed
//! ```
//!
//! Time is read and slept through a [`Clock`], so tests run the whole flow
//! without waiting.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), yoto_core::YotoError> {
//! use yoto_core::clock::TokioClock;
//! use yoto_core::device_flow::{DeviceFlow, FlowEvent};
//! use yoto_core::{ClientConfig, YotoClient};
//!
//! let client = YotoClient::new(ClientConfig::default());
//! let flow = DeviceFlow::new(&client, &TokioClock, "my-client-id");
//!
//! let grant = flow
//!     .run(|event| {
//!         if let FlowEvent::Started(device) = event {
//!             println!("Visit {}", device.verification_uri_complete);
//!         }
//!     })
//!     .await?;
//! # let _ = grant;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::client::{TokenGrant, YotoClient};
use crate::clock::Clock;
use crate::credentials::Credentials;
use crate::error::{SLOW_DOWN, YotoError};
use crate::model::DeviceCodeResponse;

/// RFC 8628 §3.5: add five seconds to the interval on every `slow_down`.
pub const DEFAULT_SLOW_DOWN_INCREMENT: Duration = Duration::from_secs(5);

/// The two token-endpoint calls the flow depends on.
#[async_trait]
pub trait DeviceAuthorizer: Send + Sync {
    async fn init_device_flow(&self, client_id: &str) -> Result<DeviceCodeResponse, YotoError>;

    async fn poll_for_token(
        &self,
        credentials: &Credentials,
        device_code: &str,
    ) -> Result<TokenGrant, YotoError>;
}

#[async_trait]
impl DeviceAuthorizer for YotoClient {
    async fn init_device_flow(&self, client_id: &str) -> Result<DeviceCodeResponse, YotoError> {
        YotoClient::init_device_flow(self, client_id).await
    }

    async fn poll_for_token(
        &self,
        credentials: &Credentials,
        device_code: &str,
    ) -> Result<TokenGrant, YotoError> {
        YotoClient::poll_for_token(self, credentials, device_code).await
    }
}

/// Progress notifications for whoever is driving the flow.
#[derive(Debug)]
pub enum FlowEvent<'a> {
    /// Device code issued; show the verification URL to the user.
    Started(&'a DeviceCodeResponse),
    /// The user has not approved yet.
    Pending,
    /// The server asked us to poll less often.
    SlowDown { interval: Duration },
}

/// State of a device authorization.
#[derive(Debug)]
pub enum FlowState {
    Init,
    Polling {
        device: DeviceCodeResponse,
        expires_at: Instant,
        interval: Duration,
    },
    Authenticated(TokenGrant),
    TimedOut,
    Failed(YotoError),
}

impl FlowState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Authenticated(_) | Self::TimedOut | Self::Failed(_)
        )
    }
}

/// Drives a device authorization to a terminal state.
pub struct DeviceFlow<'a, A: ?Sized, C: ?Sized> {
    authorizer: &'a A,
    clock: &'a C,
    client_id: String,
    slow_down_increment: Duration,
}

impl<'a, A, C> DeviceFlow<'a, A, C>
where
    A: DeviceAuthorizer + ?Sized,
    C: Clock + ?Sized,
{
    pub fn new(authorizer: &'a A, clock: &'a C, client_id: impl Into<String>) -> Self {
        Self {
            authorizer,
            clock,
            client_id: client_id.into(),
            slow_down_increment: DEFAULT_SLOW_DOWN_INCREMENT,
        }
    }

    /// How much to lengthen the poll interval on `slow_down`.
    ///
    /// Zero keeps the interval fixed.
    pub fn with_slow_down_increment(mut self, increment: Duration) -> Self {
        self.slow_down_increment = increment;
        self
    }

    /// Run until a terminal state.
    ///
    /// # Errors
    ///
    /// - [`YotoError::Timeout`] if the device code expires first
    /// - the authorizer's error for anything other than
    ///   `authorization_pending` / `slow_down`
    pub async fn run<F>(&self, mut on_event: F) -> Result<TokenGrant, YotoError>
    where
        F: FnMut(FlowEvent<'_>),
    {
        let mut state = FlowState::Init;
        while !state.is_terminal() {
            state = self.step(state, &mut on_event).await;
        }

        match state {
            FlowState::Authenticated(grant) => {
                info!("Device authorization complete");
                Ok(grant)
            }
            FlowState::Failed(err) => Err(err),
            _ => Err(YotoError::Timeout {
                message: "Authorization timed out. Please try again.".to_string(),
            }),
        }
    }

    /// Advance the state machine by one transition.
    ///
    /// Terminal states are returned unchanged.
    pub async fn step<F>(&self, state: FlowState, on_event: &mut F) -> FlowState
    where
        F: FnMut(FlowEvent<'_>),
    {
        match state {
            FlowState::Init => match self.authorizer.init_device_flow(&self.client_id).await {
                Ok(device) => {
                    on_event(FlowEvent::Started(&device));
                    let interval = Duration::from_secs(device.poll_interval_secs());
                    let expires_at = self.clock.now() + Duration::from_secs(device.expires_in);
                    debug!(
                        interval_secs = interval.as_secs(),
                        expires_in = device.expires_in,
                        "Device code issued"
                    );
                    FlowState::Polling {
                        device,
                        expires_at,
                        interval,
                    }
                }
                Err(err) => FlowState::Failed(err),
            },

            FlowState::Polling {
                device,
                expires_at,
                mut interval,
            } => {
                if self.clock.now() >= expires_at {
                    return FlowState::TimedOut;
                }

                self.clock.sleep(interval).await;

                if self.clock.now() >= expires_at {
                    return FlowState::TimedOut;
                }

                let credentials = Credentials::new(self.client_id.clone());
                match self
                    .authorizer
                    .poll_for_token(&credentials, &device.device_code)
                    .await
                {
                    Ok(grant) => FlowState::Authenticated(grant),
                    Err(err) if !err.is_pending() => FlowState::Failed(err),
                    Err(err) => {
                        if err.oauth_code() == Some(SLOW_DOWN) {
                            interval += self.slow_down_increment;
                            warn!(
                                interval_secs = interval.as_secs(),
                                "Polling too fast, slowing down"
                            );
                            on_event(FlowEvent::SlowDown { interval });
                        } else {
                            debug!("Authorization pending, continuing to poll");
                            on_event(FlowEvent::Pending);
                        }
                        FlowState::Polling {
                            device,
                            expires_at,
                            interval,
                        }
                    }
                }
            }

            terminal => terminal,
        }
    }
}
