//! # Yoto Core
//!
//! Core library for the `yoto` command-line client.
//!
//! This crate provides:
//! - Wire types for the Yoto OAuth and REST APIs
//! - [`YotoClient`], a token-stateless HTTP client with a refresh-once-on-401 policy
//! - The OAuth device authorization flow as an explicit state machine
//! - A transcode poller shared by every "wait for audio" path
//! - Read-modify-write editing of playlist cards
//! - The on-disk credential file
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use yoto_core::{ClientConfig, CredentialStore, YotoClient};
//!
//! async fn list(store: &CredentialStore) -> Result<(), yoto_core::YotoError> {
//!     let credentials = store.load().ok_or(yoto_core::YotoError::NotAuthenticated)?;
//!     let client = YotoClient::new(ClientConfig::default());
//!
//!     let listing = client.list_content(&credentials, false).await?;
//!     if let Some(refreshed) = &listing.refreshed {
//!         store.save(refreshed).ok();
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod clock;
pub mod credentials;
pub mod device_flow;
pub mod editor;
pub mod error;
pub mod model;
pub mod transcode;

// Re-export commonly used types at crate root
pub use client::{
    Authed,
    ClientConfig,
    CredentialChain,
    TokenGrant,
    YotoClient,
};

pub use clock::{
    Clock,
    ManualClock,
    TokioClock,
};

pub use credentials::{
    CredentialStore,
    CredentialStoreError,
    Credentials,
    Secret,
    TokenPair,
};

pub use device_flow::{
    DeviceAuthorizer,
    DeviceFlow,
    FlowEvent,
    FlowState,
};

pub use editor::{
    CardRepository,
    Editor,
};

pub use error::YotoError;

pub use transcode::{
    TranscodePoller,
    TranscodeSource,
    TranscodeState,
    TranscodedTrack,
};
