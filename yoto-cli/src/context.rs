//! Per-command session: settings, client, and the stored credentials.

use anyhow::Result;
use tracing::{debug, warn};
use yoto_core::{Authed, CredentialStore, Credentials, YotoClient, YotoError};

use crate::config::Settings;

pub struct Session {
    pub client: YotoClient,
    pub settings: Settings,
    store: CredentialStore,
    credentials: Credentials,
}

impl Session {
    /// Open a session for a command that needs a logged-in user.
    pub fn open(settings: Settings) -> Result<Self> {
        let store = settings.credential_store()?;
        let credentials = store
            .load()
            .filter(Credentials::is_authenticated)
            .ok_or(YotoError::NotAuthenticated)?;
        debug!("Loaded credentials from {:?}", store.path());

        Ok(Self {
            client: YotoClient::new(settings.api.clone()),
            settings,
            store,
            credentials,
        })
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Take the value out of a call result.
    ///
    /// Refreshed credentials are persisted whether or not the call succeeded.
    pub fn settle<T>(&mut self, result: Result<Authed<T>, YotoError>) -> Result<T, YotoError> {
        match result {
            Ok(authed) => {
                if let Some(refreshed) = authed.refreshed {
                    self.persist(refreshed);
                }
                Ok(authed.value)
            }
            Err(err) => {
                let (err, refreshed) = err.into_parts();
                if let Some(refreshed) = refreshed {
                    self.persist(refreshed);
                }
                Err(err)
            }
        }
    }

    fn persist(&mut self, refreshed: Credentials) {
        match self.store.save(&refreshed) {
            Ok(()) => debug!("Saved refreshed credentials"),
            Err(e) => warn!("Failed to save refreshed credentials: {}", e),
        }
        self.credentials = refreshed;
    }
}
