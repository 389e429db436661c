//! Authentication-recovery state machine (§4.5): on a login failure or any
//! disconnect that looks auth/timeout/generic-related, disconnect if still
//! live, refresh the user token, install it, and reconnect — guarded so
//! concurrent triggers collapse into one recovery attempt.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use async_trait::async_trait;
use secrecy::Secret;
use tokio::sync::Mutex;

use crate::{
    error::Result,
    identity::IdentityClient,
    secret_cache::SecretCache,
    transport::{DisconnectReason, TransportState},
};

/// What the recovery coordinator drives: disconnecting and reconnecting the
/// transport with a freshly-installed token (§9: adapter boundary).
#[async_trait]
pub trait ChatClient: Send + Sync {
    fn state(&self) -> TransportState;
    async fn disconnect(&self);
    async fn connect(&self, access_token: &Secret<String>);
}

const REFRESH_TOKEN_RESOURCE: &str = "chat-refresh-token";

pub struct RecoveryCoordinator<C: ChatClient> {
    identity: IdentityClient,
    client: Arc<C>,
    secrets: Mutex<SecretCache>,
    in_progress: AtomicBool,
}

impl<C: ChatClient> RecoveryCoordinator<C> {
    pub fn new(identity: IdentityClient, client: Arc<C>, initial_refresh_token: Secret<String>) -> Self {
        let mut secrets = SecretCache::new();
        secrets.put(REFRESH_TOKEN_RESOURCE, initial_refresh_token);
        Self {
            identity,
            client,
            secrets: Mutex::new(secrets),
            in_progress: AtomicBool::new(false),
        }
    }

    /// Entry point from the transport adapter. Returns `Ok(true)` if a
    /// recovery attempt actually ran, `Ok(false)` if reentrancy suppressed
    /// it or the reason didn't warrant recovery.
    pub async fn handle_disconnect(&self, reason: DisconnectReason) -> Result<bool> {
        if !reason.requires_recovery() {
            return Ok(false);
        }
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("recovery already in progress; ignoring reentrant trigger");
            return Ok(false);
        }

        let result = self.run_recovery().await;
        self.in_progress.store(false, Ordering::SeqCst);
        result.map(|()| true)
    }

    async fn run_recovery(&self) -> Result<()> {
        if matches!(self.client.state(), TransportState::Open | TransportState::Connecting) {
            self.client.disconnect().await;
        }

        let refresh_token = {
            let secrets = self.secrets.lock().await;
            secrets
                .get(REFRESH_TOKEN_RESOURCE)
                .cloned()
                .ok_or_else(|| crate::error::Error::AuthFailed("no refresh token cached".to_string()))?
        };

        let issued = self.identity.refresh_user_token(&refresh_token).await?;

        {
            let mut secrets = self.secrets.lock().await;
            if let Some(rotated) = issued.refresh_token.clone() {
                secrets.put(REFRESH_TOKEN_RESOURCE, rotated);
            }
        }

        self.client.connect(&issued.access_token).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use secrecy::ExposeSecret;
    use wiremock::{matchers::method, Mock, MockServer, ResponseTemplate};

    use super::*;

    struct FakeClient {
        state: StdMutex<TransportState>,
        connected_with: StdMutex<Option<String>>,
        disconnect_calls: StdMutex<usize>,
    }

    #[async_trait]
    impl ChatClient for FakeClient {
        fn state(&self) -> TransportState {
            *self.state.lock().unwrap()
        }

        async fn disconnect(&self) {
            *self.disconnect_calls.lock().unwrap() += 1;
            *self.state.lock().unwrap() = TransportState::Disconnected;
        }

        async fn connect(&self, access_token: &Secret<String>) {
            *self.connected_with.lock().unwrap() = Some(access_token.expose_secret().clone());
            *self.state.lock().unwrap() = TransportState::Open;
        }
    }

    async fn identity_against(server: &MockServer) -> IdentityClient {
        IdentityClient::with_base_url("cid", Secret::new("secret".to_string()), server.uri())
    }

    #[tokio::test]
    async fn recovery_disconnects_refreshes_and_reconnects() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "fresh-access",
                "expires_in": 3600,
            })))
            .mount(&server)
            .await;

        let client = Arc::new(FakeClient {
            state: StdMutex::new(TransportState::Open),
            connected_with: StdMutex::new(None),
            disconnect_calls: StdMutex::new(0),
        });
        let coordinator = RecoveryCoordinator::new(
            identity_against(&server).await,
            client.clone(),
            Secret::new("old-refresh".to_string()),
        );

        let recovered = coordinator.handle_disconnect(DisconnectReason::AuthExpired).await.unwrap();
        assert!(recovered);
        assert_eq!(*client.disconnect_calls.lock().unwrap(), 1);
        assert_eq!(client.connected_with.lock().unwrap().clone(), Some("fresh-access".to_string()));
    }

    #[tokio::test]
    async fn requested_disconnect_skips_recovery() {
        let server = MockServer::start().await;
        let client = Arc::new(FakeClient {
            state: StdMutex::new(TransportState::Disconnected),
            connected_with: StdMutex::new(None),
            disconnect_calls: StdMutex::new(0),
        });
        let coordinator = RecoveryCoordinator::new(
            identity_against(&server).await,
            client.clone(),
            Secret::new("old-refresh".to_string()),
        );

        let recovered = coordinator.handle_disconnect(DisconnectReason::Requested).await.unwrap();
        assert!(!recovered);
        assert!(client.connected_with.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn rotated_refresh_token_is_cached_for_next_recovery() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "fresh-access",
                "refresh_token": "rotated-refresh",
                "expires_in": 3600,
            })))
            .mount(&server)
            .await;

        let client = Arc::new(FakeClient {
            state: StdMutex::new(TransportState::Disconnected),
            connected_with: StdMutex::new(None),
            disconnect_calls: StdMutex::new(0),
        });
        let coordinator = RecoveryCoordinator::new(
            identity_against(&server).await,
            client,
            Secret::new("old-refresh".to_string()),
        );

        coordinator.handle_disconnect(DisconnectReason::Timeout).await.unwrap();
        let secrets = coordinator.secrets.lock().await;
        assert_eq!(
            secrets.get(REFRESH_TOKEN_RESOURCE).unwrap().expose_secret(),
            "rotated-refresh"
        );
    }
}
