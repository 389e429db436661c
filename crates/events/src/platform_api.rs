//! Twitch Helix client port for the one upstream call the pipeline drives
//! itself: channel-points redemption cancellation (§4.4, §6), used to
//! refund points when content policy rejects a redemption's text.

use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use ttsrelay_protocol::PLATFORM_API_TIMEOUT_MS;

use crate::error::{Context, Error, Result};

const HELIX_BASE: &str = "https://api.twitch.tv/helix";

/// The upstream operation the redemption state machine needs (§4.4). A
/// trait boundary so tests can substitute a fake instead of hitting the
/// network, matching the `TtsSynthesizer`/`EventBus` port pattern elsewhere
/// in this workspace.
#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// Cancel an unfulfilled redemption, refunding the viewer's points.
    async fn cancel_redemption(
        &self,
        broadcaster_id: &str,
        reward_id: &str,
        redemption_id: &str,
        broadcaster_token: &Secret<String>,
    ) -> Result<()>;
}

/// reqwest-based Helix client (§6).
pub struct HelixPlatformApi {
    client: reqwest::Client,
    base_url: String,
    client_id: String,
}

impl HelixPlatformApi {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: HELIX_BASE.to_string(),
            client_id: client_id.into(),
        }
    }

    #[cfg(test)]
    fn with_base_url(client_id: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            client_id: client_id.into(),
        }
    }
}

#[async_trait]
impl PlatformApi for HelixPlatformApi {
    async fn cancel_redemption(
        &self,
        broadcaster_id: &str,
        reward_id: &str,
        redemption_id: &str,
        broadcaster_token: &Secret<String>,
    ) -> Result<()> {
        let url = format!(
            "{}/channel_points/custom_rewards/redemptions?broadcaster_id={}&reward_id={}&id={}",
            self.base_url,
            urlencoding::encode(broadcaster_id),
            urlencoding::encode(reward_id),
            urlencoding::encode(redemption_id),
        );
        let response = self
            .client
            .patch(url)
            .bearer_auth(broadcaster_token.expose_secret())
            .header("Client-Id", &self.client_id)
            .json(&serde_json::json!({ "status": "CANCELED" }))
            .timeout(std::time::Duration::from_millis(PLATFORM_API_TIMEOUT_MS))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Message(format!(
                "redemption cancel failed ({status}): {body}"
            )))
            .context("canceling redemption upstream");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use wiremock::{
        matchers::{header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;

    #[tokio::test]
    async fn cancel_redemption_sends_patch_with_canceled_status() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/channel_points/custom_rewards/redemptions"))
            .and(header("Client-Id", "cid"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
            .mount(&server)
            .await;

        let client = HelixPlatformApi::with_base_url("cid", server.uri());
        let secret = Secret::new("tok".to_string());
        client
            .cancel_redemption("b", "r", "x", &secret)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = HelixPlatformApi::with_base_url("cid", server.uri());
        let secret = Secret::new("tok".to_string());
        assert!(client.cancel_redemption("b", "r", "x", &secret).await.is_err());
    }
}
