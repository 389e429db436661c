//! Identity-provider token exchange (§4.5, §6): refreshing the chat-auth
//! user token and minting app (client-credentials) tokens.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use ttsrelay_protocol::IDENTITY_TIMEOUT_MS;

use crate::error::Result;

const TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";
const REFRESH_MARGIN_SECS: i64 = 300;

#[derive(Debug, Deserialize)]
struct TokenResponseBody {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: i64,
}

/// An access token plus its refresh token (when the grant was
/// `refresh_token`) and absolute expiry, ready to be cached.
#[derive(Clone)]
pub struct IssuedToken {
    pub access_token: Secret<String>,
    pub refresh_token: Option<Secret<String>>,
    pub expires_at: DateTime<Utc>,
}

impl IssuedToken {
    /// True once within [`REFRESH_MARGIN_SECS`] of expiry (§6: "Refresh 5
    /// minutes before expiry").
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at - ChronoDuration::seconds(REFRESH_MARGIN_SECS)
    }
}

impl std::fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedToken")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

pub struct IdentityClient {
    client: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: Secret<String>,
}

impl IdentityClient {
    pub fn new(client_id: impl Into<String>, client_secret: Secret<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: TOKEN_URL.to_string(),
            client_id: client_id.into(),
            client_secret,
        }
    }

    #[cfg(test)]
    fn with_base_url(client_id: impl Into<String>, client_secret: Secret<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            client_id: client_id.into(),
            client_secret,
        }
    }

    async fn exchange(&self, extra: &[(&str, &str)]) -> Result<IssuedToken> {
        let mut form: Vec<(&str, &str)> = vec![
            ("client_id", &self.client_id),
            ("client_secret", self.client_secret.expose_secret()),
        ];
        form.extend_from_slice(extra);

        let response = self
            .client
            .post(&self.base_url)
            .form(&form)
            .timeout(std::time::Duration::from_millis(IDENTITY_TIMEOUT_MS))
            .send()
            .await?;

        let body: TokenResponseBody = response.json().await?;
        Ok(IssuedToken {
            access_token: Secret::new(body.access_token),
            refresh_token: body.refresh_token.map(Secret::new),
            expires_at: Utc::now() + ChronoDuration::seconds(body.expires_in),
        })
    }

    /// Exchange a stored refresh-token for a new user access token (§4.5,
    /// §6). If Twitch rotates the refresh token, the returned
    /// [`IssuedToken::refresh_token`] carries the new version and the
    /// caller must persist it to the secret store.
    pub async fn refresh_user_token(&self, refresh_token: &Secret<String>) -> Result<IssuedToken> {
        self.exchange(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.expose_secret()),
        ])
        .await
    }

    /// Mint an app token via `client_credentials` (§6).
    pub async fn app_token(&self) -> Result<IssuedToken> {
        self.exchange(&[("grant_type", "client_credentials")]).await
    }
}

#[cfg(test)]
mod tests {
    use wiremock::{matchers::method, Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn refresh_user_token_parses_response_and_computes_expiry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "new-access",
                "refresh_token": "new-refresh",
                "expires_in": 3600,
            })))
            .mount(&server)
            .await;

        let client = IdentityClient::with_base_url("cid", Secret::new("secret".to_string()), server.uri());
        let token = client
            .refresh_user_token(&Secret::new("old-refresh".to_string()))
            .await
            .unwrap();

        assert_eq!(token.access_token.expose_secret(), "new-access");
        assert_eq!(
            token.refresh_token.as_ref().map(|s| s.expose_secret().as_str()),
            Some("new-refresh")
        );
        assert!(!token.needs_refresh(Utc::now()));
    }

    #[test]
    fn token_near_expiry_needs_refresh() {
        let token = IssuedToken {
            access_token: Secret::new("a".to_string()),
            refresh_token: None,
            expires_at: Utc::now() + ChronoDuration::seconds(60),
        };
        assert!(token.needs_refresh(Utc::now()));
    }

    #[test]
    fn fresh_token_does_not_need_refresh() {
        let token = IssuedToken {
            access_token: Secret::new("a".to_string()),
            refresh_token: None,
            expires_at: Utc::now() + ChronoDuration::seconds(3600),
        };
        assert!(!token.needs_refresh(Utc::now()));
    }
}
