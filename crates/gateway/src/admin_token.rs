//! Signed bearer tokens for the admin HTTP surface and the overlay
//! WebSocket surface (§4.3, §6): a compact HMAC-SHA256-signed payload,
//! specialized per surface by an `aud` (audience) claim so a token minted
//! for one surface can't be replayed against the other.

use base64::Engine;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, Secret};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_ISSUER: &str = "ttsrelay";
const ADMIN_AUDIENCE: &str = "admin";
const OVERLAY_AUDIENCE: &str = "overlay";

fn sign(payload_b64: &str, secret: &Secret<String>) -> Result<String, ()> {
    let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes()).map_err(|_| ())?;
    mac.update(payload_b64.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn encode<T: Serialize>(claims: &T, secret: &Secret<String>) -> String {
    let payload = serde_json::to_vec(claims).unwrap_or_default();
    let payload_b64 = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&payload);
    let sig = sign(&payload_b64, secret).unwrap_or_default();
    format!("{payload_b64}.{sig}")
}

fn decode<T: DeserializeOwned>(token: &str, secret: &Secret<String>) -> Result<T, ()> {
    let (payload_b64, sig) = token.split_once('.').ok_or(())?;
    let expected_sig = sign(payload_b64, secret)?;
    if !constant_time_eq(&expected_sig, sig) {
        return Err(());
    }
    let payload = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| ())?;
    serde_json::from_slice(&payload).map_err(|_| ())
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(rename(serialize = "userLogin", deserialize = "userLogin"))]
    user_login: String,
    aud: String,
    iss: String,
    exp: i64,
}

/// Mint a token for `user_login`, valid until `expires_at_secs` (epoch
/// seconds).
pub fn issue(user_login: &str, expires_at_secs: i64, secret: &Secret<String>) -> String {
    let claims = Claims {
        user_login: user_login.to_string(),
        aud: ADMIN_AUDIENCE.to_string(),
        iss: TOKEN_ISSUER.to_string(),
        exp: expires_at_secs,
    };
    encode(&claims, secret)
}

/// Verify a token's signature, issuer, audience and expiry, and that its
/// `userLogin` claim equals `expected_login` (§4.3).
pub fn verify(token: &str, expected_login: &str, secret: &Secret<String>, now_secs: i64) -> Result<(), ()> {
    let claims: Claims = decode(token, secret)?;
    if claims.iss != TOKEN_ISSUER || claims.aud != ADMIN_AUDIENCE {
        return Err(());
    }
    if claims.exp < now_secs {
        return Err(());
    }
    if claims.user_login != expected_login {
        return Err(());
    }
    Ok(())
}

#[derive(Debug, Serialize, Deserialize)]
struct OverlayClaims {
    channel: String,
    aud: String,
    iss: String,
    exp: i64,
}

/// Mint an overlay WebSocket token scoped to `channel`, valid until
/// `expires_at_secs` (§4.3).
pub fn issue_overlay_token(channel: &str, expires_at_secs: i64, secret: &Secret<String>) -> String {
    let claims = OverlayClaims {
        channel: channel.to_string(),
        aud: OVERLAY_AUDIENCE.to_string(),
        iss: TOKEN_ISSUER.to_string(),
        exp: expires_at_secs,
    };
    encode(&claims, secret)
}

/// Verify an overlay token's signature, issuer, audience and expiry, and
/// that its `channel` claim equals `expected_channel` (§4.3).
pub fn verify_overlay_token(
    token: &str,
    expected_channel: &str,
    secret: &Secret<String>,
    now_secs: i64,
) -> Result<(), ()> {
    let claims: OverlayClaims = decode(token, secret)?;
    if claims.iss != TOKEN_ISSUER || claims.aud != OVERLAY_AUDIENCE {
        return Err(());
    }
    if claims.exp < now_secs {
        return Err(());
    }
    if claims.channel != expected_channel {
        return Err(());
    }
    Ok(())
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret() -> Secret<String> {
        Secret::new("admin-secret".to_string())
    }

    #[test]
    fn valid_token_for_matching_login_is_accepted() {
        let token = issue("streamer", 2_000_000_000, &secret());
        assert!(verify(&token, "streamer", &secret(), 1_000_000_000).is_ok());
    }

    #[test]
    fn token_for_a_different_login_is_rejected() {
        let token = issue("streamer", 2_000_000_000, &secret());
        assert!(verify(&token, "someoneelse", &secret(), 1_000_000_000).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = issue("streamer", 1_000, &secret());
        assert!(verify(&token, "streamer", &secret(), 2_000, ).is_err());
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let mut token = issue("streamer", 2_000_000_000, &secret());
        token.push('x');
        assert!(verify(&token, "streamer", &secret(), 1_000_000_000).is_err());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue("streamer", 2_000_000_000, &secret());
        assert!(verify(&token, "streamer", &Secret::new("wrong".to_string()), 1_000_000_000).is_err());
    }

    #[test]
    fn valid_overlay_token_for_matching_channel_is_accepted() {
        let token = issue_overlay_token("streamer", 2_000_000_000, &secret());
        assert!(verify_overlay_token(&token, "streamer", &secret(), 1_000_000_000).is_ok());
    }

    #[test]
    fn overlay_token_for_a_different_channel_is_rejected() {
        let token = issue_overlay_token("streamer", 2_000_000_000, &secret());
        assert!(verify_overlay_token(&token, "otherchannel", &secret(), 1_000_000_000).is_err());
    }

    #[test]
    fn admin_token_is_rejected_as_an_overlay_token() {
        let token = issue("streamer", 2_000_000_000, &secret());
        assert!(verify_overlay_token(&token, "streamer", &secret(), 1_000_000_000).is_err());
    }

    #[test]
    fn overlay_token_is_rejected_as_an_admin_token() {
        let token = issue_overlay_token("streamer", 2_000_000_000, &secret());
        assert!(verify(&token, "streamer", &secret(), 1_000_000_000).is_err());
    }
}
