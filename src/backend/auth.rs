//! Token exchange
//!
//! One POST to `{url}/auth` carrying the hybrid-encrypted credentials. There is
//! no retry; any failure here ends the run.

use std::fmt;

use rsa::RsaPublicKey;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::transport::Transport;
use crate::crypto::{encrypt_credentials, Credentials, SecretString};
use crate::error::{DownloadError, DownloadResult, FailureReason};

/// Bearer token for one retrieval session
#[derive(Clone)]
pub struct AccessToken(SecretString);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::new(token))
    }

    pub fn as_str(&self) -> &str {
        self.0.expose()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}

#[derive(Serialize)]
struct AuthRequest<'a> {
    encrypted_creds: &'a str,
    encrypted_key: &'a str,
    iv: &'a str,
    #[serde(rename = "encryptedWithForge")]
    encrypted_with_forge: bool,
}

#[derive(Deserialize)]
struct AuthReply {
    access_token: String,
}

/// Exchange username and password for a bearer token
pub async fn acquire_token(
    transport: &dyn Transport,
    base_url: &str,
    username: &str,
    password: &SecretString,
    public_key: &RsaPublicKey,
) -> DownloadResult<AccessToken> {
    let credentials = Credentials::new(username, password.expose());
    let payload = encrypt_credentials(&credentials, public_key)?;

    let body = serde_json::to_value(AuthRequest {
        encrypted_creds: &payload.cipher_text,
        encrypted_key: &payload.encrypted_symmetric_key,
        iv: &payload.iv,
        encrypted_with_forge: false,
    })?;

    let reply = transport
        .post_json(&format!("{}/auth", base_url), &body)
        .await?;
    debug!(status = reply.status, "Auth reply");

    if !reply.is_ok() {
        return Err(DownloadError::Auth {
            reason: FailureReason::from_status(reply.status),
        });
    }

    let parsed: AuthReply = reply
        .json()
        .map_err(|e| DownloadError::Json(format!("Token reply without access_token: {}", e)))?;
    Ok(AccessToken::new(parsed.access_token))
}
