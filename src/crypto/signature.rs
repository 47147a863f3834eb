//! Signed page verification
//!
//! Ledger pages arrive as compact JWS tokens signed RS256. Depending on the
//! deployment the signer is the backend key or the downloader's own key pair,
//! so a page is accepted if it verifies against any trusted key. Only the
//! signature is checked; the payload is a JSON document, not a set of
//! registered claims. Callers treat a page that fails here as empty.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{crypto, decode_header, Algorithm, DecodingKey};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::error::{DownloadError, DownloadResult};

/// Verifies page signatures against a set of trusted public keys
pub struct SignatureVerifier {
    keys: Vec<DecodingKey>,
}

impl SignatureVerifier {
    /// Build a verifier from a PEM public key (SPKI or PKCS#1)
    pub fn from_pem(public_key_pem: &str) -> DownloadResult<Self> {
        let key = DecodingKey::from_rsa_pem(public_key_pem.trim().as_bytes())
            .map_err(|e| DownloadError::Key(format!("Invalid signing key: {}", e)))?;
        Ok(Self { keys: vec![key] })
    }

    /// Also trust `key`
    pub fn with_public_key(mut self, key: &RsaPublicKey) -> DownloadResult<Self> {
        let n = URL_SAFE_NO_PAD.encode(key.n().to_bytes_be());
        let e = URL_SAFE_NO_PAD.encode(key.e().to_bytes_be());
        let key = DecodingKey::from_rsa_components(&n, &e)
            .map_err(|e| DownloadError::Key(format!("Invalid signing key: {}", e)))?;
        self.keys.push(key);
        Ok(self)
    }

    /// Also trust the public half of `key`
    pub fn with_private_key(self, key: &RsaPrivateKey) -> DownloadResult<Self> {
        self.with_public_key(&RsaPublicKey::from(key))
    }

    /// Verify a token and return its payload text
    pub fn verify(&self, token: &str) -> DownloadResult<String> {
        let token = token.trim();
        let parts: Vec<&str> = token.split('.').collect();
        let [header, payload, signature] = parts.as_slice() else {
            return Err(DownloadError::SignatureInvalid(format!(
                "expected 3 segments, found {}",
                parts.len()
            )));
        };

        let alg = decode_header(token)
            .map_err(|e| DownloadError::SignatureInvalid(e.to_string()))?
            .alg;
        if alg != Algorithm::RS256 {
            return Err(DownloadError::SignatureInvalid(format!(
                "unexpected algorithm {:?}",
                alg
            )));
        }

        let message = format!("{}.{}", header, payload);
        let mut last_error = None;
        let mut valid = false;
        for key in &self.keys {
            match crypto::verify(signature, message.as_bytes(), key, Algorithm::RS256) {
                Ok(true) => {
                    valid = true;
                    break;
                }
                Ok(false) => {}
                Err(e) => last_error = Some(e),
            }
        }
        if !valid {
            let reason = match last_error {
                Some(e) => e.to_string(),
                None => "signature does not match".into(),
            };
            return Err(DownloadError::SignatureInvalid(reason));
        }

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| DownloadError::SignatureInvalid(format!("bad payload encoding: {}", e)))?;
        String::from_utf8(bytes)
            .map_err(|e| DownloadError::SignatureInvalid(format!("payload is not UTF-8: {}", e)))
    }
}
