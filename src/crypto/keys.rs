//! RSA key loading
//!
//! Keys are handed over as PEM text. Public keys may be SPKI (`PUBLIC KEY`)
//! or PKCS#1 (`RSA PUBLIC KEY`); private keys PKCS#1 (`RSA PRIVATE KEY`) or
//! unencrypted PKCS#8 (`PRIVATE KEY`).

use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::error::{DownloadError, DownloadResult};

/// Parse a PEM-encoded RSA public key
pub fn load_public_key(pem: &str) -> DownloadResult<RsaPublicKey> {
    let pem = pem.trim();
    let parsed = if pem.contains("BEGIN RSA PUBLIC KEY") {
        RsaPublicKey::from_pkcs1_pem(pem).map_err(|e| e.to_string())
    } else {
        RsaPublicKey::from_public_key_pem(pem).map_err(|e| e.to_string())
    };
    parsed.map_err(|e| DownloadError::Key(format!("Invalid public key: {}", e)))
}

/// Parse a PEM-encoded RSA private key
pub fn load_private_key(pem: &str) -> DownloadResult<RsaPrivateKey> {
    let pem = pem.trim();
    if pem.contains("BEGIN ENCRYPTED PRIVATE KEY") {
        return Err(DownloadError::Key(
            "Password-protected private keys are not supported".into(),
        ));
    }
    let parsed = if pem.contains("BEGIN RSA PRIVATE KEY") {
        RsaPrivateKey::from_pkcs1_pem(pem).map_err(|e| e.to_string())
    } else {
        RsaPrivateKey::from_pkcs8_pem(pem).map_err(|e| e.to_string())
    };
    parsed.map_err(|e| DownloadError::Key(format!("Invalid private key: {}", e)))
}
