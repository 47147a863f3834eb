//! Hybrid credential encryption
//!
//! The credential JSON is base64-encoded, the base64 text is encrypted with a
//! fresh AES-256-CBC key, and that key is wrapped with the backend's RSA key
//! (PKCS#1 v1.5). The backend expects exactly this layering.

use aes::cipher::{block_padding::Pkcs7, BlockEncryptMut, KeyIvInit};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{DownloadError, DownloadResult};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;

/// Size of the AES-256 key in bytes
pub const KEY_SIZE: usize = 32;

/// Size of the CBC initialization vector in bytes
pub const IV_SIZE: usize = 16;

/// Plaintext credentials for one token request
#[derive(Serialize, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    #[serde(rename = "ApiID")]
    id: String,
    #[serde(rename = "ApiKey")]
    secret: String,
    /// Milliseconds since the Unix epoch
    #[serde(rename = "CurrentDate")]
    timestamp: String,
}

impl Credentials {
    /// Credentials stamped with the current time
    pub fn new(id: impl Into<String>, secret: impl Into<String>) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self::with_timestamp(id, secret, now.to_string())
    }

    pub fn with_timestamp(
        id: impl Into<String>,
        secret: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            secret: secret.into(),
            timestamp: timestamp.into(),
        }
    }

    fn to_json(&self) -> DownloadResult<Zeroizing<String>> {
        serde_json::to_string(self)
            .map(Zeroizing::new)
            .map_err(|e| DownloadError::Encryption(format!("Failed to serialize credentials: {}", e)))
    }
}

/// Wire form of the encrypted credentials, all fields base64
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HybridPayload {
    pub cipher_text: String,
    pub encrypted_symmetric_key: String,
    pub iv: String,
}

/// Encrypt credentials for the backend holding `public_key`
pub fn encrypt_credentials(
    credentials: &Credentials,
    public_key: &RsaPublicKey,
) -> DownloadResult<HybridPayload> {
    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    let mut iv = [0u8; IV_SIZE];
    OsRng.fill_bytes(key.as_mut_slice());
    OsRng.fill_bytes(&mut iv);

    let json = credentials.to_json()?;
    let encoded = Zeroizing::new(STANDARD.encode(json.as_bytes()));

    let cipher = Aes256CbcEnc::new_from_slices(key.as_slice(), &iv)
        .map_err(|e| DownloadError::Encryption(format!("Failed to create cipher: {}", e)))?;
    let cipher_text = cipher.encrypt_padded_vec_mut::<Pkcs7>(encoded.as_bytes());

    let wrapped_key = public_key
        .encrypt(&mut OsRng, Pkcs1v15Encrypt, key.as_slice())
        .map_err(|e| DownloadError::Encryption(format!("Failed to wrap symmetric key: {}", e)))?;

    Ok(HybridPayload {
        cipher_text: STANDARD.encode(cipher_text),
        encrypted_symmetric_key: STANDARD.encode(wrapped_key),
        iv: STANDARD.encode(iv),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::{load_private_key, load_public_key};
    use crate::testing::{BACKEND_PRIVATE_PEM, BACKEND_PUBLIC_PEM};
    use aes::cipher::BlockDecryptMut;

    type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

    fn encrypt_sample() -> HybridPayload {
        let public_key = load_public_key(BACKEND_PUBLIC_PEM).unwrap();
        let credentials = Credentials::with_timestamp("downloader", "s3cr\"et", "1700000000000");
        encrypt_credentials(&credentials, &public_key).unwrap()
    }

    #[test]
    fn test_key_and_iv_sizes() {
        let payload = encrypt_sample();
        let private_key = load_private_key(BACKEND_PRIVATE_PEM).unwrap();

        let wrapped = STANDARD.decode(&payload.encrypted_symmetric_key).unwrap();
        let key = private_key.decrypt(Pkcs1v15Encrypt, &wrapped).unwrap();

        assert_eq!(key.len(), KEY_SIZE);
        assert_eq!(STANDARD.decode(&payload.iv).unwrap().len(), IV_SIZE);
    }

    #[test]
    fn test_round_trip_through_base64_layer() {
        let payload = encrypt_sample();
        let private_key = load_private_key(BACKEND_PRIVATE_PEM).unwrap();

        let key = private_key
            .decrypt(
                Pkcs1v15Encrypt,
                &STANDARD.decode(&payload.encrypted_symmetric_key).unwrap(),
            )
            .unwrap();
        let iv = STANDARD.decode(&payload.iv).unwrap();
        let cipher_text = STANDARD.decode(&payload.cipher_text).unwrap();

        let inner = Aes256CbcDec::new_from_slices(&key, &iv)
            .unwrap()
            .decrypt_padded_vec_mut::<Pkcs7>(&cipher_text)
            .unwrap();
        let json = STANDARD.decode(inner).unwrap();

        assert_eq!(
            String::from_utf8(json).unwrap(),
            r#"{"ApiID":"downloader","ApiKey":"s3cr\"et","CurrentDate":"1700000000000"}"#
        );
    }

    #[test]
    fn test_fresh_key_per_request() {
        let first = encrypt_sample();
        let second = encrypt_sample();

        assert_ne!(first.iv, second.iv);
        assert_ne!(first.cipher_text, second.cipher_text);
    }

    #[test]
    fn test_timestamp_is_milliseconds() {
        let credentials = Credentials::new("a", "b");
        let json = credentials.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let stamp: i64 = value["CurrentDate"].as_str().unwrap().parse().unwrap();
        assert!(stamp > 1_600_000_000_000);
    }
}
