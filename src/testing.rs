//! Shared fixtures for unit tests

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine,
};
use cms::builder::{
    ContentEncryptionAlgorithm, EnvelopedDataBuilder, KeyEncryptionInfo,
    KeyTransRecipientInfoBuilder,
};
use cms::cert::x509::ext::pkix::SubjectKeyIdentifier;
use cms::content_info::ContentInfo;
use cms::enveloped_data::RecipientIdentifier;
use der::asn1::OctetString;
use der::{Any, Encode};
use jsonwebtoken::{Algorithm, EncodingKey};
use rand::rngs::OsRng;
use rsa::RsaPublicKey;
use serde_json::Value;

use crate::backend::{Reply, Transport};
use crate::error::{DownloadError, DownloadResult};

pub const BACKEND_PRIVATE_PEM: &str = include_str!("../tests/fixtures/backend_private.pem");
pub const BACKEND_PUBLIC_PEM: &str = include_str!("../tests/fixtures/backend_public.pem");
pub const CLIENT_PRIVATE_PEM: &str = include_str!("../tests/fixtures/client_private.pem");
pub const OPENSSL_ENVELOPE_PEM: &str = include_str!("../tests/fixtures/openssl_envelope.pem");
pub const STREAMED_ENVELOPE_PEM: &str = include_str!("../tests/fixtures/streamed_envelope.pem");
pub const SEGMENTED_ENVELOPE_PEM: &str = include_str!("../tests/fixtures/segmented_envelope.pem");

/// Sign `payload` as a compact RS256 token with the backend key
pub fn sign_payload(payload: &str) -> String {
    sign_payload_with(payload, BACKEND_PRIVATE_PEM)
}

/// Sign `payload` as a compact RS256 token with `private_key_pem`
pub fn sign_payload_with(payload: &str, private_key_pem: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","typ":"JWT"}"#);
    let message = format!("{}.{}", header, URL_SAFE_NO_PAD.encode(payload));
    let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes()).unwrap();
    let signature = jsonwebtoken::crypto::sign(message.as_bytes(), &key, Algorithm::RS256).unwrap();
    format!("{}.{}", message, signature)
}

/// Encrypt `content` for `recipient` and return the armor-stripped body
pub fn seal_envelope(content: &[u8], recipient: &RsaPublicKey) -> String {
    let mut key_rng = OsRng;
    let mut content_rng = OsRng;
    let rid = RecipientIdentifier::SubjectKeyIdentifier(SubjectKeyIdentifier(
        OctetString::new(vec![0x42; 20]).unwrap(),
    ));
    let ktri = KeyTransRecipientInfoBuilder::new(
        rid,
        KeyEncryptionInfo::Rsa(recipient.clone()),
        &mut key_rng,
    )
    .unwrap();

    let mut builder =
        EnvelopedDataBuilder::new(None, content, ContentEncryptionAlgorithm::Aes256Cbc, None)
            .unwrap();
    let enveloped = builder
        .add_recipient_info(ktri)
        .unwrap()
        .build_with_rng(&mut content_rng)
        .unwrap();

    let info = ContentInfo {
        content_type: const_oid::db::rfc5911::ID_ENVELOPED_DATA,
        content: Any::encode_from(&enveloped).unwrap(),
    };
    STANDARD.encode(info.to_der().unwrap())
}

/// Transport serving canned replies by exact URL
#[derive(Default)]
pub struct FakeTransport {
    replies: HashMap<String, Result<Reply, String>>,
    calls: Mutex<Vec<String>>,
    posted: Mutex<Vec<Value>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, url: &str, status: u16, body: impl Into<String>) -> Self {
        self.replies.insert(url.to_string(), Ok(Reply::new(status, body)));
        self
    }

    pub fn fail(mut self, url: &str, message: &str) -> Self {
        self.replies.insert(url.to_string(), Err(message.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn posted(&self) -> Vec<Value> {
        self.posted.lock().unwrap().clone()
    }

    fn answer(&self, url: &str) -> DownloadResult<Reply> {
        self.calls.lock().unwrap().push(url.to_string());
        match self.replies.get(url) {
            Some(Ok(reply)) => Ok(reply.clone()),
            Some(Err(message)) => Err(DownloadError::Network(message.clone())),
            None => Ok(Reply::new(404, "")),
        }
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get(&self, url: &str, _bearer: Option<&str>) -> DownloadResult<Reply> {
        self.answer(url)
    }

    async fn post_json(&self, url: &str, body: &Value) -> DownloadResult<Reply> {
        self.posted.lock().unwrap().push(body.clone());
        self.answer(url)
    }
}
