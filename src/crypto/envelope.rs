//! Enveloped-data decryption
//!
//! Each ledger record carries a CMS `EnvelopedData` message as the base64 body
//! of a PKCS#7 PEM block, with the armor lines stripped. The content key is
//! wrapped for our RSA key (key transport, PKCS#1 v1.5) and the content is
//! AES-CBC encrypted. Messages may be BER (streamed or segmented); they are
//! normalized to DER before parsing.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, KeyIvInit};
use cms::content_info::ContentInfo;
use cms::enveloped_data::{EnvelopedData, RecipientInfo};
use const_oid::db::{rfc5911, rfc5912};
use der::{Decode, Encode};
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey};
use serde_json::Value;
use zeroize::Zeroizing;

use super::ber;
use crate::error::{DownloadError, DownloadResult};
use crate::models::ResponseDocument;

const PEM_LINE_WIDTH: usize = 64;

/// Decrypts record bodies addressed to one private key
pub struct EnvelopeDecryptor {
    private_key: RsaPrivateKey,
}

impl EnvelopeDecryptor {
    pub fn new(private_key: RsaPrivateKey) -> Self {
        Self { private_key }
    }

    /// Build a decryptor from PEM private key text
    pub fn from_pem(pem: &str) -> DownloadResult<Self> {
        super::keys::load_private_key(pem).map(Self::new)
    }

    /// Decrypt a record body and parse the response tree it carries
    ///
    /// The plaintext is a JSON document whose `data.body` holds the response;
    /// documents without that wrapper are taken as the response itself.
    pub fn decrypt_response(&self, body: &str) -> DownloadResult<ResponseDocument> {
        let plaintext = self.decrypt(body)?;
        let mut document: Value = serde_json::from_slice(&plaintext)
            .map_err(|e| DownloadError::Decryption(format!("content is not JSON: {}", e)))?;

        let response = match document.pointer_mut("/data/body") {
            Some(inner) => inner.take(),
            None => document,
        };
        serde_json::from_value(response)
            .map_err(|e| DownloadError::Decryption(format!("unexpected response shape: {}", e)))
    }

    /// Decrypt a record body to its raw plaintext
    pub fn decrypt(&self, body: &str) -> DownloadResult<Vec<u8>> {
        let der = ber::to_der(&unarmor(body)?)?;
        let info = ContentInfo::from_der(&der).map_err(decryption_error)?;
        if info.content_type != rfc5911::ID_ENVELOPED_DATA {
            return Err(DownloadError::Decryption(format!(
                "not an enveloped-data message ({})",
                info.content_type
            )));
        }
        let enveloped =
            EnvelopedData::from_der(&info.content.to_der().map_err(decryption_error)?)
                .map_err(decryption_error)?;

        let content_key = self.unwrap_content_key(&enveloped)?;
        decrypt_content(&enveloped, &content_key)
    }

    /// Try every key-transport recipient until one unwraps with our key
    fn unwrap_content_key(&self, enveloped: &EnvelopedData) -> DownloadResult<Zeroizing<Vec<u8>>> {
        for recipient in enveloped.recip_infos.0.iter() {
            let RecipientInfo::Ktri(ktri) = recipient else {
                continue;
            };
            if ktri.key_enc_alg.oid != rfc5912::RSA_ENCRYPTION {
                continue;
            }
            if let Ok(key) = self
                .private_key
                .decrypt(Pkcs1v15Encrypt, ktri.enc_key.as_bytes())
            {
                return Ok(Zeroizing::new(key));
            }
        }
        Err(DownloadError::Decryption(
            "no recipient matches the private key".into(),
        ))
    }
}

fn decrypt_content(enveloped: &EnvelopedData, key: &[u8]) -> DownloadResult<Vec<u8>> {
    let content = &enveloped.encrypted_content;
    let algorithm = &content.content_enc_alg;
    let iv = algorithm
        .parameters
        .as_ref()
        .ok_or_else(|| DownloadError::Decryption("content cipher has no IV".into()))?
        .value();
    let data = content
        .encrypted_content
        .as_ref()
        .ok_or_else(|| DownloadError::Decryption("message has no content".into()))?
        .as_bytes();

    let oid = algorithm.oid;
    let plaintext = if oid == rfc5911::ID_AES_128_CBC {
        cbc::Decryptor::<aes::Aes128>::new_from_slices(key, iv)
            .map_err(decryption_error)?
            .decrypt_padded_vec_mut::<Pkcs7>(data)
    } else if oid == rfc5911::ID_AES_192_CBC {
        cbc::Decryptor::<aes::Aes192>::new_from_slices(key, iv)
            .map_err(decryption_error)?
            .decrypt_padded_vec_mut::<Pkcs7>(data)
    } else if oid == rfc5911::ID_AES_256_CBC {
        cbc::Decryptor::<aes::Aes256>::new_from_slices(key, iv)
            .map_err(decryption_error)?
            .decrypt_padded_vec_mut::<Pkcs7>(data)
    } else {
        return Err(DownloadError::Decryption(format!(
            "unsupported content cipher {}",
            oid
        )));
    };
    plaintext.map_err(|_| DownloadError::Decryption("bad padding".into()))
}

/// Restore PEM armor around a stripped body and decode it to DER
fn unarmor(body: &str) -> DownloadResult<Vec<u8>> {
    let compact: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(DownloadError::Decryption("empty record body".into()));
    }

    let mut pem = String::with_capacity(compact.len() + compact.len() / PEM_LINE_WIDTH + 64);
    pem.push_str("-----BEGIN PKCS7-----\n");
    for line in compact.as_bytes().chunks(PEM_LINE_WIDTH) {
        // Base64 text is ASCII, so byte chunks stay on char boundaries
        pem.push_str(&String::from_utf8_lossy(line));
        pem.push('\n');
    }
    pem.push_str("-----END PKCS7-----\n");

    let (_label, der) = der::pem::decode_vec(pem.as_bytes()).map_err(decryption_error)?;
    Ok(der)
}

fn decryption_error(err: impl std::fmt::Display) -> DownloadError {
    DownloadError::Decryption(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::load_private_key;
    use crate::models::ResponseNode;
    use crate::testing::{
        seal_envelope, BACKEND_PRIVATE_PEM, CLIENT_PRIVATE_PEM, SEGMENTED_ENVELOPE_PEM,
        OPENSSL_ENVELOPE_PEM, STREAMED_ENVELOPE_PEM,
    };
    use rsa::RsaPublicKey;

    /// Fixture body with its armor lines removed, as delivered by the ledger
    fn stripped(pem: &str) -> String {
        pem.lines().filter(|line| !line.starts_with("-----")).collect()
    }

    fn stripped_fixture() -> String {
        stripped(OPENSSL_ENVELOPE_PEM)
    }

    fn assert_intake_response(response: &ResponseDocument) {
        assert_eq!(
            response.questionnaire.as_deref(),
            Some("https://forms.example.org/Questionnaire/intake|1.0")
        );
        let items = response.items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].link_id(), Some("q1"));
        assert!(matches!(items[1], ResponseNode::Group { .. }));
    }

    #[test]
    fn test_decrypt_openssl_message() {
        let decryptor = EnvelopeDecryptor::from_pem(CLIENT_PRIVATE_PEM).unwrap();
        let response = decryptor.decrypt_response(&stripped_fixture()).unwrap();
        assert_intake_response(&response);
    }

    #[test]
    fn test_decrypt_streamed_ber_message() {
        // Indefinite lengths, content split into several octet strings
        let decryptor = EnvelopeDecryptor::from_pem(CLIENT_PRIVATE_PEM).unwrap();
        let response = decryptor
            .decrypt_response(&stripped(STREAMED_ENVELOPE_PEM))
            .unwrap();
        assert_intake_response(&response);
    }

    #[test]
    fn test_decrypt_segmented_content_message() {
        // Definite lengths, encrypted content as a constructed [0]
        let decryptor = EnvelopeDecryptor::from_pem(CLIENT_PRIVATE_PEM).unwrap();
        let response = decryptor
            .decrypt_response(&stripped(SEGMENTED_ENVELOPE_PEM))
            .unwrap();
        assert_intake_response(&response);
    }

    #[test]
    fn test_wrong_key_fails() {
        let decryptor = EnvelopeDecryptor::from_pem(BACKEND_PRIVATE_PEM).unwrap();
        let err = decryptor.decrypt(&stripped_fixture()).unwrap_err();
        assert!(matches!(err, DownloadError::Decryption(_)));
    }

    #[test]
    fn test_unwrapped_document_is_accepted() {
        let client = load_private_key(CLIENT_PRIVATE_PEM).unwrap();
        let body = seal_envelope(
            br#"{"questionnaire":"urn:form|2","item":[{"linkId":"a","answer":[]}]}"#,
            &RsaPublicKey::from(&client),
        );

        let response = EnvelopeDecryptor::new(client).decrypt_response(&body).unwrap();
        assert_eq!(response.questionnaire.as_deref(), Some("urn:form|2"));
        assert_eq!(response.items().len(), 1);
    }

    #[test]
    fn test_body_with_line_breaks() {
        let client = load_private_key(CLIENT_PRIVATE_PEM).unwrap();
        let body = seal_envelope(b"{}", &RsaPublicKey::from(&client));
        let wrapped: String = body
            .as_bytes()
            .chunks(76)
            .map(|c| format!("{}\r\n", String::from_utf8_lossy(c)))
            .collect();

        let plaintext = EnvelopeDecryptor::new(client).decrypt(&wrapped).unwrap();
        assert_eq!(plaintext, b"{}");
    }

    #[test]
    fn test_garbage_body_fails() {
        let decryptor = EnvelopeDecryptor::from_pem(CLIENT_PRIVATE_PEM).unwrap();
        assert!(decryptor.decrypt("").is_err());
        assert!(decryptor.decrypt("bm90IGEgY21zIG1lc3NhZ2U=").is_err());
    }
}
