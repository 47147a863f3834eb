//! Cryptography for the downloader
//!
//! Hybrid credential encryption for the token exchange, RS256 verification of
//! signed ledger pages, and CMS enveloped-data decryption of record bodies.

pub mod ber;
pub mod credentials;
pub mod envelope;
pub mod keys;
pub mod secret;
pub mod signature;

pub use credentials::{encrypt_credentials, Credentials, HybridPayload};
pub use envelope::EnvelopeDecryptor;
pub use keys::{load_private_key, load_public_key};
pub use secret::SecretString;
pub use signature::SignatureVerifier;
