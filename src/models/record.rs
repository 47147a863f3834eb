//! Ledger records
//!
//! A [`TransferRecord`] is one entry of the remote response ledger. Its
//! encrypted body is split off before decryption so the metadata can travel
//! on without it.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::form::FormKey;
use super::response::ResponseDocument;

/// Column names of the metadata block that leads every exported row
pub const META_COLUMNS: [&str; 6] = [
    "UUID",
    "SubjectId",
    "QuestionnaireId",
    "Version",
    "AbsendeDatum",
    "ErhaltenDatum",
];

/// One entry of the remote ledger, as delivered inside a signed page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRecord {
    #[serde(rename = "UUID", deserialize_with = "lenient_text")]
    pub uuid: String,
    #[serde(rename = "SubjectId", default, deserialize_with = "lenient_text")]
    pub subject_id: String,
    #[serde(rename = "QuestionnaireId", deserialize_with = "lenient_text")]
    pub form_id: String,
    #[serde(rename = "Version", deserialize_with = "lenient_text")]
    pub version: String,
    /// PEM body (headers stripped) of an enveloped-data message
    #[serde(rename = "JSON", deserialize_with = "lenient_text")]
    pub encrypted_body: String,
    #[serde(rename = "AbsendeDatum", default, deserialize_with = "lenient_text")]
    pub sent_date: String,
    #[serde(rename = "ErhaltenDatum", default, deserialize_with = "lenient_text")]
    pub received_date: String,
}

impl TransferRecord {
    /// Split the record into its metadata and the encrypted body
    pub fn into_parts(self) -> (RecordMeta, String) {
        let meta = RecordMeta {
            uuid: self.uuid,
            subject_id: self.subject_id,
            form_id: self.form_id,
            version: self.version,
            sent_date: self.sent_date,
            received_date: self.received_date,
        };
        (meta, self.encrypted_body)
    }
}

/// Record metadata without the encrypted body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordMeta {
    pub uuid: String,
    pub subject_id: String,
    pub form_id: String,
    pub version: String,
    pub sent_date: String,
    pub received_date: String,
}

impl RecordMeta {
    /// The form key this record belongs to
    pub fn form_key(&self) -> FormKey {
        FormKey::new(self.form_id.clone(), self.version.clone())
    }

    /// Metadata values in [`META_COLUMNS`] order
    pub fn values(&self) -> [&str; 6] {
        [
            self.uuid.as_str(),
            self.subject_id.as_str(),
            self.form_id.as_str(),
            self.version.as_str(),
            self.sent_date.as_str(),
            self.received_date.as_str(),
        ]
    }
}

/// A record after envelope decryption
///
/// `body` is `None` when decryption failed; the record is still carried so it
/// can be counted and reported.
#[derive(Debug, Clone)]
pub struct DecryptedResponse {
    pub meta: RecordMeta,
    pub body: Option<ResponseDocument>,
}

impl DecryptedResponse {
    pub fn is_decrypted(&self) -> bool {
        self.body.is_some()
    }
}

/// Accept strings, numbers, booleans and null for text fields
fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}
