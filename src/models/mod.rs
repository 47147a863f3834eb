//! Core data models
//!
//! Ledger records, decrypted response trees and form definitions.

pub mod form;
pub mod record;
pub mod response;

pub use form::{FormDefinition, FormKey, FormNode, ItemFields, ReconciledItem};
pub use record::{DecryptedResponse, RecordMeta, TransferRecord, META_COLUMNS};
pub use response::{ResponseDocument, ResponseNode};
