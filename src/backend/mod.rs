//! Backend protocol
//!
//! Token exchange, paginated ledger retrieval and form definition lookup,
//! all over the [`Transport`] seam.

pub mod auth;
pub mod forms;
pub mod ledger;
pub mod transport;

pub use auth::{acquire_token, AccessToken};
pub use forms::{FormCache, FormResolver};
pub use ledger::{Ledger, LedgerFetcher, SkippedPage};
pub use transport::{HttpTransport, Reply, Transport};
