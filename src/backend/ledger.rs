//! Paginated ledger retrieval
//!
//! Page 1 tells us how many pages exist; pages 2..N are then requested all at
//! once. Every page's `cTransferList` is a signed token whose payload is the
//! JSON array of records on that page. A page that cannot be fetched or
//! verified counts as empty.

use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, warn};

use super::auth::AccessToken;
use super::transport::Transport;
use crate::crypto::SignatureVerifier;
use crate::error::{DownloadError, DownloadResult};
use crate::models::TransferRecord;

/// A page that contributed no records, and why
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPage {
    pub page: u32,
    pub reason: String,
}

/// The merged ledger
#[derive(Debug, Default)]
pub struct Ledger {
    /// Records in page order, then in-page order
    pub records: Vec<TransferRecord>,
    pub total_pages: u32,
    pub skipped_pages: Vec<SkippedPage>,
}

struct Page {
    total_pages: u32,
    /// Records, or why the signed list was unusable
    records: DownloadResult<Vec<TransferRecord>>,
}

/// Fetches the ledger pages of one session
pub struct LedgerFetcher<'a> {
    transport: &'a dyn Transport,
    base_url: &'a str,
    route: &'a str,
    token: &'a AccessToken,
    verifier: &'a SignatureVerifier,
}

impl<'a> LedgerFetcher<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        base_url: &'a str,
        route: &'a str,
        token: &'a AccessToken,
        verifier: &'a SignatureVerifier,
    ) -> Self {
        Self {
            transport,
            base_url,
            route: route.trim_matches('/'),
            token,
            verifier,
        }
    }

    pub fn page_url(&self, page: u32) -> String {
        format!("{}/{}?page={}", self.base_url, self.route, page)
    }

    /// Fetch every page and merge the records in page order
    pub async fn fetch_all(&self) -> Ledger {
        let mut ledger = Ledger::default();

        let total_pages = match self.fetch_page(1).await {
            Ok(first) => {
                ledger.absorb(1, first.records);
                first.total_pages
            }
            Err(e) => {
                ledger.absorb(1, Err(e));
                return ledger;
            }
        };
        ledger.total_pages = total_pages.max(1);

        let rest = (2..=total_pages).map(|n| async move { (n, self.fetch_page(n).await) });
        for (n, result) in join_all(rest).await {
            ledger.absorb(n, result.and_then(|page| page.records));
        }

        ledger
    }

    async fn fetch_page(&self, page: u32) -> DownloadResult<Page> {
        let reply = self
            .transport
            .get(&self.page_url(page), Some(self.token.as_str()))
            .await?;
        if !reply.is_ok() {
            return Err(DownloadError::Network(format!("HTTP {}", reply.status)));
        }

        let body: Value = reply.json()?;
        let total_pages = read_page_count(body.get("totalPages"));
        let token = body
            .get("cTransferList")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let records = self
            .verifier
            .verify(token)
            .and_then(|payload| parse_records(&payload));
        debug!(page, total_pages, ok = records.is_ok(), "Ledger page");

        Ok(Page {
            total_pages,
            records,
        })
    }
}

impl Ledger {
    fn absorb(&mut self, page: u32, records: DownloadResult<Vec<TransferRecord>>) {
        match records {
            Ok(records) => self.records.extend(records),
            Err(e) => {
                warn!(page, error = %e, "Ledger page skipped");
                self.skipped_pages.push(SkippedPage {
                    page,
                    reason: e.to_string(),
                });
            }
        }
    }
}

fn read_page_count(value: Option<&Value>) -> u32 {
    match value {
        Some(Value::Number(n)) => n.as_u64().map_or(0, |n| n.min(u32::MAX as u64) as u32),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Parse a verified payload into records
///
/// The payload may be double-encoded (a JSON string holding the array).
/// Entries that do not look like records are dropped with a warning.
pub fn parse_records(payload: &str) -> DownloadResult<Vec<TransferRecord>> {
    let value = match serde_json::from_str::<Value>(payload)? {
        Value::String(inner) => serde_json::from_str(&inner)?,
        other => other,
    };

    let Value::Array(entries) = value else {
        return Err(DownloadError::Json("record list is not an array".into()));
    };

    let mut records = Vec::with_capacity(entries.len());
    for entry in entries {
        match serde_json::from_value::<TransferRecord>(entry) {
            Ok(record) => records.push(record),
            Err(e) => warn!(error = %e, "Dropping malformed ledger entry"),
        }
    }
    Ok(records)
}
