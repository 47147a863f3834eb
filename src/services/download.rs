//! The download pipeline
//!
//! Token exchange, ledger retrieval, decryption, form resolution,
//! reconciliation, pivoting and packaging, in that order. Only the token
//! exchange and key loading can fail the run; everything later degrades per
//! page, record or form and is accounted for in the [`DownloadReport`].

use serde::Serialize;
use tracing::{info, warn};

use crate::backend::{acquire_token, FormCache, FormResolver, LedgerFetcher, SkippedPage, Transport};
use crate::config::Settings;
use crate::crypto::{
    load_private_key, load_public_key, EnvelopeDecryptor, SecretString, SignatureVerifier,
};
use crate::error::{DownloadResult, FailureReason};
use crate::export::{build_archive_blocking, entry_names, table_bytes, ArchiveEntry, ExportBook};
use crate::models::{DecryptedResponse, FormKey, ReconciledItem};

use super::answers::{extract_answers, flatten_answers, reconcile};

/// Inputs supplied by the operator
#[derive(Debug)]
pub struct DownloadRequest {
    /// API base URL, without trailing slash
    pub base_url: String,
    pub username: String,
    pub password: SecretString,
    /// Backend public key (PEM); verifies pages and encrypts credentials
    pub public_key_pem: String,
    /// Our private key (PEM); opens record envelopes
    pub private_key_pem: String,
}

/// A form definition with one response's answers merged in
#[derive(Debug, Clone, Serialize)]
pub struct ReconciledResponse {
    pub uuid: String,
    pub form_key: FormKey,
    pub items: Vec<ReconciledItem>,
}

/// One file of the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSummary {
    pub file_name: String,
    pub form_key: FormKey,
    pub rows: usize,
    pub columns: usize,
}

/// Outcome of a run
#[derive(Debug)]
pub struct DownloadReport {
    /// The zip archive
    pub archive: Vec<u8>,
    /// Records found in the ledger
    pub record_count: usize,
    /// Records written to a table
    pub exported_count: usize,
    /// UUIDs of records whose envelope could not be opened
    pub decryption_failures: Vec<String>,
    pub unresolved_forms: Vec<(FormKey, FailureReason)>,
    pub skipped_pages: Vec<SkippedPage>,
    pub tables: Vec<TableSummary>,
    pub reconciled: Vec<ReconciledResponse>,
}

/// Runs the pipeline against one backend
pub struct DownloadService<'a> {
    transport: &'a dyn Transport,
    settings: &'a Settings,
}

impl<'a> DownloadService<'a> {
    pub fn new(transport: &'a dyn Transport, settings: &'a Settings) -> Self {
        Self {
            transport,
            settings,
        }
    }

    pub async fn run(&self, request: &DownloadRequest) -> DownloadResult<DownloadReport> {
        let base_url = request.base_url.trim_end_matches('/');
        let public_key = load_public_key(&request.public_key_pem)?;
        let private_key = load_private_key(&request.private_key_pem)?;
        let verifier =
            SignatureVerifier::from_pem(&request.public_key_pem)?.with_private_key(&private_key)?;
        let decryptor = EnvelopeDecryptor::new(private_key);

        info!("(1/7) Requesting token");
        let token = acquire_token(
            self.transport,
            base_url,
            &request.username,
            &request.password,
            &public_key,
        )
        .await?;

        info!("(2/7) Requesting pages");
        let ledger = LedgerFetcher::new(
            self.transport,
            base_url,
            &self.settings.download_route,
            &token,
            &verifier,
        )
        .fetch_all()
        .await;
        let record_count = ledger.records.len();
        info!(records = record_count, pages = ledger.total_pages, "Ledger retrieved");

        info!("(3/7) Decrypting records");
        let mut decryption_failures = Vec::new();
        let responses: Vec<DecryptedResponse> = ledger
            .records
            .into_iter()
            .map(|record| {
                let (meta, body) = record.into_parts();
                let body = match decryptor.decrypt_response(&body) {
                    Ok(document) => Some(document),
                    Err(e) => {
                        warn!(uuid = %meta.uuid, error = %e, "Record could not be decrypted");
                        decryption_failures.push(meta.uuid.clone());
                        None
                    }
                };
                DecryptedResponse { meta, body }
            })
            .collect();

        info!("(4/7) Resolving form definitions");
        let mut cache = FormCache::new();
        let keys = responses
            .iter()
            .filter(|r| r.is_decrypted())
            .map(|r| r.meta.form_key());
        let unresolved_forms = FormResolver::new(
            self.transport,
            base_url,
            &token,
            &self.settings.language_code,
        )
        .resolve_all(keys, &mut cache)
        .await;

        info!("(5/7) Reconciling responses");
        let mut reconciled = Vec::new();
        for response in &responses {
            let Some(body) = &response.body else { continue };
            let record_key = response.meta.form_key();
            let referenced = body.questionnaire.as_deref().map(FormKey::parse);
            let form_key = referenced
                .filter(|key| cache.contains(key))
                .unwrap_or(record_key);
            if let Some(form) = cache.get(&form_key) {
                let answers = extract_answers(body.items());
                reconciled.push(ReconciledResponse {
                    uuid: response.meta.uuid.clone(),
                    items: reconcile(&form.item, &answers),
                    form_key,
                });
            }
        }

        info!("(6/7) Spreading answers to columns");
        let mut book = ExportBook::new();
        let mut exported_count = 0;
        for response in &responses {
            if let Some(body) = &response.body {
                book.add(&response.meta, &flatten_answers(body.items()));
                exported_count += 1;
            }
        }

        info!("(7/7) Writing archive");
        let names = entry_names(book.tables().iter().map(|t| t.key()), &self.settings.form_prefix);
        let mut entries = Vec::with_capacity(book.len());
        let mut tables = Vec::with_capacity(book.len());
        for (table, name) in book.tables().iter().zip(names) {
            tables.push(TableSummary {
                file_name: name.clone(),
                form_key: table.key().clone(),
                rows: table.rows().len(),
                columns: table.columns().len(),
            });
            entries.push(ArchiveEntry {
                name,
                bytes: table_bytes(table, self.settings.encoding)?,
            });
        }
        let archive = build_archive_blocking(entries).await?;

        Ok(DownloadReport {
            archive,
            record_count,
            exported_count,
            decryption_failures,
            unresolved_forms,
            skipped_pages: ledger.skipped_pages,
            tables,
            reconciled,
        })
    }
}
