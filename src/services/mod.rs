//! Service layer
//!
//! Answer handling and the download pipeline built on top of the backend,
//! crypto and export layers.

pub mod answers;
pub mod download;

pub use answers::{extract_answers, flatten_answers, reconcile, AnswerMap, FlatAnswers};
pub use download::{
    DownloadReport, DownloadRequest, DownloadService, ReconciledResponse, TableSummary,
};
