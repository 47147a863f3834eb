//! Export tables
//!
//! One [`ExportTable`] per form key. The first response for a key fixes the
//! column list; later responses are aligned to it.

use std::collections::HashMap;

use crate::models::{FormKey, RecordMeta, META_COLUMNS};
use crate::services::FlatAnswers;

/// Column-aligned rows for one form key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTable {
    key: FormKey,
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl ExportTable {
    /// Start a table whose answer columns are those of `first`
    pub fn new(key: FormKey, first: &FlatAnswers) -> Self {
        let columns = META_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(first.columns().map(str::to_string))
            .collect();
        Self {
            key,
            columns,
            rows: Vec::new(),
        }
    }

    /// Append one row aligned to the column list
    ///
    /// Answers for unknown columns are dropped; missing answers are blank.
    pub fn push_row(&mut self, meta: &RecordMeta, answers: &FlatAnswers) {
        let mut row: Vec<String> = meta.values().iter().map(|v| v.to_string()).collect();
        row.extend(
            self.columns[META_COLUMNS.len()..]
                .iter()
                .map(|column| answers.get(column).unwrap_or_default().to_string()),
        );
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    pub fn key(&self) -> &FormKey {
        &self.key
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }
}

/// All tables of one run, in order of first appearance
#[derive(Debug, Default)]
pub struct ExportBook {
    tables: Vec<ExportTable>,
    index: HashMap<FormKey, usize>,
}

impl ExportBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a response's row to the table of its form key
    pub fn add(&mut self, meta: &RecordMeta, answers: &FlatAnswers) {
        let key = meta.form_key();
        let slot = match self.index.get(&key) {
            Some(&slot) => slot,
            None => {
                self.tables.push(ExportTable::new(key.clone(), answers));
                self.index.insert(key, self.tables.len() - 1);
                self.tables.len() - 1
            }
        };
        self.tables[slot].push_row(meta, answers);
    }

    pub fn tables(&self) -> &[ExportTable] {
        &self.tables
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
