//! Tabular export
//!
//! Pivots flattened responses into one table per form key, writes each table
//! as delimited text and packs the files into a zip archive.

pub mod archive;
pub mod csv;
pub mod table;

pub use archive::{build_archive, build_archive_blocking, entry_names, ArchiveEntry};
pub use csv::{encode_text, table_bytes, write_table};
pub use table::{ExportBook, ExportTable};
