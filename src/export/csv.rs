//! Delimited text output
//!
//! Tables are written `;`-separated with `\n` line ends and no quoting of
//! their own; answer values arrive already quoted.

use std::io::Write;

use csv::{QuoteStyle, Terminator, WriterBuilder};
use tracing::warn;

use super::table::ExportTable;
use crate::config::TextEncoding;
use crate::error::{DownloadError, DownloadResult};
use crate::models::META_COLUMNS;

/// Write a table (header row, then one row per record)
pub fn write_table<W: Write>(table: &ExportTable, writer: W) -> DownloadResult<()> {
    let mut csv = WriterBuilder::new()
        .delimiter(b';')
        .quote_style(QuoteStyle::Never)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(writer);

    for field in shifting_fields(table) {
        warn!(
            "Field {:?} in {} contains a separator and will shift its row",
            field,
            table.key()
        );
    }

    csv.write_record(table.columns())
        .map_err(|e| DownloadError::Export(e.to_string()))?;
    for row in table.rows() {
        csv.write_record(row)
            .map_err(|e| DownloadError::Export(e.to_string()))?;
    }
    csv.flush()
        .map_err(|e| DownloadError::Export(e.to_string()))?;
    Ok(())
}

/// Header and metadata fields that would break the unquoted layout
///
/// Answer values carry their own quoting and are not checked.
fn shifting_fields(table: &ExportTable) -> Vec<&str> {
    let metadata = table
        .rows()
        .iter()
        .flat_map(|row| row.iter().take(META_COLUMNS.len()));
    table
        .columns()
        .iter()
        .chain(metadata)
        .map(String::as_str)
        .filter(|field| field.contains([';', '\n', '\r']))
        .collect()
}

/// Render a table as encoded bytes
pub fn table_bytes(table: &ExportTable, encoding: TextEncoding) -> DownloadResult<Vec<u8>> {
    let mut buffer = Vec::new();
    write_table(table, &mut buffer)?;
    let text = String::from_utf8(buffer).map_err(|e| DownloadError::Export(e.to_string()))?;
    Ok(encode_text(&text, encoding))
}

/// Encode text for the consuming environment
///
/// Characters windows-1252 cannot represent become numeric character
/// references.
pub fn encode_text(text: &str, encoding: TextEncoding) -> Vec<u8> {
    match encoding.resolve() {
        TextEncoding::Windows1252 => {
            let (bytes, _, lossy) = encoding_rs::WINDOWS_1252.encode(text);
            if lossy {
                warn!("Some characters could not be represented in windows-1252");
            }
            bytes.into_owned()
        }
        _ => text.as_bytes().to_vec(),
    }
}
