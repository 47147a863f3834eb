//! Zip packaging of exported tables

use std::collections::HashSet;
use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{DownloadError, DownloadResult};
use crate::models::FormKey;

/// One file to be placed in the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Base file name for a form key, without extension
///
/// Strips `prefix` from the form id, or else keeps only its last path
/// segment. Characters that are unsafe in file names become `_`.
pub fn entry_stem(key: &FormKey, prefix: &str) -> String {
    let id = key.form_id.trim();
    let tail = match id.strip_prefix(prefix) {
        Some(rest) if !prefix.is_empty() => rest,
        _ => id.trim_end_matches('/').rsplit('/').next().unwrap_or(id),
    };
    let stem = sanitize(tail.trim_matches('/'));
    if stem.is_empty() {
        "form".to_string()
    } else {
        stem
    }
}

/// File names for `keys`, in order, unique within the archive
///
/// A name already taken gets the form version appended, then a counter.
pub fn entry_names<'a, I>(keys: I, prefix: &str) -> Vec<String>
where
    I: IntoIterator<Item = &'a FormKey>,
{
    let mut taken = HashSet::new();
    keys.into_iter()
        .map(|key| {
            let stem = entry_stem(key, prefix);
            let mut name = format!("{}.csv", stem);
            if taken.contains(&name) {
                let versioned = format!("{}_{}", stem, sanitize(&key.version));
                name = format!("{}.csv", versioned);
                let mut n = 2;
                while taken.contains(&name) {
                    name = format!("{}_{}.csv", versioned, n);
                    n += 1;
                }
            }
            taken.insert(name.clone());
            name
        })
        .collect()
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Pack entries into an in-memory zip archive
pub fn build_archive(entries: &[ArchiveEntry]) -> DownloadResult<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in entries {
        zip.start_file(entry.name.as_str(), options)
            .map_err(|e| DownloadError::Export(format!("Failed to add {}: {}", entry.name, e)))?;
        zip.write_all(&entry.bytes)
            .map_err(|e| DownloadError::Export(format!("Failed to write {}: {}", entry.name, e)))?;
    }

    let cursor = zip
        .finish()
        .map_err(|e| DownloadError::Export(format!("Failed to finish archive: {}", e)))?;
    Ok(cursor.into_inner())
}

/// [`build_archive`] on the blocking pool
pub async fn build_archive_blocking(entries: Vec<ArchiveEntry>) -> DownloadResult<Vec<u8>> {
    tokio::task::spawn_blocking(move || build_archive(&entries))
        .await
        .map_err(|e| DownloadError::Export(format!("Archive task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_stem_from_prefix_or_tail() {
        let key = FormKey::new("https://forms.example.org/Questionnaire/intake", "1.0");
        assert_eq!(entry_stem(&key, ""), "intake");
        assert_eq!(
            entry_stem(&key, "https://forms.example.org/Questionnaire/"),
            "intake"
        );
        assert_eq!(entry_stem(&FormKey::new("urn:x:y", "1"), ""), "urn_x_y");
        assert_eq!(entry_stem(&FormKey::new("", "1"), ""), "form");
    }

    #[test]
    fn test_colliding_names_get_version() {
        let keys = [
            FormKey::new("https://a.example/intake", "1"),
            FormKey::new("https://a.example/intake", "2"),
            FormKey::new("https://b.example/intake", "2"),
            FormKey::new("https://a.example/other", "1"),
        ];
        assert_eq!(
            entry_names(&keys, ""),
            vec!["intake.csv", "intake_2.csv", "intake_2_2.csv", "other.csv"]
        );
    }

    #[test]
    fn test_archive_contents() {
        let bytes = build_archive(&[
            ArchiveEntry {
                name: "intake.csv".into(),
                bytes: b"UUID;q1\nu1;\"yes\"\n".to_vec(),
            },
            ArchiveEntry {
                name: "other.csv".into(),
                bytes: b"UUID\n".to_vec(),
            },
        ])
        .unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);
        let mut text = String::new();
        archive
            .by_name("intake.csv")
            .unwrap()
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "UUID;q1\nu1;\"yes\"\n");
    }

    #[tokio::test]
    async fn test_blocking_build() {
        let bytes = build_archive_blocking(Vec::new()).await.unwrap();
        let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 0);
    }
}
