use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use lopdf::{Dictionary, Document, Object};
use tracing::debug;

use crate::dataset::{dataset_stats, load_dataset, Dataset};
use crate::model::{FileKind, FileRecord, KindMetadata};

const SNIFF_LEN: usize = 8;

#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Case-insensitive substring searched in plain-text content.
    pub keyword: Option<String>,
    /// Budget for one file; a stalled read becomes an extraction error
    /// instead of a hung scan.
    pub timeout: Option<Duration>,
}

/// Result of extracting one file. The parsed dataset rides along for rule
/// evaluation so tabular files are read once.
#[derive(Debug)]
pub struct ExtractOutcome {
    pub record: FileRecord,
    pub dataset: Option<Dataset>,
}

/// Extract metadata for a single file. Never fails: every internal error is
/// captured in the record's `extraction_error` field so a batch scan keeps
/// going.
pub fn extract_file(path: &Path, options: &ExtractOptions) -> ExtractOutcome {
    match options.timeout {
        Some(timeout) => extract_with_timeout(path, options, timeout),
        None => extract_inner(path, options),
    }
}

fn extract_with_timeout(
    path: &Path,
    options: &ExtractOptions,
    timeout: Duration,
) -> ExtractOutcome {
    let (tx, rx) = crossbeam_channel::bounded(1);
    let worker_path = path.to_path_buf();
    let worker_options = ExtractOptions {
        keyword: options.keyword.clone(),
        timeout: None,
    };
    std::thread::spawn(move || {
        let _ = tx.send(extract_inner(&worker_path, &worker_options));
    });

    match rx.recv_timeout(timeout) {
        Ok(outcome) => outcome,
        Err(_) => {
            debug!("extraction timed out for {}", path.display());
            // A file that just stalled must not be reopened, so the fallback
            // classifies by extension alone instead of signature-first.
            let mut record = base_record(path, kind_from_extension(path));
            record.extraction_error = Some(format!(
                "extraction timed out after {} second(s)",
                timeout.as_secs()
            ));
            ExtractOutcome {
                record,
                dataset: None,
            }
        }
    }
}

fn extract_inner(path: &Path, options: &ExtractOptions) -> ExtractOutcome {
    let kind = infer_kind(path);
    let mut record = base_record(path, kind);
    let mut dataset = None;

    match kind {
        FileKind::Image => {
            record.metadata = Some(KindMetadata::Image {
                exif_tags: read_exif_tags(path),
            });
        }
        FileKind::Document => match read_pdf_metadata(path) {
            Ok(metadata) => record.metadata = Some(metadata),
            Err(err) => record.extraction_error = Some(err),
        },
        FileKind::Tabular => match load_dataset(path) {
            Ok(loaded) => {
                let stats = dataset_stats(&loaded, "");
                record.metadata = Some(KindMetadata::Tabular {
                    row_count: stats.row_count,
                    column_count: stats.column_count,
                    missing_cells: stats.missing_cells,
                });
                dataset = Some(loaded);
            }
            Err(err) => record.extraction_error = Some(err.to_string()),
        },
        FileKind::Text => match std::fs::read(path) {
            Ok(bytes) => {
                let (content, lossy_decoded) = decode_lossy(bytes);
                record.keyword_found = options.keyword.as_deref().and_then(|keyword| {
                    let keyword = keyword.trim();
                    if keyword.is_empty() {
                        None
                    } else {
                        Some(content.to_lowercase().contains(&keyword.to_lowercase()))
                    }
                });
                record.metadata = Some(KindMetadata::Text {
                    line_count: content.lines().count() as u64,
                    word_count: content.split_whitespace().count() as u64,
                    lossy_decoded,
                });
            }
            Err(err) => record.extraction_error = Some(format!("failed to read text: {err}")),
        },
        FileKind::Unknown => {
            record.metadata = Some(KindMetadata::Unknown);
        }
    }

    ExtractOutcome { record, dataset }
}

fn base_record(path: &Path, kind: FileKind) -> FileRecord {
    let (size_bytes, last_modified, stat_error) = match std::fs::metadata(path) {
        Ok(metadata) => {
            let modified = metadata
                .modified()
                .ok()
                .map(DateTime::<Utc>::from)
                .map(|time| time.to_rfc3339_opts(SecondsFormat::Secs, true));
            (metadata.len(), modified, None)
        }
        Err(err) => (0, None, Some(format!("failed to stat file: {err}"))),
    };

    FileRecord {
        path: path.to_string_lossy().to_string(),
        file_name: path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default(),
        kind,
        size_bytes,
        size_kib: round_kib(size_bytes),
        mime_type: guess_mime_label(path),
        last_modified,
        metadata: None,
        extraction_error: stat_error,
        keyword_found: None,
    }
}

fn round_kib(size_bytes: u64) -> f64 {
    (size_bytes as f64 / 1024.0 * 100.0).round() / 100.0
}

fn guess_mime_label(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .map(|mime| mime.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Content-signature inference with an extension fallback. The signature
/// wins where one exists; csv and txt carry no usable magic.
pub fn infer_kind(path: &Path) -> FileKind {
    match sniff_signature(path) {
        Some(kind) => kind,
        None => kind_from_extension(path),
    }
}

fn sniff_signature(path: &Path) -> Option<FileKind> {
    let mut buf = [0_u8; SNIFF_LEN];
    let mut file = File::open(path).ok()?;
    let read = file.read(&mut buf).ok()?;
    let buf = &buf[..read];

    if buf.starts_with(&[0xFF, 0xD8, 0xFF])
        || buf.starts_with(&[0x89, b'P', b'N', b'G'])
        || buf.starts_with(b"GIF8")
    {
        return Some(FileKind::Image);
    }
    if buf.starts_with(b"%PDF-") {
        return Some(FileKind::Document);
    }
    // BMP's "BM" is two bytes and collides with plain text, so it is only
    // honored when the extension agrees.
    if buf.starts_with(b"BM") && extension_of(path).as_deref() == Some("bmp") {
        return Some(FileKind::Image);
    }
    None
}

fn kind_from_extension(path: &Path) -> FileKind {
    match extension_of(path).as_deref() {
        Some("jpg" | "jpeg" | "png" | "gif" | "bmp") => FileKind::Image,
        Some("pdf") => FileKind::Document,
        Some("csv") => FileKind::Tabular,
        Some("txt") => FileKind::Text,
        _ => FileKind::Unknown,
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// Best-effort EXIF tag map. A file without tags (or with an unreadable
/// container) yields an empty map; absence of tags is not an error.
fn read_exif_tags(path: &Path) -> BTreeMap<String, String> {
    let mut tags = BTreeMap::new();
    let Ok(file) = File::open(path) else {
        return tags;
    };
    let mut reader = BufReader::new(file);
    let Ok(exif) = exif::Reader::new().read_from_container(&mut reader) else {
        return tags;
    };
    for field in exif.fields() {
        tags.entry(field.tag.to_string())
            .or_insert_with(|| field.display_value().with_unit(&exif).to_string());
    }
    tags
}

fn read_pdf_metadata(path: &Path) -> Result<KindMetadata, String> {
    let document =
        Document::load(path).map_err(|err| format!("failed to parse document: {err}"))?;
    if document.is_encrypted() {
        return Err("document is encrypted; metadata unavailable".to_string());
    }

    let info = info_dictionary(&document);
    Ok(KindMetadata::Document {
        title: info.and_then(|dict| pdf_text(&document, dict, b"Title")),
        author: info.and_then(|dict| pdf_text(&document, dict, b"Author")),
        page_count: Some(document.get_pages().len() as u64),
    })
}

fn info_dictionary(document: &Document) -> Option<&Dictionary> {
    match document.trailer.get(b"Info").ok()? {
        Object::Reference(id) => document.get_object(*id).ok()?.as_dict().ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

fn pdf_text(document: &Document, dict: &Dictionary, key: &[u8]) -> Option<String> {
    let object = match dict.get(key).ok()? {
        Object::Reference(id) => document.get_object(*id).ok()?,
        other => other,
    };
    match object {
        Object::String(bytes, _) => Some(decode_pdf_string(bytes)),
        _ => None,
    }
}

fn decode_pdf_string(bytes: &[u8]) -> String {
    // Text strings are either UTF-16BE with a BOM or effectively latin-1.
    if bytes.starts_with(&[0xFE, 0xFF]) {
        let units = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect::<Vec<_>>();
        String::from_utf16_lossy(&units).trim().to_string()
    } else {
        String::from_utf8_lossy(bytes).trim().to_string()
    }
}

/// Lossy UTF-8 decode with an explicit marker so downstream consumers know
/// the content may have been altered.
fn decode_lossy(bytes: Vec<u8>) -> (String, bool) {
    match String::from_utf8(bytes) {
        Ok(content) => (content, false),
        Err(err) => {
            let content = String::from_utf8_lossy(err.as_bytes()).into_owned();
            (content, true)
        }
    }
}
