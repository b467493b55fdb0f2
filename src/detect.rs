//! File type detection.
//!
//! Content sniffing runs first and maps the sniffed MIME type through
//! [`FileType::from_mime`]. Only when sniffing is inconclusive (unknown
//! signature, unreadable archive) does the filename extension decide. A
//! recognised signature always wins over a disagreeing extension.

use std::io::Cursor;

use text2vector_core::models::FileType;
use text2vector_core::{IngestError, Result};
use tracing::debug;

const PDF_MAGIC: &[u8] = b"%PDF-";
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const MIME_ZIP: &str = "application/zip";
const DOCX_MAIN_PART: &str = "word/document.xml";
/// How much of the input the plain-text heuristic looks at.
const TEXT_SNIFF_BYTES: usize = 8 * 1024;

/// Classify a resource by content, falling back to the filename extension.
///
/// Fails with [`IngestError::InvalidInput`] when `bytes` is empty or the
/// filename is missing or blank, and with [`IngestError::UnsupportedFormat`]
/// when neither signal maps to a supported format.
pub fn detect(bytes: &[u8], filename: Option<&str>) -> Result<FileType> {
    let name = match filename {
        Some(n) if !n.trim().is_empty() => n.trim(),
        _ => return Err(IngestError::InvalidInput("filename is required".to_string())),
    };
    if bytes.is_empty() {
        return Err(IngestError::InvalidInput(format!("{} is empty", name)));
    }

    let sniffed = sniff_mime(bytes);
    if let Some(ft) = sniffed.and_then(FileType::from_mime) {
        debug!(filename = name, mime = sniffed, file_type = %ft, "detected by content");
        return Ok(ft);
    }

    if let Some(ft) = from_extension(name) {
        debug!(filename = name, file_type = %ft, "detected by extension");
        return Ok(ft);
    }

    Err(IngestError::UnsupportedFormat(match sniffed {
        Some(mime) => format!("{} ({})", name, mime),
        None => name.to_string(),
    }))
}

/// Infer a MIME type from leading bytes. `None` when nothing is recognised.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

    if body.starts_with(PDF_MAGIC) {
        return Some(FileType::Pdf.mime());
    }
    if body.starts_with(ZIP_MAGIC) {
        return sniff_zip(body);
    }
    if looks_like_text(body) {
        return Some(FileType::Txt.mime());
    }
    None
}

/// A zip is DOCX only when it carries the main document part.
fn sniff_zip(bytes: &[u8]) -> Option<&'static str> {
    let archive = zip::ZipArchive::new(Cursor::new(bytes)).ok()?;
    let is_docx = archive.file_names().any(|n| n == DOCX_MAIN_PART);
    Some(if is_docx {
        FileType::Docx.mime()
    } else {
        MIME_ZIP
    })
}

/// UTF-8 with no control bytes other than common whitespace.
fn looks_like_text(bytes: &[u8]) -> bool {
    if bytes.is_empty() {
        return false;
    }
    let head = &bytes[..bytes.len().min(TEXT_SNIFF_BYTES)];
    let valid = match std::str::from_utf8(head) {
        Ok(_) => true,
        // A multi-byte character cut by the sniff window is fine.
        Err(e) => e.error_len().is_none() && head.len() == TEXT_SNIFF_BYTES,
    };
    valid
        && !head
            .iter()
            .any(|&b| b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r' | 0x0c | 0x1b))
}

/// Map a filename extension to a format, case-insensitively.
pub fn from_extension(filename: &str) -> Option<FileType> {
    let lowered = filename.to_ascii_lowercase();
    mime_guess::from_path(&lowered)
        .iter()
        .find_map(|mime| FileType::from_mime(mime.essence_str()))
}
