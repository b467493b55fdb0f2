//! Per-format text extraction.
//!
//! Each supported [`FileType`] has one [`TextExtractor`]. Extractors are
//! stateless and shared through the process-wide [`ExtractorRegistry`].
//! Granularity differs by format: PDF yields one segment per non-empty page,
//! DOCX and TXT yield at most one segment for the whole document.
//!
//! Extraction never panics: decoder failures (including panics inside the
//! PDF decoder) surface as [`IngestError::ExtractionFailed`].

use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};

use quick_xml::events::Event;
use text2vector_core::models::{FileType, Resource, TextSegment, META_PAGE_INDEX, META_TOTAL_PAGES};
use text2vector_core::{IngestError, Result};
use tracing::debug;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;
const UTF8_BOM: char = '\u{feff}';

/// Turns the bytes of one resource into ordered text segments.
///
/// Returned segments are never empty and carry the `source` and `fileType`
/// metadata keys. An empty vector means the resource holds no text.
pub trait TextExtractor: Send + Sync {
    fn format(&self) -> FileType;

    fn extract(&self, resource: &Resource) -> Result<Vec<TextSegment>>;
}

// ============ PDF ============

pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn format(&self) -> FileType {
        FileType::Pdf
    }

    fn extract(&self, resource: &Resource) -> Result<Vec<TextSegment>> {
        let source = resource.source_label();
        let pages = pdf_pages(resource.bytes())?;
        let total = pages.len();

        let segments: Vec<TextSegment> = pages
            .into_iter()
            .enumerate()
            .filter_map(|(index, page)| {
                let text = page.trim();
                if text.is_empty() {
                    return None;
                }
                Some(
                    TextSegment::new(text, index, source, FileType::Pdf)
                        .with_meta(META_PAGE_INDEX, index.to_string())
                        .with_meta(META_TOTAL_PAGES, total.to_string()),
                )
            })
            .collect();

        debug!(source, pages = total, segments = segments.len(), "pdf extracted");
        Ok(segments)
    }
}

fn pdf_pages(bytes: &[u8]) -> Result<Vec<String>> {
    // pdf-extract panics on some malformed inputs instead of returning Err.
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
    }));
    match outcome {
        Ok(Ok(pages)) => Ok(pages),
        Ok(Err(e)) => Err(IngestError::extraction(format!("PDF: {}", e))),
        Err(_) => Err(IngestError::extraction("PDF: decoder panicked on malformed input")),
    }
}

// ============ DOCX ============

pub struct DocxExtractor;

impl TextExtractor for DocxExtractor {
    fn format(&self) -> FileType {
        FileType::Docx
    }

    fn extract(&self, resource: &Resource) -> Result<Vec<TextSegment>> {
        let source = resource.source_label();
        let mut archive = zip::ZipArchive::new(Cursor::new(resource.bytes()))
            .map_err(|e| IngestError::extraction(format!("DOCX: {}", e)))?;
        let xml = read_zip_entry_bounded(&mut archive, "word/document.xml", MAX_XML_ENTRY_BYTES)?;
        let body = DocxBody::parse(&xml)?;
        let text = body.render();

        debug!(
            source,
            paragraphs = body.paragraphs.len(),
            table_rows = body.table_rows.len(),
            "docx extracted"
        );
        if text.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![TextSegment::new(text, 0, source, FileType::Docx)])
    }
}

fn read_zip_entry_bounded(
    archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>> {
    let entry = archive
        .by_name(name)
        .map_err(|e| IngestError::extraction(format!("DOCX: {}: {}", name, e)))?;
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(|e| IngestError::extraction(format!("DOCX: {}: {}", name, e)))?;
    if out.len() as u64 >= max_bytes {
        return Err(IngestError::extraction(format!(
            "DOCX: ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

/// Text content of `word/document.xml`, split into body paragraphs and
/// table rows (each row a list of cell texts).
#[derive(Debug, Default)]
struct DocxBody {
    paragraphs: Vec<String>,
    table_rows: Vec<Vec<String>>,
}

impl DocxBody {
    fn parse(xml: &[u8]) -> Result<Self> {
        let mut reader = quick_xml::Reader::from_reader(xml);
        let mut buf = Vec::new();

        let mut body = DocxBody::default();
        let mut table_depth = 0usize;
        let mut in_text = false;
        let mut in_tab_stops = false;
        let mut paragraph = String::new();
        let mut cell_paragraphs: Vec<String> = Vec::new();
        let mut row: Vec<String> = Vec::new();
        // Legacy copies of alternate content (`mc:Fallback`) are skipped.
        let mut fallback_depth = 0usize;
        // Paragraphs interrupted by a text box, resumed when the box closes.
        let mut outer_paragraphs: Vec<String> = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) if e.local_name().as_ref() == b"Fallback" => {
                    fallback_depth += 1;
                }
                Ok(Event::End(e)) if e.local_name().as_ref() == b"Fallback" => {
                    fallback_depth = fallback_depth.saturating_sub(1);
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(IngestError::extraction(format!("DOCX: {}", e))),
                _ if fallback_depth > 0 => {}
                Ok(Event::Start(e)) => match e.local_name().as_ref() {
                    b"t" => in_text = true,
                    b"txbxContent" => outer_paragraphs.push(std::mem::take(&mut paragraph)),
                    b"tbl" => table_depth += 1,
                    b"tabs" => in_tab_stops = true,
                    b"tab" if !in_tab_stops => paragraph.push('\t'),
                    b"br" | b"cr" => paragraph.push('\n'),
                    _ => {}
                },
                Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                    b"tab" if !in_tab_stops => paragraph.push('\t'),
                    b"br" | b"cr" => paragraph.push('\n'),
                    _ => {}
                },
                Ok(Event::Text(te)) if in_text => {
                    let text = te
                        .unescape()
                        .map_err(|e| IngestError::extraction(format!("DOCX: {}", e)))?;
                    paragraph.push_str(&text);
                }
                Ok(Event::End(e)) => match e.local_name().as_ref() {
                    b"t" => in_text = false,
                    b"tabs" => in_tab_stops = false,
                    b"txbxContent" => paragraph = outer_paragraphs.pop().unwrap_or_default(),
                    b"p" => {
                        let finished = std::mem::take(&mut paragraph);
                        if table_depth == 0 {
                            body.paragraphs.push(finished);
                        } else {
                            cell_paragraphs.push(finished);
                        }
                    }
                    b"tc" if table_depth == 1 => {
                        row.push(cell_paragraphs.join("\n"));
                        cell_paragraphs.clear();
                    }
                    b"tr" if table_depth == 1 => {
                        body.table_rows.push(std::mem::take(&mut row));
                    }
                    b"tbl" => table_depth = table_depth.saturating_sub(1),
                    _ => {}
                },
                _ => {}
            }
            buf.clear();
        }
        Ok(body)
    }

    /// Trimmed non-blank paragraphs, one per line, then one line per table
    /// row with its non-blank cells separated by spaces.
    fn render(&self) -> String {
        let mut out = String::new();
        for p in &self.paragraphs {
            let p = p.trim();
            if !p.is_empty() {
                out.push_str(p);
                out.push('\n');
            }
        }
        for row in &self.table_rows {
            for cell in row {
                let cell = cell.trim();
                if !cell.is_empty() {
                    out.push_str(cell);
                    out.push(' ');
                }
            }
            out.push('\n');
        }
        out.trim().to_string()
    }
}

// ============ TXT ============

pub struct TxtExtractor;

impl TextExtractor for TxtExtractor {
    fn format(&self) -> FileType {
        FileType::Txt
    }

    fn extract(&self, resource: &Resource) -> Result<Vec<TextSegment>> {
        let source = resource.source_label();
        let text = std::str::from_utf8(resource.bytes())
            .map_err(|e| IngestError::extraction(format!("TXT: not valid UTF-8: {}", e)))?;
        let text = text.trim_start_matches(UTF8_BOM).trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![TextSegment::new(text, 0, source, FileType::Txt)])
    }
}

// ============ Registry ============

/// Fixed mapping from format to extractor.
pub struct ExtractorRegistry {
    extractors: HashMap<FileType, Box<dyn TextExtractor>>,
}

impl ExtractorRegistry {
    /// A registry with no extractors.
    pub fn empty() -> Self {
        Self {
            extractors: HashMap::new(),
        }
    }

    /// The PDF, DOCX and TXT extractors.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(PdfExtractor));
        registry.register(Box::new(DocxExtractor));
        registry.register(Box::new(TxtExtractor));
        registry
    }

    /// Process-wide builtin registry, built on first use and never mutated.
    pub fn global() -> Arc<ExtractorRegistry> {
        static REGISTRY: OnceLock<Arc<ExtractorRegistry>> = OnceLock::new();
        Arc::clone(REGISTRY.get_or_init(|| Arc::new(ExtractorRegistry::builtin())))
    }

    pub fn register(&mut self, extractor: Box<dyn TextExtractor>) {
        self.extractors.insert(extractor.format(), extractor);
    }

    pub fn extractor_for(&self, format: FileType) -> Result<&dyn TextExtractor> {
        self.extractors
            .get(&format)
            .map(|e| e.as_ref())
            .ok_or_else(|| {
                IngestError::UnsupportedFormat(format!("no extractor registered for {}", format))
            })
    }

    pub fn formats(&self) -> Vec<FileType> {
        let mut formats: Vec<FileType> = self.extractors.keys().copied().collect();
        formats.sort();
        formats
    }
}
