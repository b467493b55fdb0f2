//! Library-level pipeline tests: detection → extraction → batching →
//! embedding → storage, driven through [`Ingestor`] with a scripted
//! in-process embedding backend.

use std::io::Write;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use text2vector::db;
use text2vector::embedding::{DisabledBackend, HashingBackend};
use text2vector::extract::{ExtractorRegistry, TxtExtractor};
use text2vector::ingest::Ingestor;
use text2vector::migrate;
use text2vector::sqlite_store::SqliteVectorStore;
use text2vector_core::embedding::{EmbedOptions, EmbeddingBackend};
use text2vector_core::models::{FileType, IngestionStatus, Resource};
use text2vector_core::store::{InMemoryVectorStore, SearchHit, VectorRecord, VectorStore};
use text2vector_core::token::CharRatioEstimator;
use text2vector_core::{IngestError, Result};

const DIMS: usize = 4;

/// Returns `[chars, 1, 0, 0]` per text and records each call's batch.
/// Any text containing `POISON` makes the whole call fail.
#[derive(Default)]
struct ScriptedBackend {
    calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedBackend {
    fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmbeddingBackend for ScriptedBackend {
    fn model_name(&self) -> &str {
        "scripted"
    }

    fn dims(&self) -> usize {
        DIMS
    }

    async fn embed(&self, texts: &[String], _options: &EmbedOptions) -> Result<Vec<Vec<f32>>> {
        self.calls.lock().unwrap().push(texts.to_vec());
        if texts.iter().any(|t| t.contains("POISON")) {
            return Err(IngestError::backend("model rejected input"));
        }
        Ok(texts
            .iter()
            .map(|t| vec![t.chars().count() as f32, 1.0, 0.0, 0.0])
            .collect())
    }
}

struct FailingStore;

#[async_trait]
impl VectorStore for FailingStore {
    async fn add(&self, _records: &[VectorRecord]) -> Result<usize> {
        Err(IngestError::VectorStore("disk full".to_string()))
    }

    async fn similarity_search(&self, _query: &[f32], _top_k: usize) -> Result<Vec<SearchHit>> {
        Ok(Vec::new())
    }

    async fn count(&self) -> Result<usize> {
        Ok(0)
    }
}

fn scripted(max_tokens: usize) -> (Arc<ScriptedBackend>, Ingestor) {
    let backend = Arc::new(ScriptedBackend::default());
    let ingestor = Ingestor::new(
        backend.clone(),
        Arc::new(CharRatioEstimator::default()),
        max_tokens,
    )
    .unwrap();
    (backend, ingestor)
}

fn hashing(max_tokens: usize) -> Ingestor {
    Ingestor::new(
        Arc::new(HashingBackend::new(128).unwrap()),
        Arc::new(CharRatioEstimator::default()),
        max_tokens,
    )
    .unwrap()
}

/// Minimal PDF with one page per entry, each drawing its text in Helvetica.
/// Stream lengths and xref offsets are computed so pdf-extract can parse it.
fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    let n = pages.len();
    let font_id = 3 + 2 * n;
    let kids: Vec<String> = (0..n).map(|i| format!("{} 0 R", 3 + 2 * i)).collect();

    let mut objects: Vec<Vec<u8>> = vec![
        b"<< /Type /Catalog /Pages 2 0 R >>".to_vec(),
        format!("<< /Type /Pages /Kids [{}] /Count {} >>", kids.join(" "), n).into_bytes(),
    ];
    for (i, text) in pages.iter().enumerate() {
        objects.push(
            format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents {} 0 R /Resources << /Font << /F1 {} 0 R >> >> >>",
                4 + 2 * i,
                font_id
            )
            .into_bytes(),
        );
        let content = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET", text);
        objects.push(
            format!(
                "<< /Length {} >>\nstream\n{}\nendstream",
                content.len(),
                content
            )
            .into_bytes(),
        );
    }
    objects.push(b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_vec());

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n", i + 1).as_bytes());
        out.extend_from_slice(body);
        out.extend_from_slice(b"\nendobj\n");
    }
    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer << /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_start
        )
        .as_bytes(),
    );
    out
}

fn docx_with_body(body_xml: &str) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file(
            "word/document.xml",
            zip::write::SimpleFileOptions::default(),
        )
        .unwrap();
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
            body_xml
        );
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}

#[tokio::test]
async fn hello_world_txt_is_one_segment_one_batch_one_vector() {
    let (backend, ingestor) = scripted(100);
    let document = ingestor
        .ingest_resource(Resource::named(&b"hello world"[..], "hello.txt"))
        .await
        .unwrap();

    assert_eq!(document.file_type, FileType::Txt);
    assert_eq!(document.segments.len(), 1);
    assert_eq!(document.batches, 1);
    assert_eq!(document.vectors.len(), 1);
    assert_eq!(document.vectors[0].len(), DIMS);
    assert_eq!(backend.calls(), vec![vec!["hello world".to_string()]]);

    let result = document.into_result();
    assert!(result.is_ok());
    assert_eq!(result.chunk_count, 1);
    assert_eq!(result.filename, "hello.txt");
}

#[tokio::test]
async fn three_page_pdf_yields_three_ordered_segments() {
    let (_, ingestor) = scripted(100);
    let pdf = pdf_with_pages(&["alpha page", "bravo page", "charlie page"]);
    let document = ingestor
        .ingest_resource(Resource::named(pdf, "deck.pdf"))
        .await
        .unwrap();

    assert_eq!(document.segments.len(), 3);
    let indexes: Vec<usize> = document.segments.iter().map(|s| s.sequence_index).collect();
    assert_eq!(indexes, vec![0, 1, 2]);
    for (i, (segment, word)) in document
        .segments
        .iter()
        .zip(["alpha", "bravo", "charlie"])
        .enumerate()
    {
        assert!(segment.text.contains(word), "page {}: {:?}", i, segment.text);
        assert_eq!(segment.metadata["fileType"], "pdf");
        assert_eq!(segment.metadata["source"], "deck.pdf");
        assert_eq!(segment.metadata["pageIndex"], i.to_string());
        assert_eq!(segment.metadata["totalPages"], "3");
    }
    assert_eq!(document.vectors.len(), 3);
}

#[tokio::test]
async fn pdf_content_wins_over_txt_extension() {
    let (_, ingestor) = scripted(100);
    let pdf = pdf_with_pages(&["disguised"]);
    let results = ingestor.ingest(vec![Resource::named(pdf, "report.txt")]).await;
    assert_eq!(results[0].file_type, Some(FileType::Pdf));
    assert!(results[0].is_ok());
}

#[tokio::test]
async fn tight_ceiling_isolates_every_page() {
    let (backend, ingestor) = scripted(1);
    let pdf = pdf_with_pages(&["alpha page", "bravo page", "charlie page"]);
    let document = ingestor
        .ingest_resource(Resource::named(pdf, "deck.pdf"))
        .await
        .unwrap();

    assert_eq!(document.batches, 3);
    assert_eq!(document.oversized_batches, 3);
    assert_eq!(document.vectors.len(), 3);
    assert!(backend.calls().iter().all(|call| call.len() == 1));
}

#[tokio::test]
async fn generous_ceiling_sends_one_batch() {
    let (backend, ingestor) = scripted(10_000);
    let pdf = pdf_with_pages(&["alpha page", "bravo page", "charlie page"]);
    let document = ingestor
        .ingest_resource(Resource::named(pdf, "deck.pdf"))
        .await
        .unwrap();

    assert_eq!(document.batches, 1);
    assert_eq!(document.oversized_batches, 0);
    assert_eq!(backend.calls().len(), 1);
    assert_eq!(backend.calls()[0].len(), 3);
}

#[tokio::test]
async fn oversized_text_is_embedded_not_rejected() {
    let (_, ingestor) = scripted(10);
    let long = "word ".repeat(200);
    let document = ingestor
        .ingest_resource(Resource::named(long.into_bytes(), "long.txt"))
        .await
        .unwrap();
    assert_eq!(document.batches, 1);
    assert_eq!(document.oversized_batches, 1);
    assert_eq!(document.vectors.len(), 1);
}

#[tokio::test]
async fn docx_is_a_single_whole_document_segment() {
    let (_, ingestor) = scripted(100);
    let docx = docx_with_body(
        "<w:p><w:r><w:t>Intro</w:t></w:r></w:p>\
         <w:tbl><w:tr><w:tc><w:p><w:r><w:t>k</w:t></w:r></w:p></w:tc>\
         <w:tc><w:p><w:r><w:t>v</w:t></w:r></w:p></w:tc></w:tr></w:tbl>",
    );
    let document = ingestor
        .ingest_resource(Resource::named(docx, "Handbook.DOCX"))
        .await
        .unwrap();
    assert_eq!(document.file_type, FileType::Docx);
    assert_eq!(document.segments.len(), 1);
    assert_eq!(document.segments[0].text, "Intro\nk v");
    assert_eq!(document.segments[0].metadata["fileType"], "docx");
}

fn visible_chars(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

#[test]
fn pdf_and_docx_extraction_is_repeatable_and_adds_no_text() {
    let registry = ExtractorRegistry::global();
    let pages = ["alpha page", "bravo page", "charlie page"];
    let box_xml = "<w:p><w:r><w:t xml:space=\"preserve\">Before </w:t></w:r><w:r><mc:AlternateContent>\
         <mc:Choice Requires=\"wps\"><w:drawing><wps:txbx><w:txbxContent><w:p><w:r><w:t>Boxed</w:t></w:r></w:p></w:txbxContent></wps:txbx></w:drawing></mc:Choice>\
         <mc:Fallback><w:pict><v:textbox><w:txbxContent><w:p><w:r><w:t>Boxed</w:t></w:r></w:p></w:txbxContent></v:textbox></w:pict></mc:Fallback>\
         </mc:AlternateContent></w:r><w:r><w:t>After</w:t></w:r></w:p>";
    let docx_words = ["Before", "Boxed", "After", "k", "v"];

    let fixtures = [
        (
            FileType::Pdf,
            Resource::named(pdf_with_pages(&pages), "deck.pdf"),
            pages.iter().map(|p| visible_chars(p)).sum::<usize>(),
        ),
        (
            FileType::Docx,
            Resource::named(
                docx_with_body(&format!(
                    "{}<w:tbl><w:tr><w:tc><w:p><w:r><w:t>k</w:t></w:r></w:p></w:tc>\
                     <w:tc><w:p><w:r><w:t>v</w:t></w:r></w:p></w:tc></w:tr></w:tbl>",
                    box_xml
                )),
                "boxed.docx",
            ),
            docx_words.iter().map(|w| visible_chars(w)).sum::<usize>(),
        ),
    ];

    for (file_type, resource, source_chars) in fixtures {
        let extractor = registry.extractor_for(file_type).unwrap();
        let first = extractor.extract(&resource).unwrap();
        let second = extractor.extract(&resource).unwrap();
        assert!(!first.is_empty(), "{}: no segments", file_type);
        assert_eq!(first, second, "{}: extraction differs between runs", file_type);

        let extracted: usize = first.iter().map(|s| visible_chars(&s.text)).sum();
        assert!(
            extracted <= source_chars,
            "{}: {} visible chars extracted from {} in the source: {:?}",
            file_type,
            extracted,
            source_chars,
            first
        );
    }
}

#[tokio::test]
async fn one_malformed_resource_does_not_abort_siblings() {
    let (_, ingestor) = scripted(100);
    let resources = vec![
        Resource::named(&b"first file"[..], "a.txt"),
        Resource::named(&b"PK\x03\x04not really a zip"[..], "broken.docx"),
        Resource::named(pdf_with_pages(&["page"]), "ok.pdf"),
        Resource::named(vec![0u8, 159, 146, 150], "image.png"),
    ];
    let results = ingestor.ingest(resources).await;

    assert_eq!(results.len(), 4);
    assert!(results[0].is_ok());
    assert!(results[2].is_ok());
    match &results[1].status {
        IngestionStatus::Failed { kind, .. } => assert_eq!(kind, "extraction_failed"),
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(results[1].file_type, Some(FileType::Docx));
    match &results[3].status {
        IngestionStatus::Failed { kind, .. } => assert_eq!(kind, "unsupported_format"),
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(results[3].file_type, None);
}

#[tokio::test]
async fn backend_error_fails_only_the_owning_resource() {
    let (_, ingestor) = scripted(100);
    let results = ingestor
        .ingest(vec![
            Resource::named(&b"POISON pill"[..], "bad.txt"),
            Resource::named(&b"fine"[..], "good.txt"),
        ])
        .await;
    assert!(results[0].is_failed());
    assert!(matches!(
        &results[0].status,
        IngestionStatus::Failed { kind, .. } if kind == "embedding_backend_error"
    ));
    assert!(results[1].is_ok());
    assert_eq!(results[1].vectors, vec![vec![4.0, 1.0, 0.0, 0.0]]);
}

#[tokio::test]
async fn disabled_backend_marks_resources_unavailable() {
    let ingestor = Ingestor::new(
        Arc::new(DisabledBackend),
        Arc::new(CharRatioEstimator::default()),
        100,
    )
    .unwrap();
    let results = ingestor
        .ingest(vec![
            Resource::named(&b"text"[..], "a.txt"),
            Resource::named(&b"   "[..], "blank.txt"),
        ])
        .await;
    assert!(matches!(
        &results[0].status,
        IngestionStatus::Failed { kind, .. } if kind == "embedding_backend_unavailable"
    ));
    assert_eq!(results[1].status, IngestionStatus::Empty);
}

#[tokio::test]
async fn empty_extraction_skips_the_backend() {
    let (backend, ingestor) = scripted(100);
    let results = ingestor
        .ingest(vec![Resource::named(&b"\n\n   \n"[..], "blank.txt")])
        .await;
    assert_eq!(results[0].status, IngestionStatus::Empty);
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn missing_extractor_is_reported_per_resource() {
    let (_, ingestor) = scripted(100);
    let mut registry = ExtractorRegistry::empty();
    registry.register(Box::new(TxtExtractor));
    let ingestor = ingestor.with_registry(Arc::new(registry));

    let results = ingestor
        .ingest(vec![
            Resource::named(pdf_with_pages(&["x"]), "a.pdf"),
            Resource::named(&b"y"[..], "b.txt"),
        ])
        .await;
    assert!(matches!(
        &results[0].status,
        IngestionStatus::Failed { kind, .. } if kind == "unsupported_format"
    ));
    assert!(results[1].is_ok());
}

#[tokio::test]
async fn embed_texts_returns_mean_vector_from_one_call() {
    let (backend, ingestor) = scripted(100);
    let out = ingestor
        .embed_texts(&["ab".to_string(), "abcd".to_string()])
        .await
        .unwrap();
    assert_eq!(out.vector, vec![3.0, 1.0, 0.0, 0.0]);
    assert_eq!(out.length, DIMS);
    assert_eq!(backend.calls().len(), 1);
}

#[tokio::test]
async fn store_then_search_in_memory() {
    let ingestor = hashing(1000);
    let store = InMemoryVectorStore::new();
    let results = ingestor
        .store(
            vec![
                Resource::named(&b"rust ownership and borrowing rules"[..], "rust.txt"),
                Resource::named(&b"banana bread recipe with walnuts"[..], "bread.txt"),
                Resource::named(&b""[..], "empty.txt"),
            ],
            &store,
        )
        .await;

    assert!(results[0].is_ok());
    assert!(results[1].is_ok());
    assert!(results[2].is_failed());
    assert_eq!(store.count().await.unwrap(), 2);

    let hits = ingestor
        .search("borrowing rules in rust", 1, &store)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].metadata["source"], "rust.txt");
    assert_eq!(hits[0].metadata["fileType"], "txt");
}

#[tokio::test]
async fn store_failure_is_reported_per_resource() {
    let ingestor = hashing(1000);
    let results = ingestor
        .store(vec![Resource::named(&b"some text"[..], "a.txt")], &FailingStore)
        .await;
    assert!(matches!(
        &results[0].status,
        IngestionStatus::Failed { kind, .. } if kind == "vector_store_error"
    ));
    assert_eq!(results[0].file_type, Some(FileType::Txt));
}

#[tokio::test]
async fn store_then_search_in_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let pool = db::connect_path(&dir.path().join("data").join("t2v.sqlite"))
        .await
        .unwrap();
    migrate::migrate_pool(&pool).await.unwrap();
    let store = SqliteVectorStore::new(pool);

    let ingestor = hashing(1000);
    let pdf = pdf_with_pages(&["quarterly revenue grew", "office party planning"]);
    let results = ingestor
        .store(vec![Resource::named(pdf, "report.pdf")], &store)
        .await;
    assert!(results[0].is_ok(), "{:?}", results[0]);
    assert_eq!(results[0].chunk_count, 2);
    assert_eq!(store.count().await.unwrap(), 2);

    let hits = ingestor.search("revenue", 2, &store).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits[0].text.contains("revenue"));
    assert_eq!(hits[0].metadata["pageIndex"], "0");
    assert!(hits[0].score >= hits[1].score);
}
