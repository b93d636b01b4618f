//! PDF text extraction
//!
//! Small documents are parsed in process; large ones are routed to the
//! asynchronous OCR service, which is slower and billed but reliable at
//! scale. The page count measured by the in-process parser decides the
//! route.

use crate::error::{ExtractError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Documents with more pages than this go to the OCR service.
pub const OCR_PAGE_THRESHOLD: usize = 50;

/// Location of a stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub bucket: String,
    pub key: String,
}

/// Trait for asynchronous OCR backends
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Extract per-page text for a stored document, pages in ascending order
    async fn document_text(&self, object: &ObjectRef) -> Result<Vec<String>>;
}

/// Count pages with the in-process parser; unreadable documents count as 0
/// and take the local route.
pub fn page_count(bytes: &[u8]) -> usize {
    match lopdf::Document::load_mem(bytes) {
        Ok(document) => document.get_pages().len(),
        Err(e) => {
            warn!(error = %e, "could not detect page count");
            0
        }
    }
}

/// Join per-page texts with blank lines, skipping blank pages.
fn join_pages(pages: &[String]) -> String {
    pages
        .iter()
        .map(|page| page.trim())
        .filter(|page| !page.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn local_text(bytes: &[u8]) -> Result<String> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| ExtractError::PdfParse(e.to_string()))?;
    Ok(join_pages(&pages))
}

/// Full-text extractor choosing between the in-process parser and OCR
pub struct Extractor {
    ocr: Arc<dyn OcrEngine>,
}

impl Extractor {
    pub fn new(ocr: Arc<dyn OcrEngine>) -> Self {
        Self { ocr }
    }

    /// Extract the full text of a PDF, returning it with the measured page
    /// count.
    pub async fn extract(&self, object: &ObjectRef, bytes: &[u8]) -> Result<(String, usize)> {
        let pages = page_count(bytes);

        let text = if pages > OCR_PAGE_THRESHOLD {
            info!(pages, key = %object.key, "routing large document to OCR");
            join_pages(&self.ocr.document_text(object).await?)
        } else {
            info!(pages, key = %object.key, "extracting in process");
            local_text(bytes)?
        };

        Ok((text, pages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeOcr {
        pages: Vec<String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl OcrEngine for FakeOcr {
        async fn document_text(&self, _object: &ObjectRef) -> Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.pages.clone())
        }
    }

    fn blank_pdf(pages: usize) -> Vec<u8> {
        use lopdf::{dictionary, Document, Object, Stream};

        let mut document = Document::with_version("1.5");
        let pages_id = document.new_object_id();
        let kids: Vec<Object> = (0..pages)
            .map(|_| {
                let content_id =
                    document.add_object(Stream::new(dictionary! {}, Vec::new()));
                document
                    .add_object(dictionary! {
                        "Type" => "Page",
                        "Parent" => pages_id,
                        "Contents" => content_id,
                    })
                    .into()
            })
            .collect();
        document.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages as i64,
                "Resources" => dictionary! {},
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        document.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        document.save_to(&mut bytes).expect("pdf serialization");
        bytes
    }

    fn object() -> ObjectRef {
        ObjectRef {
            bucket: "bucket".into(),
            key: "asap/doc.pdf".into(),
        }
    }

    #[test]
    fn test_page_count() {
        assert_eq!(page_count(&blank_pdf(3)), 3);
        assert_eq!(page_count(&blank_pdf(51)), 51);
        assert_eq!(page_count(b"definitely not a pdf"), 0);
    }

    #[test]
    fn test_join_pages_skips_blanks() {
        let pages = vec!["uno".to_string(), "  ".to_string(), "dos".to_string()];
        assert_eq!(join_pages(&pages), "uno\n\ndos");
    }

    #[tokio::test]
    async fn test_large_document_routes_to_ocr() {
        let ocr = Arc::new(FakeOcr {
            pages: vec!["página uno".into(), "página dos".into()],
            calls: AtomicUsize::new(0),
        });
        let extractor = Extractor::new(ocr.clone());

        let (text, pages) = extractor.extract(&object(), &blank_pdf(51)).await.unwrap();
        assert_eq!(pages, 51);
        assert_eq!(text, "página uno\n\npágina dos");
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fifty_pages_stay_local() {
        let ocr = Arc::new(FakeOcr {
            pages: vec!["no debería usarse".into()],
            calls: AtomicUsize::new(0),
        });
        let extractor = Extractor::new(ocr.clone());

        // Whatever the local parser makes of a contentless document, the
        // OCR service must not be consulted at or below the threshold.
        let _ = extractor.extract(&object(), &blank_pdf(50)).await;
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unreadable_bytes_fall_back_to_local_parser() {
        let ocr = Arc::new(FakeOcr {
            pages: vec![],
            calls: AtomicUsize::new(0),
        });
        let extractor = Extractor::new(ocr.clone());

        let result = extractor.extract(&object(), b"garbage").await;
        assert!(result.is_err());
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 0);
    }
}
