use crate::error::IngestError;
use lopdf::Document;
use regex::Regex;

pub trait PdfExtractor: Send + Sync {
    /// Returns the document's plain text. Empty or whitespace-only output is
    /// an error: such a document can never be queried.
    fn extract_text(&self, bytes: &[u8]) -> Result<String, IngestError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_text(&self, bytes: &[u8]) -> Result<String, IngestError> {
        let document =
            Document::load_mem(bytes).map_err(|error| IngestError::Extraction(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| IngestError::Extraction(error.to_string()))?;

            if !text.trim().is_empty() {
                pages.push(text);
            }
        }

        let text = compact_text(&pages.join("\n\n"))?;
        if text.is_empty() {
            return Err(IngestError::Extraction(
                "pdf had no extractable text (image-only documents are not supported)".to_string(),
            ));
        }

        Ok(text)
    }
}

/// Collapses horizontal whitespace runs and more than one blank line.
pub fn compact_text(text: &str) -> Result<String, IngestError> {
    let horizontal = Regex::new(r"[ \t\u{a0}]+")?;
    let trailing = Regex::new(r" *\n *")?;
    let blank_lines = Regex::new(r"\n{3,}")?;

    let text = horizontal.replace_all(text, " ");
    let text = trailing.replace_all(&text, "\n");
    let text = blank_lines.replace_all(&text, "\n\n");
    Ok(text.trim().to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    pub(crate) fn render_pdf(lines: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let mut operations = Vec::new();
        for line in lines {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec!["F1".into(), 12.into()]));
            operations.push(Operation::new("Td", vec![72.into(), 720.into()]));
            operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
            operations.push(Operation::new("ET", vec![]));
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("content should encode"),
        ));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).expect("pdf should serialize");
        buffer
    }

    #[test]
    fn extracts_invoice_text() {
        let pdf = render_pdf(&["The invoice total is $42."]);
        let text = LopdfExtractor.extract_text(&pdf).expect("text should extract");
        assert!(text.contains("$42"), "unexpected text: {text:?}");
    }

    #[test]
    fn image_only_pdf_is_an_extraction_error() {
        let pdf = render_pdf(&[]);
        let result = LopdfExtractor.extract_text(&pdf);
        assert!(matches!(result, Err(IngestError::Extraction(_))));
    }

    #[test]
    fn garbage_bytes_are_an_extraction_error() {
        let result = LopdfExtractor.extract_text(b"%PDF-1.4\n%broken");
        assert!(matches!(result, Err(IngestError::Extraction(_))));
    }

    #[test]
    fn compaction_collapses_spacing() {
        let text = compact_text("  A  \t lot \n\n\n\n of   spacing \n").unwrap();
        assert_eq!(text, "A lot\n\nof spacing");
    }
}
