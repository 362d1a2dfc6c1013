//! Inspection of fetched PDF bytes using lopdf
//!
//! The session never renders or modifies the PDF; it only needs to know the
//! bytes are a PDF, how many pages it has, and each page's MediaBox.

use lopdf::{Dictionary, Document, Object, ObjectId};
use thiserror::Error;

/// US Letter, used when a page declares no MediaBox anywhere in its tree
const LETTER_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("Failed to parse PDF: {0}")]
    Parse(String),

    #[error("PDF has no pages")]
    Empty,

    #[error("Page {0} not found")]
    PageNotFound(u32),

    #[error("Invalid MediaBox: {0}")]
    InvalidMediaBox(String),
}

/// PDF bytes that parsed successfully, with per-page geometry
#[derive(Debug, Clone)]
pub struct LoadedPdf {
    bytes: Vec<u8>,
    media_boxes: Vec<[f64; 4]>,
}

impl LoadedPdf {
    /// Parse `bytes` and read every page's MediaBox
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, PdfError> {
        let doc = Document::load_mem(&bytes).map_err(|e| PdfError::Parse(e.to_string()))?;

        let pages = doc.get_pages();
        if pages.is_empty() {
            return Err(PdfError::Empty);
        }

        // get_pages is keyed by 1-based page number in document order
        let mut media_boxes = Vec::with_capacity(pages.len());
        for (_, page_id) in pages {
            media_boxes.push(media_box(&doc, page_id)?);
        }

        Ok(Self { bytes, media_boxes })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn page_count(&self) -> u32 {
        self.media_boxes.len() as u32
    }

    /// MediaBox `[x, y, width, height]` of a zero-based page
    pub fn page_media_box(&self, page: u32) -> Result<[f64; 4], PdfError> {
        self.media_boxes
            .get(page as usize)
            .copied()
            .ok_or(PdfError::PageNotFound(page))
    }
}

/// MediaBox of a page, inherited through the Pages tree when absent
fn media_box(doc: &Document, page_id: ObjectId) -> Result<[f64; 4], PdfError> {
    let mut current = Some(page_id);
    // Guard against cyclic Parent chains
    let mut depth = 0;

    while let Some(id) = current {
        if depth > 32 {
            break;
        }
        depth += 1;

        let dict = match doc.get_object(id).and_then(Object::as_dict) {
            Ok(dict) => dict,
            Err(_) => break,
        };

        if let Ok(obj) = dict.get(b"MediaBox") {
            return parse_rect(doc, obj);
        }

        current = parent_of(dict);
    }

    Ok(LETTER_MEDIA_BOX)
}

fn parent_of(dict: &Dictionary) -> Option<ObjectId> {
    dict.get(b"Parent").and_then(Object::as_reference).ok()
}

/// Parse a PDF rectangle `[x1 y1 x2 y2]` into `[x, y, width, height]`
fn parse_rect(doc: &Document, obj: &Object) -> Result<[f64; 4], PdfError> {
    let arr = match obj {
        Object::Array(a) => a,
        Object::Reference(id) => doc
            .get_object(*id)
            .and_then(Object::as_array)
            .map_err(|e| PdfError::InvalidMediaBox(e.to_string()))?,
        _ => return Err(PdfError::InvalidMediaBox("not an array".to_string())),
    };

    if arr.len() != 4 {
        return Err(PdfError::InvalidMediaBox(format!(
            "{} elements, expected 4",
            arr.len()
        )));
    }

    let mut values = [0.0f64; 4];
    for (i, obj) in arr.iter().enumerate() {
        values[i] = number(doc, obj)?;
    }

    Ok([
        values[0],
        values[1],
        values[2] - values[0],
        values[3] - values[1],
    ])
}

fn number(doc: &Document, obj: &Object) -> Result<f64, PdfError> {
    match obj {
        Object::Integer(i) => Ok(*i as f64),
        Object::Real(r) => Ok(*r as f64),
        Object::Reference(id) => {
            let resolved = doc
                .get_object(*id)
                .map_err(|e| PdfError::InvalidMediaBox(e.to_string()))?;
            number(doc, resolved)
        }
        other => Err(PdfError::InvalidMediaBox(format!(
            "expected a number, got {:?}",
            other
        ))),
    }
}

/// Build a PDF with one page per entry of `media_boxes`, for tests across
/// the workspace
#[cfg(any(test, feature = "test-util"))]
pub fn sample_pdf(media_boxes: &[[i64; 4]]) -> Vec<u8> {
    use lopdf::dictionary;

    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let mut kids = Vec::new();
    for mb in media_boxes {
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![mb[0].into(), mb[1].into(), mb[2].into(), mb[3].into()],
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    // Writing to a Vec cannot fail
    let _ = doc.save_to(&mut buffer);
    buffer
}
