//! Content sniffing and structuring for uploaded documents.
//!
//! Every upload is classified by extension into a [`DocumentType`]. The bytes
//! are then checked against that type and, where the type is textual,
//! turned into the JSON stored in `documents.content`.

pub mod csv;
pub mod docx;
pub mod text;

use serde_json::{Value, json};
use std::path::Path;
use tracing::debug;

use crate::db::DocumentType;
use crate::error::{ServiceError, ServiceResult};

/// Check the uploaded bytes against the document type and build its structured content.
///
/// Returns `Ok(None)` for types that are stored without extraction.
/// `max_extracted_bytes` bounds the decompressed text of archive formats.
pub fn structure_content(
    document_type: DocumentType,
    filename: &str,
    bytes: &[u8],
    max_extracted_bytes: u64,
) -> ServiceResult<Option<Value>> {
    match document_type {
        DocumentType::Text => {
            let text = text::decode_utf8(bytes)?;
            Ok(Some(text::structure(&text)))
        }
        DocumentType::Csv if is_spreadsheet(filename) => {
            debug!(filename = %filename, "Spreadsheet stored without structured content");
            Ok(None)
        }
        DocumentType::Csv => {
            let text = text::decode_utf8(bytes)?;
            Ok(Some(csv::structure(&text)?))
        }
        DocumentType::Docx => {
            if !infer::doc::is_docx(bytes) {
                return Err(ServiceError::validation(format!(
                    "{} is not a valid DOCX document",
                    filename
                )));
            }
            let paragraphs = docx::extract_paragraphs(bytes, max_extracted_bytes)?;
            Ok(Some(json!({
                "text": paragraphs.join("\n\n"),
                "paragraphs": paragraphs,
            })))
        }
        DocumentType::Pdf => {
            if !infer::is_mime(bytes, "application/pdf") {
                return Err(ServiceError::validation(format!(
                    "{} is not a valid PDF document",
                    filename
                )));
            }
            debug!(filename = %filename, "PDF stored without structured content");
            Ok(None)
        }
    }
}

fn is_spreadsheet(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("xlsx") || e.eq_ignore_ascii_case("xls"))
        .unwrap_or(false)
}
