//! DOCX text extraction.
//!
//! Reads `word/document.xml` out of the package and collects the text runs
//! of each paragraph. Formatting, tables and embedded objects are ignored.

use std::io::{Cursor, Read};
use zip::ZipArchive;

use crate::error::{ServiceError, ServiceResult};

const DOCUMENT_PART: &str = "word/document.xml";

/// Extract the non-empty paragraphs of a DOCX document.
///
/// The document part may decompress to at most `max_part_bytes`; the
/// declared size is checked first and the read itself is capped.
pub fn extract_paragraphs(bytes: &[u8], max_part_bytes: u64) -> ServiceResult<Vec<String>> {
    let invalid = |e: &dyn std::fmt::Display| {
        ServiceError::validation(format!("Could not read DOCX document: {}", e))
    };
    let too_large = || {
        ServiceError::validation(format!(
            "DOCX document text exceeds the maximum of {} bytes",
            max_part_bytes
        ))
    };

    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| invalid(&e))?;
    let part = archive.by_name(DOCUMENT_PART).map_err(|e| invalid(&e))?;
    if part.size() > max_part_bytes {
        return Err(too_large());
    }

    let mut xml = String::new();
    part.take(max_part_bytes.saturating_add(1))
        .read_to_string(&mut xml)
        .map_err(|e| invalid(&e))?;
    if xml.len() as u64 > max_part_bytes {
        return Err(too_large());
    }

    Ok(paragraphs_from_xml(&xml))
}

/// Walk the WordprocessingML markup, keeping `<w:t>` text and breaking on `</w:p>`
fn paragraphs_from_xml(xml: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut rest = xml;

    while let Some(start) = rest.find('<') {
        if in_text {
            current.push_str(&unescape(&rest[..start]));
        }
        let Some(len) = rest[start..].find('>') else {
            break;
        };
        let tag = &rest[start + 1..start + len];
        rest = &rest[start + len + 1..];

        let closing = tag.starts_with('/');
        let self_closing = tag.ends_with('/');
        let name = tag
            .trim_start_matches('/')
            .split(|c: char| c.is_whitespace() || c == '/')
            .next()
            .unwrap_or("");

        match (name, closing) {
            ("w:t", false) => in_text = !self_closing,
            ("w:t", true) => in_text = false,
            ("w:tab", false) => current.push('\t'),
            ("w:br", false) | ("w:cr", false) => current.push('\n'),
            ("w:p", true) => push_paragraph(&mut paragraphs, &mut current),
            _ => {}
        }
    }
    push_paragraph(&mut paragraphs, &mut current);

    paragraphs
}

fn push_paragraph(paragraphs: &mut Vec<String>, current: &mut String) {
    let text = current.trim();
    if !text.is_empty() {
        paragraphs.push(text.to_string());
    }
    current.clear();
}

/// Decode the predefined XML entities and numeric character references.
/// Anything unrecognised is kept as written.
fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let decoded = rest
            .find(';')
            .and_then(|end| decode_entity(&rest[1..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);

    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "amp" => Some('&'),
        _ => {
            let number = entity.strip_prefix('#')?;
            let code = match number.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => number.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn build_docx(document_xml: &str) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file(DOCUMENT_PART, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(document_xml.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>Interviewer: How did the </w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve">move </w:t></w:r><w:r><w:t>feel?</w:t></w:r></w:p>
    <w:p/>
    <w:p><w:r><w:t>Participant: Lonely &amp; quiet.</w:t><w:br/><w:t>Then better.</w:t></w:r></w:p>
  </w:body>
</w:document>"#;

    #[test]
    fn test_paragraphs_from_xml() {
        assert_eq!(
            paragraphs_from_xml(SAMPLE),
            vec![
                "Interviewer: How did the move feel?",
                "Participant: Lonely & quiet.\nThen better.",
            ]
        );
    }

    #[test]
    fn test_extract_from_package() {
        let bytes = build_docx(SAMPLE);
        assert!(infer::doc::is_docx(&bytes));

        let paragraphs = extract_paragraphs(&bytes, 1024 * 1024).unwrap();
        assert_eq!(paragraphs.len(), 2);
    }

    #[test]
    fn test_oversized_document_part_is_rejected() {
        // Highly repetitive text compresses to a tiny fraction of its size
        let xml = format!(
            "<w:document><w:body><w:p><w:r><w:t>{}</w:t></w:r></w:p></w:body></w:document>",
            "a".repeat(64 * 1024)
        );
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file(
                DOCUMENT_PART,
                SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated),
            )
            .unwrap();
        writer.write_all(xml.as_bytes()).unwrap();
        let bytes = writer.finish().unwrap().into_inner();
        assert!(bytes.len() < 4096);

        let err = extract_paragraphs(&bytes, 1024).unwrap_err();
        assert!(matches!(err, ServiceError::Validation { .. }));
        assert!(err.to_string().contains("exceeds the maximum of 1024 bytes"));

        assert_eq!(extract_paragraphs(&bytes, 1024 * 1024).unwrap().len(), 1);
    }

    #[test]
    fn test_character_references_are_decoded() {
        assert_eq!(unescape("caf&#233; &#x2019;ok"), "caf\u{e9} \u{2019}ok");
        assert_eq!(unescape("&#X41;&lt;&amp;&gt;"), "A<&>");
    }

    #[test]
    fn test_unknown_entities_are_kept() {
        assert_eq!(unescape("AT&T &nbsp; &#xZZ; &#1114112; 5 & 6"), "AT&T &nbsp; &#xZZ; &#1114112; 5 & 6");
    }

    #[test]
    fn test_package_without_document_part() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("word/styles.xml", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"<w:styles/>").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let err = extract_paragraphs(&bytes, 1024).unwrap_err();
        assert!(err.to_string().starts_with("Could not read DOCX document"));
    }
}
