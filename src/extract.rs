//! Text extraction for binary document formats (PDF, DOCX, PPTX).
//!
//! Extraction only turns bytes into structured plain text: whole-document
//! text for PDF, paragraphs for DOCX, one string per slide for PPTX.
//! Normalisation and chunking happen in [`crate::parser`].

use std::io::Read;

use quick_xml::events::Event;

use crate::chunk::clean_text;
use crate::error::ParseError;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

const DOCX_BODY: &str = "word/document.xml";
const PPTX_SLIDE_PREFIX: &str = "ppt/slides/slide";

/// Extract the text of every page of a PDF, concatenated in page order.
pub fn pdf_text(bytes: &[u8]) -> Result<String, ParseError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ParseError::Pdf(e.to_string()))
}

/// Extract the non-empty paragraphs of a DOCX body, in document order.
pub fn docx_paragraphs(bytes: &[u8]) -> Result<Vec<String>, ParseError> {
    let mut archive = open_archive(bytes)?;
    if !archive.file_names().any(|n| n == DOCX_BODY) {
        return Err(ParseError::Ooxml(format!("{} not found", DOCX_BODY)));
    }
    let xml = read_zip_entry_bounded(&mut archive, DOCX_BODY, MAX_XML_ENTRY_BYTES)?;
    Ok(xml_paragraphs(&xml)?
        .into_iter()
        .filter(|p| !p.trim().is_empty())
        .collect())
}

/// Extract one whitespace-normalised string per slide, in slide order.
///
/// Slides without any text come back as empty strings so callers can keep
/// slide numbering aligned with the deck.
pub fn pptx_slides(bytes: &[u8]) -> Result<Vec<String>, ParseError> {
    let mut archive = open_archive(bytes)?;
    let mut slide_names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with(PPTX_SLIDE_PREFIX) && n.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    slide_names.sort_by_key(|name| {
        name.trim_start_matches(PPTX_SLIDE_PREFIX)
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });

    let mut slides = Vec::with_capacity(slide_names.len());
    for name in slide_names {
        let xml = read_zip_entry_bounded(&mut archive, &name, MAX_XML_ENTRY_BYTES)?;
        slides.push(clean_text(&xml_paragraphs(&xml)?.join(" ")));
    }
    Ok(slides)
}

fn open_archive(bytes: &[u8]) -> Result<zip::ZipArchive<std::io::Cursor<&[u8]>>, ParseError> {
    zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| ParseError::Ooxml(e.to_string()))
}

fn read_zip_entry_bounded(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, ParseError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ParseError::Ooxml(e.to_string()))?;
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(|e| ParseError::Ooxml(e.to_string()))?;
    if out.len() as u64 >= max_bytes {
        return Err(ParseError::Ooxml(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

/// Collect the text runs (`<*:t>`) of each paragraph (`<*:p>`).
///
/// WordprocessingML (`w:p`/`w:t`) and DrawingML (`a:p`/`a:t`) share local
/// names, so one walker covers both DOCX bodies and PPTX slides.
fn xml_paragraphs(xml: &[u8]) -> Result<Vec<String>, ParseError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => paragraphs.push(std::mem::take(&mut current)),
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                let text = te
                    .unescape()
                    .map_err(|e| ParseError::Ooxml(e.to_string()))?;
                current.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ParseError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }
    Ok(paragraphs)
}
