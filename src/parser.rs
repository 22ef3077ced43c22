//! Document parser: turns one file into an ordered list of chunk strings.
//!
//! Dispatch is by file extension (case-insensitive):
//!
//! | Extension | Strategy |
//! |-----------|----------|
//! | `.pdf` | all page text, whitespace-normalised, then [`chunk_text`] |
//! | `.docx` | non-empty paragraphs joined, normalised, then [`chunk_text`] |
//! | `.pptx` | one `[Slide N] ...` chunk per non-empty slide |
//! | `.csv` | a header summary chunk, then batches of `column: value` rows |
//! | `.md` | split on headings; oversized sections re-chunked |
//! | `.txt` | paragraphs batched up to a size threshold |
//!
//! Anything else parses to no chunks. [`parse_document`] returns a typed
//! [`ParseError`]; [`diagnostic_chunk`] is what ingestion substitutes for a
//! file that failed so the rest of the run can continue.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::chunk::{chunk_text, clean_text};
use crate::config::ChunkingConfig;
use crate::error::ParseError;
use crate::extract;

/// A newline followed by a markdown heading marker.
static HEADING_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n#+\s").expect("valid regex"));

/// Supported document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
    Pptx,
    Csv,
    Markdown,
    Text,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "pptx" => Some(Self::Pptx),
            "csv" => Some(Self::Csv),
            "md" => Some(Self::Markdown),
            "txt" => Some(Self::Text),
            _ => None,
        }
    }
}

/// Parse one file into chunk strings.
///
/// Unsupported extensions yield `Ok(vec![])`.
pub fn parse_document(path: &Path, config: &ChunkingConfig) -> Result<Vec<String>, ParseError> {
    let kind = match DocumentKind::from_path(path) {
        Some(kind) => kind,
        None => return Ok(Vec::new()),
    };

    match kind {
        DocumentKind::Pdf => {
            let text = extract::pdf_text(&read_bytes(path)?)?;
            Ok(generic_chunks(&clean_text(&text), config))
        }
        DocumentKind::Docx => {
            let paragraphs = extract::docx_paragraphs(&read_bytes(path)?)?;
            Ok(generic_chunks(&clean_text(&paragraphs.join("\n")), config))
        }
        DocumentKind::Pptx => {
            let slides = extract::pptx_slides(&read_bytes(path)?)?;
            Ok(slide_chunks(&slides))
        }
        DocumentKind::Csv => {
            let reader = csv::ReaderBuilder::new()
                .has_headers(false)
                .flexible(true)
                .from_path(path)?;
            csv_chunks(reader, config.csv_batch_size)
        }
        DocumentKind::Markdown => Ok(markdown_chunks(&read_text(path)?, config)),
        DocumentKind::Text => Ok(paragraph_chunks(
            &read_text(path)?,
            config.paragraph_batch_size,
        )),
    }
}

/// The single chunk that stands in for a file that failed to parse.
pub fn diagnostic_chunk(filename: &str, err: &ParseError) -> String {
    format!("Error parsing file {}: {}", filename, err)
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, ParseError> {
    std::fs::read(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_text(path: &Path) -> Result<String, ParseError> {
    let bytes = read_bytes(path)?;
    String::from_utf8(bytes).map_err(|_| ParseError::Encoding {
        path: path.to_path_buf(),
    })
}

fn generic_chunks(text: &str, config: &ChunkingConfig) -> Vec<String> {
    chunk_text(text, config.max_chunk_size, config.overlap)
}

/// Slides are kept whole: one labelled chunk per slide with text.
fn slide_chunks(slides: &[String]) -> Vec<String> {
    slides
        .iter()
        .enumerate()
        .filter(|(_, text)| !text.is_empty())
        .map(|(i, text)| format!("[Slide {}] {}", i + 1, text))
        .collect()
}

/// A `CSV Headers: ...` summary chunk, then `batch_size` rows per chunk.
///
/// Each row renders its non-blank cells as `column: value` joined by ` | `;
/// cells past the header width are labelled `Col<i>`. Rows with no
/// non-blank cell are skipped.
fn csv_chunks<R: std::io::Read>(
    mut reader: csv::Reader<R>,
    batch_size: usize,
) -> Result<Vec<String>, ParseError> {
    let mut records = reader.records();
    let headers: Vec<String> = match records.next() {
        Some(record) => record?.iter().map(|h| h.to_string()).collect(),
        None => return Ok(Vec::new()),
    };
    if headers.is_empty() {
        return Ok(Vec::new());
    }

    let mut chunks = vec![format!("CSV Headers: {}", headers.join(", "))];
    let mut batch: Vec<String> = Vec::with_capacity(batch_size);

    for record in records {
        let record = record?;
        if !record.iter().any(|cell| !cell.trim().is_empty()) {
            continue;
        }
        let row = record
            .iter()
            .enumerate()
            .filter(|(_, cell)| !cell.trim().is_empty())
            .map(|(i, cell)| match headers.get(i) {
                Some(header) => format!("{}: {}", header, cell),
                None => format!("Col{}: {}", i, cell),
            })
            .collect::<Vec<_>>()
            .join(" | ");
        batch.push(row);

        if batch.len() >= batch_size {
            chunks.push(batch.join("\n"));
            batch.clear();
        }
    }
    if !batch.is_empty() {
        chunks.push(batch.join("\n"));
    }

    Ok(chunks)
}

/// Split on heading boundaries; sections over the limit go through the
/// generic chunker.
fn markdown_chunks(content: &str, config: &ChunkingConfig) -> Vec<String> {
    let mut chunks = Vec::new();
    for section in HEADING_BOUNDARY.split(content) {
        let section = section.trim();
        if section.is_empty() {
            continue;
        }
        if section.chars().count() > config.markdown_section_limit {
            chunks.extend(generic_chunks(section, config));
        } else {
            chunks.push(section.to_string());
        }
    }
    chunks
}

/// Batch blank-line separated paragraphs until the next one would push the
/// batch past `limit` characters.
fn paragraph_chunks(content: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for para in content.split("\n\n") {
        let para = clean_text(para);
        if para.is_empty() {
            continue;
        }
        if current.chars().count() + para.chars().count() > limit {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            current = para;
        } else {
            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(&para);
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn kind_from_extension_is_case_insensitive() {
        assert_eq!(DocumentKind::from_path(Path::new("a/B.PDF")), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::from_path(Path::new("notes.md")), Some(DocumentKind::Markdown));
        assert_eq!(DocumentKind::from_path(Path::new("image.png")), None);
        assert_eq!(DocumentKind::from_path(Path::new("README")), None);
    }

    #[test]
    fn unsupported_extension_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "picture.png", "not really");
        let chunks = parse_document(&path, &ChunkingConfig::default()).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn csv_header_then_row_batches() {
        let dir = TempDir::new().unwrap();
        let mut body = String::from("a,b\n");
        for i in 0..12 {
            body.push_str(&format!("{},{}\n", i, i * 2));
        }
        let path = write(&dir, "data.csv", &body);

        let chunks = parse_document(&path, &ChunkingConfig::default()).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], "CSV Headers: a, b");
        assert_eq!(chunks[1].lines().count(), 10);
        assert_eq!(chunks[2].lines().count(), 2);
        assert_eq!(chunks[1].lines().next().unwrap(), "a: 0 | b: 0");
        assert_eq!(chunks[2].lines().last().unwrap(), "a: 11 | b: 22");
    }

    #[test]
    fn csv_skips_blank_rows_and_labels_extra_columns() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "wide.csv", "name\nx,,extra\n , \nz\n");
        let chunks = parse_document(&path, &ChunkingConfig::default()).unwrap();
        assert_eq!(chunks, vec!["CSV Headers: name", "name: x | Col2: extra\nname: z"]);
    }

    #[test]
    fn empty_csv_has_no_chunks() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "empty.csv", "");
        assert!(parse_document(&path, &ChunkingConfig::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn text_paragraphs_are_batched() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "facts.txt", "Alpha fact.\n\nBeta fact.\n\n\n\nGamma  fact.");

        let config = ChunkingConfig::default();
        let chunks = parse_document(&path, &config).unwrap();
        assert_eq!(chunks, vec!["Alpha fact.\n\nBeta fact.\n\nGamma fact."]);

        let small = ChunkingConfig {
            paragraph_batch_size: 12,
            ..ChunkingConfig::default()
        };
        let chunks = parse_document(&path, &small).unwrap();
        assert_eq!(chunks, vec!["Alpha fact.", "Beta fact.", "Gamma fact."]);
    }

    #[test]
    fn markdown_splits_on_headings() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "guide.md",
            "Intro text.\n# Install\nRun cargo.\n## Usage\nCall it.\n",
        );
        let chunks = parse_document(&path, &ChunkingConfig::default()).unwrap();
        assert_eq!(chunks, vec!["Intro text.", "Install\nRun cargo.", "Usage\nCall it."]);
    }

    #[test]
    fn oversized_markdown_section_is_rechunked() {
        let dir = TempDir::new().unwrap();
        let body = "Some sentence about things. ".repeat(20);
        let path = write(&dir, "big.md", &format!("Lead.\n# Big\n{}", body));
        let config = ChunkingConfig {
            max_chunk_size: 100,
            overlap: 0,
            markdown_section_limit: 200,
            ..ChunkingConfig::default()
        };
        let chunks = parse_document(&path, &config).unwrap();
        assert_eq!(chunks[0], "Lead.");
        assert!(chunks.len() > 3);
        assert!(chunks[1..].iter().all(|c| c.chars().count() <= 100));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = parse_document(Path::new("/no/such/file.txt"), &ChunkingConfig::default())
            .unwrap_err();
        assert!(matches!(err, ParseError::Io { .. }));
        let chunk = diagnostic_chunk("file.txt", &err);
        assert!(chunk.starts_with("Error parsing file file.txt: failed to read"));
    }

    #[test]
    fn invalid_utf8_text_is_encoding_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("latin1.txt");
        fs::write(&path, [0x66, 0x6f, 0xff, 0xfe]).unwrap();
        let err = parse_document(&path, &ChunkingConfig::default()).unwrap_err();
        assert!(matches!(err, ParseError::Encoding { .. }));
    }

    #[test]
    fn slides_skip_empty_but_keep_numbering() {
        let slides = vec!["Title".to_string(), String::new(), "Third".to_string()];
        assert_eq!(slide_chunks(&slides), vec!["[Slide 1] Title", "[Slide 3] Third"]);
    }

    #[test]
    fn corrupt_docx_is_ooxml_error() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "broken.docx", "plain text, not a zip");
        let err = parse_document(&path, &ChunkingConfig::default()).unwrap_err();
        assert!(matches!(err, ParseError::Ooxml(_)));
    }
}
