use crate::error::IngestError;
use lopdf::Document;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};
use std::path::Path;

pub trait TextExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String, IngestError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    PlainText,
}

impl DocumentFormat {
    pub fn from_file_name(name: &str) -> Option<Self> {
        let extension = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())?
            .to_ascii_lowercase();

        match extension.as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "txt" | "md" => Some(Self::PlainText),
            _ => None,
        }
    }

    pub fn extractor(self) -> &'static dyn TextExtractor {
        match self {
            Self::Pdf => &PdfExtractor,
            Self::Docx => &DocxExtractor,
            Self::PlainText => &PlainTextExtractor,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String, IngestError> {
        let document =
            Document::load_mem(bytes).map_err(|error| IngestError::Extraction(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| IngestError::Extraction(error.to_string()))?;
            pages.push(text);
        }

        if pages.iter().all(|page| page.trim().is_empty()) {
            return Err(IngestError::Extraction(
                "pdf had no readable page text".to_string(),
            ));
        }

        Ok(pages.join("\n"))
    }
}

/// Reads `word/document.xml` out of the zip container. Paragraphs are
/// separated by blank lines so the chunker sees their boundaries.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocxExtractor;

impl TextExtractor for DocxExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String, IngestError> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|error| {
            IngestError::Extraction(format!("not a valid .docx (zip) file: {error}"))
        })?;
        let mut entry = archive.by_name("word/document.xml").map_err(|error| {
            IngestError::Extraction(format!("missing word/document.xml: {error}"))
        })?;

        let mut xml = String::new();
        entry.read_to_string(&mut xml)?;
        docx_paragraphs(&xml).map(|paragraphs| paragraphs.join("\n\n"))
    }
}

fn docx_paragraphs(xml: &str) -> Result<Vec<String>, IngestError> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|error| IngestError::Extraction(format!("malformed document.xml: {error}")))?;

        match event {
            Event::Start(element) => match element.local_name().as_ref() {
                b"t" => in_text = true,
                b"tab" => current.push('\t'),
                b"br" => current.push('\n'),
                _ => {}
            },
            Event::Empty(element) => match element.local_name().as_ref() {
                b"tab" => current.push('\t'),
                b"br" => current.push('\n'),
                _ => {}
            },
            Event::End(element) => match element.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let paragraph = std::mem::take(&mut current);
                    if !paragraph.trim().is_empty() {
                        paragraphs.push(paragraph.trim().to_string());
                    }
                }
                _ => {}
            },
            Event::Text(text) if in_text => {
                let unescaped = text
                    .unescape()
                    .map_err(|error| IngestError::Extraction(error.to_string()))?;
                current.push_str(&unescaped);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String, IngestError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|error| IngestError::Extraction(format!("invalid utf-8: {error}")))?;
        Ok(text.trim_start_matches('\u{feff}').to_string())
    }
}

pub fn is_supported(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(DocumentFormat::from_file_name)
        .is_some()
}

/// Extracts UTF-8 text from an uploaded file, choosing the reader by the
/// file name's extension.
pub fn extract_text(file_name: &str, bytes: &[u8]) -> Result<String, IngestError> {
    let format = DocumentFormat::from_file_name(file_name)
        .ok_or_else(|| IngestError::UnsupportedFileType(file_name.to_string()))?;
    format.extractor().extract(bytes)
}
