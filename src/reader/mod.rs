/*!
 * Document readers.
 *
 * Each reader turns one input format into a single raw text blob with paragraphs
 * separated by blank lines. Markup is discarded; only the paragraph structure
 * survives into the translation pipeline.
 *
 * - `text`: plain text in any encoding the resolver accepts
 * - `epub`: EPUB containers, read in spine order
 * - `fb2`: FictionBook 2 XML
 */

use encoding_rs::Encoding;
use log::info;
use std::fs;
use std::path::Path;

use crate::encoding::EncodingResolver;
use crate::errors::DocumentError;

pub mod epub;
pub mod fb2;
pub mod text;

/// Input formats with a reader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// Plain text
    Text,
    /// EPUB e-book
    Epub,
    /// FictionBook 2
    Fb2,
}

impl DocumentFormat {
    /// Pick a format from the file extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, DocumentError> {
        let extension = path
            .as_ref()
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "txt" | "text" => Ok(Self::Text),
            "epub" => Ok(Self::Epub),
            "fb2" => Ok(Self::Fb2),
            "" => Err(DocumentError::UnsupportedFormat("(no extension)".to_string())),
            other => Err(DocumentError::UnsupportedFormat(format!(".{}", other))),
        }
    }

    /// Short display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Epub => "EPUB",
            Self::Fb2 => "FB2",
        }
    }
}

/// A source document: raw text, the encoding it was decoded with, and its format
#[derive(Debug, Clone)]
pub struct Document {
    /// Extracted text, paragraphs separated by blank lines
    pub text: String,
    /// Encoding used to decode the input
    pub encoding: &'static Encoding,
    /// Format the text was extracted from
    pub format: DocumentFormat,
}

impl Document {
    /// Length of the text in characters
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// Read any supported document from disk
pub fn read_document<P: AsRef<Path>>(path: P, resolver: &EncodingResolver) -> Result<Document, DocumentError> {
    let path = path.as_ref();
    let format = DocumentFormat::from_path(path)?;

    let document = match format {
        DocumentFormat::Text => text::read(path, resolver)?,
        DocumentFormat::Fb2 => {
            let bytes = fs::read(path)?;
            fb2::parse(&bytes, resolver)?
        }
        DocumentFormat::Epub => {
            let file = fs::File::open(path)?;
            epub::parse(file)?
        }
    };

    info!(
        "Loaded {} characters from {} ({}, {})",
        document.char_count(),
        path.display(),
        document.format.name(),
        document.encoding.name()
    );

    Ok(document)
}

/// Collapses runs of blank lines and trims each paragraph
pub(crate) fn tidy_paragraphs(raw: &str) -> String {
    raw.split("\n\n")
        .map(|p| p.lines().map(str::trim).filter(|l| !l.is_empty()).collect::<Vec<_>>().join("\n"))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}
