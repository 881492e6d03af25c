//! Plain text reader.

use std::path::Path;

use super::{Document, DocumentFormat};
use crate::encoding::EncodingResolver;
use crate::errors::DocumentError;

/// Read a plain text file, resolving its encoding
pub fn read(path: &Path, resolver: &EncodingResolver) -> Result<Document, DocumentError> {
    let decoded = resolver.resolve(path)?;
    Ok(Document {
        text: decoded.text,
        encoding: decoded.encoding,
        format: DocumentFormat::Text,
    })
}
