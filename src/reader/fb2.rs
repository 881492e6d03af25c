/*!
 * FictionBook 2 reader.
 *
 * Only the first `<body>` is read; later bodies hold notes and comments.
 * Paragraph-level elements (`p`, `v`, `subtitle`, `text-author`, `empty-line`)
 * become blank-line breaks.
 */

use encoding_rs::Encoding;
use log::{debug, warn};
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::bytes::Regex;
use std::sync::LazyLock;

use super::{tidy_paragraphs, Document, DocumentFormat};
use crate::encoding::EncodingResolver;
use crate::errors::DocumentError;

/// Encoding label inside the XML declaration
static XML_DECLARED_ENCODING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<\?xml[^>]*?encoding\s*=\s*["']([A-Za-z0-9._:-]+)["']"#).expect("Invalid XML declaration regex")
});

const BREAK_ELEMENTS: [&[u8]; 5] = [b"p", b"v", b"subtitle", b"text-author", b"empty-line"];

/// Parse an FB2 document from raw bytes
pub fn parse(bytes: &[u8], resolver: &EncodingResolver) -> Result<Document, DocumentError> {
    let declared = declared_encoding(bytes);
    if let Some(encoding) = declared {
        debug!("FB2 declares {} encoding", encoding.name());
    }

    let decoded = resolver.decode_with_hint(bytes, declared)?;
    let text = extract_body_text(&decoded.text)?;

    Ok(Document {
        text,
        encoding: decoded.encoding,
        format: DocumentFormat::Fb2,
    })
}

/// Encoding named in the `<?xml ... encoding="..."?>` declaration, if known
fn declared_encoding(bytes: &[u8]) -> Option<&'static Encoding> {
    let head = &bytes[..bytes.len().min(256)];
    let label = XML_DECLARED_ENCODING.captures(head)?.get(1)?;
    let encoding = Encoding::for_label(label.as_bytes());
    if encoding.is_none() {
        warn!("Ignoring unknown FB2 encoding label: {}", String::from_utf8_lossy(label.as_bytes()));
    }
    encoding
}

fn extract_body_text(xml: &str) -> Result<String, DocumentError> {
    let mut reader = Reader::from_str(xml);
    reader.check_end_names(false);

    let mut out = String::new();
    let mut depth = 0usize;
    let mut body_done = false;

    loop {
        let event = reader.read_event().map_err(|e| DocumentError::Malformed {
            format: "FB2",
            message: format!("at byte {}: {}", reader.buffer_position(), e),
        })?;

        match event {
            Event::Start(e) => {
                let name = e.local_name();
                if depth > 0 {
                    depth += 1;
                } else if !body_done && name.as_ref() == b"body" {
                    depth = 1;
                }
            }
            Event::Empty(e) => {
                if depth > 0 && BREAK_ELEMENTS.contains(&e.local_name().as_ref()) {
                    out.push_str("\n\n");
                }
            }
            Event::End(e) => {
                if depth == 0 {
                    continue;
                }
                depth -= 1;
                if depth == 0 {
                    body_done = true;
                } else if BREAK_ELEMENTS.contains(&e.local_name().as_ref()) {
                    out.push_str("\n\n");
                }
            }
            Event::Text(e) if depth > 0 => match e.unescape() {
                Ok(text) => out.push_str(&text),
                Err(_) => out.push_str(&String::from_utf8_lossy(&e)),
            },
            Event::CData(e) if depth > 0 => {
                out.push_str(&String::from_utf8_lossy(&e.into_inner()));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !body_done && depth == 0 {
        return Err(DocumentError::Malformed {
            format: "FB2",
            message: "no <body> element".to_string(),
        });
    }

    Ok(tidy_paragraphs(&out))
}
