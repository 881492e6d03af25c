/*!
 * EPUB reader.
 *
 * Follows `META-INF/container.xml` to the package document and reads content
 * documents in spine order. Archives without a usable package document fall back
 * to every XHTML/HTML entry in archive order.
 */

use encoding_rs::UTF_8;
use log::{debug, warn};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Read, Seek};
use url::Url;
use zip::ZipArchive;

use super::{tidy_paragraphs, Document, DocumentFormat};
use crate::errors::DocumentError;

const CONTAINER_PATH: &str = "META-INF/container.xml";

const BLOCK_ELEMENTS: [&[u8]; 17] = [
    b"p", b"div", b"h1", b"h2", b"h3", b"h4", b"h5", b"h6", b"li", b"blockquote", b"section", b"article",
    b"tr", b"dd", b"dt", b"pre", b"hr",
];

const SKIPPED_ELEMENTS: [&[u8]; 3] = [b"script", b"style", b"head"];

fn malformed(message: impl ToString) -> DocumentError {
    DocumentError::Malformed {
        format: "EPUB",
        message: message.to_string(),
    }
}

/// Parse an EPUB container
pub fn parse<R: Read + Seek>(reader: R) -> Result<Document, DocumentError> {
    let mut archive = ZipArchive::new(reader).map_err(malformed)?;

    let documents = match spine_documents(&mut archive) {
        Ok(paths) if !paths.is_empty() => paths,
        Ok(_) => {
            warn!("EPUB spine is empty, reading all XHTML entries");
            html_entries(&archive)
        }
        Err(e) => {
            warn!("Could not read EPUB package document ({}), reading all XHTML entries", e);
            html_entries(&archive)
        }
    };

    if documents.is_empty() {
        return Err(malformed("no content documents"));
    }

    let mut text = String::new();
    for path in &documents {
        let markup = match read_entry(&mut archive, path) {
            Ok(markup) => markup,
            Err(e) => {
                warn!("Skipping EPUB entry {}: {}", path, e);
                continue;
            }
        };
        debug!("Reading EPUB content document {}", path);
        text.push_str(&xhtml_text(&markup));
        text.push_str("\n\n");
    }

    Ok(Document {
        text: tidy_paragraphs(&text),
        encoding: UTF_8,
        format: DocumentFormat::Epub,
    })
}

fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Result<String, DocumentError> {
    let mut entry = archive.by_name(path).map_err(malformed)?;
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn html_entries<R: Read + Seek>(archive: &ZipArchive<R>) -> Vec<String> {
    archive
        .file_names()
        .filter(|name| {
            let lower = name.to_lowercase();
            lower.ends_with(".xhtml") || lower.ends_with(".html") || lower.ends_with(".htm")
        })
        .map(str::to_string)
        .collect()
}

/// Content document paths in reading order
fn spine_documents<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<Vec<String>, DocumentError> {
    let container = read_entry(archive, CONTAINER_PATH)?;
    let opf_path = rootfile_path(&container)?.ok_or_else(|| malformed("container.xml has no rootfile"))?;
    let opf = read_entry(archive, &opf_path)?;

    let base = match opf_path.rfind('/') {
        Some(pos) => &opf_path[..=pos],
        None => "",
    };

    let (manifest, spine) = package_items(&opf)?;
    Ok(spine
        .iter()
        .filter_map(|idref| match manifest.get(idref) {
            Some(href) => {
                let path = resolve_href(base, href);
                if path.is_none() {
                    warn!("Cannot resolve manifest href {}", href);
                }
                path
            }
            None => {
                warn!("Spine references unknown manifest item {}", idref);
                None
            }
        })
        .collect())
}

fn rootfile_path(container: &str) -> Result<Option<String>, DocumentError> {
    let mut reader = Reader::from_str(container);
    loop {
        match reader.read_event().map_err(malformed)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"rootfile" => {
                for attr in e.attributes().flatten() {
                    if attr.key.local_name().as_ref() == b"full-path" {
                        return Ok(Some(attr.unescape_value().map_err(malformed)?.into_owned()));
                    }
                }
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

/// Manifest (id -> href) and spine idrefs from the package document
fn package_items(opf: &str) -> Result<(HashMap<String, String>, Vec<String>), DocumentError> {
    let mut reader = Reader::from_str(opf);
    let mut manifest = HashMap::new();
    let mut spine = Vec::new();

    loop {
        match reader.read_event().map_err(malformed)? {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"item" => {
                    let mut id = None;
                    let mut href = None;
                    for attr in e.attributes().flatten() {
                        let value = attr.unescape_value().map_err(malformed)?.into_owned();
                        match attr.key.local_name().as_ref() {
                            b"id" => id = Some(value),
                            b"href" => href = Some(value),
                            _ => {}
                        }
                    }
                    if let (Some(id), Some(href)) = (id, href) {
                        manifest.insert(id, href);
                    }
                }
                b"itemref" => {
                    for attr in e.attributes().flatten() {
                        if attr.key.local_name().as_ref() == b"idref" {
                            spine.push(attr.unescape_value().map_err(malformed)?.into_owned());
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok((manifest, spine))
}

/// Archive path of a manifest href relative to the package directory
fn resolve_href(base: &str, href: &str) -> Option<String> {
    let root = Url::parse("epub:/").ok()?;
    let resolved = root.join(base).ok()?.join(href).ok()?;
    let path = resolved.path().trim_start_matches('/');
    let decoded = urlencoding::decode(path).ok()?;
    Some(decoded.into_owned())
}

/// Entities HTML content documents commonly use but XML does not define
fn html_entity(name: &str) -> Option<&'static str> {
    match name {
        "nbsp" => Some("\u{a0}"),
        "mdash" => Some("\u{2014}"),
        "ndash" => Some("\u{2013}"),
        "hellip" => Some("\u{2026}"),
        "laquo" => Some("\u{ab}"),
        "raquo" => Some("\u{bb}"),
        "ldquo" => Some("\u{201c}"),
        "rdquo" => Some("\u{201d}"),
        "lsquo" => Some("\u{2018}"),
        "rsquo" => Some("\u{2019}"),
        "bdquo" => Some("\u{201e}"),
        "shy" => Some(""),
        "copy" => Some("\u{a9}"),
        _ => None,
    }
}

/// Text of an XHTML content document's `<body>`, with block elements as paragraph breaks
fn xhtml_text(markup: &str) -> String {
    let mut reader = Reader::from_str(markup);
    reader.check_end_names(false);

    let mut out = String::new();
    let mut in_body = false;
    let mut skip_depth = 0usize;

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => {
                warn!("Stopping at malformed XHTML near byte {}: {}", reader.buffer_position(), e);
                break;
            }
        };

        match event {
            Event::Start(e) => {
                let name = e.local_name();
                let name = name.as_ref();
                if name == b"body" {
                    in_body = true;
                } else if skip_depth > 0 || SKIPPED_ELEMENTS.contains(&name) {
                    skip_depth += 1;
                } else if in_body && BLOCK_ELEMENTS.contains(&name) {
                    out.push_str("\n\n");
                }
            }
            Event::Empty(e) => {
                let name = e.local_name();
                let name = name.as_ref();
                if in_body && skip_depth == 0 {
                    if name == b"br" {
                        out.push('\n');
                    } else if BLOCK_ELEMENTS.contains(&name) {
                        out.push_str("\n\n");
                    }
                }
            }
            Event::End(e) => {
                let name = e.local_name();
                let name = name.as_ref();
                if skip_depth > 0 {
                    skip_depth -= 1;
                } else if name == b"body" {
                    in_body = false;
                } else if in_body && BLOCK_ELEMENTS.contains(&name) {
                    out.push_str("\n\n");
                }
            }
            Event::Text(e) if in_body && skip_depth == 0 => match e.unescape_with(html_entity) {
                Ok(text) => out.push_str(&text),
                Err(_) => out.push_str(&String::from_utf8_lossy(&e)),
            },
            Event::CData(e) if in_body && skip_depth == 0 => {
                out.push_str(&String::from_utf8_lossy(&e.into_inner()));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    out
}
