/*!
 * Source encoding resolution.
 *
 * Input documents arrive in whatever encoding they were saved with. The resolver
 * asks a statistical detector for a best guess, decodes strictly, and walks a
 * fixed fallback chain when the guess fails.
 *
 * The fallback chain (`UTF-8`, `windows-1251`, `KOI8-R`, `ISO-8859-5`) is a heuristic
 * for Cyrillic sources. It is not meant for other scripts: the three single-byte
 * encodings accept almost any byte sequence, so a non-Cyrillic file that is not valid
 * UTF-8 will decode into nonsense rather than fail.
 */

use encoding_rs::{Encoding, ISO_8859_5, KOI8_R, UTF_8, WINDOWS_1251};
use log::{debug, info, warn};
use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::DocumentError;

/// Default fallback chain, tried in order after the detector's guess
pub const CYRILLIC_FALLBACKS: [&Encoding; 4] = [UTF_8, WINDOWS_1251, KOI8_R, ISO_8859_5];

/// Statistical encoding detector
pub trait EncodingDetector: Send + Sync + Debug {
    /// Guess the encoding of a byte buffer
    fn detect(&self, bytes: &[u8]) -> Option<&'static Encoding>;
}

/// Detector backed by the chardetng crate
#[derive(Debug, Default, Clone, Copy)]
pub struct ChardetDetector;

impl EncodingDetector for ChardetDetector {
    fn detect(&self, bytes: &[u8]) -> Option<&'static Encoding> {
        if bytes.is_empty() {
            return None;
        }
        let mut detector = chardetng::EncodingDetector::new();
        detector.feed(bytes, true);
        Some(detector.guess(None, true))
    }
}

/// Text decoded from a byte stream together with the encoding that worked
#[derive(Debug, Clone)]
pub struct DecodedText {
    /// Decoded text
    pub text: String,
    /// Encoding used to decode it
    pub encoding: &'static Encoding,
}

/// Resolves the encoding of an input and decodes it
#[derive(Debug)]
pub struct EncodingResolver {
    detector: Box<dyn EncodingDetector>,
    fallbacks: Vec<&'static Encoding>,
    explicit: Option<&'static Encoding>,
}

impl Default for EncodingResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl EncodingResolver {
    /// Create a resolver with the chardetng detector and the Cyrillic fallback chain
    pub fn new() -> Self {
        Self {
            detector: Box::new(ChardetDetector),
            fallbacks: CYRILLIC_FALLBACKS.to_vec(),
            explicit: None,
        }
    }

    /// Replace the detector
    pub fn with_detector(mut self, detector: Box<dyn EncodingDetector>) -> Self {
        self.detector = detector;
        self
    }

    /// Replace the fallback chain
    pub fn with_fallbacks(mut self, fallbacks: Vec<&'static Encoding>) -> Self {
        self.fallbacks = fallbacks;
        self
    }

    /// Use a known encoding as the first candidate instead of detecting one
    pub fn with_explicit(mut self, encoding: Option<&'static Encoding>) -> Self {
        self.explicit = encoding;
        self
    }

    /// Look up an encoding by WHATWG label (e.g. "cp1251", "koi8-r")
    pub fn encoding_for_label(label: &str) -> Option<&'static Encoding> {
        Encoding::for_label(label.trim().as_bytes())
    }

    /// Read a file and decode it
    pub fn resolve<P: AsRef<Path>>(&self, path: P) -> Result<DecodedText, DocumentError> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        self.decode_bytes(&bytes, path, None)
    }

    /// Decode an in-memory buffer
    pub fn decode(&self, bytes: &[u8]) -> Result<DecodedText, DocumentError> {
        self.decode_bytes(bytes, Path::new("<memory>"), None)
    }

    /// Decode an in-memory buffer whose container declares an encoding.
    ///
    /// An explicitly configured encoding still wins over the declared one.
    pub fn decode_with_hint(&self, bytes: &[u8], declared: Option<&'static Encoding>) -> Result<DecodedText, DocumentError> {
        self.decode_bytes(bytes, Path::new("<memory>"), declared)
    }

    fn decode_bytes(&self, bytes: &[u8], path: &Path, declared: Option<&'static Encoding>) -> Result<DecodedText, DocumentError> {
        let first = match self.explicit.or(declared) {
            Some(encoding) => Some(encoding),
            None => {
                let guess = self.detector.detect(bytes);
                if let Some(encoding) = guess {
                    info!("Detected encoding: {}", encoding.name());
                }
                guess
            }
        };

        let mut tried: Vec<&'static Encoding> = Vec::new();

        if let Some(encoding) = first {
            tried.push(encoding);
            if let Some(text) = decode_strict(bytes, encoding) {
                return Ok(DecodedText { text, encoding });
            }
            warn!("Failed to read with {} encoding. Trying fallback encodings...", encoding.name());
        }

        for &encoding in &self.fallbacks {
            if tried.contains(&encoding) {
                continue;
            }
            tried.push(encoding);
            match decode_strict(bytes, encoding) {
                Some(text) => {
                    info!("Successfully read input with {} encoding", encoding.name());
                    return Ok(DecodedText { text, encoding });
                }
                None => debug!("{} rejected the input", encoding.name()),
            }
        }

        Err(DocumentError::Decode {
            path: PathBuf::from(path),
            tried: tried.iter().map(|e| e.name().to_string()).collect(),
        })
    }
}

/// Decode without replacement characters; `None` on any malformed sequence
fn decode_strict(bytes: &[u8], encoding: &'static Encoding) -> Option<String> {
    let (text, had_errors) = encoding.decode_with_bom_removal(bytes);
    if had_errors {
        None
    } else {
        Some(text.into_owned())
    }
}
