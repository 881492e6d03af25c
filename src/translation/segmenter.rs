/*!
 * Document segmentation.
 *
 * Splits raw text into paragraphs on blank lines, paragraphs into sentences, and
 * packs sentences greedily into chunks no larger than `max_chunk_size` bytes.
 * A sentence is never cut: a single sentence over the budget becomes a chunk of
 * its own.
 */

use regex::Regex;
use std::fmt::Debug;
use std::sync::LazyLock;

/// Terminal punctuation, optional closing quotes or brackets, then whitespace
static SENTENCE_BOUNDARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([.!?…]+["'»”’)\]]*)\s+"#).expect("Invalid sentence boundary regex")
});

/// A blank line, possibly holding whitespace
static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("Invalid paragraph break regex"));

/// Splits a paragraph into sentences
pub trait SentenceSplitter: Send + Sync + Debug {
    /// Sentences of `paragraph` in order, whitespace-normalized, none empty
    fn split(&self, paragraph: &str) -> Vec<String>;
}

/// Splits after terminal punctuation (`.`, `!`, `?`, `…`) followed by whitespace.
///
/// Closing quotes and brackets directly after the punctuation stay with the sentence.
#[derive(Debug, Clone, Copy, Default)]
pub struct PunctuationSentenceSplitter;

impl PunctuationSentenceSplitter {
    /// Create a splitter
    pub fn new() -> Self {
        Self
    }
}

impl SentenceSplitter for PunctuationSentenceSplitter {
    fn split(&self, paragraph: &str) -> Vec<String> {
        let mut sentences = Vec::new();
        let mut start = 0;

        for captures in SENTENCE_BOUNDARY.captures_iter(paragraph) {
            let (Some(whole), Some(terminal)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            push_sentence(&mut sentences, &paragraph[start..terminal.end()]);
            start = whole.end();
        }
        push_sentence(&mut sentences, &paragraph[start..]);

        sentences
    }
}

fn push_sentence(sentences: &mut Vec<String>, raw: &str) {
    let sentence = collapse_whitespace(raw);
    if !sentence.is_empty() {
        sentences.push(sentence);
    }
}

/// Collapse every whitespace run to a single space and trim the ends
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A bounded run of whole sentences from one paragraph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Paragraph the chunk belongs to
    pub paragraph_index: usize,
    /// Position within the paragraph
    pub index: usize,
    /// Sentences joined by single spaces
    pub text: String,
    /// Number of sentences packed into the chunk
    pub sentence_count: usize,
}

impl Chunk {
    /// Size in UTF-8 bytes
    pub fn size_bytes(&self) -> usize {
        self.text.len()
    }
}

/// A non-empty paragraph and its chunks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paragraph {
    /// Position among the non-empty paragraphs of the document
    pub index: usize,
    /// Chunks in order, never empty
    pub chunks: Vec<Chunk>,
}

/// Turns raw text into paragraphs of size-bounded chunks
#[derive(Debug)]
pub struct Segmenter {
    max_chunk_size: usize,
    splitter: Box<dyn SentenceSplitter>,
}

impl Segmenter {
    /// Create a segmenter using the punctuation sentence splitter
    pub fn new(max_chunk_size: usize) -> Self {
        Self::with_splitter(max_chunk_size, Box::new(PunctuationSentenceSplitter::new()))
    }

    /// Create a segmenter with a custom sentence splitter
    pub fn with_splitter(max_chunk_size: usize, splitter: Box<dyn SentenceSplitter>) -> Self {
        Self {
            max_chunk_size: max_chunk_size.max(1),
            splitter,
        }
    }

    /// Chunk budget in bytes
    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    /// Segment into paragraphs
    pub fn paragraphs(&self, text: &str) -> Vec<Paragraph> {
        let normalized = text.replace("\r\n", "\n").replace('\r', "\n");

        PARAGRAPH_BREAK
            .split(&normalized)
            .filter(|p| !p.trim().is_empty())
            .enumerate()
            .map(|(index, raw)| Paragraph {
                index,
                chunks: self.pack(index, self.splitter.split(raw)),
            })
            .filter(|p| !p.chunks.is_empty())
            .collect()
    }

    /// Segment into a flat, ordered list of `(paragraph_index, chunk)`
    pub fn segment(&self, text: &str) -> Vec<(usize, Chunk)> {
        self.paragraphs(text)
            .into_iter()
            .flat_map(|p| p.chunks.into_iter().map(move |c| (p.index, c)))
            .collect()
    }

    fn pack(&self, paragraph_index: usize, sentences: Vec<String>) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut current_size = 0usize;

        for sentence in sentences {
            if !current.is_empty() && current_size + 1 + sentence.len() > self.max_chunk_size {
                chunks.push(make_chunk(paragraph_index, chunks.len(), &mut current));
                current_size = 0;
            }
            let separator = usize::from(!current.is_empty());
            current_size += separator + sentence.len();
            current.push(sentence);
        }

        if !current.is_empty() {
            chunks.push(make_chunk(paragraph_index, chunks.len(), &mut current));
        }

        chunks
    }
}

fn make_chunk(paragraph_index: usize, index: usize, sentences: &mut Vec<String>) -> Chunk {
    let sentence_count = sentences.len();
    let text = sentences.join(" ");
    sentences.clear();
    Chunk {
        paragraph_index,
        index,
        text,
        sentence_count,
    }
}
