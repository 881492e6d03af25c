/*!
 * Tests for paragraph and sentence segmentation
 */

use rusten::translation::segmenter::{collapse_whitespace, SentenceSplitter};
use rusten::translation::{PunctuationSentenceSplitter, Segmenter};

const LONG_PARAGRAPH: &str = "Он вышел из дома рано утром. На улице было холодно и сыро! \
    Кто мог подумать, что день начнётся так? «Пойдём», — сказал он. Они шли молча… \
    Дорога тянулась через поле (и дальше к лесу.) В лесу было тихо.";

#[test]
fn test_segment_examplePair_shouldKeepParagraphIndices() {
    let chunks = Segmenter::new(1000).segment("Привет. Как дела?\n\nВсё хорошо.");

    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].0, 0);
    assert_eq!(chunks[0].1.text, "Привет. Как дела?");
    assert_eq!(chunks[0].1.sentence_count, 2);
    assert_eq!(chunks[1].0, 1);
    assert_eq!(chunks[1].1.text, "Всё хорошо.");
}

#[test]
fn test_segment_smallBudget_shouldNeverExceedUnlessSingleSentence() {
    for budget in [10, 40, 80, 120, 500] {
        let chunks = Segmenter::new(budget).segment(LONG_PARAGRAPH);
        for (_, chunk) in &chunks {
            assert!(
                chunk.size_bytes() <= budget || chunk.sentence_count == 1,
                "budget {} exceeded by {:?}",
                budget,
                chunk.text
            );
        }
    }
}

#[test]
fn test_segment_anyBudget_shouldPreserveSentenceOrderAndContent() {
    let sentences = PunctuationSentenceSplitter::new().split(LONG_PARAGRAPH);

    for budget in [1, 30, 100, 10_000] {
        let joined = Segmenter::new(budget)
            .segment(LONG_PARAGRAPH)
            .into_iter()
            .map(|(_, chunk)| chunk.text)
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(joined, sentences.join(" "), "budget {}", budget);
    }
}

#[test]
fn test_segment_chunkIndices_shouldCountFromZeroPerParagraph() {
    let text = format!("{}\n\n{}", LONG_PARAGRAPH, LONG_PARAGRAPH);
    let chunks = Segmenter::new(60).segment(&text);

    let mut expected_index = 0;
    let mut current_paragraph = 0;
    for (paragraph, chunk) in &chunks {
        if *paragraph != current_paragraph {
            current_paragraph = *paragraph;
            expected_index = 0;
        }
        assert_eq!(chunk.index, expected_index);
        assert_eq!(chunk.paragraph_index, *paragraph);
        expected_index += 1;
    }
    assert_eq!(current_paragraph, 1);
}

#[test]
fn test_split_ellipsisAndQuotes_shouldStayWithSentence() {
    let sentences = PunctuationSentenceSplitter::new().split("«Кто там?» Никто… Тишина.");
    assert_eq!(sentences, vec!["«Кто там?»", "Никто…", "Тишина."]);
}

#[test]
fn test_split_noTerminalPunctuation_shouldReturnWholeParagraph() {
    let sentences = PunctuationSentenceSplitter::new().split("просто строка без точки");
    assert_eq!(sentences, vec!["просто строка без точки"]);
}

#[test]
fn test_paragraphs_windowsLineEndings_shouldSplitOnBlankLines() {
    let paragraphs = Segmenter::new(1000).paragraphs("Первый.\r\n\r\nВторой.\r\n  \r\nТретий.");
    assert_eq!(paragraphs.len(), 3);
    assert_eq!(paragraphs[2].index, 2);
    assert_eq!(paragraphs[2].chunks[0].text, "Третий.");
}

#[test]
fn test_paragraphs_innerLineBreaks_shouldCollapseToSpaces() {
    let paragraphs = Segmenter::new(1000).paragraphs("Строка\nпродолжается\tздесь.");
    assert_eq!(paragraphs[0].chunks[0].text, "Строка продолжается здесь.");
}

#[test]
fn test_collapseWhitespace_mixedRuns_shouldLeaveSingleSpaces() {
    assert_eq!(collapse_whitespace("  a \n\t b  "), "a b");
    assert_eq!(collapse_whitespace(" \n "), "");
}

#[test]
fn test_segment_zeroBudget_shouldBehaveAsOneByte() {
    let segmenter = Segmenter::new(0);
    assert_eq!(segmenter.max_chunk_size(), 1);
    assert_eq!(segmenter.segment("А. Б.").len(), 2);
}
