use crate::error::IngestError;
use crate::models::{Chunk, IngestionOptions};
use regex::Regex;
use std::ops::Range;

const PARAGRAPH_SEPARATOR: &str = r"\n\s*\n";
const SENTENCE_END: &str = r#"[.!?]+["')\]]*\s+"#;
const WORD: &str = r"\S+";

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl From<IngestionOptions> for ChunkingConfig {
    fn from(value: IngestionOptions) -> Self {
        Self {
            max_chars: value.chunk_max_chars,
            overlap_chars: value.chunk_overlap_chars,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.max_chars == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "max_chars must be positive".to_string(),
            ));
        }
        if self.overlap_chars >= self.max_chars {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap_chars {} must be smaller than max_chars {}",
                self.overlap_chars, self.max_chars
            )));
        }
        Ok(())
    }

    /// Characters available to a chunk once the carried overlap is reserved.
    fn body_budget(&self) -> usize {
        self.max_chars - self.overlap_chars
    }
}

/// Splits `text` into chunk bodies, returned as byte ranges into `text`.
///
/// Bodies never overlap, are trimmed of surrounding whitespace and together
/// cover every non-whitespace character of the input. Whole paragraphs are
/// packed greedily; a paragraph that does not fit on its own is broken at
/// sentence ends, then at whitespace, and only then mid-word.
pub fn chunk_by_paragraph(
    text: &str,
    config: ChunkingConfig,
) -> Result<Vec<Range<usize>>, IngestError> {
    config.validate()?;
    let separator = Regex::new(PARAGRAPH_SEPARATOR)?;
    let sentence_end = Regex::new(SENTENCE_END)?;
    let word = Regex::new(WORD)?;
    let budget = config.body_budget();

    let mut units = Vec::new();
    for paragraph in split_trimmed(text, 0..text.len(), &separator, false) {
        if char_len(text, &paragraph) <= budget {
            units.push(paragraph);
            continue;
        }

        for sentence in split_trimmed(text, paragraph, &sentence_end, true) {
            if char_len(text, &sentence) <= budget {
                units.push(sentence);
                continue;
            }

            for token in word.find_iter(&text[sentence.clone()]) {
                let token = sentence.start + token.start()..sentence.start + token.end();
                if char_len(text, &token) <= budget {
                    units.push(token);
                } else {
                    units.extend(hard_split(text, token, budget));
                }
            }
        }
    }

    Ok(pack(text, units, budget))
}

/// Chunks one document, carrying `overlap_chars` of the previous body into
/// the head of each following chunk.
pub fn build_chunks(
    document_id: &str,
    text: &str,
    options: &IngestionOptions,
) -> Result<Vec<Chunk>, IngestError> {
    let config = ChunkingConfig::from(*options);
    let bodies = chunk_by_paragraph(text, config)?;

    if bodies.is_empty() {
        return Err(IngestError::EmptyDocument {
            document_id: document_id.to_string(),
        });
    }

    let mut counter = CharCounter::default();
    let mut chunks = Vec::with_capacity(bodies.len());

    for (chunk_index, body) in bodies.iter().enumerate() {
        let start = match chunk_index.checked_sub(1) {
            Some(previous) => {
                overlap_start(text, bodies[previous].start, body.start, config.overlap_chars)
            }
            None => body.start,
        };
        let overlap_chars = text[start..body.start].chars().count();
        let body_start_char = counter.advance_to(text, body.start);
        let end_char = counter.advance_to(text, body.end);

        chunks.push(Chunk {
            document_id: document_id.to_string(),
            chunk_index,
            text: text[start..body.end].to_string(),
            start_char: body_start_char - overlap_chars,
            end_char,
            overlap_chars,
        });
    }

    Ok(chunks)
}

/// Splits `span` at every match of `boundary`, trimming and dropping blank
/// pieces. With `keep_boundary` the matched text stays on the left piece.
fn split_trimmed(
    text: &str,
    span: Range<usize>,
    boundary: &Regex,
    keep_boundary: bool,
) -> Vec<Range<usize>> {
    let slice = &text[span.clone()];
    let mut pieces = Vec::new();
    let mut cursor = 0;

    for found in boundary.find_iter(slice) {
        let end = if keep_boundary { found.end() } else { found.start() };
        pieces.extend(trim_span(text, span.start + cursor..span.start + end));
        cursor = found.end();
    }
    pieces.extend(trim_span(text, span.start + cursor..span.end));
    pieces
}

fn trim_span(text: &str, span: Range<usize>) -> Option<Range<usize>> {
    let slice = &text[span.clone()];
    let trimmed = slice.trim();
    if trimmed.is_empty() {
        return None;
    }
    let start = span.start + (slice.len() - slice.trim_start().len());
    Some(start..start + trimmed.len())
}

fn hard_split(text: &str, span: Range<usize>, budget: usize) -> Vec<Range<usize>> {
    let slice = &text[span.clone()];
    let mut cuts = slice
        .char_indices()
        .step_by(budget)
        .map(|(offset, _)| span.start + offset)
        .collect::<Vec<_>>();
    cuts.push(span.end);
    cuts.windows(2).map(|pair| pair[0]..pair[1]).collect()
}

fn pack(text: &str, units: Vec<Range<usize>>, budget: usize) -> Vec<Range<usize>> {
    let mut bodies = Vec::new();
    let mut open: Option<(Range<usize>, usize)> = None;

    for unit in units {
        let unit_chars = char_len(text, &unit);
        open = match open {
            None => Some((unit, unit_chars)),
            Some((current, current_chars)) => {
                let merged_chars =
                    current_chars + char_len(text, &(current.end..unit.start)) + unit_chars;
                if merged_chars <= budget {
                    Some((current.start..unit.end, merged_chars))
                } else {
                    bodies.push(current);
                    Some((unit, unit_chars))
                }
            }
        };
    }

    bodies.extend(open.map(|(current, _)| current));
    bodies
}

/// Byte offset at most `overlap` characters before `body_start`, never
/// reaching back past `floor` and never starting on whitespace.
fn overlap_start(text: &str, floor: usize, body_start: usize, overlap: usize) -> usize {
    let cut = text[floor..body_start]
        .char_indices()
        .rev()
        .take(overlap)
        .last()
        .map_or(body_start, |(offset, _)| floor + offset);
    body_start - text[cut..body_start].trim_start().len()
}

fn char_len(text: &str, span: &Range<usize>) -> usize {
    text[span.clone()].chars().count()
}

/// Converts monotonically increasing byte offsets into character offsets.
#[derive(Default)]
struct CharCounter {
    byte: usize,
    chars: usize,
}

impl CharCounter {
    fn advance_to(&mut self, text: &str, byte: usize) -> usize {
        self.chars += text[self.byte..byte].chars().count();
        self.byte = byte;
        self.chars
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(max: usize, overlap: usize) -> IngestionOptions {
        IngestionOptions {
            chunk_max_chars: max,
            chunk_overlap_chars: overlap,
        }
    }

    fn non_whitespace(text: &str) -> String {
        text.chars().filter(|c| !c.is_whitespace()).collect()
    }

    fn sample_document() -> String {
        let mut text = String::new();
        for paragraph in 0..12 {
            for sentence in 0..(3 + paragraph % 5) {
                text.push_str(&format!(
                    "Paragraph {paragraph} sentence {sentence} talks about railway schedules and delays. "
                ));
            }
            text.push_str("\n\n\n");
        }
        text.push_str(&"x".repeat(2_500));
        text
    }

    #[test]
    fn short_text_is_a_single_chunk() -> Result<(), IngestError> {
        let text = "  First paragraph.\n\nSecond paragraph.\n";
        let chunks = build_chunks("doc.txt", text, &IngestionOptions::default())?;

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "First paragraph.\n\nSecond paragraph.");
        assert_eq!(chunks[0].start_char, 2);
        assert_eq!(chunks[0].end_char, 37);
        assert_eq!(chunks[0].overlap_chars, 0);
        Ok(())
    }

    #[test]
    fn overlap_is_carried_from_previous_chunk() -> Result<(), IngestError> {
        let text = "aaaa bbbb cccc\n\ndddd eeee ffff";
        let chunks = build_chunks("doc.txt", text, &options(30, 10))?;

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "aaaa bbbb cccc");
        assert_eq!(chunks[1].text, "bbb cccc\n\ndddd eeee ffff");
        assert_eq!(chunks[1].overlap_chars, 10);
        assert_eq!(chunks[1].body(), "dddd eeee ffff");
        assert_eq!(chunks[1].start_char, 6);
        assert_eq!(chunks[1].end_char, 30);
        Ok(())
    }

    #[test]
    fn oversized_paragraph_splits_at_sentences() -> Result<(), IngestError> {
        let text = "One two three four. Five six seven eight. Nine ten eleven.";
        let chunks = build_chunks("doc.txt", text, &options(40, 0))?;

        let texts = chunks.iter().map(|chunk| chunk.text.as_str()).collect::<Vec<_>>();
        assert_eq!(
            texts,
            vec!["One two three four.", "Five six seven eight. Nine ten eleven."]
        );
        Ok(())
    }

    #[test]
    fn unbroken_run_is_split_hard() -> Result<(), IngestError> {
        let text = "é".repeat(25);
        let chunks = build_chunks("doc.txt", &text, &options(10, 0))?;

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].text.chars().count(), 5);
        Ok(())
    }

    #[test]
    fn chunks_respect_maximum_length() -> Result<(), IngestError> {
        let text = sample_document();
        let chunks = build_chunks("doc.txt", &text, &IngestionOptions::default())?;

        assert!(chunks.len() > 3);
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 1_000, "chunk {} too long", chunk.chunk_index);
            assert!(chunk.overlap_chars <= 200);
        }
        Ok(())
    }

    #[test]
    fn bodies_reconstruct_non_whitespace_content() -> Result<(), IngestError> {
        let text = sample_document();
        let chunks = build_chunks("doc.txt", &text, &IngestionOptions::default())?;

        let rebuilt = chunks.iter().map(Chunk::body).collect::<String>();
        assert_eq!(non_whitespace(&rebuilt), non_whitespace(&text));
        Ok(())
    }

    #[test]
    fn offsets_address_the_source_text() -> Result<(), IngestError> {
        let text = format!("Ünïcode prelude.\n\n{}", sample_document());
        let chunks = build_chunks("doc.txt", &text, &options(300, 60))?;
        let chars = text.chars().collect::<Vec<_>>();

        for (position, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, position);
            let expected = chars[chunk.start_char..chunk.end_char].iter().collect::<String>();
            assert_eq!(chunk.text, expected);
        }
        Ok(())
    }

    #[test]
    fn chunking_is_deterministic() -> Result<(), IngestError> {
        let text = sample_document();
        let first = build_chunks("doc.txt", &text, &IngestionOptions::default())?;
        let second = build_chunks("doc.txt", &text, &IngestionOptions::default())?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn whitespace_only_document_is_rejected() {
        let result = build_chunks("blank.txt", "  \n\n\t \n", &IngestionOptions::default());
        assert!(matches!(
            result,
            Err(IngestError::EmptyDocument { document_id }) if document_id == "blank.txt"
        ));
    }

    #[test]
    fn overlap_must_be_smaller_than_maximum() {
        let result = build_chunks("doc.txt", "text", &options(100, 100));
        assert!(matches!(result, Err(IngestError::InvalidChunkConfig(_))));
    }
}
