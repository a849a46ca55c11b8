//! Message chunking: reflow long text into platform-sized segments.
//!
//! Splits prefer paragraph boundaries, then sentence boundaries, and only
//! fall back to hard character offsets for a single run longer than the
//! limit. Lengths are counted in chars, so a multi-byte character is never
//! cut in half.

use std::sync::LazyLock;

use regex::Regex;

static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("hardcoded regex"));

/// A run of text up to and including its terminal punctuation, or a bare
/// run of punctuation. Together the matches cover the whole input.
static SENTENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^.!?]+[.!?]*|[.!?]+").expect("hardcoded regex"));

/// Split `content` into ordered, trimmed, non-empty chunks of at most
/// `limit` chars each. A `limit` of 0 is treated as 1.
pub fn chunk_message(content: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut packer = Packer::new(limit, "\n\n");

    let paragraphs = PARAGRAPH_BREAK
        .split(content)
        .map(str::trim)
        .filter(|p| !p.is_empty());
    for paragraph in paragraphs {
        if char_len(paragraph) <= limit {
            packer.push(paragraph, &mut chunks);
        } else {
            packer.flush(&mut chunks);
            split_sentences(paragraph, limit, &mut chunks);
        }
    }
    packer.flush(&mut chunks);
    chunks
}

fn split_sentences(paragraph: &str, limit: usize, chunks: &mut Vec<String>) {
    let mut packer = Packer::new(limit, " ");
    let sentences = SENTENCE
        .find_iter(paragraph)
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty());
    for sentence in sentences {
        if char_len(sentence) <= limit {
            packer.push(sentence, chunks);
        } else {
            packer.flush(chunks);
            force_split(sentence, limit, chunks);
        }
    }
    packer.flush(chunks);
}

fn force_split(text: &str, limit: usize, chunks: &mut Vec<String>) {
    let chars: Vec<char> = text.chars().collect();
    for piece in chars.chunks(limit) {
        let piece: String = piece.iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Greedy accumulator: joins pieces with `separator` while the result fits.
struct Packer {
    limit: usize,
    separator: &'static str,
    current: String,
    current_len: usize,
}

impl Packer {
    fn new(limit: usize, separator: &'static str) -> Self {
        Self {
            limit,
            separator,
            current: String::new(),
            current_len: 0,
        }
    }

    /// `piece` must already fit within the limit on its own.
    fn push(&mut self, piece: &str, chunks: &mut Vec<String>) {
        let piece_len = char_len(piece);
        if !self.current.is_empty() {
            let joined = self.current_len + char_len(self.separator) + piece_len;
            if joined <= self.limit {
                self.current.push_str(self.separator);
                self.current.push_str(piece);
                self.current_len = joined;
                return;
            }
            self.flush(chunks);
        }
        self.current.push_str(piece);
        self.current_len = piece_len;
    }

    fn flush(&mut self, chunks: &mut Vec<String>) {
        let trimmed = self.current.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }
        self.current.clear();
        self.current_len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn non_whitespace(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn test_short_message_single_chunk() {
        assert_eq!(chunk_message("Hello there.", 2000), vec!["Hello there."]);
    }

    #[test]
    fn test_empty_and_whitespace() {
        assert!(chunk_message("", 10).is_empty());
        assert!(chunk_message("   \n\n \t \n", 10).is_empty());
    }

    #[test]
    fn test_paragraphs_packed_together_when_they_fit() {
        let chunks = chunk_message("one\n\ntwo\n\n\n  \nthree", 100);
        assert_eq!(chunks, vec!["one\n\ntwo\n\nthree"]);
    }

    #[test]
    fn test_paragraph_boundary_preferred() {
        let first = "a".repeat(60);
        let second = "b".repeat(60);
        let chunks = chunk_message(&format!("{first}\n\n{second}"), 100);
        assert_eq!(chunks, vec![first, second]);
    }

    #[test]
    fn test_sentence_split_for_long_paragraph() {
        let text = "The swamp is warm today. The frogs are loud! Do you hear them? I do.";
        let chunks = chunk_message(text, 30);
        assert_eq!(
            chunks,
            vec![
                "The swamp is warm today.",
                "The frogs are loud!",
                "Do you hear them? I do.",
            ]
        );
    }

    #[test]
    fn test_force_split_exact_multiple() {
        let text = "x".repeat(30);
        let chunks = chunk_message(&text, 10);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() == 10));
    }

    #[test]
    fn test_force_split_remainder() {
        let text = "y".repeat(25);
        let chunks = chunk_message(&text, 10);
        let lens: Vec<usize> = chunks.iter().map(|c| c.chars().count()).collect();
        assert_eq!(lens, vec![10, 10, 5]);
    }

    #[test]
    fn test_length_bound_and_reconstruction() {
        let text = "🐍 Hiss. ".repeat(40)
            + "\n\n"
            + &"ssssssssssssssssssssssssssssssssssssssss".repeat(3)
            + "\n\nShort tail?! Yes...";
        for limit in [1, 3, 7, 16, 50, 200, 5000] {
            let chunks = chunk_message(&text, limit);
            assert!(
                chunks.iter().all(|c| c.chars().count() <= limit && !c.is_empty()),
                "limit {limit} violated"
            );
            assert_eq!(non_whitespace(&chunks.concat()), non_whitespace(&text));
        }
    }

    #[test]
    fn test_deterministic() {
        let text = "First. Second! Third?\n\nFourth paragraph here.";
        assert_eq!(chunk_message(text, 12), chunk_message(text, 12));
    }

    #[test]
    fn test_discord_sized_two_paragraphs() {
        let first = "Sentence number one is here. ".repeat(47);
        let second = "Another thought follows. ".repeat(46);
        let text = format!("{}\n\n{}", first.trim(), second.trim());
        assert!(text.chars().count() >= 2500);

        let chunks = chunk_message(&text, 2000);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.chars().count() <= 2000));
        assert_eq!(chunks[0], first.trim());
        assert_eq!(chunks[1], second.trim());
    }
}
