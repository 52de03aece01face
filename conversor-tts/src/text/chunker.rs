//! Text chunking for TTS processing.

use super::TextChunk;
use super::sentences::split_sentences;

/// Default chunk limit in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 2000;

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split normalized text into chunks of at most `limit` characters.
///
/// Paragraphs that fit are emitted as they are. Longer paragraphs are split
/// into sentences and packed greedily; a sentence longer than `limit` is
/// sliced without regard for word boundaries. A `limit` of zero is treated
/// as one.
pub fn segment(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();

    for paragraph in text.split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        if char_len(paragraph) <= limit {
            chunks.push(paragraph.to_string());
            continue;
        }

        let mut current = String::new();
        let mut current_len = 0;

        for sentence in split_sentences(paragraph) {
            let sentence_len = char_len(&sentence);

            if sentence_len > limit {
                // Flush current chunk first
                if !current.is_empty() {
                    chunks.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                chunks.extend(hard_split(&sentence, limit));
            } else if current.is_empty() {
                current = sentence;
                current_len = sentence_len;
            } else if current_len + sentence_len + 1 <= limit {
                current.push(' ');
                current.push_str(&sentence);
                current_len += sentence_len + 1;
            } else {
                chunks.push(std::mem::replace(&mut current, sentence));
                current_len = sentence_len;
            }
        }

        if !current.is_empty() {
            chunks.push(current);
        }
    }

    chunks
}

/// Hard split text at exact character positions (last resort).
fn hard_split(text: &str, limit: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(limit)
        .map(|piece| piece.iter().collect::<String>().trim().to_string())
        .filter(|piece| !piece.is_empty())
        .collect()
}

/// Segment `text` into indexed chunks.
pub fn chunk_text(text: &str, limit: usize) -> Vec<TextChunk> {
    segment(text, limit)
        .into_iter()
        .enumerate()
        .map(|(index, text)| TextChunk::new(index, text))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_short_paragraphs_are_kept() {
        let text = "Olá mundo.\n\nComo vai?";
        assert_eq!(segment(text, 2000), vec!["Olá mundo.", "Como vai?"]);
    }

    #[test]
    fn test_long_paragraph_is_packed() {
        let text = "Primeira frase. Segunda frase. Terceira frase. Quarta frase.";
        let chunks = segment(text, 32);
        assert_eq!(
            chunks,
            vec!["Primeira frase. Segunda frase.", "Terceira frase. Quarta frase."]
        );
    }

    #[test]
    fn test_packing_keeps_abbreviations() {
        let text = "O Dr. Silva chegou cedo. A Sra. Souza chegou tarde.";
        let chunks = segment(text, 30);
        assert_eq!(chunks, vec!["O Dr. Silva chegou cedo.", "A Sra. Souza chegou tarde."]);
    }

    #[test]
    fn test_empty_text() {
        assert!(segment("", 100).is_empty());
        assert!(segment("   \n\n   ", 100).is_empty());
    }

    #[test]
    fn test_zero_limit_is_one() {
        assert_eq!(segment("abc", 0), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_hard_split() {
        let parts = hard_split("abcdefghij", 3);
        assert_eq!(parts, vec!["abc", "def", "ghi", "j"]);
    }

    #[test]
    fn test_limit_counts_characters() {
        // 5 characters, 10 bytes
        assert_eq!(segment("ãããããããããã", 5), vec!["ããããã", "ããããã"]);
    }

    #[test]
    fn test_chunk_text_indices() {
        let chunks = chunk_text("Um.\n\nDois.\n\nTrês.", 100);
        assert_eq!(chunks.len(), 3);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
        }
        assert_eq!(chunks[2].text, "Três.");
    }

    proptest! {
        #[test]
        fn prop_chunks_bounded_and_cover_input(
            words in prop::collection::vec("[a-zá-ú]{1,12}[.!?]?", 1..80),
            breaks in prop::collection::vec(any::<bool>(), 80),
            limit in 1usize..120,
        ) {
            let mut text = String::new();
            for (i, word) in words.iter().enumerate() {
                if i > 0 {
                    text.push_str(if breaks[i] { "\n\n" } else { " " });
                }
                text.push_str(word);
            }

            let chunks = segment(&text, limit);
            for chunk in &chunks {
                prop_assert!(!chunk.trim().is_empty());
                prop_assert!(chunk.chars().count() <= limit);
            }

            let strip = |s: &str| s.chars().filter(|c| !c.is_whitespace()).collect::<String>();
            prop_assert_eq!(strip(&chunks.concat()), strip(&text));
        }

        #[test]
        fn prop_hard_slices_are_exact(word in "[a-z]{1,200}", limit in 1usize..50) {
            let parts = hard_split(&word, limit);
            let (last, rest) = parts.split_last().unwrap();
            for part in rest {
                prop_assert_eq!(part.chars().count(), limit);
            }
            prop_assert!(last.chars().count() <= limit);
        }
    }
}
