//! Sentence splitting aware of Portuguese abbreviations.

use once_cell::sync::Lazy;
use regex::Regex;

use super::chapters::is_canonical_header;
use super::cleaner::collapse_spaces;
use super::layout::is_abbreviated;

/// Terminal punctuation run, optional closing quotes, then whitespace or end.
static TERMINAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[.!?…]+["'»”’)]*(?:\s+|$)"#).unwrap());

/// A bare enumeration marker such as `12.`.
static ENUMERATION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\.$").unwrap());

const CLOSING_QUOTES: &[char] = &['"', '\'', '»', '”', '’', ')'];

/// Split text into sentences.
///
/// A period that closes an abbreviation, an initial or an enumeration marker
/// does not end the sentence.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut start = 0;
    for m in TERMINAL_RE.find_iter(text) {
        let piece = text[start..m.end()].trim();
        if !piece.is_empty() {
            pieces.push(piece);
        }
        start = m.end();
    }
    let rest = text[start..].trim();
    if !rest.is_empty() {
        pieces.push(rest);
    }

    let mut sentences = Vec::with_capacity(pieces.len());
    let mut pending = String::new();
    for piece in pieces {
        if !pending.is_empty() {
            pending.push(' ');
        }
        pending.push_str(piece);
        if !continues(&pending) {
            sentences.push(std::mem::take(&mut pending));
        }
    }
    if !pending.is_empty() {
        sentences.push(pending);
    }

    sentences
}

fn continues(fragment: &str) -> bool {
    let last_word = fragment.rsplit(' ').next().unwrap_or(fragment);
    is_abbreviated(last_word) || ENUMERATION_RE.is_match(fragment)
}

/// True when `text` ends in `.`, `!`, `?` or `…`, ignoring closing quotes.
pub fn has_terminal(text: &str) -> bool {
    text.trim_end()
        .trim_end_matches(CLOSING_QUOTES)
        .ends_with(['.', '!', '?', '…'])
}

/// Append a period when `text` lacks terminal punctuation.
pub fn ensure_terminal(text: &str) -> String {
    let text = text.trim_end();
    if text.is_empty() || has_terminal(text) {
        text.to_string()
    } else {
        format!("{text}.")
    }
}

/// Put every sentence in its own paragraph.
pub fn resegment(text: &str) -> String {
    let mut paragraphs = Vec::new();
    for paragraph in text.split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        if is_canonical_header(paragraph) {
            paragraphs.push(paragraph.to_string());
            continue;
        }
        let paragraph = collapse_spaces(paragraph);
        paragraphs.extend(split_sentences(&paragraph).iter().map(|s| ensure_terminal(s)));
    }
    paragraphs.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_basic() {
        assert_eq!(
            split_sentences("Olá. Tudo bem? Sim! Então…"),
            vec!["Olá.", "Tudo bem?", "Sim!", "Então…"]
        );
    }

    #[test]
    fn test_abbreviation_guard() {
        assert_eq!(split_sentences("O Dr. Silva chegou."), vec!["O Dr. Silva chegou."]);
    }

    #[test]
    fn test_initials_and_enumerations() {
        assert_eq!(
            split_sentences("Li J. R. R. Tolkien. Gostei."),
            vec!["Li J. R. R. Tolkien.", "Gostei."]
        );
        assert_eq!(
            split_sentences("1. Introdução ao tema. Fim."),
            vec!["1. Introdução ao tema.", "Fim."]
        );
    }

    #[test]
    fn test_closing_quotes_stay_with_sentence() {
        assert_eq!(
            split_sentences("Ele disse: \"Vá embora.\" Ela foi."),
            vec!["Ele disse: \"Vá embora.\"", "Ela foi."]
        );
    }

    #[test]
    fn test_decimal_is_not_a_boundary() {
        assert_eq!(split_sentences("Custa 3.5 vezes mais."), vec!["Custa 3.5 vezes mais."]);
    }

    #[test]
    fn test_resegment() {
        let text = "CAPÍTULO 1.\n\nA Fuga\n\nEle correu. Ela\nficou";
        assert_eq!(
            resegment(text),
            "CAPÍTULO 1.\n\nA Fuga.\n\nEle correu.\n\nEla ficou."
        );
    }

    #[test]
    fn test_ensure_terminal() {
        assert_eq!(ensure_terminal("Fim"), "Fim.");
        assert_eq!(ensure_terminal("Fim?"), "Fim?");
        assert_eq!(ensure_terminal("\"Fim.\""), "\"Fim.\"");
        assert_eq!(ensure_terminal(""), "");
    }
}
