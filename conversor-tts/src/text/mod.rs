//! Text processing for TTS: normalization of extracted text and chunking.
//!
//! `normalize` runs an ordered list of pure passes. Each pass is exposed so it
//! can be tested and debugged on its own.

mod abbreviations;
mod casing;
mod chapters;
pub mod chunker;
mod cleaner;
mod layout;
mod numbers;
mod sentences;

pub use chunker::{DEFAULT_CHUNK_SIZE, chunk_text};

/// A chunk of text ready for TTS processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Zero-based position in the document, fixed at creation
    pub index: usize,
    /// The text content
    pub text: String,
}

impl TextChunk {
    /// Create a new text chunk.
    pub fn new(index: usize, text: String) -> Self {
        Self { index, text }
    }
}

/// A named normalization pass.
type Pass = (&'static str, fn(&str) -> String);

fn expand_and_spell(text: &str) -> String {
    numbers::spell_numbers(&abbreviations::expand_abbreviations(text))
}

fn final_cleanup(text: &str) -> String {
    let text = abbreviations::rejoin_titles(text);
    let text = cleaner::normalize_whitespace(&text);
    text.split("\n\n")
        .map(|p| {
            let p = remove_space_before_punctuation(&cleaner::collapse_spaces(p));
            sentences::ensure_terminal(&p)
        })
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn remove_space_before_punctuation(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '.' | ',' | ';' | ':' | '!' | '?' | '…') && out.ends_with(' ') {
            out.pop();
        }
        out.push(c);
    }
    out
}

const PASSES: &[Pass] = &[
    ("canonicalize", cleaner::canonicalize),
    ("reflow", layout::reflow),
    ("pages", layout::clean_pages),
    ("chapters", chapters::canonicalize_chapters),
    ("sentences", sentences::resegment),
    ("case", casing::normalize_case),
    ("ordinals", numbers::spell_ordinals),
    ("numbers", expand_and_spell),
    ("cleanup", final_cleanup),
];

/// Turn raw extracted text into TTS-ready text.
///
/// Never fails: constructs no pass recognizes pass through unchanged.
pub fn normalize(raw: &str) -> String {
    PASSES.iter().fold(raw.to_string(), |text, (name, pass)| {
        let out = pass(&text);
        log::trace!("normalize pass {}: {} -> {} chars", name, text.len(), out.len());
        out
    })
}
