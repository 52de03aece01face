//! Character-level canonicalization of extracted text.

use unicode_normalization::UnicodeNormalization;

/// Characters that can cause TTS issues and their replacements.
const PROBLEMATIC_CHARS: &[(char, &str)] = &[
    ('\u{2018}', "'"),  // Left single quote
    ('\u{2019}', "'"),  // Right single quote
    ('\u{201a}', "'"),  // Low single quote
    ('\u{201c}', "\""), // Left double quote
    ('\u{201d}', "\""), // Right double quote
    ('\u{201e}', "\""), // Low double quote
    ('\u{2013}', "-"),  // En dash
    ('\u{2014}', "-"),  // Em dash
    ('\u{2015}', "-"),  // Horizontal bar
    ('\u{2011}', "-"),  // Non-breaking hyphen
    ('\u{2012}', "-"),  // Figure dash
    ('\u{00ad}', ""),   // Soft hyphen
    ('\u{00a0}', " "),  // Non-breaking space
    ('\u{2002}', " "),  // En space
    ('\u{2003}', " "),  // Em space
    ('\u{2009}', " "),  // Thin space
    ('\u{202f}', " "),  // Narrow no-break space
    ('\u{200b}', ""),   // Zero-width space
    ('\u{200c}', ""),   // Zero-width non-joiner
    ('\u{200d}', ""),   // Zero-width joiner
    ('\u{feff}', ""),   // BOM
    ('\u{2032}', "'"),  // Prime (feet)
    ('\u{2033}', "\""), // Double prime (inches)
    ('\u{00ab}', "\""), // Left-pointing double angle quote
    ('\u{00bb}', "\""), // Right-pointing double angle quote
    ('\u{2039}', "\""), // Single left-pointing angle quote
    ('\u{203a}', "\""), // Single right-pointing angle quote
];

/// Markup left over from PDF/EPUB extraction; never spoken.
const MARKUP_NOISE: &[char] = &['*', '_', '#', '@', '[', ']', '(', ')', '{', '}', '`'];

/// Canonicalize raw text.
///
/// This function:
/// - Composes Unicode to NFC
/// - Turns form feeds into paragraph breaks and CRLF into LF
/// - Replaces problematic Unicode characters (smart quotes, dashes, etc.)
/// - Removes control characters and markup noise
/// - Collapses horizontal whitespace, trims lines and merges blank-line runs
pub fn canonicalize(text: &str) -> String {
    let composed: String = text.nfc().collect();
    let mut result = String::with_capacity(composed.len());

    let mut chars = composed.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() != Some(&'\n') {
                    result.push('\n');
                }
            }
            '\u{c}' => result.push_str("\n\n"),
            _ if MARKUP_NOISE.contains(&c) => result.push(' '),
            _ => {
                let replacement = PROBLEMATIC_CHARS
                    .iter()
                    .find(|(ch, _)| *ch == c)
                    .map(|(_, r)| *r);

                if let Some(r) = replacement {
                    result.push_str(r);
                } else if is_allowed_char(c) {
                    result.push(c);
                }
            }
        }
    }

    let result = fix_multiple_periods(&result);
    normalize_whitespace(&result)
}

/// Check if a character is allowed in TTS text.
fn is_allowed_char(c: char) -> bool {
    if c == '\n' || c == '\t' {
        return true;
    }
    !c.is_control()
}

/// Trim every line, collapse runs of spaces and keep at most one blank line
/// between blocks.
pub fn normalize_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut pending_blank = false;

    for line in text.split('\n') {
        let line = collapse_spaces(line);
        if line.is_empty() {
            pending_blank = !result.is_empty();
            continue;
        }
        if !result.is_empty() {
            result.push_str(if pending_blank { "\n\n" } else { "\n" });
        }
        result.push_str(&line);
        pending_blank = false;
    }

    result
}

/// Collapse every whitespace run into one space and trim.
pub fn collapse_spaces(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Runs of three or more periods become an ellipsis; a doubled period is a typo.
fn fix_multiple_periods(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut period_count = 0;

    let flush = |result: &mut String, count: usize| match count {
        0 => {}
        1 | 2 => result.push('.'),
        _ => result.push('…'),
    };

    for c in text.chars() {
        if c == '.' {
            period_count += 1;
        } else {
            flush(&mut result, period_count);
            period_count = 0;
            result.push(c);
        }
    }
    flush(&mut result, period_count);

    result
}
