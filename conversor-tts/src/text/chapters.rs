//! Chapter heading canonicalization.
//!
//! `Capítulo <numeral> [sep] [title]` in any case, with or without the accent,
//! and with an arabic, roman or spelled (one to twenty) numeral becomes
//! `CAPÍTULO N.` on its own paragraph, followed by the title-cased title.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::casing::title_case;
use super::cleaner::normalize_whitespace;

/// Spelled numerals accepted in headings. Longer forms come first.
const SPELLED_NUMERALS: &[(&str, u32)] = &[
    ("dezesseis", 16),
    ("dezessete", 17),
    ("quatorze", 14),
    ("dezenove", 19),
    ("dezoito", 18),
    ("catorze", 14),
    ("quatro", 4),
    ("quinze", 15),
    ("cinco", 5),
    ("treze", 13),
    ("vinte", 20),
    ("dois", 2),
    ("duas", 2),
    ("três", 3),
    ("tres", 3),
    ("seis", 6),
    ("sete", 7),
    ("oito", 8),
    ("nove", 9),
    ("onze", 11),
    ("doze", 12),
    ("uma", 1),
    ("dez", 10),
    ("um", 1),
];

fn spelled_alternation() -> String {
    SPELLED_NUMERALS
        .iter()
        .map(|(w, _)| *w)
        .collect::<Vec<_>>()
        .join("|")
}

static HEADING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)^cap[ií]tulo\s+({}|\d+|[ivxlcdm]+)\b[ \t]*(?:[:.\-][ \t]*)?(.*)$",
        spelled_alternation()
    ))
    .unwrap()
});

static INLINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"CAP[IÍ]TULO\s+((?i:{}))\b\s*:\s*([^\n]+)",
        spelled_alternation()
    ))
    .unwrap()
});

/// Canonical header line for chapter `n`.
pub fn header(n: u32) -> String {
    format!("CAPÍTULO {n}.")
}

/// True for a paragraph that is exactly a canonical header.
pub fn is_canonical_header(paragraph: &str) -> bool {
    static CANONICAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^CAPÍTULO \d+\.$").unwrap());
    CANONICAL_RE.is_match(paragraph.trim())
}

/// A parsed heading line.
#[derive(Debug, PartialEq, Eq)]
pub struct Heading<'a> {
    pub number: u32,
    pub title: Option<&'a str>,
}

/// Recognize a chapter heading line.
pub fn parse_heading(line: &str) -> Option<Heading<'_>> {
    let caps = HEADING_RE.captures(line.trim())?;
    let number = numeral_value(caps.get(1)?.as_str())?;
    let title = caps
        .get(2)
        .map(|m| m.as_str().trim())
        .filter(|t| !t.is_empty());
    Some(Heading { number, title })
}

fn numeral_value(token: &str) -> Option<u32> {
    let lower = token.to_lowercase();
    if let Some((_, n)) = SPELLED_NUMERALS.iter().find(|(w, _)| *w == lower) {
        return Some(*n);
    }
    if token.chars().all(|c| c.is_ascii_digit()) {
        return token.parse().ok().filter(|n| *n > 0);
    }
    roman_value(token)
}

/// Parse a roman numeral, rejecting non-canonical spellings like "IIII" or "MIL".
fn roman_value(token: &str) -> Option<u32> {
    let upper = token.to_ascii_uppercase();
    let mut total: i64 = 0;
    let mut prev = 0;
    for c in upper.chars().rev() {
        let v = match c {
            'I' => 1,
            'V' => 5,
            'X' => 10,
            'L' => 50,
            'C' => 100,
            'D' => 500,
            'M' => 1000,
            _ => return None,
        };
        if v < prev {
            total -= v;
        } else {
            total += v;
            prev = v;
        }
    }
    let value = u32::try_from(total).ok().filter(|v| (1..4000).contains(v))?;
    (to_roman(value) == upper).then_some(value)
}

fn to_roman(mut n: u32) -> String {
    const TABLE: &[(u32, &str)] = &[
        (1000, "M"),
        (900, "CM"),
        (500, "D"),
        (400, "CD"),
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];
    let mut out = String::new();
    for (value, symbol) in TABLE {
        while n >= *value {
            out.push_str(symbol);
            n -= value;
        }
    }
    out
}

fn render(number: u32, title: Option<&str>) -> String {
    match title {
        Some(title) => format!("{}\n\n{}", header(number), title_case(title)),
        None => header(number),
    }
}

/// Rewrite every chapter heading into its canonical form.
pub fn canonicalize_chapters(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 64);
    for line in text.split('\n') {
        match parse_heading(line) {
            Some(heading) => {
                out.push_str("\n\n");
                out.push_str(&render(heading.number, heading.title));
                out.push_str("\n\n");
            }
            None => {
                out.push_str(line);
                out.push('\n');
            }
        }
    }

    let out = INLINE_RE.replace_all(&out, |caps: &Captures| {
        match numeral_value(&caps[1]) {
            Some(n) => format!("\n\n{}\n\n", render(n, Some(caps[2].trim()))),
            None => caps[0].to_string(),
        }
    });

    normalize_whitespace(&out)
}
