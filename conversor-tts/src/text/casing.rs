//! Case normalization for paragraphs typeset in all capitals.
//!
//! Shouted text reads badly through TTS engines, which spell out or stress
//! uppercase words. Acronyms stay uppercase so they are still spelled.

use super::chapters::is_canonical_header;

const VOWELS: &str = "AEIOUÁÉÍÓÚÂÊÔÃÕÀÜ";

/// Pronouns never treated as acronyms.
const PRONOUNS: &[&str] = &[
    "EU", "TU", "ELE", "ELA", "NÓS", "VÓS", "ELES", "ELAS", "ME", "TE", "LHE", "NOS", "VOS",
    "SE", "MIM", "TI",
];

/// Short words that read as words even with fewer than four letters.
const FUNCTION_WORDS: &[&str] = &[
    "DE", "DA", "DO", "DAS", "DOS", "EM", "NO", "NA", "NOS", "NAS", "UM", "UMA", "QUE", "SE",
    "POR", "COM", "AO", "AOS", "OS", "AS", "MAS", "NEM", "SEM", "SOB", "ERA", "FOI", "SÃO",
    "SUA", "SEU", "MEU", "TEU", "NÃO", "SIM", "JÁ", "SÓ", "LÁ", "AQUI", "ATÉ", "QUEM", "PARA",
    "PELO", "PELA", "OU", "TEM", "VAI", "DIA", "ANO", "MAR", "SOL", "LUZ", "PAI", "MÃE",
];

/// Words kept lowercase inside a title.
const LOWERCASE_IN_TITLE: &[&str] = &[
    "de", "da", "do", "das", "dos", "e", "em", "no", "na", "nos", "nas", "a", "o", "as", "os",
    "com", "por", "para", "ao", "aos",
];

fn is_vowel(c: char) -> bool {
    VOWELS.contains(c.to_uppercase().next().unwrap_or(c))
}

/// A word that can be read aloud rather than spelled letter by letter.
fn is_pronounceable(word: &str) -> bool {
    let has_vowel = word.chars().any(is_vowel);
    let has_consonant = word.chars().any(|c| !is_vowel(c));
    has_vowel && has_consonant && (word.chars().count() >= 4 || FUNCTION_WORDS.contains(&word))
}

/// Approximate acronym test for an uppercase word.
pub fn is_acronym(word: &str) -> bool {
    let len = word.chars().count();
    word.chars().all(char::is_alphabetic)
        && (2..=5).contains(&len)
        && !PRONOUNS.contains(&word)
        && !(len == 1 && word.chars().all(is_vowel))
        && !is_pronounceable(word)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Title-case `text` token by token, keeping uppercase acronyms.
pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .enumerate()
        .map(|(i, token)| {
            let core = token.trim_matches(|c: char| !c.is_alphanumeric());
            let is_upper = core.chars().any(char::is_alphabetic)
                && !core.chars().any(char::is_lowercase);
            if is_upper && is_acronym(core) {
                return token.to_string();
            }
            let lower = token.to_lowercase();
            if i > 0 && LOWERCASE_IN_TITLE.contains(&lower.as_str()) {
                lower
            } else {
                capitalize_core(token)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Capitalize the first letter of a token, skipping leading punctuation.
fn capitalize_core(token: &str) -> String {
    match token.find(char::is_alphanumeric) {
        Some(start) => format!("{}{}", &token[..start], capitalize(&token[start..])),
        None => token.to_string(),
    }
}

fn is_shouted(paragraph: &str) -> bool {
    paragraph.chars().count() > 3
        && paragraph.chars().any(char::is_alphabetic)
        && !paragraph.chars().any(char::is_lowercase)
        && !is_canonical_header(paragraph)
}

/// Title-case every all-uppercase paragraph.
pub fn normalize_case(text: &str) -> String {
    text.split("\n\n")
        .map(|p| {
            if is_shouted(p) {
                title_case(p)
            } else {
                p.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acronyms() {
        assert!(is_acronym("ONU"));
        assert!(is_acronym("CPF"));
        assert!(is_acronym("FGTS"));
        assert!(!is_acronym("CASA"));
        assert!(!is_acronym("DE"));
        assert!(!is_acronym("ELE"));
        assert!(!is_acronym("A"));
        assert!(!is_acronym("PARALELEPIPEDO"));
        assert!(!is_acronym("R2D2"));
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("a fuga"), "A Fuga");
        assert_eq!(title_case("O HOMEM DA ONU"), "O Homem da ONU");
        assert_eq!(title_case("\"ÚLTIMA CHANCE\""), "\"Última Chance\"");
    }

    #[test]
    fn test_normalize_case_only_touches_shouted_paragraphs() {
        let text = "ERA UMA CASA NO BRASIL.\n\nTexto normal da ONU.\n\nCAPÍTULO 3.\n\nOK";
        assert_eq!(
            normalize_case(text),
            "Era Uma Casa no Brasil.\n\nTexto normal da ONU.\n\nCAPÍTULO 3.\n\nOK"
        );
    }
}
