//! Line-level layout repair: reflowing hard-wrapped lines and removing page
//! furniture left behind by PDF extraction.

use once_cell::sync::Lazy;
use regex::Regex;

use super::abbreviations::is_abbreviation;
use super::chapters::parse_heading;
use super::cleaner::normalize_whitespace;

/// Print-shop stamp such as `livro_miolo.indd 12 03/05/2019 10:41 AM`.
static STAMP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:\d+\s+)?\S+\.indd\s+\d+\s+\d{1,2}/\d{1,2}/\d{2,4}\s+\d{1,2}:\d{2}(?::\d{2})?(?:\s*[AP]M)?")
        .unwrap()
});

static PAGE_NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,4}$").unwrap());

static ACRONYM_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:\p{Lu}\.)+$").unwrap());

static HYPHEN_BREAK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\p{L})-[ \t]*\n[ \t]*(\p{L})").unwrap());

/// Longest line a title-less heading will absorb as its title.
const MAX_ABSORBED_TITLE: usize = 60;

const CLOSING_QUOTES: &[char] = &['"', '\'', '»', '”', '’'];

fn is_page_noise(line: &str) -> bool {
    PAGE_NUMBER_RE.is_match(line) || STAMP_RE.is_match(line)
}

/// True when `word` ending in a period is an abbreviation or initial, not a sentence end.
pub(crate) fn is_abbreviated(word: &str) -> bool {
    let word = word.trim_start_matches(|c: char| !c.is_alphanumeric());
    match word.strip_suffix('.') {
        Some(stem) => is_abbreviation(stem) || ACRONYM_RUN_RE.is_match(word),
        None => false,
    }
}

fn ends_sentence(line: &str) -> bool {
    let trimmed = line.trim_end_matches(CLOSING_QUOTES);
    match trimmed.chars().last() {
        Some('!' | '?' | '…') => true,
        Some('.') => {
            let last_word = trimmed.rsplit(' ').next().unwrap_or(trimmed);
            !is_abbreviated(last_word)
        }
        _ => false,
    }
}

fn starts_upper(line: &str) -> bool {
    line.chars()
        .find(|c| !matches!(c, '-' | '"' | '\'' | ' '))
        .is_some_and(char::is_uppercase)
}

fn is_title_candidate(line: &str) -> bool {
    line.chars().count() <= MAX_ABSORBED_TITLE
        && !line.ends_with(['.', '!', '?', '…', ',', ';'])
        && !is_page_noise(line)
        && parse_heading(line).is_none()
}

fn reflow_block(block: &str) -> String {
    let lines: Vec<&str> = block.lines().filter(|l| !l.is_empty()).collect();
    let mut out = String::with_capacity(block.len());
    let mut prev: Option<&str> = None;
    // A heading always ends its line.
    let mut force_break = false;
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        let heading = parse_heading(line);

        if let Some(prev) = prev {
            let keep_break = force_break
                || heading.is_some()
                || is_page_noise(prev)
                || is_page_noise(line)
                || prev.ends_with('-')
                || (ends_sentence(prev) && starts_upper(line));
            out.push(if keep_break { '\n' } else { ' ' });
        }
        out.push_str(line);
        force_break = false;

        if let Some(heading) = heading {
            force_break = true;
            if heading.title.is_none() {
                if let Some(next) = lines.get(i + 1).filter(|n| is_title_candidate(n)) {
                    out.push(' ');
                    out.push_str(next);
                    i += 1;
                }
            }
        }

        prev = Some(lines[i]);
        i += 1;
    }

    out
}

/// Rejoin hard-wrapped lines inside each blank-line-delimited block.
pub fn reflow(text: &str) -> String {
    text.split("\n\n")
        .map(reflow_block)
        .filter(|b| !b.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Remove stamps and page numbers, rejoin hyphen-broken words, then reflow
/// what the removed lines were holding apart.
pub fn clean_pages(text: &str) -> String {
    let mut kept = String::with_capacity(text.len());
    for raw in text.split('\n') {
        let line = STAMP_RE.replace_all(raw, "");
        let line = line.trim();
        let emptied = line.is_empty() && !raw.trim().is_empty();
        if emptied || PAGE_NUMBER_RE.is_match(line) {
            continue;
        }
        kept.push_str(line);
        kept.push('\n');
    }

    // A page break can sit between the two halves of a hyphenated word.
    let kept = normalize_whitespace(&kept);
    let joined = HYPHEN_BREAK_RE.replace_all(&kept, "$1$2");
    reflow(&joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reflow_joins_wrapped_lines() {
        let text = "Era uma vez um menino\nque morava longe.\nEle gostava de ler.";
        assert_eq!(
            reflow(text),
            "Era uma vez um menino que morava longe.\nEle gostava de ler."
        );
    }

    #[test]
    fn test_reflow_keeps_abbreviation_together() {
        let text = "Conversou com o Dr.\nSilva ontem.";
        assert_eq!(reflow(text), "Conversou com o Dr. Silva ontem.");

        let text = "Assinado por J. R.\nTolkien.";
        assert_eq!(reflow(text), "Assinado por J. R. Tolkien.");
    }

    #[test]
    fn test_reflow_keeps_noise_and_hyphen_breaks() {
        let text = "uma pala-\nvra\n12\nsegue";
        assert_eq!(reflow(text), "uma pala-\nvra\n12\nsegue");
    }

    #[test]
    fn test_heading_absorbs_title() {
        let text = "Capítulo 3\nO Encontro\nNaquela manhã, tudo mudou.";
        assert_eq!(
            reflow(text),
            "Capítulo 3 O Encontro\nNaquela manhã, tudo mudou."
        );
    }

    #[test]
    fn test_heading_does_not_absorb_sentence() {
        let text = "Capítulo 3\nNaquela manhã, tudo mudou.";
        assert_eq!(reflow(text), "Capítulo 3\nNaquela manhã, tudo mudou.");
    }

    #[test]
    fn test_clean_pages() {
        let text = "O dia come-\n42\nçou cedo e\nlivro_final.indd 42 12/03/2020 10:41 AM\nterminou tarde.";
        assert_eq!(clean_pages(&reflow(text)), "O dia começou cedo e terminou tarde.");
    }

    #[test]
    fn test_clean_pages_keeps_paragraphs() {
        let text = "Primeiro parágrafo.\n\n7\n\nSegundo parágrafo.";
        assert_eq!(clean_pages(text), "Primeiro parágrafo.\n\nSegundo parágrafo.");
    }

    #[test]
    fn test_is_abbreviated() {
        assert!(is_abbreviated("Dr."));
        assert!(is_abbreviated("E.U.A."));
        assert!(is_abbreviated("(Sr."));
        assert!(!is_abbreviated("casa."));
        assert!(!is_abbreviated("Dr"));
    }
}
