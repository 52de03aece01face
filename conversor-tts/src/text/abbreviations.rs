//! Portuguese abbreviation dictionary.
//!
//! `D.` (Dona) and `R.` (Rua) are deliberately absent: they collide with
//! initials such as "D. Pedro" vs "J. R. Tolkien" and with acronym runs.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Abbreviation (without the trailing period) and its spoken form.
pub const ABBREVIATIONS: &[(&str, &str)] = &[
    ("Dr", "Doutor"),
    ("Dra", "Doutora"),
    ("Sr", "Senhor"),
    ("Sra", "Senhora"),
    ("Srta", "Senhorita"),
    ("Prof", "Professor"),
    ("Profa", "Professora"),
    ("Eng", "Engenheiro"),
    ("Engª", "Engenheira"),
    ("Adm", "Administrador"),
    ("Adv", "Advogado"),
    ("Exmo", "Excelentíssimo"),
    ("Exma", "Excelentíssima"),
    ("V.Exa", "Vossa Excelência"),
    ("V.Sa", "Vossa Senhoria"),
    ("Av", "Avenida"),
    ("Km", "Quilômetro"),
    ("etc", "etcétera"),
    ("Ref", "Referência"),
    ("Pag", "Página"),
    ("Pág", "Página"),
    ("Págs", "Páginas"),
    ("Pags", "Páginas"),
    ("Fl", "Folha"),
    ("Fls", "Folhas"),
    ("Pe", "Padre"),
    ("Dept", "Departamento"),
    ("Depto", "Departamento"),
    ("Univ", "Universidade"),
    ("Inst", "Instituição"),
    ("Est", "Estado"),
    ("Tel", "Telefone"),
    ("CEP", "Código de Endereçamento Postal"),
    ("CNPJ", "Cadastro Nacional da Pessoa Jurídica"),
    ("CPF", "Cadastro de Pessoas Físicas"),
    ("EUA", "Estados Unidos da América"),
    ("Ed", "Edição"),
    ("Ltda", "Limitada"),
];

/// Titles that may end up followed by a stray period after expansion.
const TITLES: &str = "Doutor|Doutora|Senhor|Senhora|Senhorita|Professor|Professora|Padre|Dona";

static ABBREVIATION_RE: Lazy<Regex> = Lazy::new(|| {
    let mut keys: Vec<&str> = ABBREVIATIONS.iter().map(|(k, _)| *k).collect();
    // Longest first so "Dra" wins over "Dr"
    keys.sort_by_key(|k| std::cmp::Reverse(k.chars().count()));
    let alternation = keys
        .iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"\b({alternation})\.(\s|$)")).unwrap()
});

static TITLE_BREAK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"\b({TITLES})\.\s+(\p{{Lu}})")).unwrap());

/// Acronym entries such as `CPF` are written without a period, so a period
/// after one closes the sentence.
fn is_acronym(key: &str) -> bool {
    key.chars().all(char::is_uppercase)
}

/// True when `word` (without its trailing period) is an abbreviation whose
/// period never ends a sentence.
pub fn is_abbreviation(word: &str) -> bool {
    ABBREVIATIONS
        .iter()
        .any(|(k, _)| *k == word && !is_acronym(k))
}

fn expansion(key: &str) -> &'static str {
    ABBREVIATIONS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| *v)
        .unwrap_or_default()
}

/// Replace `Dr. ` style abbreviations with their spoken form.
pub fn expand_abbreviations(text: &str) -> String {
    ABBREVIATION_RE
        .replace_all(text, |caps: &Captures| {
            let period = if is_acronym(&caps[1]) { "." } else { "" };
            format!("{}{}{}", expansion(&caps[1]), period, &caps[2])
        })
        .into_owned()
}

/// Collapse `Doutor. Silva` back into `Doutor Silva`.
pub fn rejoin_titles(text: &str) -> String {
    TITLE_BREAK_RE.replace_all(text, "$1 $2").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_titles() {
        assert_eq!(
            expand_abbreviations("O Dr. Silva e a Dra. Souza chegaram."),
            "O Doutor Silva e a Doutora Souza chegaram."
        );
        assert_eq!(
            expand_abbreviations("Falei com V.Exa. ontem."),
            "Falei com Vossa Excelência ontem."
        );
    }

    #[test]
    fn test_expand_requires_following_space() {
        // No whitespace after the period: not an abbreviation use
        assert_eq!(expand_abbreviations("Dr.Silva"), "Dr.Silva");
        assert_eq!(expand_abbreviations("maçãs, peras etc."), "maçãs, peras etcétera");
    }

    #[test]
    fn test_no_expansion_inside_words() {
        assert_eq!(expand_abbreviations("Endr. x"), "Endr. x");
        assert_eq!(expand_abbreviations("Sr"), "Sr");
    }

    #[test]
    fn test_initials_are_not_expanded() {
        assert_eq!(expand_abbreviations("D. Pedro e R. Tolkien"), "D. Pedro e R. Tolkien");
    }

    #[test]
    fn test_is_abbreviation() {
        assert!(is_abbreviation("Dr"));
        assert!(is_abbreviation("Engª"));
        assert!(!is_abbreviation("dr"));
        assert!(!is_abbreviation("Silva"));
        assert!(!is_abbreviation("CPF"));
        assert!(!is_abbreviation("EUA"));
    }

    #[test]
    fn test_acronym_keeps_sentence_period() {
        assert_eq!(
            expand_abbreviations("Meu CPF. Ok."),
            "Meu Cadastro de Pessoas Físicas. Ok."
        );
        assert_eq!(
            expand_abbreviations("Mora nos EUA.\nVoltou."),
            "Mora nos Estados Unidos da América.\nVoltou."
        );
    }

    #[test]
    fn test_rejoin_titles() {
        assert_eq!(rejoin_titles("O Doutor. Silva chegou."), "O Doutor Silva chegou.");
        assert_eq!(rejoin_titles("Era doutor. ele sabia."), "Era doutor. ele sabia.");
    }
}
