//! Spelling numbers out in Brazilian Portuguese.
//!
//! Years between 1900 and 2100, numbers longer than seven digits and the
//! enumeration marker opening a paragraph keep their digits.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::chapters::is_canonical_header;

const UNITS: [&str; 20] = [
    "zero",
    "um",
    "dois",
    "três",
    "quatro",
    "cinco",
    "seis",
    "sete",
    "oito",
    "nove",
    "dez",
    "onze",
    "doze",
    "treze",
    "catorze",
    "quinze",
    "dezesseis",
    "dezessete",
    "dezoito",
    "dezenove",
];

const TENS: [&str; 10] = [
    "", "", "vinte", "trinta", "quarenta", "cinquenta", "sessenta", "setenta", "oitenta",
    "noventa",
];

const HUNDREDS: [&str; 10] = [
    "",
    "cento",
    "duzentos",
    "trezentos",
    "quatrocentos",
    "quinhentos",
    "seiscentos",
    "setecentos",
    "oitocentos",
    "novecentos",
];

const ORDINAL_UNITS: [&str; 10] = [
    "", "primeiro", "segundo", "terceiro", "quarto", "quinto", "sexto", "sétimo", "oitavo", "nono",
];

const ORDINAL_TENS: [&str; 10] = [
    "",
    "décimo",
    "vigésimo",
    "trigésimo",
    "quadragésimo",
    "quinquagésimo",
    "sexagésimo",
    "septuagésimo",
    "octogésimo",
    "nonagésimo",
];

const ORDINAL_HUNDREDS: [&str; 10] = [
    "",
    "centésimo",
    "ducentésimo",
    "trecentésimo",
    "quadringentésimo",
    "quingentésimo",
    "sexcentésimo",
    "septingentésimo",
    "octingentésimo",
    "noningentésimo",
];

const MONTHS: [&str; 12] = [
    "janeiro",
    "fevereiro",
    "março",
    "abril",
    "maio",
    "junho",
    "julho",
    "agosto",
    "setembro",
    "outubro",
    "novembro",
    "dezembro",
];

/// Longest digit run that is still spelled out.
const MAX_SPOKEN_DIGITS: usize = 7;

const NUMBER: &str = r"\d{1,3}(?:\.\d{3})+|\d+";

/// `°` directly followed by a letter is a unit (`30°C`), not an ordinal.
static ORDINAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d+)([ºª°])(\p{L})?").unwrap());

static TEMPERATURE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(-?)\b({NUMBER})(?:,(\d+))?\s?°\s?([CF])\b")).unwrap()
});

static DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:(\d{1,2})/(\d{1,2})/(\d{4}|\d{2})|(\d{4})-(\d{2})-(\d{2}))\b").unwrap()
});

static TIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([01]?\d|2[0-3]):([0-5]\d)(?::([0-5]\d))?\b").unwrap()
});

static DOT_DECIMAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d+)\.(\d{1,2})\b").unwrap());

static UNIT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\b({NUMBER})(?:,(\d+))?\s?(km|kg|cm|mm|mg|ml|mL|min|ha|m|g|l|L)\b"
    ))
    .unwrap()
});

static PERCENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"\b({NUMBER})(?:,(\d+))?\s?%")).unwrap());

static CURRENCY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"R\$\s*({NUMBER})(?:,\d{{1,2}})?")).unwrap());

static RANGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"\b({NUMBER})\s?-\s?({NUMBER})\b")).unwrap());

static NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"\b({NUMBER})(?:,(\d+))?\b")).unwrap());

static ENUMERATION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+[.)]\s").unwrap());

fn below_thousand(n: u64) -> String {
    match n {
        0..=19 => UNITS[n as usize].to_string(),
        20..=99 => {
            let (tens, units) = (n / 10, n % 10);
            if units == 0 {
                TENS[tens as usize].to_string()
            } else {
                format!("{} e {}", TENS[tens as usize], UNITS[units as usize])
            }
        }
        100 => "cem".to_string(),
        _ => {
            let (hundreds, rest) = (n / 100, n % 100);
            if rest == 0 {
                HUNDREDS[hundreds as usize].to_string()
            } else {
                format!("{} e {}", HUNDREDS[hundreds as usize], below_thousand(rest))
            }
        }
    }
}

/// Whether the group following a thousand/million is joined with "e".
fn joins_with_e(rest: u64) -> bool {
    rest < 100 || (rest < 1000 && rest % 100 == 0) || (rest % 1000 == 0 && joins_with_e(rest / 1000))
}

/// Masculine cardinal words for `n` (below one billion).
pub fn cardinal(n: u64) -> String {
    if n < 1000 {
        return below_thousand(n);
    }

    let (head, rest) = if n >= 1_000_000 {
        let millions = n / 1_000_000;
        let head = if millions == 1 {
            "um milhão".to_string()
        } else {
            format!("{} milhões", cardinal(millions))
        };
        (head, n % 1_000_000)
    } else {
        let thousands = n / 1000;
        let head = if thousands == 1 {
            "mil".to_string()
        } else {
            format!("{} mil", below_thousand(thousands))
        };
        (head, n % 1000)
    };

    if rest == 0 {
        head
    } else if joins_with_e(rest) {
        format!("{head} e {}", cardinal(rest))
    } else {
        format!("{head} {}", cardinal(rest))
    }
}

/// Feminine cardinal words, for counting feminine nouns such as `horas`.
fn feminine_cardinal(n: u64) -> String {
    let words = cardinal(n);
    let (head, last) = match words.rsplit_once(' ') {
        Some((head, last)) => (format!("{head} "), last),
        None => (String::new(), words.as_str()),
    };
    let last = match last {
        "um" => "uma",
        "dois" => "duas",
        other => other,
    };
    format!("{head}{last}")
}

/// Ordinal words for 1..=999, feminine when `feminine` is set.
pub fn ordinal(n: u32, feminine: bool) -> Option<String> {
    if n == 0 || n > 999 {
        return None;
    }
    let parts = [
        ORDINAL_HUNDREDS[(n / 100) as usize],
        ORDINAL_TENS[((n / 10) % 10) as usize],
        ORDINAL_UNITS[(n % 10) as usize],
    ];
    let words: Vec<String> = parts
        .iter()
        .filter(|w| !w.is_empty())
        .map(|w| match (feminine, w.strip_suffix('o')) {
            (true, Some(stem)) => format!("{stem}a"),
            _ => w.to_string(),
        })
        .collect();
    Some(words.join(" "))
}

/// Parse a digit run that may use `.` as thousands separator.
fn parse_integer(token: &str) -> Option<u64> {
    let digits: String = token.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() || digits.len() > MAX_SPOKEN_DIGITS {
        return None;
    }
    digits.parse().ok()
}

fn is_year(token: &str) -> bool {
    token.len() == 4
        && token.chars().all(|c| c.is_ascii_digit())
        && token.parse::<u32>().is_ok_and(|y| (1900..=2100).contains(&y))
}

fn decimal_words(fraction: &str) -> String {
    if fraction.starts_with('0') || fraction.len() > 3 {
        fraction
            .chars()
            .filter_map(|c| c.to_digit(10))
            .map(|d| UNITS[d as usize])
            .collect::<Vec<_>>()
            .join(" ")
    } else {
        fraction.parse().map(cardinal).unwrap_or_else(|_| fraction.to_string())
    }
}

/// Spoken form of an integer token with optional decimal part.
fn spoken(integer: &str, fraction: Option<&str>) -> Option<String> {
    let value = parse_integer(integer)?;
    let words = cardinal(value);
    Some(match fraction {
        Some(f) => format!("{words} vírgula {}", decimal_words(f)),
        None => words,
    })
}

fn unit_name(unit: &str, plural: bool) -> &'static str {
    let (singular, plural_form) = match unit {
        "km" => ("quilômetro", "quilômetros"),
        "kg" => ("quilograma", "quilogramas"),
        "cm" => ("centímetro", "centímetros"),
        "mm" => ("milímetro", "milímetros"),
        "mg" => ("miligrama", "miligramas"),
        "ml" | "mL" => ("mililitro", "mililitros"),
        "min" => ("minuto", "minutos"),
        "ha" => ("hectare", "hectares"),
        "m" => ("metro", "metros"),
        "g" => ("grama", "gramas"),
        _ => ("litro", "litros"),
    };
    if plural { plural_form } else { singular }
}

/// Replace `1º`, `2ª`, `3°` with ordinal words.
pub fn spell_ordinals(text: &str) -> String {
    ORDINAL_RE
        .replace_all(text, |caps: &Captures| {
            let letter = caps.get(3).map_or("", |m| m.as_str());
            if &caps[2] == "°" && !letter.is_empty() {
                return caps[0].to_string();
            }
            caps[1]
                .parse()
                .ok()
                .and_then(|n| ordinal(n, &caps[2] == "ª"))
                .map(|words| format!("{words}{letter}"))
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// True when the match is one part of a dotted, colon or slash separated
/// digit sequence such as `1.2.3`, `25:99` or `3/4`.
fn is_glued(text: &str, caps: &Captures) -> bool {
    let Some(m) = caps.get(0) else {
        return false;
    };
    let joins = |sep: Option<char>, digit: Option<char>| {
        matches!(sep, Some('.' | ':' | '/')) && digit.is_some_and(|c| c.is_ascii_digit())
    };
    let mut before = text[..m.start()].chars().rev();
    let mut after = text[m.end()..].chars();
    joins(before.next(), before.next()) || joins(after.next(), after.next())
}

fn spoken_date(day: &str, month: &str, year: &str) -> Option<String> {
    let day: u64 = day.parse().ok().filter(|d| (1..=31).contains(d))?;
    let month: usize = month.parse().ok().filter(|m| (1..=12).contains(m))?;
    let day = if day == 1 {
        "primeiro".to_string()
    } else {
        cardinal(day)
    };
    let year = if is_year(year) {
        year.to_string()
    } else {
        cardinal(year.parse().ok()?)
    };
    Some(format!("{day} de {} de {year}", MONTHS[month - 1]))
}

fn spoken_time(caps: &Captures) -> Option<String> {
    let hours: u64 = caps[1].parse().ok()?;
    let minutes: u64 = caps[2].parse().ok()?;
    let mut words = format!(
        "{} {}",
        feminine_cardinal(hours),
        if hours == 1 { "hora" } else { "horas" }
    );
    let mut tail = Vec::new();
    if minutes > 0 {
        tail.push(format!(
            "{} {}",
            cardinal(minutes),
            if minutes == 1 { "minuto" } else { "minutos" }
        ));
    }
    if let Some(seconds) = caps.get(3).and_then(|m| m.as_str().parse::<u64>().ok()) {
        if seconds > 0 {
            tail.push(format!(
                "{} {}",
                cardinal(seconds),
                if seconds == 1 { "segundo" } else { "segundos" }
            ));
        }
    }
    for part in tail {
        words.push_str(" e ");
        words.push_str(&part);
    }
    Some(words)
}

fn spell_paragraph(paragraph: &str) -> String {
    let text = DATE_RE.replace_all(paragraph, |caps: &Captures| {
        let words = match (caps.get(1), caps.get(2), caps.get(3)) {
            (Some(d), Some(m), Some(y)) => spoken_date(d.as_str(), m.as_str(), y.as_str()),
            _ => spoken_date(&caps[6], &caps[5], &caps[4]),
        };
        words.unwrap_or_else(|| caps[0].to_string())
    });

    let text = TIME_RE.replace_all(&text, |caps: &Captures| {
        if is_glued(&text, caps) {
            return caps[0].to_string();
        }
        spoken_time(caps).unwrap_or_else(|| caps[0].to_string())
    });

    let text = RANGE_RE.replace_all(&text, |caps: &Captures| {
        let valid = |token: &str| is_year(token) || parse_integer(token).is_some();
        if valid(&caps[1]) && valid(&caps[2]) {
            format!("{} a {}", &caps[1], &caps[2])
        } else {
            caps[0].to_string()
        }
    });

    let text = TEMPERATURE_RE.replace_all(&text, |caps: &Captures| {
        let fraction = caps.get(3).map(|m| m.as_str());
        match spoken(&caps[2], fraction) {
            Some(words) => {
                let sign = if caps[1].is_empty() { "" } else { "menos " };
                let plural = fraction.is_some() || parse_integer(&caps[2]) != Some(1);
                let scale = if &caps[4] == "C" { "Celsius" } else { "Fahrenheit" };
                format!("{sign}{words} {} {scale}", if plural { "graus" } else { "grau" })
            }
            None => caps[0].to_string(),
        }
    });

    let text = UNIT_RE.replace_all(&text, |caps: &Captures| {
        let fraction = caps.get(2).map(|m| m.as_str());
        match spoken(&caps[1], fraction) {
            Some(words) => {
                let plural = fraction.is_some() || parse_integer(&caps[1]) != Some(1);
                format!("{words} {}", unit_name(&caps[3], plural))
            }
            None => caps[0].to_string(),
        }
    });

    let text = PERCENT_RE.replace_all(&text, |caps: &Captures| {
        match spoken(&caps[1], caps.get(2).map(|m| m.as_str())) {
            Some(words) => format!("{words} por cento"),
            None => caps[0].to_string(),
        }
    });

    let text = CURRENCY_RE.replace_all(&text, |caps: &Captures| {
        match parse_integer(&caps[1]) {
            Some(1) => "um real".to_string(),
            Some(value) => format!("{} reais", cardinal(value)),
            None => caps[0].to_string(),
        }
    });

    let text = DOT_DECIMAL_RE.replace_all(&text, |caps: &Captures| {
        if is_glued(&text, caps) {
            return caps[0].to_string();
        }
        match parse_integer(&caps[1]) {
            Some(value) => format!("{} ponto {}", cardinal(value), decimal_words(&caps[2])),
            None => caps[0].to_string(),
        }
    });

    NUMBER_RE
        .replace_all(&text, |caps: &Captures| {
            let token = &caps[1];
            let fraction = caps.get(2).map(|m| m.as_str());
            if (fraction.is_none() && is_year(token)) || is_glued(&text, caps) {
                return caps[0].to_string();
            }
            spoken(token, fraction).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Spell out dates, times, ranges, units, percentages, currency and the
/// remaining numbers.
pub fn spell_numbers(text: &str) -> String {
    text.split("\n\n")
        .map(|paragraph| {
            if is_canonical_header(paragraph) {
                return paragraph.to_string();
            }
            match ENUMERATION_RE.find(paragraph) {
                Some(marker) => format!(
                    "{}{}",
                    marker.as_str(),
                    spell_paragraph(&paragraph[marker.end()..])
                ),
                None => spell_paragraph(paragraph),
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
