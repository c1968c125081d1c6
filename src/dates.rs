// 📅 Date Parsing
// Registry payloads carry dates in whatever layout the upstream felt like that day.
// Fixed layouts first, then a day-first general parser.

use crate::error::DateParseError;
use chrono::{Datelike, NaiveDate, Utc};
use tracing::debug;

// ============================================================================
// FIXED LAYOUTS
// ============================================================================

/// Layouts tried in order before falling back to the general parser.
pub const FIXED_FORMATS: [&str; 4] = ["%d/%m/%Y", "%Y-%m-%d", "%d-%m-%Y", "%Y/%m/%d"];

/// Parse a date of unknown layout.
///
/// * `Ok(None)` - blank input, i.e. "no date here"
/// * `Ok(Some(date))` - one of the layouts matched
/// * `Err(DateParseError)` - something was there but it is not a date
///
/// Ambiguous numeric dates are read day-first: `03/04/2021` is April 3rd.
pub fn parse_date(text: &str) -> Result<Option<NaiveDate>, DateParseError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    for format in FIXED_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            if has_four_digit_year(trimmed, format) {
                return Ok(Some(date));
            }
        }
    }

    parse_day_first(trimmed, Utc::now().year())
        .map(Some)
        .ok_or_else(|| DateParseError::new(text))
}

/// Parse upstream data: an unreadable date is treated as no date at all.
pub fn parse_date_lenient(text: &str) -> Option<NaiveDate> {
    match parse_date(text) {
        Ok(date) => date,
        Err(err) => {
            debug!(%err, "treating unparseable date as absent");
            None
        }
    }
}

/// chrono's `%Y` happily reads "19" as year 19; the fixed layouts want four digits.
fn has_four_digit_year(text: &str, format: &str) -> bool {
    let separator = if format.contains('/') { '/' } else { '-' };
    let year_token = if format.starts_with("%Y") {
        text.split(separator).next()
    } else {
        text.rsplit(separator).next()
    };
    year_token.map_or(false, |token| {
        token.len() == 4 && token.chars().all(|c| c.is_ascii_digit())
    })
}

// ============================================================================
// GENERAL (DAY-FIRST) PARSER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Number(String),
    Month(u32),
}

const MONTH_NAMES: [(&str, u32); 24] = [
    ("janeiro", 1),
    ("fevereiro", 2),
    ("marco", 3),
    ("abril", 4),
    ("maio", 5),
    ("junho", 6),
    ("julho", 7),
    ("agosto", 8),
    ("setembro", 9),
    ("outubro", 10),
    ("novembro", 11),
    ("dezembro", 12),
    ("january", 1),
    ("february", 2),
    ("march", 3),
    ("april", 4),
    ("may", 5),
    ("june", 6),
    ("july", 7),
    ("august", 8),
    ("september", 9),
    ("october", 10),
    ("november", 11),
    ("december", 12),
];

const NOISE_WORDS: [&str; 36] = [
    "de", "do", "of", "the", "em", "at", "as", "a", "z", "utc", "gmt", "feira",
    "segunda", "terca", "quarta", "quinta", "sexta", "sabado", "domingo",
    "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday",
    "mon", "tue", "wed", "thu", "fri", "sat", "sun", "seg", "qua", "qui",
];

fn parse_day_first(text: &str, current_year: i32) -> Option<NaiveDate> {
    let tokens = tokenize(text)?;

    let mut numbers = Vec::new();
    let mut month_name = None;
    for token in tokens {
        match token {
            Token::Number(digits) => numbers.push(digits),
            Token::Month(month) => {
                if month_name.replace(month).is_some() {
                    return None;
                }
            }
        }
    }

    match (month_name, numbers.as_slice()) {
        (None, [compact]) if compact.len() == 8 => {
            let year = compact[..4].parse().ok()?;
            let month = compact[4..6].parse().ok()?;
            let day = compact[6..].parse().ok()?;
            NaiveDate::from_ymd_opt(year, month, day)
        }
        (None, [a, b, c]) => {
            let (year, month, day) = if is_year_token(a) {
                let (b, c) = (number(b)?, number(c)?);
                if b <= 12 {
                    (a.as_str(), b, c)
                } else {
                    (a.as_str(), c, b)
                }
            } else {
                let (a, b) = (number(a)?, number(b)?);
                if b <= 12 {
                    (c.as_str(), b, a)
                } else {
                    (c.as_str(), a, b)
                }
            };
            NaiveDate::from_ymd_opt(resolve_year(year, current_year)?, month, day)
        }
        (Some(month), [a, b]) => {
            let (day, year) = if is_year_token(a) && !is_year_token(b) {
                (b, a)
            } else {
                (a, b)
            };
            NaiveDate::from_ymd_opt(resolve_year(year, current_year)?, month, number(day)?)
        }
        _ => None,
    }
}

fn tokenize(text: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();

    for chunk in split_time_marker(text).split_whitespace() {
        // times of day and UTC offsets
        if chunk.contains(':') {
            continue;
        }

        for piece in chunk.split(|c: char| matches!(c, '/' | '-' | '.' | ',')) {
            if piece.is_empty() {
                continue;
            }

            let word = fold_accents(&piece.to_lowercase());
            if word.chars().all(|c| c.is_ascii_digit()) {
                tokens.push(Token::Number(word));
            } else if let Some(digits) = strip_ordinal(&word) {
                tokens.push(Token::Number(digits.to_string()));
            } else if let Some(month) = month_from_name(&word) {
                tokens.push(Token::Month(month));
            } else if !NOISE_WORDS.contains(&word.as_str()) {
                return None;
            }
        }
    }

    Some(tokens)
}

/// "2021-03-04T10:00:00" -> "2021-03-04 10:00:00"
fn split_time_marker(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    chars
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            let between_digits = i > 0
                && i + 1 < chars.len()
                && chars[i - 1].is_ascii_digit()
                && chars[i + 1].is_ascii_digit();
            if (c == 'T' || c == 't') && between_digits {
                ' '
            } else {
                c
            }
        })
        .collect()
}

fn fold_accents(word: &str) -> String {
    word.chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'ê' | 'è' => 'e',
            'í' | 'î' => 'i',
            'ó' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ü' => 'u',
            'ç' => 'c',
            other => other,
        })
        .collect()
}

fn strip_ordinal(word: &str) -> Option<&str> {
    let digits = ["st", "nd", "rd", "th", "o", "º"]
        .iter()
        .find_map(|suffix| word.strip_suffix(*suffix))?;
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        Some(digits)
    } else {
        None
    }
}

fn month_from_name(word: &str) -> Option<u32> {
    if word == "sept" {
        return Some(9);
    }
    MONTH_NAMES.iter().find_map(|(name, month)| {
        let abbreviated = word.len() == 3 && name.starts_with(word);
        if *name == word || abbreviated {
            Some(*month)
        } else {
            None
        }
    })
}

fn number(token: &str) -> Option<u32> {
    token.parse().ok()
}

fn is_year_token(token: &str) -> bool {
    token.len() >= 3 || number(token).map_or(false, |n| n > 31)
}

/// Two-digit years land within fifty years of `current_year`.
fn resolve_year(token: &str, current_year: i32) -> Option<i32> {
    let value: i32 = token.parse().ok()?;
    if token.len() > 2 {
        return Some(value);
    }

    let year = current_year / 100 * 100 + value;
    if year >= current_year + 50 {
        Some(year - 100)
    } else if year < current_year - 50 {
        Some(year + 100)
    } else {
        Some(year)
    }
}

// ============================================================================
// TESTS
// ============================================================================
