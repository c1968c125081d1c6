// ⏳ Timeline Builder
// The registry reports history as closed intervals but "enrolled right now" as a
// sentence. Turn that sentence into an open-ended period so the classifier only
// ever sees one representation.

use crate::dates::parse_date_lenient;
use crate::period::{has_open_period, EnrollmentPeriod};
use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

pub const ENROLLED_PHRASE: &str = "optante pelo simples nacional";
pub const INFERRED_DETAIL: &str = "Situação Atual: Optante pelo Simples Nacional";

fn since_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"desde\s+(\d{2}/\d{2}/\d{4})").expect("valid 'desde' pattern")
    })
}

/// Does the narrative say the entity is currently enrolled?
///
/// "NÃO optante pelo Simples Nacional" contains the phrase too, so negated forms
/// are rejected explicitly.
pub fn states_current_enrollment(status_text: &str) -> bool {
    let lowered = status_text.to_lowercase();
    let mut search_from = 0;

    while let Some(offset) = lowered[search_from..].find(ENROLLED_PHRASE) {
        let at = search_from + offset;
        let before = lowered[..at].trim_end();
        if !(before.ends_with("não") || before.ends_with("nao")) {
            return true;
        }
        search_from = at + ENROLLED_PHRASE.len();
    }

    false
}

/// Date captured by "desde DD/MM/YYYY", if any and if it parses.
pub fn enrolled_since(status_text: &str) -> Option<NaiveDate> {
    let lowered = status_text.to_lowercase();
    let captures = since_pattern().captures(&lowered)?;
    parse_date_lenient(captures.get(1)?.as_str())
}

/// Append an inferred open period when the status narrative says "currently
/// enrolled" and the structured history has no open period of its own.
///
/// Start date: the "desde" date, or January 1st of `reference_year`.
pub fn augment(
    mut periods: Vec<EnrollmentPeriod>,
    status_text: Option<&str>,
    reference_year: i32,
) -> Vec<EnrollmentPeriod> {
    let status_text = match status_text {
        Some(text) if states_current_enrollment(text) => text,
        _ => return periods,
    };

    if has_open_period(&periods) {
        debug!("status says enrolled but history already has an open period");
        return periods;
    }

    let start = enrolled_since(status_text)
        .or_else(|| NaiveDate::from_ymd_opt(reference_year, 1, 1));

    if let Some(start) = start {
        periods.push(EnrollmentPeriod::open(start, INFERRED_DETAIL));
    }

    periods
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_synthesizes_period_from_desde_date() {
        let periods = augment(
            Vec::new(),
            Some("Optante pelo Simples Nacional desde 01/03/2019"),
            2021,
        );

        assert_eq!(periods.len(), 1);
        assert_eq!(periods[0].start(), ymd(2019, 3, 1));
        assert!(periods[0].is_open());
        assert_eq!(periods[0].detail(), INFERRED_DETAIL);
    }

    #[test]
    fn test_defaults_to_january_of_reference_year() {
        let periods = augment(Vec::new(), Some("OPTANTE PELO SIMPLES NACIONAL"), 2021);
        assert_eq!(periods, vec![EnrollmentPeriod::open(ymd(2021, 1, 1), INFERRED_DETAIL)]);
    }

    #[test]
    fn test_unparseable_desde_date_defaults_too() {
        let periods = augment(
            Vec::new(),
            Some("optante pelo simples nacional desde 31/02/2019"),
            2022,
        );
        assert_eq!(periods[0].start(), ymd(2022, 1, 1));
    }

    #[test]
    fn test_does_not_duplicate_open_period() {
        let existing = vec![EnrollmentPeriod::open(ymd(2018, 1, 1), "histórico")];
        let periods = augment(
            existing.clone(),
            Some("optante pelo simples nacional desde 01/03/2019"),
            2021,
        );
        assert_eq!(periods, existing);
    }

    #[test]
    fn test_keeps_closed_history_and_appends() {
        let closed = EnrollmentPeriod::new(ymd(2010, 1, 1), Some(ymd(2012, 12, 31)), "").unwrap();
        let periods = augment(
            vec![closed.clone()],
            Some("Optante pelo Simples Nacional desde 01/01/2020"),
            2021,
        );
        assert_eq!(periods.len(), 2);
        assert_eq!(periods[0], closed);
        assert_eq!(periods[1].start(), ymd(2020, 1, 1));
    }

    #[test]
    fn test_unrelated_or_negated_status_adds_nothing() {
        assert!(augment(Vec::new(), None, 2021).is_empty());
        assert!(augment(Vec::new(), Some("ATIVA"), 2021).is_empty());
        // negated wording is rejected on purpose, unlike a bare substring match
        assert!(augment(Vec::new(), Some("NÃO optante pelo Simples Nacional"), 2021).is_empty());
        assert!(augment(Vec::new(), Some("Nao optante pelo Simples Nacional"), 2021).is_empty());
    }

    #[test]
    fn test_states_current_enrollment() {
        assert!(states_current_enrollment("Optante pelo Simples Nacional desde 01/01/2018"));
        assert!(!states_current_enrollment("Não optante pelo Simples Nacional"));
        assert!(!states_current_enrollment(""));
    }
}
