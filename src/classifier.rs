// 🏷️ Month Classifier
// "Was this entity in the Simples Nacional for the whole of month M?"
//
// Periods are scanned in timeline order, no sorting. First match wins.

use crate::period::{EnrollmentPeriod, Month};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const REGIME_SIMPLES: &str = "Simples Nacional";
pub const REGIME_OTHER: &str = "Outro Regime";

// ============================================================================
// REASONS
// ============================================================================

/// Justification attached to every classified month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reason {
    /// Current month, covered by an open-ended period.
    CurrentStatus,
    /// Covered from first to last day.
    RemainedWholeMonth,
    /// A closed period ended before the month did.
    Excluded(NaiveDate),
    /// No period says anything about this month.
    NeverEnrolled,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::CurrentStatus => write!(f, "Status atual é Simples Nacional."),
            Reason::RemainedWholeMonth => {
                write!(f, "Permaneceu no Simples Nacional o mês inteiro.")
            }
            Reason::Excluded(date) => write!(
                f,
                "Excluída do Simples Nacional em {}.",
                date.format("%Y-%m-%d")
            ),
            Reason::NeverEnrolled => {
                write!(f, "Não optante/Nunca esteve no Simples Nacional neste mês.")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthVerdict {
    pub enrolled: bool,
    pub reason: Reason,
}

impl MonthVerdict {
    fn enrolled(reason: Reason) -> Self {
        MonthVerdict {
            enrolled: true,
            reason,
        }
    }

    fn not_enrolled(reason: Reason) -> Self {
        MonthVerdict {
            enrolled: false,
            reason,
        }
    }

    pub fn regime_label(&self) -> &'static str {
        regime_label(self.enrolled)
    }
}

/// Output label for the REGIME column.
pub fn regime_label(enrolled: bool) -> &'static str {
    if enrolled {
        REGIME_SIMPLES
    } else {
        REGIME_OTHER
    }
}

// ============================================================================
// CLASSIFICATION
// ============================================================================

/// Classify one month against a timeline.
///
/// 1. Full coverage: a period starting on/before day 1 whose end (or `today`,
///    if open) reaches the last day.
/// 2. Exclusion: a closed period starting on/before the last day and ending
///    strictly before it. The start is deliberately not required to fall inside
///    the month, so an old closed period reports its exclusion date for every
///    later month.
/// 3. Otherwise never enrolled.
pub fn classify(periods: &[EnrollmentPeriod], month: Month, today: NaiveDate) -> MonthVerdict {
    let first_day = month.first_day();
    let last_day = month.last_day();
    let is_current_month = month == Month::containing(today);

    for period in periods {
        if period.start() <= first_day && period.effective_end(today) >= last_day {
            if is_current_month && period.is_open() {
                return MonthVerdict::enrolled(Reason::CurrentStatus);
            }
            return MonthVerdict::enrolled(Reason::RemainedWholeMonth);
        }
    }

    for period in periods {
        if let Some(end) = period.end() {
            if period.start() <= last_day && end < last_day {
                return MonthVerdict::not_enrolled(Reason::Excluded(end));
            }
        }
    }

    MonthVerdict::not_enrolled(Reason::NeverEnrolled)
}

// ============================================================================
// TESTS
// ============================================================================
