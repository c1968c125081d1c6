// 🔁 Batch Orchestrator
// One entity at a time: lookup → periods → timeline → one verdict per month.
// Strictly sequential; the pause after each entity is the rate limit.

use crate::classifier::{classify, regime_label, Reason};
use crate::cnpj::unique_cnpjs;
use crate::config::BatchSettings;
use crate::normalizer::{extract_periods, extract_status_text};
use crate::period::{render_snapshot, reporting_months, EnrollmentPeriod, Month};
use crate::registry::RegistryClient;
use crate::timeline::augment;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::thread;
use tracing::info;

// ============================================================================
// RESULT ROWS
// ============================================================================

/// One (entity, month) verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub entity_id: String,
    pub month: Month,
    pub enrolled: bool,
    pub reason: Reason,
    pub periods_snapshot: String,
    pub current_status_text: String,
}

impl ClassificationResult {
    pub fn regime_label(&self) -> &'static str {
        regime_label(self.enrolled)
    }

    /// Flat, sheet-ready form of this row.
    pub fn to_row(&self) -> ResultRow {
        ResultRow {
            cnpj: self.entity_id.clone(),
            month: self.month.label(),
            regime: self.regime_label().to_string(),
            reason: self.reason.to_string(),
            periods: self.periods_snapshot.clone(),
            current_status: self.current_status_text.clone(),
        }
    }
}

/// The output sheet's columns, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRow {
    #[serde(rename = "CNPJ")]
    pub cnpj: String,

    #[serde(rename = "MÊS")]
    pub month: String,

    #[serde(rename = "REGIME")]
    pub regime: String,

    #[serde(rename = "MOTIVO")]
    pub reason: String,

    #[serde(rename = "Períodos_detectados")]
    pub periods: String,

    #[serde(rename = "Situacao_Atual")]
    pub current_status: String,
}

impl ResultRow {
    pub const HEADERS: [&'static str; 6] = [
        "CNPJ",
        "MÊS",
        "REGIME",
        "MOTIVO",
        "Períodos_detectados",
        "Situacao_Atual",
    ];

    pub fn cells(&self) -> [&str; 6] {
        [
            &self.cnpj,
            &self.month,
            &self.regime,
            &self.reason,
            &self.periods,
            &self.current_status,
        ]
    }
}

/// Reported after each entity finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub processed: usize,
    pub total: usize,
}

// ============================================================================
// PER-ENTITY TIMELINE
// ============================================================================

/// Everything learned about one entity from a single lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityTimeline {
    pub entity_id: String,
    pub periods: Vec<EnrollmentPeriod>,
    pub status_text: Option<String>,
}

impl EntityTimeline {
    pub fn classify_months(&self, months: &[Month], today: NaiveDate) -> Vec<ClassificationResult> {
        let snapshot = render_snapshot(&self.periods);
        let status = self.status_text.clone().unwrap_or_default();

        months
            .iter()
            .map(|&month| {
                let verdict = classify(&self.periods, month, today);
                ClassificationResult {
                    entity_id: self.entity_id.clone(),
                    month,
                    enrolled: verdict.enrolled,
                    reason: verdict.reason,
                    periods_snapshot: snapshot.clone(),
                    current_status_text: status.clone(),
                }
            })
            .collect()
    }
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

pub struct BatchOrchestrator<'a, C: RegistryClient + ?Sized> {
    client: &'a C,
    settings: &'a BatchSettings,
}

impl<'a, C: RegistryClient + ?Sized> BatchOrchestrator<'a, C> {
    pub fn new(client: &'a C, settings: &'a BatchSettings) -> Self {
        BatchOrchestrator { client, settings }
    }

    /// Look up one (already normalized) CNPJ and build its timeline.
    /// Upstream trouble simply yields an empty timeline.
    pub fn timeline_for(&self, cnpj: &str, today: NaiveDate) -> EntityTimeline {
        let response = self.client.lookup(cnpj);
        let body = response.body.as_ref();

        let periods = extract_periods(body);
        let status_text = extract_status_text(body);
        let periods = augment(periods, status_text.as_deref(), today.year());

        info!(
            cnpj,
            status = ?response.status,
            periods = periods.len(),
            "entity timeline built"
        );

        EntityTimeline {
            entity_id: cnpj.to_string(),
            periods,
            status_text,
        }
    }

    pub fn run<I, S>(&self, raw_ids: I, today: NaiveDate) -> Vec<ClassificationResult>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.run_with_progress(raw_ids, today, |_| {})
    }

    /// Classify every month of the reporting window for every unique CNPJ,
    /// in input order.
    pub fn run_with_progress<I, S, F>(
        &self,
        raw_ids: I,
        today: NaiveDate,
        mut on_progress: F,
    ) -> Vec<ClassificationResult>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: FnMut(Progress),
    {
        let cnpjs = unique_cnpjs(raw_ids);
        let months = reporting_months(self.settings.start_year, today);
        let total = cnpjs.len();

        info!(entities = total, months = months.len(), "batch started");

        let mut results = Vec::with_capacity(total * months.len());
        for (index, cnpj) in cnpjs.iter().enumerate() {
            let timeline = self.timeline_for(cnpj, today);
            results.extend(timeline.classify_months(&months, today));

            on_progress(Progress {
                processed: index + 1,
                total,
            });

            if !self.settings.request_delay.is_zero() {
                thread::sleep(self.settings.request_delay);
            }
        }

        info!(rows = results.len(), "batch finished");
        results
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryResponse;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// In-memory registry that records every lookup.
    struct StubRegistry {
        responses: HashMap<String, Value>,
        calls: Mutex<Vec<String>>,
    }

    impl StubRegistry {
        fn new(responses: &[(&str, Value)]) -> Self {
            StubRegistry {
                responses: responses
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl RegistryClient for StubRegistry {
        fn lookup(&self, cnpj: &str) -> RegistryResponse {
            self.calls.lock().unwrap().push(cnpj.to_string());
            match self.responses.get(cnpj) {
                Some(body) => RegistryResponse::json(200, body.clone()),
                None => RegistryResponse::unavailable(),
            }
        }
    }

    fn settings(start_year: i32) -> BatchSettings {
        BatchSettings {
            start_year,
            request_delay: Duration::ZERO,
            ..BatchSettings::default()
        }
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_closed_2019_period_end_to_end() {
        let registry = StubRegistry::new(&[(
            "12345678000195",
            json!({"data": [{"simples_nacional_periodos_anteriores": [
                {"inicio_data": "01/01/2019", "fim_data": "31/12/2019", "detalhamento": "Excluída por opção"}
            ]}]}),
        )]);
        let settings = settings(2019);
        let orchestrator = BatchOrchestrator::new(&registry, &settings);

        let results = orchestrator.run(["12.345.678/0001-95"], ymd(2021, 6, 15));

        // 2019-01 .. 2021-06
        assert_eq!(results.len(), 30);
        for row in &results[..12] {
            assert!(row.enrolled, "{} should be enrolled", row.month.label());
            assert_eq!(row.reason, Reason::RemainedWholeMonth);
        }
        for row in &results[12..] {
            assert!(!row.enrolled, "{} should not be enrolled", row.month.label());
        }
        assert_eq!(results[12].reason, Reason::Excluded(ymd(2019, 12, 31)));
        assert_eq!(
            results[0].periods_snapshot,
            "2019-01-01 - 2019-12-31 [Excluída por opção]"
        );
        assert_eq!(results[0].current_status_text, "");
    }

    #[test]
    fn test_failed_lookup_never_enrolled_without_aborting() {
        let registry = StubRegistry::new(&[(
            "00000000000191",
            json!({"data": {"situacao": "Optante pelo Simples Nacional desde 01/01/2020"}}),
        )]);
        let settings = settings(2020);
        let orchestrator = BatchOrchestrator::new(&registry, &settings);

        let results = orchestrator.run(["99", "191"], ymd(2020, 3, 31));

        assert_eq!(results.len(), 6);
        let unknown: Vec<_> = results.iter().filter(|r| r.entity_id == "00000000000099").collect();
        assert_eq!(unknown.len(), 3);
        assert!(unknown.iter().all(|r| !r.enrolled && r.reason == Reason::NeverEnrolled));

        let known: Vec<_> = results.iter().filter(|r| r.entity_id == "00000000000191").collect();
        assert!(known.iter().all(|r| r.enrolled));
        assert_eq!(known[2].reason, Reason::CurrentStatus);
        assert_eq!(
            known[0].current_status_text,
            "Optante pelo Simples Nacional desde 01/01/2020"
        );
    }

    #[test]
    fn test_duplicates_looked_up_once_in_input_order() {
        let registry = StubRegistry::new(&[]);
        let settings = settings(2021);
        let orchestrator = BatchOrchestrator::new(&registry, &settings);

        orchestrator.run(["222", "111", "000.000.000/0222", ""], ymd(2021, 1, 10));

        let calls = registry.calls.lock().unwrap();
        assert_eq!(*calls, vec!["00000000000222", "00000000000111"]);
    }

    #[test]
    fn test_progress_reported_per_entity() {
        let registry = StubRegistry::new(&[]);
        let settings = settings(2021);
        let orchestrator = BatchOrchestrator::new(&registry, &settings);

        let mut seen = Vec::new();
        orchestrator.run_with_progress(["1", "2", "3"], ymd(2021, 2, 1), |p| seen.push(p));

        assert_eq!(seen.len(), 3);
        assert_eq!(seen[2], Progress { processed: 3, total: 3 });
    }

    #[test]
    fn test_request_delay_applied_per_entity() {
        let registry = StubRegistry::new(&[]);
        let settings = BatchSettings {
            start_year: 2021,
            request_delay: Duration::from_millis(20),
            ..BatchSettings::default()
        };
        let orchestrator = BatchOrchestrator::new(&registry, &settings);

        let started = std::time::Instant::now();
        orchestrator.run(["1", "2", "3"], ymd(2021, 1, 10));

        assert!(started.elapsed() >= Duration::from_millis(60));
        assert_eq!(registry.calls.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_result_row_labels() {
        let row = ClassificationResult {
            entity_id: "12345678000195".to_string(),
            month: Month::new(2020, 5).unwrap(),
            enrolled: false,
            reason: Reason::Excluded(ymd(2020, 5, 10)),
            periods_snapshot: String::new(),
            current_status_text: String::new(),
        }
        .to_row();

        assert_eq!(row.month, "01/05/2020");
        assert_eq!(row.regime, "Outro Regime");
        assert_eq!(row.reason, "Excluída do Simples Nacional em 2020-05-10.");
    }
}
