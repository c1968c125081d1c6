// 🚚 Pipeline
// The unit of work a job runner executes: workbook bytes in, workbook bytes out.
// No job ids, no storage, no polling in here.

use crate::config::BatchSettings;
use crate::error::ProcessError;
use crate::orchestrator::{BatchOrchestrator, ClassificationResult, Progress, ResultRow};
use crate::registry::RegistryClient;
use crate::workbook::{read_workbook, write_with_results};
use chrono::NaiveDate;
use tracing::info;

/// Output of one run: the merged workbook plus the rows that went into it.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub workbook: Vec<u8>,
    pub results: Vec<ClassificationResult>,
}

impl ProcessOutput {
    pub fn rows(&self) -> Vec<ResultRow> {
        self.results.iter().map(ClassificationResult::to_row).collect()
    }
}

pub fn process_workbook<C: RegistryClient + ?Sized>(
    input: &[u8],
    client: &C,
    settings: &BatchSettings,
    today: NaiveDate,
) -> Result<Vec<u8>, ProcessError> {
    process_workbook_with_progress(input, client, settings, today, |_| {}).map(|out| out.workbook)
}

/// Read the identifier column of the first sheet, classify, and merge the
/// result sheet back. Only input problems (and output encoding) fail.
pub fn process_workbook_with_progress<C, F>(
    input: &[u8],
    client: &C,
    settings: &BatchSettings,
    today: NaiveDate,
    on_progress: F,
) -> Result<ProcessOutput, ProcessError>
where
    C: RegistryClient + ?Sized,
    F: FnMut(Progress),
{
    let workbook = read_workbook(input)?;
    let raw_ids = workbook.first_sheet()?.column_values(&settings.id_column)?;

    info!(
        sheets = workbook.sheets.len(),
        identifiers = raw_ids.len(),
        "input workbook read"
    );

    let results = BatchOrchestrator::new(client, settings).run_with_progress(raw_ids, today, on_progress);
    let rows: Vec<ResultRow> = results.iter().map(ClassificationResult::to_row).collect();
    let bytes = write_with_results(&workbook, &settings.output_sheet, &rows)?;

    Ok(ProcessOutput {
        workbook: bytes,
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InputError;
    use crate::registry::RegistryResponse;
    use std::time::Duration;

    struct Offline;

    impl RegistryClient for Offline {
        fn lookup(&self, _cnpj: &str) -> RegistryResponse {
            RegistryResponse::unavailable()
        }
    }

    fn settings() -> BatchSettings {
        BatchSettings {
            start_year: 2020,
            request_delay: Duration::ZERO,
            ..BatchSettings::default()
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 2, 10).unwrap()
    }

    #[test]
    fn test_missing_column_aborts() {
        let err = process_workbook(b"cnpj,nome\n191,x\n", &Offline, &settings(), today()).unwrap_err();
        assert!(matches!(err, ProcessError::Input(InputError::MissingColumn(_))));
    }

    #[test]
    fn test_offline_registry_still_produces_workbook() {
        let output = process_workbook_with_progress(
            b"cnpj_part\n191\n191\n",
            &Offline,
            &settings(),
            today(),
            |_| {},
        )
        .unwrap();

        assert!(output.workbook.starts_with(b"PK"));
        assert_eq!(output.results.len(), 2);
        assert!(output.results.iter().all(|r| !r.enrolled));
        assert_eq!(output.rows()[1].month, "01/02/2020");
    }
}
