// ⚠️ Error taxonomy
// Only InputError (and output encoding failures) ever leave the pipeline.
// UpstreamError and DateParseError are absorbed where they happen.

use chrono::NaiveDate;
use thiserror::Error;

/// Fatal problems with the uploaded workbook. Aborts the whole batch.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("input sheet must contain the '{0}' column")]
    MissingColumn(String),

    #[error("input workbook has no sheets")]
    NoSheets,

    #[error("unreadable input workbook: {0}")]
    Unreadable(String),
}

/// Registry API failures. Recovered per entity as an empty timeline.
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("registry request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("registry returned a non-JSON body (HTTP {status}): {reason}")]
    Decode { status: u16, reason: String },
}

/// A date string none of the known layouts understand.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unrecognized date: {input:?}")]
pub struct DateParseError {
    pub input: String,
}

impl DateParseError {
    pub fn new(input: &str) -> Self {
        DateParseError {
            input: input.to_string(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PeriodError {
    #[error("period ends ({end}) before it starts ({start})")]
    Inverted { start: NaiveDate, end: NaiveDate },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Everything the bytes-in/bytes-out pipeline can fail with.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error("failed to write output workbook: {0}")]
    Output(String),
}

impl From<rust_xlsxwriter::XlsxError> for ProcessError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        ProcessError::Output(err.to_string())
    }
}
