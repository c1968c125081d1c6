// Simples Consulta - Core Library
// Exposes all modules for use in the CLI, the API server, and tests

pub mod error;
pub mod config;
pub mod cnpj;          // identifier cleaning + dedup
pub mod dates;         // tolerant date parsing
pub mod period;        // enrollment periods + calendar months
pub mod normalizer;    // registry JSON → periods
pub mod timeline;      // current-status augmentation
pub mod classifier;    // per-month verdict
pub mod registry;      // registry HTTP client
pub mod orchestrator;  // batch loop
pub mod workbook;      // spreadsheet read/write
pub mod pipeline;      // bytes in, bytes out
pub mod jobs;          // submit/poll/download bookkeeping

#[cfg(feature = "server")]
pub mod web;

// Re-export commonly used types
pub use error::{ConfigError, DateParseError, InputError, PeriodError, ProcessError, UpstreamError};
pub use config::{BatchSettings, Config, RegistryConfig, ServerConfig};
pub use cnpj::{clean_cnpj, unique_cnpjs};
pub use dates::{parse_date, parse_date_lenient};
pub use period::{reporting_months, EnrollmentPeriod, Month};
pub use normalizer::{extract_periods, extract_status_text};
pub use timeline::augment;
pub use classifier::{classify, MonthVerdict, Reason};
pub use registry::{HttpRegistryClient, RegistryClient, RegistryResponse};
pub use orchestrator::{BatchOrchestrator, ClassificationResult, Progress, ResultRow};
pub use workbook::{read_workbook, results_to_csv, write_with_results, Workbook};
pub use pipeline::{process_workbook, process_workbook_with_progress, ProcessOutput};
pub use jobs::{Download, JobState, JobStatus, JobStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
