use std::io;

pub type Result<T> = std::result::Result<T, PickerError>;

#[derive(Debug, thiserror::Error)]
pub enum PickerError {
    #[error("Neither input contains the columns IP, rDNS, fDNS and PMTA")]
    SchemaMismatch,
    #[error("Both inputs contain IP, rDNS, fDNS and PMTA; cannot tell which one is the detailed table")]
    AmbiguousSchema,
    #[error("Column '{column}' is missing from {table}")]
    MissingColumn { table: String, column: String },
    #[error("Exactly two input files are required, got {found}")]
    InputCountMismatch { found: usize },
    #[error("IPs per PMTA must be between 1 and 50, got {0}")]
    InvalidCap(u32),
    #[error("Unsupported input format: {0}")]
    UnsupportedFormat(String),
    #[error("No header row found in {0}")]
    EmptyInput(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Failed to write output: {0}")]
    Write(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Ranking worker failed: {0}")]
    Worker(String),
}

impl From<rust_xlsxwriter::XlsxError> for PickerError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        PickerError::Write(e.to_string())
    }
}
