use chrono::NaiveDate;

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("no FX rate for {month:02}/{year}")]
    MissingRate { year: i32, month: u32 },
    #[error("unsupported operation, handle manually: {0}")]
    UnsupportedOperation(String),
    #[error("no curated split multiplier for {symbol} on {date}")]
    UnhandledSplit { date: NaiveDate, symbol: String },
    #[error("fiscal year {0} is not one of the supported years")]
    FiscalYearRange(String),
    #[error("malformed record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },
    #[error("internal error: {0}")]
    Internal(String),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl ConvertError {
    /// Malformed record whose line number is filled in later by the converter.
    pub fn malformed(reason: impl Into<String>) -> Self {
        ConvertError::MalformedRecord {
            line: 0,
            reason: reason.into(),
        }
    }

    /// Attach a 1-based input line number to a malformed record error.
    pub fn at_line(self, line: usize) -> Self {
        match self {
            ConvertError::MalformedRecord { line: 0, reason } => {
                ConvertError::MalformedRecord { line, reason }
            }
            other => other,
        }
    }
}

pub type Result<T, E = ConvertError> = std::result::Result<T, E>;
