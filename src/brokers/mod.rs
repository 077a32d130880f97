pub mod ibkr;
pub mod schwab;

pub use ibkr::Ibkr;
pub use schwab::Schwab;

use crate::error::{ConvertError, Result};
use crate::fx::FxRateTable;
use crate::normalize::{NormalizedTransaction, Side};
use crate::tax::TaxYear;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::borrow::Cow;

/// Fields of one export line, with quote characters removed.
///
/// Field positions are fixed per broker export layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    fields: Vec<String>,
}

impl RawRecord {
    pub fn parse(line: &str) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(line.as_bytes());
        let fields = match rdr.records().next() {
            Some(record) => record?.iter().map(|f| f.replace('"', "")).collect(),
            None => Vec::new(),
        };
        Ok(Self { fields })
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }

    /// Field that the layout requires to be present.
    pub fn field(&self, index: usize, name: &str) -> Result<&str> {
        self.get(index).ok_or_else(|| {
            ConvertError::malformed(format!(
                "missing {name} (field {index}) in a record with {} fields",
                self.len()
            ))
        })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }
}

/// What an export row means, decided before any conversion happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Trade(Side),
    Dividend,
    Split,
    /// Header, footer or other non-transaction line.
    Header,
    /// Row for a symbol the run is configured to leave out.
    Excluded,
    /// Action with no handling; the label is kept for the run summary.
    Ignored(String),
}

/// A broker export layout.
pub trait BrokerFormat {
    fn name(&self) -> &'static str;

    /// Tax years dividends may fall into when the configuration names none.
    fn default_tax_years(&self) -> Vec<TaxYear>;

    /// Fix known corruption in a raw line before it is split into fields.
    fn repair<'a>(&self, line: &'a str) -> Cow<'a, str> {
        Cow::Borrowed(line)
    }

    /// Lines that carry no transaction, judged on the raw line.
    fn is_header(&self, line: &str) -> bool;

    fn classify(&self, record: &RawRecord) -> Result<Classification>;

    fn trade(
        &self,
        record: &RawRecord,
        side: Side,
        rates: &FxRateTable,
    ) -> Result<NormalizedTransaction>;

    fn split(&self, record: &RawRecord) -> Result<NormalizedTransaction>;

    /// Payment date and amount in source currency.
    fn dividend(&self, record: &RawRecord) -> Result<(NaiveDate, Decimal)>;
}

pub(crate) fn parse_date(raw: &str, format: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), format)
        .map_err(|e| ConvertError::malformed(format!("invalid date '{raw}': {e}")))
}
