//! Charles Schwab brokerage "Transactions" export.
//!
//! Columns: `Date,Action,Symbol,Description,Quantity,Price,Fees & Comm,Amount`.
//! Dates are `MM/DD/YYYY`, sometimes followed by `as of MM/DD/YYYY`.

use super::{parse_date, BrokerFormat, Classification, RawRecord};
use crate::config::{Config, ExclusionTable, SplitTable};
use crate::error::{ConvertError, Result};
use crate::fx::FxRateTable;
use crate::money::parse_amount;
use crate::normalize::{
    normalize_split, normalize_trade, Consideration, NormalizedTransaction, Side, TradeFields,
};
use crate::tax::TaxYear;
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;

const HEADER_PREFIXES: [&str; 3] = ["Tran", "\"Tra", "\"Dat"];

/// Actions that are income for UK purposes, whether paid out or reinvested.
const DIVIDEND_ACTIONS: [&str; 5] = [
    "Qual Div Reinvest",
    "Qualified Dividend",
    "Cash Dividend",
    "Pr Yr Cash Div",
    "Pr Yr Special Div",
];

const DATE: usize = 0;
const ACTION: usize = 1;
const SYMBOL: usize = 2;
const QUANTITY: usize = 4;
const PRICE: usize = 5;
const AMOUNT: usize = 7;

#[derive(Debug, Clone, Default)]
pub struct Schwab {
    exclusions: ExclusionTable,
    splits: SplitTable,
}

impl Schwab {
    pub fn new(exclusions: ExclusionTable, splits: SplitTable) -> Self {
        Self { exclusions, splits }
    }

    pub fn from_config(config: &Config) -> Self {
        let splits = config.split_table();
        log::debug!("{} curated split multipliers", splits.len());
        Self::new(config.exclusion_table(), splits)
    }

    fn date(record: &RawRecord) -> Result<NaiveDate> {
        let raw = record.field(DATE, "date")?;
        let leading: String = raw.chars().take(10).collect();
        parse_date(&leading, "%m/%d/%Y")
    }

    fn symbol(record: &RawRecord) -> &str {
        record.get(SYMBOL).unwrap_or_default().trim()
    }
}

impl BrokerFormat for Schwab {
    fn name(&self) -> &'static str {
        "Charles Schwab"
    }

    fn default_tax_years(&self) -> Vec<TaxYear> {
        TaxYear::range(TaxYear(2020), TaxYear(2025)).collect()
    }

    fn is_header(&self, line: &str) -> bool {
        line.trim().is_empty() || HEADER_PREFIXES.iter().any(|p| line.starts_with(p))
    }

    fn classify(&self, record: &RawRecord) -> Result<Classification> {
        // Blank-dated footer rows
        if record.get(DATE).map_or(true, |d| d.trim().is_empty()) {
            return Ok(Classification::Header);
        }
        let date = Self::date(record)?;
        if self
            .exclusions
            .is_excluded(Self::symbol(record), date.year(), date.month())
        {
            return Ok(Classification::Excluded);
        }

        let action = record.field(ACTION, "action")?;
        let classification = match action {
            "Buy" | "Reinvest Shares" => Classification::Trade(Side::Buy),
            "Sell" => Classification::Trade(Side::Sell),
            "Stock Split" => Classification::Split,
            a if DIVIDEND_ACTIONS.contains(&a) => Classification::Dividend,
            other => Classification::Ignored(other.to_string()),
        };
        Ok(classification)
    }

    fn trade(
        &self,
        record: &RawRecord,
        side: Side,
        rates: &FxRateTable,
    ) -> Result<NormalizedTransaction> {
        let fields = TradeFields {
            date: Self::date(record)?,
            symbol: Self::symbol(record).to_string(),
            quantity: parse_amount(record.field(QUANTITY, "quantity")?)?,
            consideration: Consideration::PerShare(parse_amount(record.field(PRICE, "price")?)?),
        };
        normalize_trade(fields, side, rates)
    }

    fn split(&self, record: &RawRecord) -> Result<NormalizedTransaction> {
        let symbol = Self::symbol(record);
        if symbol.is_empty() {
            return Err(ConvertError::malformed("stock split row without a symbol"));
        }
        normalize_split(Self::date(record)?, symbol, &self.splits)
    }

    fn dividend(&self, record: &RawRecord) -> Result<(NaiveDate, Decimal)> {
        Ok((
            Self::date(record)?,
            parse_amount(record.field(AMOUNT, "amount")?)?,
        ))
    }
}
