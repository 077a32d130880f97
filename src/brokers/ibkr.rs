//! Interactive Brokers "Transaction History" export.
//!
//! Data rows look like:
//! `Transaction History,Data,2023-06-15,U***123,APPLE INC,Buy,AAPL,10,99.5,-995,-5,-1000,...`

use super::{parse_date, BrokerFormat, Classification, RawRecord};
use crate::error::{ConvertError, Result};
use crate::fx::FxRateTable;
use crate::money::parse_amount;
use crate::normalize::{normalize_trade, Consideration, NormalizedTransaction, Side, TradeFields};
use crate::tax::TaxYear;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::borrow::Cow;

pub const DATA_PREFIX: &str = "Transaction History,Data,";
pub const FOREX_MARKER: &str = "Net Amount in Base from Forex Trade:";
const FOREX_CURRENCIES: [&str; 3] = ["GBP", "EUR", "USD"];

const DATE: usize = 2;
const DESCRIPTION: usize = 4;
const TRANSACTION_TYPE: usize = 5;
const SYMBOL: usize = 6;
const QUANTITY: usize = 7;
/// Net amount includes commission and is in the account base currency.
const NET_AMOUNT: usize = 11;

#[derive(Debug, Clone, Copy, Default)]
pub struct Ibkr;

/// Rejoin a forex amount that the export split on its thousands separator.
///
/// e.g. `...,Net Amount in Base from Forex Trade: 47,460 GBP.USD,...` has the
/// amount spread over the description field and the one after it.
pub fn repair(line: &str) -> Cow<'_, str> {
    if !line.contains(FOREX_MARKER) {
        return Cow::Borrowed(line);
    }
    let chunks: Vec<&str> = line.split(',').collect();
    if chunks.len() <= DESCRIPTION + 1 {
        return Cow::Borrowed(line);
    }

    let (head_raw, next_raw) = (chunks[DESCRIPTION], chunks[DESCRIPTION + 1]);
    let (head, next) = (head_raw.trim(), next_raw.trim());
    let head_ends_in_digit = head.chars().last().is_some_and(|c| c.is_ascii_digit());
    let has_currency = |s: &str| FOREX_CURRENCIES.iter().any(|c| s.contains(c));
    let next_starts_with_digit = next.chars().next().is_some_and(|c| c.is_ascii_digit());

    if head_ends_in_digit
        && !has_currency(head)
        && next_starts_with_digit
        && next.contains(' ')
        && has_currency(next)
    {
        let merged = format!("{head_raw}{next_raw}");
        log::debug!("Repaired forex amount: {}", merged);
        let repaired: Vec<&str> = chunks[..DESCRIPTION]
            .iter()
            .copied()
            .chain(std::iter::once(merged.as_str()))
            .chain(chunks[DESCRIPTION + 2..].iter().copied())
            .collect();
        return Cow::Owned(repaired.join(","));
    }
    Cow::Borrowed(line)
}

impl Ibkr {
    fn date(record: &RawRecord) -> Result<NaiveDate> {
        parse_date(record.field(DATE, "date")?, "%Y-%m-%d")
    }

    fn net_amount(record: &RawRecord) -> Result<Decimal> {
        parse_amount(record.field(NET_AMOUNT, "net amount")?)
    }
}

impl BrokerFormat for Ibkr {
    fn name(&self) -> &'static str {
        "Interactive Brokers"
    }

    fn default_tax_years(&self) -> Vec<TaxYear> {
        TaxYear::range(TaxYear(2020), TaxYear(2026)).collect()
    }

    fn repair<'a>(&self, line: &'a str) -> Cow<'a, str> {
        repair(line)
    }

    fn is_header(&self, line: &str) -> bool {
        !line.starts_with(DATA_PREFIX)
    }

    fn classify(&self, record: &RawRecord) -> Result<Classification> {
        let transaction_type = record.field(TRANSACTION_TYPE, "transaction type")?;

        if transaction_type.to_lowercase().contains("split") {
            return Err(ConvertError::UnsupportedOperation(format!(
                "stock split '{}' for {} on {}",
                transaction_type,
                record.get(SYMBOL).unwrap_or_default(),
                record.get(DATE).unwrap_or_default()
            )));
        }

        let classification = match transaction_type {
            "Buy" => Classification::Trade(Side::Buy),
            "Sell" => Classification::Trade(Side::Sell),
            "Dividend" => Classification::Dividend,
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
            symbol: record.get(SYMBOL).unwrap_or_default().to_string(),
            quantity: parse_amount(record.field(QUANTITY, "quantity")?)?,
            consideration: Consideration::Total(Self::net_amount(record)?),
        };
        normalize_trade(fields, side, rates)
    }

    fn split(&self, record: &RawRecord) -> Result<NormalizedTransaction> {
        Err(ConvertError::UnsupportedOperation(format!(
            "stock split for {} on {}",
            record.get(SYMBOL).unwrap_or_default(),
            record.get(DATE).unwrap_or_default()
        )))
    }

    fn dividend(&self, record: &RawRecord) -> Result<(NaiveDate, Decimal)> {
        Ok((Self::date(record)?, Self::net_amount(record)?.abs()))
    }
}
