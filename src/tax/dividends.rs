//! Per tax year dividend totals in GBP.

use super::uk::{fiscal_year, TaxYear};
use crate::error::{ConvertError, Result};
use crate::fx::FxRateTable;
use crate::money::round_gbp;
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DividendBucket {
    pub total_gbp: Decimal,
    pub payments: usize,
}

/// Dividend ledger for one run.
///
/// Only the tax years it was created with can receive dividends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DividendLedger {
    years: BTreeMap<TaxYear, DividendBucket>,
}

impl DividendLedger {
    pub fn new<I>(supported: I) -> Self
    where
        I: IntoIterator<Item = TaxYear>,
    {
        let years = supported
            .into_iter()
            .map(|year| (year, DividendBucket::default()))
            .collect();
        Self { years }
    }

    /// Convert a source currency dividend to GBP and add it to its tax year.
    ///
    /// The converted amount is rounded to pence before it is added.
    pub fn accumulate(
        &mut self,
        date: NaiveDate,
        amount: Decimal,
        rates: &FxRateTable,
    ) -> Result<Decimal> {
        let tax_year = fiscal_year(date.day(), date.month(), date.year())?;
        let bucket = self
            .years
            .get_mut(&tax_year)
            .ok_or_else(|| ConvertError::FiscalYearRange(tax_year.display()))?;
        let value_gbp = round_gbp(rates.to_gbp(amount, date.year(), date.month())?);
        bucket.total_gbp += value_gbp;
        bucket.payments += 1;
        log::debug!("Dividend {} on {} -> £{} ({})", amount, date, value_gbp, tax_year);
        Ok(value_gbp)
    }

    #[cfg(test)]
    pub fn get(&self, year: TaxYear) -> Option<Decimal> {
        self.years.get(&year).map(|b| b.total_gbp)
    }

    pub fn total(&self) -> Decimal {
        self.years.values().map(|b| b.total_gbp).sum()
    }

    /// Buckets in tax year order, including years with no dividends.
    pub fn iter(&self) -> impl Iterator<Item = (TaxYear, &DividendBucket)> {
        self.years.iter().map(|(year, bucket)| (*year, bucket))
    }
}
