//! Monthly GBP/USD rates.
//!
//! Rates are quoted as units of source currency per one unit of GBP, so a
//! source amount is converted by dividing by the rate.

use crate::error::{ConvertError, Result};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::io::Read;
use std::str::FromStr;

/// Immutable (year, month) -> rate table, loaded once per run.
#[derive(Debug, Clone, Default)]
pub struct FxRateTable {
    rates: BTreeMap<i32, BTreeMap<u32, Decimal>>,
}

impl FxRateTable {
    /// Read a rate file: one `month/year,rate` observation per line.
    ///
    /// Longer date tokens such as `day/month/year` use their last two parts.
    /// Later observations for the same month replace earlier ones.
    pub fn load<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut table = FxRateTable::default();
        for record in rdr.records() {
            let record = record?;
            let line = record.position().map_or(0, |p| p.line() as usize);
            let fields: Vec<String> = record.iter().map(|f| f.replace('"', "")).collect();
            let token = fields.first().map(String::as_str).unwrap_or_default();
            if token.is_empty() && fields.len() <= 1 {
                continue;
            }
            if !token.chars().any(|c| c.is_ascii_digit()) {
                log::debug!("Skipping rate header line {}: {:?}", line, fields);
                continue;
            }
            let (year, month) = parse_month_year(token).map_err(|e| e.at_line(line))?;
            let rate = fields
                .get(1)
                .ok_or_else(|| ConvertError::malformed(format!("no rate for '{token}'")))
                .and_then(|r| {
                    Decimal::from_str(r.trim())
                        .map_err(|_| ConvertError::malformed(format!("invalid rate '{r}'")))
                })
                .map_err(|e| e.at_line(line))?;
            if rate <= Decimal::ZERO {
                return Err(ConvertError::MalformedRecord {
                    line,
                    reason: format!("rate for {token} must be positive, got {rate}"),
                });
            }
            table.insert(year, month, rate);
        }
        if table.is_empty() {
            log::warn!("Rate file contained no rates");
        }
        log::info!("Loaded {} monthly FX rates", table.len());
        Ok(table)
    }

    pub fn insert(&mut self, year: i32, month: u32, rate: Decimal) {
        self.rates.entry(year).or_default().insert(month, rate);
    }

    /// Rate for the given month; never falls back to a default.
    pub fn rate(&self, year: i32, month: u32) -> Result<Decimal> {
        self.rates
            .get(&year)
            .and_then(|months| months.get(&month))
            .copied()
            .ok_or(ConvertError::MissingRate { year, month })
    }

    /// Convert an amount in source currency to GBP at the month's rate.
    pub fn to_gbp(&self, amount: Decimal, year: i32, month: u32) -> Result<Decimal> {
        Ok(amount / self.rate(year, month)?)
    }

    pub fn len(&self) -> usize {
        self.rates.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn parse_month_year(token: &str) -> Result<(i32, u32)> {
    let parts: Vec<&str> = token.split('/').map(str::trim).collect();
    let invalid = || ConvertError::malformed(format!("invalid rate date '{token}'"));
    if parts.len() < 2 {
        return Err(invalid());
    }
    let month: u32 = parts[parts.len() - 2].parse().map_err(|_| invalid())?;
    let year: i32 = parts[parts.len() - 1].parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&month) {
        return Err(invalid());
    }
    Ok((year, month))
}
