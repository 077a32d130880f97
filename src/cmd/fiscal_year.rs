//! Fiscal year command - show which UK tax year a date falls in

use crate::tax::TaxYear;
use chrono::NaiveDate;
use clap::Args;

#[derive(Args, Debug)]
pub struct FiscalYearCommand {
    /// Date as DD/MM/YYYY or YYYY-MM-DD
    date: String,
}

impl FiscalYearCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let date = parse_date(&self.date)?;
        let year = TaxYear::from_date(date);
        match (year.start_date(), year.end_date()) {
            (Some(start), Some(end)) => println!(
                "{} ({} to {})",
                year,
                start.format("%d/%m/%Y"),
                end.format("%d/%m/%Y")
            ),
            _ => println!("{}", year),
        }
        Ok(())
    }
}

fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%d/%m/%Y")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .map_err(|_| anyhow::anyhow!("Invalid date '{}', expected DD/MM/YYYY or YYYY-MM-DD", s))
}
