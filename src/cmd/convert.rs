//! Convert command - normalize one broker export and report dividends

use crate::brokers::{BrokerFormat, Ibkr, Schwab};
use crate::config::Config;
use crate::convert::{convert, ConversionReport};
use crate::fx::FxRateTable;
use crate::money::display_gbp;
use crate::normalize::write_transactions;
use anyhow::Context;
use clap::{Args, ValueEnum};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tabled::{
    settings::{object::Columns, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Args, Debug)]
pub struct ConvertCommand {
    /// Which broker produced the export
    #[arg(short, long, value_enum)]
    broker: BrokerArg,

    /// Broker export file (CSV)
    #[arg(short, long)]
    input: PathBuf,

    /// Monthly GBP/USD rates file (`MM/YYYY,rate` per line)
    #[arg(short, long, default_value = "gbp_usd.csv")]
    rates: PathBuf,

    /// Where to write the normalized transactions (overwritten)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON file with supported tax years, split multipliers and exclusions
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the run summary as JSON instead of formatted text
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum BrokerArg {
    /// Interactive Brokers transaction history
    Ibkr,
    /// Charles Schwab transactions
    Schwab,
}

impl BrokerArg {
    fn default_output(self) -> &'static str {
        match self {
            BrokerArg::Ibkr => "filtered_ibkr.csv",
            BrokerArg::Schwab => "filtered_schwab.csv",
        }
    }
}

/// Row for the dividends table output
#[derive(Debug, Tabled, Serialize)]
struct DividendRow {
    #[tabled(rename = "Tax Year")]
    tax_year: String,
    #[tabled(rename = "Payments")]
    payments: usize,
    #[tabled(rename = "Dividends (GBP)")]
    total_gbp: String,
}

/// JSON output structure
#[derive(Debug, Serialize)]
struct SummaryOutput<'a> {
    broker: &'a str,
    output: String,
    transactions: usize,
    skipped_lines: &'a [String],
    excluded_lines: &'a [String],
    dividends: Vec<DividendRow>,
    total_dividends_gbp: String,
    ignored_actions: Vec<&'a str>,
}

impl ConvertCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        let rates_file = File::open(&self.rates)
            .with_context(|| format!("Failed to open rates file {}", self.rates.display()))?;
        let rates = FxRateTable::load(BufReader::new(rates_file))
            .with_context(|| format!("Invalid rates file {}", self.rates.display()))?;

        let report = match self.broker {
            BrokerArg::Ibkr => {
                log::info!("Net Amount in Interactive Brokers exports is assumed to be in USD, the account base currency");
                self.run(&Ibkr, &rates, &config)?
            }
            BrokerArg::Schwab => self.run(&Schwab::from_config(&config), &rates, &config)?,
        };

        let output = self
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(self.broker.default_output()));
        write_output(&report, &output)?;

        if self.json {
            self.print_json(&report, &output)
        } else {
            self.print_summary(&report, &output);
            Ok(())
        }
    }

    fn run<B: BrokerFormat>(
        &self,
        broker: &B,
        rates: &FxRateTable,
        config: &Config,
    ) -> anyhow::Result<ConversionReport> {
        let input = File::open(&self.input)
            .with_context(|| format!("Failed to open export file {}", self.input.display()))?;
        convert(
            broker,
            BufReader::new(input),
            rates,
            config.tax_years(broker),
        )
        .with_context(|| format!("Failed to convert {}", self.input.display()))
    }

    fn print_summary(&self, report: &ConversionReport, output: &Path) {
        println!();
        println!("{} -> {}", report.broker, output.display());
        println!("{} transactions written", report.transactions.len());
        println!();

        println!("Skipped header/non-transaction lines:");
        for line in &report.skipped_lines {
            println!("  {}", line);
        }
        if !report.excluded_lines.is_empty() {
            println!();
            println!("Excluded lines:");
            for line in &report.excluded_lines {
                println!("  {}", line);
            }
        }

        println!();
        println!("Dividends for each year (GBP):");
        let table = Table::new(dividend_rows(report))
            .with(Style::rounded())
            .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
            .to_string();
        println!("{}", table);
        println!("Total: \u{00A3}{}", display_gbp(report.dividends.total()));

        println!();
        if report.ignored_actions.is_empty() {
            println!("Ignored actions: none");
        } else {
            println!("Ignored actions:");
            for action in &report.ignored_actions {
                println!("  {}", action);
            }
        }
    }

    fn print_json(&self, report: &ConversionReport, output: &Path) -> anyhow::Result<()> {
        let summary = SummaryOutput {
            broker: report.broker,
            output: output.display().to_string(),
            transactions: report.transactions.len(),
            skipped_lines: &report.skipped_lines,
            excluded_lines: &report.excluded_lines,
            dividends: dividend_rows(report),
            total_dividends_gbp: display_gbp(report.dividends.total()),
            ignored_actions: report.ignored_actions.iter().map(String::as_str).collect(),
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
        Ok(())
    }
}

fn dividend_rows(report: &ConversionReport) -> Vec<DividendRow> {
    report
        .dividends
        .iter()
        .map(|(year, bucket)| DividendRow {
            tax_year: year.display(),
            payments: bucket.payments,
            total_gbp: display_gbp(bucket.total_gbp),
        })
        .collect()
}

/// Replace the output file with the report's transactions.
///
/// The lines go to a sibling temporary file first, which is renamed over
/// `path` only once fully written.
fn write_output(report: &ConversionReport, path: &Path) -> anyhow::Result<()> {
    let tmp = temp_path(path);
    let written = write_transactions_file(report, &tmp);
    if written.is_err() {
        let _ = fs::remove_file(&tmp);
        return written;
    }
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e)
            .with_context(|| format!("Failed to replace output file {}", path.display()));
    }
    Ok(())
}

fn write_transactions_file(report: &ConversionReport, path: &Path) -> anyhow::Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    write_transactions(&report.transactions, &mut writer)
        .with_context(|| format!("Failed to write output file {}", path.display()))?;
    let file = writer
        .into_inner()
        .map_err(|e| e.into_error())
        .with_context(|| format!("Failed to write output file {}", path.display()))?;
    file.sync_all()?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}
