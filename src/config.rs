//! Run configuration: which tax years are covered, curated split ratios and
//! symbols left out of the conversion.
//!
//! Defaults reproduce the tables the tool has always shipped with; a JSON file
//! with the same shape replaces them wholesale.

use crate::brokers::BrokerFormat;
use crate::tax::TaxYear;
use anyhow::Context;
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Tax years dividends may fall into (e.g. "2023/24"); any other year aborts the run.
    /// Each broker has its own built-in list when this is omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<Vec<String>>")]
    pub supported_tax_years: Option<Vec<TaxYear>>,
    /// Manually verified stock split multipliers
    #[serde(default = "default_splits")]
    pub splits: Vec<SplitEntry>,
    /// Symbols whose rows are dropped from Schwab exports
    #[serde(default = "default_exclusions")]
    pub exclusions: Vec<Exclusion>,
}

/// One stock split event and its share multiplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SplitEntry {
    /// Date of the split row in the export (YYYY-MM-DD)
    #[schemars(with = "String")]
    pub date: NaiveDate,
    pub symbol: String,
    /// New shares per old share
    pub multiplier: u32,
}

/// A symbol to drop, either for good or up to and including a cutoff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Exclusion {
    pub symbol: String,
    /// Rows after the cutoff are kept; no cutoff drops every row
    #[serde(default)]
    pub until: Option<Cutoff>,
}

/// Rows are dropped when `year <= cutoff.year` and, if a month is given,
/// `month <= cutoff.month`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Cutoff {
    pub year: i32,
    #[serde(default)]
    pub month: Option<u32>,
}

impl Config {
    /// Read a JSON configuration file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open config file {}", path.display()))?;
        let config: Config = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.supported_tax_years.as_ref().is_some_and(Vec::is_empty) {
            anyhow::bail!("supported_tax_years must list at least one tax year");
        }
        let mut seen = HashMap::new();
        for split in &self.splits {
            if split.multiplier == 0 {
                anyhow::bail!("split multiplier for {} on {} is zero", split.symbol, split.date);
            }
            if let Some(prev) = seen.insert((split.date, split.symbol.as_str()), split.multiplier) {
                anyhow::bail!(
                    "split for {} on {} listed twice ({} and {})",
                    split.symbol,
                    split.date,
                    prev,
                    split.multiplier
                );
            }
        }
        for exclusion in &self.exclusions {
            if let Some(Cutoff { month: Some(m), .. }) = exclusion.until {
                if !(1..=12).contains(&m) {
                    anyhow::bail!("exclusion for {} has invalid month {}", exclusion.symbol, m);
                }
            }
        }
        Ok(())
    }

    /// Configured tax years, or the broker's built-in list.
    pub fn tax_years<B: BrokerFormat>(&self, broker: &B) -> Vec<TaxYear> {
        self.supported_tax_years
            .clone()
            .unwrap_or_else(|| broker.default_tax_years())
    }

    pub fn split_table(&self) -> SplitTable {
        SplitTable::from_entries(&self.splits)
    }

    pub fn exclusion_table(&self) -> ExclusionTable {
        ExclusionTable::new(self.exclusions.clone())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            supported_tax_years: None,
            splits: default_splits(),
            exclusions: default_exclusions(),
        }
    }
}

fn default_splits() -> Vec<SplitEntry> {
    [
        ((2020, 8, 31), "AAPL", 4),
        ((2020, 8, 31), "TSLA", 5),
        ((2021, 7, 20), "NVDA", 4),
        ((2022, 6, 6), "AMZN", 20),
        ((2022, 6, 29), "SHOP", 10),
        ((2022, 7, 18), "GOOGL", 20),
        ((2024, 6, 10), "NVDA", 10),
    ]
    .into_iter()
    .filter_map(|((y, m, d), symbol, multiplier)| {
        Some(SplitEntry {
            date: NaiveDate::from_ymd_opt(y, m, d)?,
            symbol: symbol.to_string(),
            multiplier,
        })
    })
    .collect()
}

fn default_exclusions() -> Vec<Exclusion> {
    let permanent = |symbol: &str| Exclusion {
        symbol: symbol.to_string(),
        until: None,
    };
    let until = |symbol: &str, year, month| Exclusion {
        symbol: symbol.to_string(),
        until: Some(Cutoff { year, month }),
    };
    vec![
        permanent("FB"),
        permanent("META"),
        // History before 2020 is no longer exported, so early positions in
        // these symbols cannot be reconstructed.
        until("SNAP", 2023, None),
        until("ABNB", 2023, None),
        until("LYFT", 2023, None),
        until("TSLA", 2023, None),
        until("PLTR", 2021, Some(4)),
    ]
}

/// Curated split multipliers keyed by (date, symbol).
#[derive(Debug, Clone, Default)]
pub struct SplitTable {
    multipliers: HashMap<(NaiveDate, String), u32>,
}

impl SplitTable {
    pub fn from_entries(entries: &[SplitEntry]) -> Self {
        let multipliers = entries
            .iter()
            .map(|e| ((e.date, e.symbol.clone()), e.multiplier))
            .collect();
        Self { multipliers }
    }

    pub fn multiplier(&self, date: NaiveDate, symbol: &str) -> Option<u32> {
        self.multipliers.get(&(date, symbol.to_string())).copied()
    }

    pub fn len(&self) -> usize {
        self.multipliers.len()
    }
}

/// Symbol exclusions, evaluated the same way for every entry.
#[derive(Debug, Clone, Default)]
pub struct ExclusionTable {
    by_symbol: HashMap<String, Vec<Option<Cutoff>>>,
}

impl ExclusionTable {
    pub fn new(exclusions: Vec<Exclusion>) -> Self {
        let mut by_symbol: HashMap<String, Vec<Option<Cutoff>>> = HashMap::new();
        for exclusion in exclusions {
            by_symbol
                .entry(exclusion.symbol)
                .or_default()
                .push(exclusion.until);
        }
        Self { by_symbol }
    }

    pub fn is_excluded(&self, symbol: &str, year: i32, month: u32) -> bool {
        self.by_symbol.get(symbol).is_some_and(|cutoffs| {
            cutoffs.iter().any(|cutoff| match cutoff {
                None => true,
                Some(c) => year <= c.year && c.month.map_or(true, |m| month <= m),
            })
        })
    }
}
