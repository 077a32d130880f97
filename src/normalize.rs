//! Unified transaction lines produced from any broker export.

use crate::config::SplitTable;
use crate::error::{ConvertError, Result};
use crate::fx::FxRateTable;
use crate::money::{display_gbp, display_quantity, round_gbp};
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use std::fmt;
use std::io::Write;

/// Fee column value; commission is already folded into the price.
pub const FEE: &str = "0";

const DATE_FORMAT: &str = "%d/%m/%Y";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn label(self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

/// How the broker reports what was paid or received for a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consideration {
    /// Whole trade amount including commission.
    Total(Decimal),
    /// Per share price.
    PerShare(Decimal),
}

/// Trade fields pulled out of a broker record, still in source currency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeFields {
    pub date: NaiveDate,
    pub symbol: String,
    pub quantity: Decimal,
    pub consideration: Consideration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedTransaction {
    Trade {
        side: Side,
        date: NaiveDate,
        symbol: String,
        /// Always non-negative.
        quantity: Decimal,
        /// GBP per share, rounded to pence.
        price_gbp: Decimal,
    },
    Split {
        date: NaiveDate,
        symbol: String,
        multiplier: u32,
    },
}

impl NormalizedTransaction {
    pub fn action(&self) -> &'static str {
        match self {
            NormalizedTransaction::Trade { side, .. } => side.label(),
            NormalizedTransaction::Split { .. } => "SPLIT",
        }
    }

    /// Output columns: `ACTION DATE SYMBOL QUANTITY PRICE FEE` for trades and
    /// `SPLIT DATE SYMBOL MULTIPLIER` for splits.
    pub fn columns(&self) -> Vec<String> {
        match self {
            NormalizedTransaction::Trade {
                side,
                date,
                symbol,
                quantity,
                price_gbp,
            } => vec![
                side.label().to_string(),
                date.format(DATE_FORMAT).to_string(),
                symbol.clone(),
                display_quantity(*quantity),
                display_gbp(*price_gbp),
                FEE.to_string(),
            ],
            NormalizedTransaction::Split {
                date,
                symbol,
                multiplier,
            } => vec![
                self.action().to_string(),
                date.format(DATE_FORMAT).to_string(),
                symbol.clone(),
                multiplier.to_string(),
            ],
        }
    }
}

impl fmt::Display for NormalizedTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.columns().join(" "))
    }
}

/// Convert a buy or sell into GBP.
///
/// A total consideration is spread over the shares, so the price carries
/// the commission.
pub fn normalize_trade(
    fields: TradeFields,
    side: Side,
    rates: &FxRateTable,
) -> Result<NormalizedTransaction> {
    let TradeFields {
        date,
        symbol,
        quantity,
        consideration,
    } = fields;
    let symbol = symbol.trim().to_string();
    if symbol.is_empty() {
        return Err(ConvertError::malformed(format!(
            "empty symbol on {} dated {}",
            side.label(),
            date
        )));
    }

    let quantity = quantity.abs();
    let rate = rates.rate(date.year(), date.month())?;
    let price_gbp = match consideration {
        Consideration::Total(amount) => {
            if quantity.is_zero() {
                return Err(ConvertError::malformed(format!(
                    "zero quantity on {} {} dated {}",
                    side.label(),
                    symbol,
                    date
                )));
            }
            amount.abs() / rate / quantity
        }
        Consideration::PerShare(price) => price / rate,
    };

    Ok(NormalizedTransaction::Trade {
        side,
        date,
        symbol,
        quantity,
        price_gbp: round_gbp(price_gbp),
    })
}

/// Look up the curated multiplier for a split; ratios are never read from the export.
pub fn normalize_split(
    date: NaiveDate,
    symbol: &str,
    splits: &SplitTable,
) -> Result<NormalizedTransaction> {
    let symbol = symbol.trim();
    let multiplier = splits
        .multiplier(date, symbol)
        .ok_or_else(|| ConvertError::UnhandledSplit {
            date,
            symbol: symbol.to_string(),
        })?;
    Ok(NormalizedTransaction::Split {
        date,
        symbol: symbol.to_string(),
        multiplier,
    })
}

/// Write one space separated line per transaction.
pub fn write_transactions<'a, I, W>(transactions: I, writer: W) -> Result<()>
where
    I: IntoIterator<Item = &'a NormalizedTransaction>,
    W: Write,
{
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b' ')
        .has_headers(false)
        .flexible(true)
        .quote_style(csv::QuoteStyle::Never)
        .from_writer(writer);
    for tx in transactions {
        wtr.write_record(tx.columns())?;
    }
    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SplitEntry;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn rates() -> FxRateTable {
        let mut rates = FxRateTable::default();
        rates.insert(2023, 6, dec!(1.25));
        rates
    }

    fn buy(quantity: Decimal, consideration: Consideration) -> TradeFields {
        TradeFields {
            date: date(2023, 6, 15),
            symbol: "AAPL".to_string(),
            quantity,
            consideration,
        }
    }

    #[test]
    fn price_from_net_amount_and_rate() {
        let tx = normalize_trade(
            buy(dec!(10), Consideration::Total(dec!(-1000.00))),
            Side::Buy,
            &rates(),
        )
        .unwrap();
        assert_eq!(tx.columns(), vec!["BUY", "15/06/2023", "AAPL", "10.0000", "80.00", "0"]);
        assert_eq!(tx.to_string(), "BUY 15/06/2023 AAPL 10.0000 80.00 0");
    }

    #[test]
    fn sell_quantity_reported_positive() {
        let tx = normalize_trade(
            buy(dec!(-2.5), Consideration::Total(dec!(499.37))),
            Side::Sell,
            &rates(),
        )
        .unwrap();
        // 499.37 / 1.25 / 2.5 = 159.7984
        assert_eq!(tx.to_string(), "SELL 15/06/2023 AAPL 2.5000 159.80 0");
    }

    #[test]
    fn per_share_price_converted() {
        let tx = normalize_trade(
            buy(dec!(3), Consideration::PerShare(dec!(181.99))),
            Side::Buy,
            &rates(),
        )
        .unwrap();
        // 181.99 / 1.25 = 145.592
        assert_eq!(tx.to_string(), "BUY 15/06/2023 AAPL 3.0000 145.59 0");
    }

    #[test]
    fn empty_symbol_rejected() {
        let mut fields = buy(dec!(1), Consideration::Total(dec!(10)));
        fields.symbol = " ".to_string();
        let err = normalize_trade(fields, Side::Buy, &rates()).unwrap_err();
        assert!(matches!(err, ConvertError::MalformedRecord { .. }));
    }

    #[test]
    fn zero_quantity_rejected_for_total_consideration() {
        let err = normalize_trade(
            buy(dec!(0), Consideration::Total(dec!(10))),
            Side::Buy,
            &rates(),
        )
        .unwrap_err();
        assert!(matches!(err, ConvertError::MalformedRecord { .. }));
    }

    #[test]
    fn missing_rate_fails_trade() {
        let mut fields = buy(dec!(1), Consideration::Total(dec!(10)));
        fields.date = date(2023, 7, 1);
        let err = normalize_trade(fields, Side::Buy, &rates()).unwrap_err();
        assert!(matches!(err, ConvertError::MissingRate { year: 2023, month: 7 }));
    }

    #[test]
    fn split_uses_curated_multiplier() {
        let splits = SplitTable::from_entries(&[SplitEntry {
            date: date(2024, 6, 10),
            symbol: "NVDA".to_string(),
            multiplier: 10,
        }]);
        let tx = normalize_split(date(2024, 6, 10), "NVDA", &splits).unwrap();
        assert_eq!(tx.to_string(), "SPLIT 10/06/2024 NVDA 10");

        let err = normalize_split(date(2024, 6, 11), "NVDA", &splits).unwrap_err();
        assert!(matches!(err, ConvertError::UnhandledSplit { ref symbol, .. } if symbol == "NVDA"));
    }

    #[test]
    fn write_space_separated_lines() {
        let txs = vec![
            normalize_trade(
                buy(dec!(10), Consideration::Total(dec!(-1000))),
                Side::Buy,
                &rates(),
            )
            .unwrap(),
            NormalizedTransaction::Split {
                date: date(2022, 7, 18),
                symbol: "GOOGL".to_string(),
                multiplier: 20,
            },
        ];
        let mut out = Vec::new();
        write_transactions(&txs, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "BUY 15/06/2023 AAPL 10.0000 80.00 0\nSPLIT 18/07/2022 GOOGL 20\n"
        );
    }
}
