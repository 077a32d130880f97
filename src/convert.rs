//! One pass over a broker export: repair, classify, then either normalize
//! the row or add it to the dividend ledger.

use crate::brokers::{BrokerFormat, Classification, RawRecord};
use crate::error::Result;
use crate::fx::FxRateTable;
use crate::normalize::NormalizedTransaction;
use crate::tax::{DividendLedger, TaxYear};
use std::collections::BTreeSet;
use std::io::BufRead;

/// Everything a run produced. Nothing is written until a report exists.
#[derive(Debug, Clone)]
pub struct ConversionReport {
    pub broker: &'static str,
    pub transactions: Vec<NormalizedTransaction>,
    pub dividends: DividendLedger,
    pub ignored_actions: BTreeSet<String>,
    pub skipped_lines: Vec<String>,
    pub excluded_lines: Vec<String>,
}

/// Per-run state. A new converter is created for every export file.
pub struct Converter<'a, B: BrokerFormat> {
    broker: &'a B,
    rates: &'a FxRateTable,
    transactions: Vec<NormalizedTransaction>,
    dividends: DividendLedger,
    ignored_actions: BTreeSet<String>,
    skipped_lines: Vec<String>,
    excluded_lines: Vec<String>,
}

impl<'a, B: BrokerFormat> Converter<'a, B> {
    pub fn new<I>(broker: &'a B, rates: &'a FxRateTable, tax_years: I) -> Self
    where
        I: IntoIterator<Item = TaxYear>,
    {
        Self {
            broker,
            rates,
            transactions: Vec::new(),
            dividends: DividendLedger::new(tax_years),
            ignored_actions: BTreeSet::new(),
            skipped_lines: Vec::new(),
            excluded_lines: Vec::new(),
        }
    }

    /// Handle one raw export line; `line_no` is 1-based and used in errors.
    pub fn process_line(&mut self, line_no: usize, line: &str) -> Result<()> {
        let line = line.trim();
        let line = self.broker.repair(line);

        if self.broker.is_header(&line) {
            log::debug!("Skipping line {}: {}", line_no, line);
            self.skipped_lines.push(line.into_owned());
            return Ok(());
        }

        let record = RawRecord::parse(&line).map_err(|e| e.at_line(line_no))?;
        let classification = self
            .broker
            .classify(&record)
            .map_err(|e| e.at_line(line_no))?;
        log::debug!("Line {} classified as {:?}", line_no, classification);

        match classification {
            Classification::Trade(side) => {
                let tx = self
                    .broker
                    .trade(&record, side, self.rates)
                    .map_err(|e| e.at_line(line_no))?;
                log::info!("{} formatted line: {}", side.label(), tx);
                self.transactions.push(tx);
            }
            Classification::Split => {
                let tx = self.broker.split(&record).map_err(|e| e.at_line(line_no))?;
                log::info!("Split formatted line: {}", tx);
                self.transactions.push(tx);
            }
            Classification::Dividend => {
                let (date, amount) = self
                    .broker
                    .dividend(&record)
                    .map_err(|e| e.at_line(line_no))?;
                self.dividends
                    .accumulate(date, amount, self.rates)
                    .map_err(|e| e.at_line(line_no))?;
            }
            Classification::Header => {
                self.skipped_lines.push(line.into_owned());
            }
            Classification::Excluded => {
                log::warn!("Ignoring excluded line {}: {}", line_no, line);
                self.excluded_lines.push(line.into_owned());
            }
            Classification::Ignored(action) => {
                if !action.is_empty() {
                    self.ignored_actions.insert(action);
                }
            }
        }
        Ok(())
    }

    pub fn finish(self) -> ConversionReport {
        log::info!(
            "{}: {} transactions, {} skipped lines, {} excluded lines, {} ignored actions",
            self.broker.name(),
            self.transactions.len(),
            self.skipped_lines.len(),
            self.excluded_lines.len(),
            self.ignored_actions.len()
        );
        ConversionReport {
            broker: self.broker.name(),
            transactions: self.transactions,
            dividends: self.dividends,
            ignored_actions: self.ignored_actions,
            skipped_lines: self.skipped_lines,
            excluded_lines: self.excluded_lines,
        }
    }
}

/// Convert a whole export. The first error aborts the run.
pub fn convert<B, R, I>(
    broker: &B,
    input: R,
    rates: &FxRateTable,
    tax_years: I,
) -> anyhow::Result<ConversionReport>
where
    B: BrokerFormat,
    R: BufRead,
    I: IntoIterator<Item = TaxYear>,
{
    let mut converter = Converter::new(broker, rates, tax_years);
    for (index, line) in input.lines().enumerate() {
        converter.process_line(index + 1, &line?)?;
    }
    Ok(converter.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brokers::{Ibkr, Schwab};
    use crate::config::Config;
    use crate::error::ConvertError;
    use rust_decimal_macros::dec;

    fn rates() -> FxRateTable {
        FxRateTable::load("06/2023,1.20\n01/2024,1.25\n06/2024,1.27\n".as_bytes()).unwrap()
    }

    fn years() -> Vec<TaxYear> {
        Config::default().tax_years(&Ibkr)
    }

    const IBKR_EXPORT: &str = "\
Statement,Header,Field Name,Field Value
Statement,Data,Title,Transaction History
Transaction History,Header,Date,Account,Description,Transaction Type,Symbol,Quantity,Price,Gross Amount,Commission,Net Amount
Transaction History,Data,2023-06-15,U***1234,APPLE INC,Buy,AAPL,10,99.5,-995,-5,-1000.00
Transaction History,Data,2023-06-15,U***1234,MSFT Cash Dividend,Dividend,MSFT,-,-,120.00,-,120.00
Transaction History,Data,2024-01-10,U***1234,Net Amount in Base from Forex Trade: 47,460 GBP.USD,Forex Trade Component,GBP.USD,-,-,60000,-,60000
Transaction History,Data,2024-01-11,U***1234,Deposit,Deposit,-,-,-,1000,-,1000
Transaction History,Data,2024-01-12,U***1234,APPLE INC,Sell,AAPL,-4,150,600,-5,595
";

    #[test]
    fn ibkr_export_end_to_end() {
        let report = convert(&Ibkr, IBKR_EXPORT.as_bytes(), &rates(), years()).unwrap();
        let lines: Vec<String> = report.transactions.iter().map(|t| t.to_string()).collect();
        assert_eq!(
            lines,
            vec![
                "BUY 15/06/2023 AAPL 10.0000 83.33 0",
                // 595 / 1.25 / 4 = 119
                "SELL 12/01/2024 AAPL 4.0000 119.00 0",
            ]
        );
        assert_eq!(report.dividends.get(TaxYear(2024)), Some(dec!(100.00)));
        assert_eq!(report.skipped_lines.len(), 3);
        assert_eq!(
            report.ignored_actions.into_iter().collect::<Vec<_>>(),
            vec!["Deposit", "Forex Trade Component"]
        );
    }

    #[test]
    fn ibkr_split_aborts_run() {
        let input = "Transaction History,Data,2024-06-10,U***1234,NVIDIA,Stock Split,NVDA,90,0,0,0,0\n";
        let err = convert(&Ibkr, input.as_bytes(), &rates(), years()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConvertError>(),
            Some(ConvertError::UnsupportedOperation(_))
        ));
    }

    const SCHWAB_EXPORT: &str = r#""Transactions  for account XXXX-1234 as of 07/01/2024 12:00:00 ET"
"Date","Action","Symbol","Description","Quantity","Price","Fees & Comm","Amount"
"06/13/2024","Qualified Dividend","MSFT","MICROSOFT CORP","","","","$127.00"
"06/10/2024","Stock Split","NVDA","NVIDIA CORP","90","","",""
"06/03/2024","Buy","META","META PLATFORMS INC","1","$480.00","","-$480.00"
"01/02/2024","Sell","AAPL","APPLE INC","5","$187.50","$0.02","$937.48"
"01/02/2024","Wire Funds","","WIRED FUNDS FEE","","","","-$25.00"
Transactions Total,"","","","","","","$559.48"
"#;

    #[test]
    fn schwab_export_end_to_end() {
        let schwab = Schwab::from_config(&Config::default());
        let tax_years = Config::default().tax_years(&schwab);
        let report = convert(&schwab, SCHWAB_EXPORT.as_bytes(), &rates(), tax_years).unwrap();
        let lines: Vec<String> = report.transactions.iter().map(|t| t.to_string()).collect();
        assert_eq!(
            lines,
            vec![
                "SPLIT 10/06/2024 NVDA 10",
                "SELL 02/01/2024 AAPL 5.0000 150.00 0",
            ]
        );
        assert_eq!(report.dividends.get(TaxYear(2025)), Some(dec!(100.00)));
        assert_eq!(report.excluded_lines.len(), 1);
        assert_eq!(report.skipped_lines.len(), 3);
        assert!(report.ignored_actions.contains("Wire Funds"));
    }

    #[test]
    fn dividend_outside_supported_years_aborts() {
        let input = "Transaction History,Data,2023-06-15,U1,Div,Dividend,MSFT,-,-,120,-,120\n";
        let err = convert(&Ibkr, input.as_bytes(), &rates(), vec![TaxYear(2023)]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConvertError>(),
            Some(ConvertError::FiscalYearRange(y)) if y == "2023/24"
        ));
    }

    #[test]
    fn schwab_default_years_stop_at_2024_25() {
        let schwab = Schwab::from_config(&Config::default());
        let mut rates = rates();
        rates.insert(2025, 6, dec!(1.30));
        let input = r#""06/13/2025","Qualified Dividend","MSFT","MICROSOFT CORP","","","","$13.00""#;
        let err = convert(
            &schwab,
            input.as_bytes(),
            &rates,
            Config::default().tax_years(&schwab),
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConvertError>(),
            Some(ConvertError::FiscalYearRange(y)) if y == "2025/26"
        ));

        // The same payment is accepted for Interactive Brokers
        let ibkr_input = "Transaction History,Data,2025-06-13,U1,Div,Dividend,MSFT,-,-,13.00,-,13.00\n";
        let report = convert(&Ibkr, ibkr_input.as_bytes(), &rates, years()).unwrap();
        assert_eq!(report.dividends.get(TaxYear(2026)), Some(dec!(10.00)));
    }

    #[test]
    fn malformed_errors_carry_line_number() {
        let input = "Statement,Header\nTransaction History,Data,2023-06-15,U1,APPLE,Buy,,10,1,-99,-1,-100\n";
        let err = convert(&Ibkr, input.as_bytes(), &rates(), years()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConvertError>(),
            Some(ConvertError::MalformedRecord { line: 2, .. })
        ));
    }
}
