pub mod dividends;
pub mod uk;

pub use dividends::DividendLedger;
pub use uk::TaxYear;
