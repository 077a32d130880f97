pub mod convert;
pub mod fiscal_year;
pub mod schema;
