use clap::{Parser, Subcommand};

mod brokers;
mod cmd;
mod config;
mod convert;
mod error;
mod fx;
mod money;
mod normalize;
mod tax;

/// Normalize broker exports into GBP trades and UK tax year dividend totals
#[derive(Parser, Debug)]
#[command(name = "brokerfx", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a broker export into normalized transactions
    Convert(cmd::convert::ConvertCommand),
    /// Show the UK tax year for a date
    FiscalYear(cmd::fiscal_year::FiscalYearCommand),
    /// Describe the configuration file and output formats
    Schema(cmd::schema::SchemaCommand),
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Convert(convert) => convert.exec(),
        Command::FiscalYear(fiscal_year) => fiscal_year.exec(),
        Command::Schema(schema) => schema.exec(),
    }
}
