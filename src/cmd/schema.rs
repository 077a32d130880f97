//! Schema command - print the configuration and output formats

use crate::config::Config;
use clap::Args;
use schemars::schema_for;

#[derive(Args, Debug)]
pub struct SchemaCommand {
    /// What to describe
    #[arg(value_enum, default_value = "config")]
    format: SchemaFormat,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum SchemaFormat {
    /// JSON Schema for the --config file
    Config,
    /// The built-in configuration as JSON
    DefaultConfig,
    /// Columns of the normalized output file
    Output,
}

impl SchemaCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        match self.format {
            SchemaFormat::Config => self.print_json_schema(),
            SchemaFormat::DefaultConfig => self.print_default_config(),
            SchemaFormat::Output => self.print_output_fields(),
        }
    }

    fn print_json_schema(&self) -> anyhow::Result<()> {
        let schema = schema_for!(Config);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        Ok(())
    }

    fn print_default_config(&self) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(&Config::default())?);
        Ok(())
    }

    fn print_output_fields(&self) -> anyhow::Result<()> {
        println!("Output Format (space separated, one transaction per line)");
        println!("=========================================================");
        println!();
        for (name, description) in OUTPUT_FIELDS {
            println!("{:12}  {}", name, description);
        }
        println!();
        println!("PRICE for Interactive Brokers is the net amount over the quantity, so it");
        println!("includes commission. For Charles Schwab it is the quoted per share price,");
        println!("without fees.");
        println!();
        println!("Splits are written as: SPLIT DATE SYMBOL MULTIPLIER");
        Ok(())
    }
}

const OUTPUT_FIELDS: &[(&str, &str)] = &[
    ("ACTION", "BUY or SELL"),
    ("DATE", "Trade date (DD/MM/YYYY)"),
    ("SYMBOL", "Ticker symbol"),
    ("QUANTITY", "Number of shares, 4 decimal places"),
    ("PRICE", "GBP per share, 2 decimal places (see below)"),
    ("FEE", "Always 0"),
];
