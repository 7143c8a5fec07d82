use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use ebb::config::Config;
use ebb::pruning::RuleTable;

use crate::error::CliResult;
use crate::output::OutputFormat;

#[derive(Parser)]
pub struct ConfigCommand {
    #[clap(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    #[clap(about = "Show the effective configuration")]
    Show,

    #[clap(about = "Show the resolved pruning rule table")]
    Rules,
}

impl ConfigCommand {
    pub fn execute(&self, config: &Config, format: OutputFormat) -> CliResult<()> {
        match &self.command {
            ConfigSubcommand::Show => match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config)?),
                OutputFormat::Table => print!("{}", toml::to_string_pretty(config)?),
            },
            ConfigSubcommand::Rules => Self::rules(config, format)?,
        }
        Ok(())
    }

    fn rules(config: &Config, format: OutputFormat) -> CliResult<()> {
        let table = RuleTable::from_config(&config.pruning);
        let sources = table.sources();

        match format {
            OutputFormat::Json => {
                let rules: serde_json::Map<String, serde_json::Value> = sources
                    .iter()
                    .map(|s| {
                        serde_json::to_value(table.resolve(s).strategy).map(|v| (s.to_string(), v))
                    })
                    .collect::<Result<_, _>>()?;
                let output = serde_json::json!({
                    "rules": rules,
                    "default": table.default_strategy(),
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                let mut out = Table::new();
                out.load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(["Source", "Strategy", "Parameters"]);

                for source in &sources {
                    let strategy = table.resolve(source).strategy;
                    out.add_row([
                        source.to_string(),
                        strategy.name().to_string(),
                        params(&strategy),
                    ]);
                }
                let default = table.default_strategy();
                out.add_row([
                    "(default)".to_string(),
                    default.name().to_string(),
                    params(&default),
                ]);

                println!("{out}");
            }
        }
        Ok(())
    }
}

fn params(strategy: &ebb::pruning::Strategy) -> String {
    use ebb::pruning::Strategy;
    match strategy {
        Strategy::KeepAll | Strategy::Discard => "-".to_string(),
        Strategy::KeepEnds {
            first_chars,
            last_chars,
        } => format!("first {first_chars}, last {last_chars}"),
        Strategy::KeepLast { chars } | Strategy::Summarize { chars } => format!("{chars} chars"),
    }
}
