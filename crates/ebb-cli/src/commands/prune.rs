use clap::Parser;
use ebb::ContextEngine;
use ebb::session::SessionId;
use tokio::io::AsyncReadExt;

use crate::error::CliResult;
use crate::output::OutputFormat;

#[derive(Parser)]
pub struct PruneCommand {
    #[clap(help = "Tool source identifier (bash, read, grep, ...)")]
    pub source: String,

    #[clap(long, help = "Also extract and record facts from the output")]
    pub observe: bool,
}

impl PruneCommand {
    pub async fn execute(
        &self,
        engine: &ContextEngine,
        session: &SessionId,
        format: OutputFormat,
    ) -> CliResult<()> {
        let mut text = String::new();
        tokio::io::stdin().read_to_string(&mut text).await?;

        let level = engine.current_level(session).await;
        let rule = engine.pruner().resolve_rule(&self.source);

        let (output, recorded) = if self.observe {
            let observed = engine.observe_tool_output(session, &self.source, &text).await;
            (observed.output, observed.recorded.len())
        } else {
            (engine.prune_output(session, &self.source, &text).await, 0)
        };

        match format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "source": self.source,
                    "strategy": rule.strategy.name(),
                    "default_rule": rule.is_default,
                    "level": level,
                    "chars_in": text.chars().count(),
                    "chars_out": output.chars().count(),
                    "facts_recorded": recorded,
                    "output": output,
                });
                println!("{}", serde_json::to_string_pretty(&json)?);
            }
            OutputFormat::Table => {
                if self.observe {
                    eprintln!("Recorded {recorded} facts");
                }
                print!("{output}");
                if !output.ends_with('\n') {
                    println!();
                }
            }
        }

        Ok(())
    }
}
