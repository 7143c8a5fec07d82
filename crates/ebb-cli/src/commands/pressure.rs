use clap::{Parser, Subcommand};
use ebb::ContextEngine;
use ebb::pressure::PressureSample;
use ebb::session::SessionId;

use crate::error::CliResult;
use crate::output::{OutputFormat, format_timestamp};

#[derive(Parser)]
pub struct PressureCommand {
    #[clap(subcommand)]
    pub command: PressureSubcommand,
}

#[derive(Subcommand)]
pub enum PressureSubcommand {
    #[clap(about = "Record a usage sample")]
    Sample(SampleArgs),

    #[clap(about = "Show the session's live pressure sample")]
    Show,
}

#[derive(Parser)]
pub struct SampleArgs {
    #[clap(help = "Usage ratio (used / capacity), or the used amount with --capacity")]
    pub value: f64,

    #[clap(long, help = "Capacity to divide the value by")]
    pub capacity: Option<f64>,
}

impl PressureCommand {
    pub async fn execute(
        &self,
        engine: &ContextEngine,
        session: &SessionId,
        format: OutputFormat,
    ) -> CliResult<()> {
        match &self.command {
            PressureSubcommand::Sample(args) => Self::sample(engine, session, args, format).await,
            PressureSubcommand::Show => Self::show(engine, session, format).await,
        }
    }

    async fn sample(
        engine: &ContextEngine,
        session: &SessionId,
        args: &SampleArgs,
        format: OutputFormat,
    ) -> CliResult<()> {
        let mut report = match args.capacity {
            Some(capacity) => engine.sample_usage(session, args.value, capacity).await,
            None => engine.sample_pressure(session, args.value).await,
        };
        // The runtime shuts down when the command returns
        report.delivered().await;

        match format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "sample": report.sample,
                    "intervention": report.intervention,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                print_sample(&report.sample);
                if let Some(intervention) = &report.intervention {
                    println!("\nIntervention sent: {}", intervention.message);
                }
            }
        }

        Ok(())
    }

    async fn show(
        engine: &ContextEngine,
        session: &SessionId,
        format: OutputFormat,
    ) -> CliResult<()> {
        let sample = engine.pressure(session).await;

        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&sample)?),
            OutputFormat::Table => match &sample {
                Some(sample) => print_sample(sample),
                None => println!("No pressure recorded for session {session}."),
            },
        }

        Ok(())
    }
}

fn print_sample(sample: &PressureSample) {
    let trend = if sample.is_escalation() {
        "escalated"
    } else if sample.is_deescalation() {
        "de-escalated"
    } else {
        "steady"
    };

    println!("Session:  {}", sample.session_id);
    println!("Usage:    {:.1}%", sample.usage_ratio * 100.0);
    println!("Level:    {} ({trend} from {})", sample.level, sample.previous_level);
    println!("Sampled:  {}", format_timestamp(&sample.sampled_at));
}
