use clap::{Parser, Subcommand};
use ebb::ContextEngine;
use ebb::session::SessionId;

use crate::error::CliResult;
use crate::output::OutputFormat;

#[derive(Parser)]
pub struct SessionCommand {
    #[clap(subcommand)]
    pub command: SessionSubcommand,
}

#[derive(Subcommand)]
pub enum SessionSubcommand {
    #[clap(about = "Delete all persisted state for the session")]
    Delete,
}

impl SessionCommand {
    pub async fn execute(
        &self,
        engine: &ContextEngine,
        session: &SessionId,
        format: OutputFormat,
    ) -> CliResult<()> {
        match &self.command {
            SessionSubcommand::Delete => {
                engine.session_deleted(session).await;
                match format {
                    OutputFormat::Json => {
                        let output = serde_json::json!({ "deleted": session });
                        println!("{}", serde_json::to_string_pretty(&output)?);
                    }
                    OutputFormat::Table => println!("Deleted session {session}"),
                }
                Ok(())
            }
        }
    }
}
