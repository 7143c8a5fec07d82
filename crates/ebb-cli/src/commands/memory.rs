use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use ebb::ContextEngine;
use ebb::memory::{Category, MemoryItem};
use ebb::session::SessionId;

use crate::error::CliResult;
use crate::output::{OutputFormat, format_timestamp, truncate_string};

#[derive(Parser)]
pub struct MemoryCommand {
    #[clap(subcommand)]
    pub command: MemorySubcommand,
}

#[derive(Subcommand)]
pub enum MemorySubcommand {
    #[clap(about = "Record a fact")]
    Add(AddArgs),

    #[clap(about = "List the session's working memory")]
    List(ListArgs),

    #[clap(about = "Remove the first fact containing a substring")]
    Forget(ForgetArgs),

    #[clap(about = "Remove every fact of one category")]
    Clear(ClearArgs),
}

#[derive(Parser)]
pub struct AddArgs {
    #[clap(help = "Category (decision, error, task, file_path, discovery)")]
    pub category: String,

    #[clap(help = "Fact content")]
    pub content: String,

    #[clap(long, default_value = "manual", help = "Provenance tag")]
    pub source: String,
}

#[derive(Parser)]
pub struct ListArgs {
    #[clap(long, help = "Only show this category")]
    pub category: Option<String>,
}

#[derive(Parser)]
pub struct ForgetArgs {
    #[clap(help = "Substring to match against fact content")]
    pub needle: String,
}

#[derive(Parser)]
pub struct ClearArgs {
    #[clap(help = "Category to clear")]
    pub category: String,
}

impl MemoryCommand {
    pub async fn execute(
        &self,
        engine: &ContextEngine,
        session: &SessionId,
        format: OutputFormat,
    ) -> CliResult<()> {
        match &self.command {
            MemorySubcommand::Add(args) => Self::add(engine, session, args, format).await,
            MemorySubcommand::List(args) => Self::list(engine, session, args, format).await,
            MemorySubcommand::Forget(args) => Self::forget(engine, session, args, format).await,
            MemorySubcommand::Clear(args) => Self::clear(engine, session, args, format).await,
        }
    }

    async fn add(
        engine: &ContextEngine,
        session: &SessionId,
        args: &AddArgs,
        format: OutputFormat,
    ) -> CliResult<()> {
        let category: Category = args.category.parse()?;
        let outcome = engine
            .record_fact(session, category, &args.content, &args.source)
            .await
            .ok_or_else(|| format!("Session {session} is derived; facts are not recorded"))?;

        match format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "item": outcome.item,
                    "merged": outcome.merged,
                    "retained": outcome.retained,
                    "evicted": outcome.evicted,
                    "warning": outcome.warning,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                if let Some(warning) = &outcome.warning {
                    eprintln!("Warning: {warning}");
                }
                let verb = if outcome.merged { "Refreshed" } else { "Recorded" };
                println!(
                    "{verb} {} fact (mentions: {})",
                    category, outcome.item.mentions
                );
                if !outcome.retained {
                    println!("Note: the fact scored below the pool cutoff and was evicted immediately.");
                }
                for evicted in &outcome.evicted {
                    println!("Evicted: {}", truncate_string(&evicted.content, 60));
                }
            }
        }

        Ok(())
    }

    async fn list(
        engine: &ContextEngine,
        session: &SessionId,
        args: &ListArgs,
        format: OutputFormat,
    ) -> CliResult<()> {
        let filter = args
            .category
            .as_deref()
            .map(str::parse::<Category>)
            .transpose()?;
        let state = engine.snapshot(session).await;

        let items: Vec<&MemoryItem> = Category::ALL
            .iter()
            .filter(|c| filter.is_none_or(|f| f == **c))
            .flat_map(|c| state.items(*c))
            .collect();

        match format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "session_id": state.session_id,
                    "event_counter": state.event_counter,
                    "updated_at": state.updated_at.to_rfc3339(),
                    "items": items,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                if items.is_empty() {
                    println!("No facts recorded for session {session}.");
                    return Ok(());
                }

                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header([
                        "Category", "Kind", "Content", "Mentions", "Score", "Source", "Created",
                    ]);

                for item in &items {
                    let kind = if engine.policy().is_slot(item.category) {
                        "slot"
                    } else {
                        "pool"
                    };
                    table.add_row([
                        item.category.to_string(),
                        kind.to_string(),
                        truncate_string(&item.content, 60),
                        item.mentions.to_string(),
                        item.score.map(|s| format!("{s:.3}")).unwrap_or_else(|| "-".to_string()),
                        item.source.clone(),
                        format_timestamp(&item.created_at),
                    ]);
                }

                println!("{table}");
                println!(
                    "\nTotal: {} facts (event counter: {})",
                    items.len(),
                    state.event_counter
                );
            }
        }

        Ok(())
    }

    async fn forget(
        engine: &ContextEngine,
        session: &SessionId,
        args: &ForgetArgs,
        format: OutputFormat,
    ) -> CliResult<()> {
        let item = engine.forget(session, &args.needle).await?;

        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&item)?),
            OutputFormat::Table => {
                println!(
                    "Forgot {} fact: {}",
                    item.category,
                    truncate_string(&item.content, 60)
                );
            }
        }

        Ok(())
    }

    async fn clear(
        engine: &ContextEngine,
        session: &SessionId,
        args: &ClearArgs,
        format: OutputFormat,
    ) -> CliResult<()> {
        let category: Category = args.category.parse()?;
        let removed = engine.clear_category(session, category).await;

        match format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "category": category,
                    "removed": removed,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => println!("Removed {removed} {category} facts"),
        }

        Ok(())
    }
}
