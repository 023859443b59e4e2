use anyhow::Context;
use caixinha_core::Settings;
use caixinha_sync::SyncPipeline;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "caixinha", version, about = "Caixinha snapshots, balances and loan limits")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Rebuild the member roster snapshot from the members workbook.
    SyncMembers,
    /// Rebuild the report snapshot from the report workbook.
    SyncReport,
    /// Re-extract the fund series and rebuild its snapshot.
    SyncEvolution,
    /// Current, invested and variation balances for a member.
    Balances { cpf: String },
    /// The member's name as written in the roster.
    Name { cpf: String },
    /// The fund's time series.
    Evolution {
        /// Keep only the last N points. Zero or anything unparseable means all.
        #[arg(long, short = 'n')]
        limit: Option<String>,
    },
    /// The loan rules, validated and in canonical form.
    Charges,
    /// The member's name and the most they may borrow, after a roster refresh.
    Loan { cpf: String },
    /// Name, balances and series in one pass, then a report refresh.
    Dashboard { cpf: String },
}

fn main() -> anyhow::Result<()> {
    // stdout carries the JSON answer; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env().context("loading settings")?;
    tracing::debug!(snapshot_dir = %settings.snapshot_dir.display(), "settings loaded");
    let pipeline = SyncPipeline::new(settings);

    let output = match cli.command {
        Command::SyncMembers => commands::sync_members(&pipeline),
        Command::SyncReport => commands::sync_report(&pipeline),
        Command::SyncEvolution => commands::sync_evolution(&pipeline),
        Command::Balances { cpf } => commands::balances(&pipeline, &cpf),
        Command::Name { cpf } => commands::name(&pipeline, &cpf),
        Command::Evolution { limit } => commands::evolution(&pipeline, limit.as_deref()),
        Command::Charges => commands::charges(&pipeline)?,
        Command::Loan { cpf } => commands::loan(pipeline, &cpf)?,
        Command::Dashboard { cpf } => commands::dashboard(&pipeline, &cpf),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
