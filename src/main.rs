//! Track study PDFs and decide what to revise next.

mod commands;
mod display;
mod setup;

use crate::display::SortKey;
use clap::{Parser, Subcommand};
use revisit_config::Config;
use revisit_priority::models::Score;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "revisit", version, about)]
struct Cli {
    /// Configuration file (defaults to config.toml in the user config directory)
    #[arg(short, long, global = true, env = "REVISIT_CONFIG")]
    config: Option<PathBuf>,

    /// Log debug output, including full error traces
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show all materials, most urgent first
    List {
        #[arg(short, long, value_enum, default_value_t)]
        sort: SortKey,
        /// Sort ascending instead of descending
        #[arg(long)]
        asc: bool,
    },
    /// Upload one or more PDFs
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Record a revision: 1 (hard), 2 (okay) or 3 (easy)
    Rate {
        id: String,
        #[arg(value_parser = parse_score)]
        score: Score,
    },
    /// Delete a material and its file
    Delete {
        id: String,
        /// Don't ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Print the download URL of a material
    Url { id: String },
    /// List stored files that no material refers to
    Orphans {
        /// Delete orphans older than an hour
        #[arg(long)]
        prune: bool,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "revisit=debug" } else { "revisit=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(cli.config.as_deref()).map_err(report)?;
    if let Command::Config = cli.command {
        return commands::show_config(&config);
    }

    let (library, db) = setup::open(&config).await?;
    let result = match cli.command {
        Command::List { sort, asc } => commands::list(&library, sort, asc).await,
        Command::Upload { files } => commands::upload(&library, &files).await,
        Command::Rate { id, score } => commands::rate(&library, id.into(), score).await,
        Command::Delete { id, yes } => commands::delete(&library, id.into(), yes).await,
        Command::Url { id } => commands::url(&library, id.into()).await,
        Command::Orphans { prune } => commands::orphans(&library, prune).await,
        Command::Config => Ok(()),
    };
    db.close().await;
    result
}

fn parse_score(s: &str) -> Result<Score, String> {
    s.parse::<Score>().map_err(|_| format!("expected 1, 2, 3, hard, okay or easy, got {s:?}"))
}

/// Turn a library error into a report carrying its top-level message.
///
/// The full error tree (with source locations) is only logged at debug level.
pub(crate) fn report<E: std::error::Error + Send + Sync + 'static>(err: exn::Exn<E>) -> miette::Report {
    tracing::debug!("{err:?}");
    miette::miette!("{err}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use revisit_config::error::ErrorKind;

    #[test]
    fn test_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_report_keeps_top_level_message() {
        let err = exn::Exn::from(ErrorKind::InvalidValue("storage.bucket"));
        assert_eq!(report(err).to_string(), "invalid configuration value: storage.bucket");
    }

    #[test]
    fn test_parse_score() {
        assert_eq!(parse_score("hard"), Ok(Score::Hard));
        assert!(parse_score("4").is_err());
    }
}
