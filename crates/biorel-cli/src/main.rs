//! biorel CLI - Command-line interface
//!
//! Usage:
//!   biorel load-corpus --goldstd <corpus>
//!   biorel annotate --goldstd <corpus> [--etype <type>]
//!   biorel train-relations --goldstd <corpus>... --kernel <kernel> --pairtype <type>
//!   biorel test-relations --goldstd <corpus>... --kernel <kernel> --pairtype <type|all> --output <path>
//!   biorel write-results --results <file> --output <dir>
//!   biorel write-goldstandard --goldstd <corpus> --output <file> [--etype <type>]
//!   biorel stats --goldstd <corpus>...

mod commands;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use biorel_classify::KernelKind;
use biorel_core::{AppConfig, LoggingConfig};

#[derive(Parser)]
#[command(name = "biorel")]
#[command(about = "Biomedical relation extraction over annotated corpora")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level or filter directive, e.g. `info` or `biorel_reader=debug`
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a gold-standard corpus into sentences and save it
    LoadCorpus {
        #[arg(long, required = true, num_args = 1..)]
        goldstd: Vec<String>,
    },
    /// Align gold-standard annotations onto a saved corpus
    Annotate {
        #[arg(long, required = true, num_args = 1..)]
        goldstd: Vec<String>,
        /// Entity type to keep, or `all`
        #[arg(long, default_value = "all")]
        etype: String,
    },
    /// Train a relation classifier on one or more saved corpora
    TrainRelations {
        #[arg(long, required = true, num_args = 1..)]
        goldstd: Vec<String>,
        #[arg(long, default_value = "rules")]
        kernel: KernelKind,
        #[arg(long)]
        pairtype: String,
    },
    /// Classify candidate pairs and evaluate against the gold relations
    TestRelations {
        #[arg(long, required = true, num_args = 1..)]
        goldstd: Vec<String>,
        #[arg(long, default_value = "rules")]
        kernel: KernelKind,
        /// Relation type, or `all` for every configured type
        #[arg(long)]
        pairtype: String,
        /// Results path prefix; BioNLP files go into this directory
        #[arg(long)]
        output: PathBuf,
    },
    /// Write saved results as BioNLP `.a2` files
    WriteResults {
        #[arg(long)]
        results: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Write the gold-standard entities of a corpus
    WriteGoldstandard {
        #[arg(long)]
        goldstd: String,
        #[arg(long)]
        output: PathBuf,
        #[arg(long, default_value = "all")]
        etype: String,
    },
    /// Relation statistics of annotated corpora
    Stats {
        #[arg(long, required = true, num_args = 1..)]
        goldstd: Vec<String>,
    },
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_file(logging.include_location)
        .with_line_number(logging.include_location);
    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => AppConfig::default(),
    };
    Ok(config.with_env_override()?)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_ref())?;
    if let Some(level) = cli.log {
        config.logging.level = level;
    }
    init_tracing(&config.logging);

    let start = Instant::now();
    match cli.command {
        Commands::LoadCorpus { goldstd } => commands::load_corpus(&config, &goldstd)?,
        Commands::Annotate { goldstd, etype } => commands::annotate(&config, &goldstd, &etype)?,
        Commands::TrainRelations {
            goldstd,
            kernel,
            pairtype,
        } => commands::train_relations(&config, &goldstd, kernel, &pairtype)?,
        Commands::TestRelations {
            goldstd,
            kernel,
            pairtype,
            output,
        } => {
            let metrics = commands::test_relations(&config, &goldstd, kernel, &pairtype, &output)?;
            println!("{}", metrics.report());
        }
        Commands::WriteResults { results, output } => {
            commands::write_results(&config, &results, &output)?;
        }
        Commands::WriteGoldstandard {
            goldstd,
            output,
            etype,
        } => {
            commands::write_goldstandard(&config, &goldstd, &output, &etype)?;
        }
        Commands::Stats { goldstd } => {
            let stats = commands::stats(&config, &goldstd)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }
    info!(elapsed_secs = start.elapsed().as_secs_f64(), "total time");
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_test_relations() {
        let cli = Cli::try_parse_from([
            "biorel",
            "--log",
            "debug",
            "test-relations",
            "--goldstd",
            "train",
            "dev",
            "--kernel",
            "svmtk",
            "--pairtype",
            "all",
            "--output",
            "results/run1",
        ])
        .unwrap();
        assert_eq!(cli.log.as_deref(), Some("debug"));
        match cli.command {
            Commands::TestRelations {
                goldstd,
                kernel,
                pairtype,
                output,
            } => {
                assert_eq!(goldstd, vec!["train", "dev"]);
                assert_eq!(kernel, KernelKind::SvmTk);
                assert_eq!(pairtype, "all");
                assert_eq!(output, PathBuf::from("results/run1"));
            }
            _ => panic!("parsed the wrong subcommand"),
        }
    }

    #[test]
    fn test_unknown_kernel_rejected() {
        let parsed = Cli::try_parse_from([
            "biorel",
            "train-relations",
            "--goldstd",
            "train",
            "--kernel",
            "crf",
            "--pairtype",
            "tlink",
        ]);
        assert!(parsed.is_err());
    }
}
