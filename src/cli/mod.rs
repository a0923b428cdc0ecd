//! liftsense CLI Module
//!
//! Command-line interface for the full study, feature selection only and
//! table inspection.

use clap::{Args, Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};

use crate::config::StudyConfig;
use crate::data::{describe, DataLoader, DataSource};
use crate::report::console::{dim, muted, section};
use crate::study::Study;

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "liftsense")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Weight lifting exercise recognition from wearable sensors")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Sources and config shared by `run` and `select`
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Training table (URL or local CSV path)
    #[arg(long)]
    pub training: Option<String>,

    /// TOML file overriding the default study settings
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Random seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Worker threads (default: available cores minus one)
    #[arg(long)]
    pub workers: Option<usize>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full study (default)
    Run {
        #[command(flatten)]
        source: SourceArgs,

        /// Quiz table (URL or local CSV path)
        #[arg(long)]
        quiz: Option<String>,

        /// Output directory for plots, report and predictions
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip the SVG charts
        #[arg(long)]
        no_plots: bool,
    },

    /// Filter columns and select features by outcome correlation
    Select {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Show shape, types and missingness of a table
    Info {
        /// Table to inspect (URL or local CSV path)
        #[arg(short, long)]
        data: String,
    },
}

/// Build the study configuration from an optional TOML file and flag overrides
pub fn resolve_config(source: &SourceArgs) -> anyhow::Result<StudyConfig> {
    let mut config = match &source.config {
        Some(path) => StudyConfig::from_toml_file(path)?,
        None => StudyConfig::default(),
    };
    if let Some(training) = &source.training {
        config = config.with_training_source(training.clone());
    }
    if let Some(seed) = source.seed {
        config = config.with_seed(seed);
    }
    if let Some(workers) = source.workers {
        config = config.with_workers(workers);
    }
    config.validate()?;
    Ok(config)
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub async fn cmd_run(
    source: &SourceArgs,
    quiz: Option<&str>,
    output: Option<&Path>,
    no_plots: bool,
) -> anyhow::Result<()> {
    let mut config = resolve_config(source)?;
    if let Some(quiz) = quiz {
        config = config.with_quiz_source(quiz);
    }
    if let Some(output) = output {
        config = config.with_output_dir(output);
    }
    if no_plots {
        config = config.with_plots(false);
    }

    let study = Study::new(config)?;
    let report = study.run().await?;

    println!(
        "  {} {}",
        muted("Report written to"),
        study.output_dir().display().to_string().white()
    );
    println!(
        "  {} {}",
        muted("Best model"),
        report.best_model.display_name().white().bold()
    );
    println!();
    Ok(())
}

pub async fn cmd_select(source: &SourceArgs) -> anyhow::Result<()> {
    let config = resolve_config(source)?;
    let study = Study::new(config)?;
    let selection = study.select().await?;

    section("Selected features");
    for name in &selection.selected {
        println!("  {}", name);
    }
    println!();
    Ok(())
}

pub async fn cmd_info(location: &str) -> anyhow::Result<()> {
    section("Data Info");

    let source = DataSource::parse(location);
    let bytes = source.fetch().await?;
    let df = DataLoader::new().load_csv_bytes(bytes)?;

    println!("  {:<12} {}", muted("Source"), source);
    println!("  {:<12} {}", muted("Rows"), df.height());
    println!("  {:<12} {}", muted("Columns"), df.width());
    println!("  {:<12} {:.2} MB", muted("Memory"), df.estimated_size() as f64 / 1024.0 / 1024.0);
    println!();

    println!("  {:<28} {:<10} {:>7} {:>10}", muted("Column"), muted("Type"), muted("Nulls"), muted("Present"));
    println!("  {}", dim(&"─".repeat(58)));

    for info in describe(&df) {
        println!(
            "  {:<28} {:<10} {:>7} {:>9.1}%",
            info.name,
            muted(&info.dtype),
            info.null_count,
            info.non_missing_fraction * 100.0
        );
    }

    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_default_is_run() {
        let cli = Cli::parse_from(["liftsense"]);
        assert!(cli.command.is_none());

        let cli = Cli::parse_from(["liftsense", "run", "--seed", "7", "--no-plots"]);
        match cli.command {
            Some(Commands::Run { source, no_plots, .. }) => {
                assert_eq!(source.seed, Some(7));
                assert!(no_plots);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_resolve_config_applies_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "seed = 1\n[cv]\nn_folds = 4").unwrap();

        let args = SourceArgs {
            training: Some("local.csv".to_string()),
            config: Some(file.path().to_path_buf()),
            seed: Some(99),
            workers: Some(2),
        };
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.seed, 99);
        assert_eq!(config.cv.n_folds, 4);
        assert_eq!(config.training_source, "local.csv");
        assert_eq!(config.n_workers, Some(2));
    }

    #[test]
    fn test_resolve_config_rejects_zero_workers() {
        let args = SourceArgs {
            workers: Some(0),
            ..Default::default()
        };
        assert!(resolve_config(&args).is_err());
    }
}
