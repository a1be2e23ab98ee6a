//! `sift`: metadata-only AI-readiness analysis.
//!
//! Reads `sift.toml` (or the path given with `--config`), layers `SIFT_*`
//! environment variables and command-line flags on top, then runs the stage
//! pipeline against a catalog snapshot and writes artifacts to the output
//! directory.
//!
//! # Usage
//!
//! ```
//! sift --database SALES --database MARKETING
//! sift --mode append --database HR
//! sift --start-stage 2C --force
//! sift --dry-run
//! ```

mod output;
mod settings;

use std::{path::PathBuf, str::FromStr};

use anyhow::Context as _;
use clap::Parser;
use settings::Settings;
use sift_catalog_sqlite::SqliteCatalog;
use sift_core::{
  clock::SystemClock, history::RunMode, pipeline::Pipeline, source::RawCatalog,
};
use sift_store_fs::FsStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Metadata-only AI-readiness analysis")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "sift.toml")]
  config: PathBuf,

  /// Resume from this stage (label such as `2C`, or name such as `score`).
  #[arg(long, value_name = "STAGE")]
  start_stage: Option<String>,

  /// Stop after this stage.
  #[arg(long, value_name = "STAGE")]
  stop_after: Option<String>,

  /// `fresh` replaces the candidate set; `append` merges into it.
  #[arg(long, value_parser = RunMode::from_str)]
  mode: Option<RunMode>,

  /// Ignore cached analyses and re-score every candidate.
  #[arg(long)]
  force: bool,

  /// Skip the backup a fresh run normally takes first.
  #[arg(long)]
  no_backup: bool,

  /// Analyse only this database (repeatable).
  #[arg(long = "database", value_name = "NAME")]
  databases: Vec<String>,

  /// Skip this database (repeatable).
  #[arg(long = "exclude", value_name = "NAME")]
  excludes: Vec<String>,

  /// Directory artifacts are read from and written to.
  #[arg(long, value_name = "DIR")]
  output_dir: Option<PathBuf>,

  /// Catalog snapshot to analyse.
  #[arg(long, value_name = "FILE")]
  catalog: Option<PathBuf>,

  /// Validate, count catalog rows and print the stage plan without running.
  #[arg(long)]
  dry_run: bool,

  /// Print the run outcome as JSON instead of a summary.
  #[arg(long)]
  json: bool,
}

impl Cli {
  /// Flags win over the config file and environment.
  fn apply(&self, settings: &mut Settings) {
    let analysis = &mut settings.analysis;
    if let Some(stage) = &self.start_stage {
      analysis.start_stage = Some(stage.clone());
    }
    if let Some(stage) = &self.stop_after {
      analysis.stop_after = Some(stage.clone());
    }
    if let Some(mode) = self.mode {
      analysis.run_mode = mode;
    }
    if self.force {
      analysis.force_reanalysis = true;
    }
    if self.no_backup {
      analysis.backup_before_fresh = false;
    }
    if !self.databases.is_empty() {
      analysis.target_databases = self.databases.clone();
    }
    if !self.excludes.is_empty() {
      analysis.exclude_databases = self.excludes.clone();
    }
    if let Some(dir) = &self.output_dir {
      settings.output_dir = dir.clone();
    }
    if let Some(path) = &self.catalog {
      settings.catalog_path = path.clone();
    }
  }
}

fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let mut settings = Settings::load(&cli.config).with_context(|| {
    format!("failed to read configuration from {}", cli.config.display())
  })?;
  cli.apply(&mut settings);
  let plan = settings
    .analysis
    .validate()
    .context("invalid analysis configuration")?;

  let catalog = SqliteCatalog::open(&settings.catalog_path).with_context(|| {
    format!(
      "failed to open catalog snapshot {}",
      settings.catalog_path.display()
    )
  })?;

  if cli.dry_run {
    let store = FsStore::at(&settings.output_dir);
    let rows = RawCatalog::fetch(&catalog, &plan.scope)
      .context("failed to read the catalog")?;
    let stages = Pipeline::new(&plan, &store, &catalog, &SystemClock)
      .plan()
      .context("failed to inspect the output directory")?;
    if cli.json {
      println!("{}", serde_json::to_string_pretty(&stages)?);
    } else {
      print!("{}", output::plan(&stages, &rows));
    }
    return Ok(());
  }

  let store = FsStore::open(&settings.output_dir).with_context(|| {
    format!(
      "failed to open output directory {}",
      settings.output_dir.display()
    )
  })?;
  let outcome = Pipeline::new(&plan, &store, &catalog, &SystemClock)
    .run()
    .context("run failed")?;

  if cli.json {
    println!("{}", serde_json::to_string_pretty(&outcome)?);
  } else {
    print!("{}", output::outcome(&outcome));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn flags_override_settings() {
    let cli = Cli::parse_from([
      "sift",
      "--mode",
      "append",
      "--database",
      "sales",
      "--database",
      "hr",
      "--start-stage",
      "2c",
      "--force",
      "--output-dir",
      "elsewhere",
    ]);
    let mut settings = Settings::default();
    settings.analysis.exclude_databases = vec!["TMP".into()];
    cli.apply(&mut settings);

    assert_eq!(settings.analysis.run_mode, RunMode::Append);
    assert_eq!(settings.analysis.target_databases, ["sales", "hr"]);
    assert_eq!(settings.analysis.exclude_databases, ["TMP"]);
    assert!(settings.analysis.force_reanalysis);
    assert_eq!(settings.output_dir, PathBuf::from("elsewhere"));

    let plan = settings.analysis.validate().unwrap();
    assert_eq!(plan.start.name(), "score");
  }

  #[test]
  fn unknown_mode_is_rejected_by_the_parser() {
    assert!(Cli::try_parse_from(["sift", "--mode", "merge"]).is_err());
  }

  #[test]
  fn cli_definition_is_consistent() {
    use clap::CommandFactory;
    Cli::command().debug_assert();
  }
}
