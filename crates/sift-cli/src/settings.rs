//! Binary settings: where things live, plus the analysis configuration.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use sift_core::config::AnalysisConfig;

/// Everything the `sift` binary reads from its config file and environment.
///
/// ```toml
/// output_dir   = "~/sift/results"
/// catalog_path = "~/sift/catalog.sqlite"
///
/// [analysis]
/// run_mode         = "append"
/// target_databases = ["SALES"]
///
/// [analysis.confirmation]
/// min_data_readiness = 3.0
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
  pub output_dir:   PathBuf,
  pub catalog_path: PathBuf,
  pub analysis:     AnalysisConfig,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      output_dir:   PathBuf::from("sift_output"),
      catalog_path: PathBuf::from("catalog.sqlite"),
      analysis:     AnalysisConfig::default(),
    }
  }
}

/// Environment variables are `SIFT_` followed by the key path, nested keys
/// separated by `__`, e.g. `SIFT_ANALYSIS__RUN_MODE=append`. Database lists
/// are comma-separated.
fn environment() -> config::Environment {
  config::Environment::with_prefix("SIFT")
    .prefix_separator("_")
    .separator("__")
    .list_separator(",")
    .with_list_parse_key("analysis.target_databases")
    .with_list_parse_key("analysis.exclude_databases")
}

impl Settings {
  /// Layer the optional config file under the environment.
  pub fn load(file: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(file).required(false))
      .add_source(environment())
      .build()?
      .try_deserialize::<Self>()
      .map(Self::expanded)
  }

  fn expanded(self) -> Self {
    Self {
      output_dir: expand_tilde(&self.output_dir),
      catalog_path: expand_tilde(&self.catalog_path),
      ..self
    }
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
