//! Run configuration.
//!
//! [`AnalysisConfig`] is the deserialised, permissive form: every field has a
//! default and stage markers are plain strings. [`AnalysisConfig::validate`]
//! turns it into a [`RunPlan`], rejecting anything inconsistent before a
//! single stage runs.

use std::{collections::BTreeSet, fmt};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
  confirm::ConfirmationThresholds,
  detect::DetectionRules,
  error::ConfigError,
  history::RunMode,
  profile::EstimatePolicy,
  score::{CandidateScoringPolicy, TableScoringPolicy},
  stage::Stage,
};

// ─── Scope ───────────────────────────────────────────────────────────────────

/// Which databases a run covers.
///
/// A non-empty target list wins, including over a database it shares with the
/// exclude list; otherwise every database not excluded is in scope. Names
/// compare case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseScope {
  targets:  BTreeSet<String>,
  excludes: BTreeSet<String>,
}

/// Warehouse identifiers: letters, digits, `_` and `$`.
fn valid_identifier(name: &str) -> bool {
  !name.is_empty()
    && name
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn normalise<I, S>(names: I) -> Result<BTreeSet<String>, ConfigError>
where
  I: IntoIterator<Item = S>,
  S: AsRef<str>,
{
  names
    .into_iter()
    .map(|name| {
      let trimmed = name.as_ref().trim();
      if valid_identifier(trimmed) {
        Ok(trimmed.to_ascii_uppercase())
      } else {
        Err(ConfigError::InvalidDatabaseName(name.as_ref().to_owned()))
      }
    })
    .collect()
}

impl DatabaseScope {
  /// Every database.
  pub fn all() -> Self { Self::default() }

  pub fn new<I, J, S, T>(targets: I, excludes: J) -> Result<Self, ConfigError>
  where
    I: IntoIterator<Item = S>,
    J: IntoIterator<Item = T>,
    S: AsRef<str>,
    T: AsRef<str>,
  {
    let targets = normalise(targets)?;
    let excludes = normalise(excludes)?;
    let overlap: Vec<&str> =
      targets.intersection(&excludes).map(String::as_str).collect();
    if !overlap.is_empty() {
      warn!(
        databases = %overlap.join(", "),
        "databases are both targeted and excluded; the target list wins"
      );
    }
    Ok(Self { targets, excludes })
  }

  pub fn includes(&self, database: &str) -> bool {
    let database = database.to_ascii_uppercase();
    if self.targets.is_empty() {
      !self.excludes.contains(&database)
    } else {
      self.targets.contains(&database)
    }
  }

  pub fn targets(&self) -> &BTreeSet<String> { &self.targets }

  pub fn excludes(&self) -> &BTreeSet<String> { &self.excludes }
}

fn joined(names: &BTreeSet<String>) -> String {
  names.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

impl fmt::Display for DatabaseScope {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if !self.targets.is_empty() {
      write!(f, "databases: {}", joined(&self.targets))
    } else if !self.excludes.is_empty() {
      write!(f, "all databases except: {}", joined(&self.excludes))
    } else {
      f.write_str("all databases")
    }
  }
}

// ─── Configuration ───────────────────────────────────────────────────────────

/// Everything a run can be told, as read from files, environment and flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
  pub target_databases:    Vec<String>,
  pub exclude_databases:   Vec<String>,
  pub run_mode:            RunMode,
  /// Copy the output directory aside before a fresh run overwrites it.
  pub backup_before_fresh: bool,
  /// Ignore cached analyses.
  pub force_reanalysis:    bool,
  /// Stage label or name to resume from.
  pub start_stage:         Option<String>,
  /// Stage label or name after which the run stops.
  pub stop_after:          Option<String>,
  pub detection:           DetectionRules,
  pub readiness:           TableScoringPolicy,
  pub scoring:             CandidateScoringPolicy,
  pub estimates:           EstimatePolicy,
  pub confirmation:        ConfirmationThresholds,
}

impl Default for AnalysisConfig {
  fn default() -> Self {
    Self {
      target_databases:    Vec::new(),
      exclude_databases:   Vec::new(),
      run_mode:            RunMode::Fresh,
      backup_before_fresh: true,
      force_reanalysis:    false,
      start_stage:         None,
      stop_after:          None,
      detection:           DetectionRules::default(),
      readiness:           TableScoringPolicy::default(),
      scoring:             CandidateScoringPolicy::default(),
      estimates:           EstimatePolicy::default(),
      confirmation:        ConfirmationThresholds::default(),
    }
  }
}

fn parse_stage(marker: Option<&str>, default: Stage) -> Result<Stage, ConfigError> {
  match marker.map(str::trim).filter(|m| !m.is_empty()) {
    Some(marker) => marker.parse(),
    None => Ok(default),
  }
}

impl AnalysisConfig {
  /// Check every setting and produce the plan a run executes.
  pub fn validate(&self) -> Result<RunPlan, ConfigError> {
    let scope =
      DatabaseScope::new(&self.target_databases, &self.exclude_databases)?;
    let start = parse_stage(self.start_stage.as_deref(), Stage::FIRST)?;
    let stop_after = parse_stage(self.stop_after.as_deref(), Stage::LAST)?;
    if stop_after < start {
      return Err(ConfigError::StopBeforeStart {
        start,
        stop: stop_after,
      });
    }

    self.detection.validate()?;
    self.readiness.validate()?;
    self.estimates.validate()?;
    self.confirmation.validate()?;

    Ok(RunPlan {
      scope,
      mode: self.run_mode,
      backup_before_fresh: self.backup_before_fresh,
      force_reanalysis: self.force_reanalysis,
      start,
      stop_after,
      detection: self.detection.clone(),
      readiness: self.readiness.clone(),
      scoring: self.scoring.clone(),
      estimates: self.estimates.clone(),
      confirmation: self.confirmation.clone(),
    })
  }
}

/// A validated configuration.
#[derive(Debug, Clone)]
pub struct RunPlan {
  pub scope:               DatabaseScope,
  pub mode:                RunMode,
  pub backup_before_fresh: bool,
  pub force_reanalysis:    bool,
  pub start:               Stage,
  pub stop_after:          Stage,
  pub detection:           DetectionRules,
  pub readiness:           TableScoringPolicy,
  pub scoring:             CandidateScoringPolicy,
  pub estimates:           EstimatePolicy,
  pub confirmation:        ConfirmationThresholds,
}

impl RunPlan {
  /// Whether `stage` executes under this plan.
  pub fn runs(&self, stage: Stage) -> bool {
    self.start <= stage && stage <= self.stop_after
  }
}

impl Default for RunPlan {
  fn default() -> Self {
    Self {
      scope:               DatabaseScope::all(),
      mode:                RunMode::Fresh,
      backup_before_fresh: false,
      force_reanalysis:    false,
      start:               Stage::FIRST,
      stop_after:          Stage::LAST,
      detection:           DetectionRules::default(),
      readiness:           TableScoringPolicy::default(),
      scoring:             CandidateScoringPolicy::default(),
      estimates:           EstimatePolicy::default(),
      confirmation:        ConfirmationThresholds::default(),
    }
  }
}
