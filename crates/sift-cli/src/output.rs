//! Human-readable run output.

use std::fmt::Write as _;

use sift_core::{
  pipeline::{PlannedStage, PrerequisiteSource, RunOutcome, StageStatus},
  source::RawCatalog,
};

pub fn plan(stages: &[PlannedStage], rows: &RawCatalog) -> String {
  let mut out = String::new();
  let _ = writeln!(
    out,
    "catalog rows: {} tables, {} columns, {} constraints, {} storage, {} stages",
    rows.tables.len(),
    rows.columns.len(),
    rows.constraints.len(),
    rows.storage.len(),
    rows.stages.len(),
  );
  for planned in stages {
    let status = if planned.runs { "run " } else { "skip" };
    let _ = writeln!(out, "  [{status}] {}", planned.stage);
    for req in &planned.requires {
      let source = match req.source {
        PrerequisiteSource::ThisRun => "produced earlier in this run",
        PrerequisiteSource::Stored => "loaded from the output directory",
        PrerequisiteSource::Missing => "MISSING, an empty default is used",
      };
      let _ = writeln!(out, "         needs {}: {source}", req.artifact);
    }
  }
  out
}

pub fn outcome(outcome: &RunOutcome) -> String {
  let mut out = String::new();
  let _ = writeln!(out, "run {}", outcome.run_id);
  if let Some(backup) = &outcome.backup {
    let _ = writeln!(out, "  backup: {backup}");
  }
  for stage in &outcome.stages {
    let status = match stage.status {
      StageStatus::Skipped => "skipped",
      StageStatus::Completed => "done",
      StageStatus::NotReached => "not reached",
    };
    let _ = write!(out, "  {:<22} {status}", stage.stage.to_string());
    if !stage.degraded.is_empty() {
      let missing: Vec<_> =
        stage.degraded.iter().map(ToString::to_string).collect();
      let _ = write!(out, " (missing: {})", missing.join(", "));
    }
    out.push('\n');
  }

  let Some(report) = &outcome.report else {
    return out;
  };
  let summary = &report.summary;
  let _ = writeln!(
    out,
    "\n{} candidates, {} confirmed, across {} database(s)",
    summary.total_candidates,
    summary.confirmed_candidates,
    summary.databases.len()
  );
  for (feature, counts) in &summary.by_feature {
    let _ = writeln!(
      out,
      "  {:<14} {:>4} candidates {:>4} confirmed",
      feature.to_string(),
      counts.candidates,
      counts.confirmed
    );
  }
  let bands = summary.readiness_bands;
  let _ = write!(
    out,
    "{} tables scored: {} high, {} medium, {} low",
    summary.tables_scored, bands.high, bands.medium, bands.low
  );
  if let Some(average) = summary.average_table_score {
    let _ = write!(out, " (average {average:.1})");
  }
  out.push('\n');
  out
}
