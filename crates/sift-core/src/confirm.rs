//! Confirmation policy.
//!
//! A candidate is confirmed when every applicable predicate holds. Each
//! predicate that is evaluated leaves a reason naming the measured value and
//! the threshold, so a decision can always be explained after the fact.

use serde::{Deserialize, Serialize};

use crate::{
  candidate::Candidate, error::ConfigError, profile::ColumnProfile,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmationThresholds {
  /// Highest acceptable estimated NULL percentage.
  pub max_sparsity_pct:   f64,
  /// Lowest acceptable estimated average length, for text features.
  pub min_content_length: f64,
  /// Lowest acceptable data-readiness sub-score.
  pub min_data_readiness: f64,
}

impl Default for ConfirmationThresholds {
  fn default() -> Self {
    Self {
      max_sparsity_pct:   50.0,
      min_content_length: 30.0,
      min_data_readiness: 3.5,
    }
  }
}

impl ConfirmationThresholds {
  pub fn validate(&self) -> Result<(), ConfigError> {
    let checks = [
      ("confirmation.max_sparsity_pct", self.max_sparsity_pct, 100.0),
      ("confirmation.min_content_length", self.min_content_length, f64::MAX),
      ("confirmation.min_data_readiness", self.min_data_readiness, 5.0),
    ];
    for (name, value, max) in checks {
      if !(0.0..=max).contains(&value) {
        return Err(ConfigError::OutOfRange {
          name,
          value,
          min: 0.0,
          max,
        });
      }
    }
    Ok(())
  }
}

/// Outcome of the policy for one candidate. `reasons` is never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Confirmation {
  pub is_confirmed: bool,
  pub reasons:      Vec<String>,
}

/// Evaluate the policy. Pure: depends only on its arguments.
pub fn evaluate(
  candidate: &Candidate,
  profile: Option<&ColumnProfile>,
  thresholds: &ConfirmationThresholds,
) -> Confirmation {
  let mut reasons = Vec::new();
  let mut is_confirmed = true;

  match profile.and_then(|p| p.null_pct) {
    Some(null_pct) if null_pct <= thresholds.max_sparsity_pct => {
      reasons.push(format!(
        "Good completeness ({null_pct:.1}% NULL, maximum {:.1}%)",
        thresholds.max_sparsity_pct
      ));
    }
    Some(null_pct) => {
      is_confirmed = false;
      reasons.push(format!(
        "High sparsity ({null_pct:.1}% NULL exceeds maximum {:.1}%)",
        thresholds.max_sparsity_pct
      ));
    }
    None => {
      is_confirmed = false;
      reasons.push(format!(
        "Sparsity unknown (no column profile; maximum {:.1}% NULL)",
        thresholds.max_sparsity_pct
      ));
    }
  }

  if candidate.ai_feature.is_text() {
    match profile.and_then(|p| p.avg_length) {
      Some(avg) if avg >= thresholds.min_content_length => {
        reasons.push(format!(
          "Substantial content (avg {avg:.1} chars, minimum {:.1})",
          thresholds.min_content_length
        ));
      }
      Some(avg) => {
        is_confirmed = false;
        reasons.push(format!(
          "Short content (avg {avg:.1} chars below minimum {:.1})",
          thresholds.min_content_length
        ));
      }
      None => {
        is_confirmed = false;
        reasons.push(format!(
          "Content length unknown (minimum {:.1} chars)",
          thresholds.min_content_length
        ));
      }
    }
  }

  match candidate.scores.map(|s| s.data_readiness) {
    Some(score) if score >= thresholds.min_data_readiness => {
      reasons.push(format!(
        "Good data readiness ({score:.2}, minimum {:.2})",
        thresholds.min_data_readiness
      ));
    }
    Some(score) => {
      is_confirmed = false;
      reasons.push(format!(
        "Low data readiness score ({score:.2} below minimum {:.2})",
        thresholds.min_data_readiness
      ));
    }
    None => {
      is_confirmed = false;
      reasons.push("Not scored; data readiness unknown".to_owned());
    }
  }

  Confirmation {
    is_confirmed,
    reasons,
  }
}

/// Evaluate and record the decision on the candidate.
pub fn apply(
  candidate: &mut Candidate,
  profile: Option<&ColumnProfile>,
  thresholds: &ConfirmationThresholds,
) {
  let Confirmation {
    is_confirmed,
    reasons,
  } = evaluate(candidate, profile, thresholds);
  candidate.is_confirmed = is_confirmed;
  candidate.confirmation_reasons = reasons;
}
