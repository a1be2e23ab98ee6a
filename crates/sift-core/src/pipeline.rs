//! The stage orchestrator.
//!
//! A run walks [`Stage::all`] in order. Stages before the plan's start are
//! skipped, stages after its stop point are never reached. Each executed
//! stage reads its inputs from the in-memory run state, loading from the
//! store whatever an earlier stage of this run did not produce, and writes
//! its outputs once, when it completes.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
  artifact::{
    Artifact, ArtifactKind, ConfirmedCandidates, ConfirmedSet,
    DetectedCandidates, ScoredCandidates, TableScores,
  },
  cache::{self, AnalysisCache, CacheEntry},
  clock::Clock,
  config::{DatabaseScope, RunPlan},
  confirm,
  detect,
  error::{Error, Result},
  history::{RunHistory, RunHistoryEntry, RunMode},
  lookup::{Inventory, MetadataLookups},
  merge::{self, CandidateSet},
  profile::ColumnProfiles,
  report::{RunReport, RunSummary},
  score,
  source::{CatalogSource, RawCatalog},
  stage::Stage,
  store::ArtifactStore,
};

// ─── Outcomes ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
  /// Before the start stage.
  Skipped,
  Completed,
  /// After the stop-after stage.
  NotReached,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageOutcome {
  pub stage:    Stage,
  pub status:   StageStatus,
  /// Prerequisites that were missing from the store and replaced with an
  /// empty default.
  pub degraded: Vec<ArtifactKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutcome {
  pub run_id: Uuid,
  /// Where the pre-fresh backup went, if one was taken.
  pub backup: Option<String>,
  pub stages: Vec<StageOutcome>,
  /// Present when the publish stage ran.
  pub report: Option<RunReport>,
}

impl RunOutcome {
  pub fn is_degraded(&self) -> bool {
    self.stages.iter().any(|s| !s.degraded.is_empty())
  }
}

/// One stage as it would execute under a plan, without executing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedStage {
  pub stage:    Stage,
  pub runs:     bool,
  pub requires: Vec<Prerequisite>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Prerequisite {
  pub artifact: ArtifactKind,
  pub source:   PrerequisiteSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrerequisiteSource {
  /// Produced by an earlier stage of the same run.
  ThisRun,
  /// Read from a previous run's output.
  Stored,
  /// Will be replaced with an empty default.
  Missing,
}

// ─── Run state ───────────────────────────────────────────────────────────────

/// Artifacts held in memory for the duration of a run.
#[derive(Default)]
struct RunState {
  inventory:    Option<Inventory>,
  lookups:      Option<MetadataLookups>,
  detected:     Option<DetectedCandidates>,
  profiles:     Option<ColumnProfiles>,
  table_scores: Option<TableScores>,
  scored:       Option<ScoredCandidates>,
  confirmed:    Option<ConfirmedCandidates>,
  cache:        Option<AnalysisCache>,
  candidates:   Option<CandidateSet>,
  history:      Option<RunHistory>,
  summary:      Option<RunSummary>,
}

/// Fills empty state slots from the store, remembering what was missing.
struct Loader<'s, S> {
  store:    &'s S,
  degraded: Vec<ArtifactKind>,
}

impl<S: ArtifactStore> Loader<'_, S> {
  /// Output of an earlier stage. Its absence degrades the stage.
  fn require<'v, A: Artifact>(
    &mut self,
    slot: &'v mut Option<A>,
  ) -> Result<&'v mut A> {
    self.fill(slot, true)
  }

  /// State carried over from earlier runs; absent until a first run has
  /// written it.
  fn carried<'v, A: Artifact>(
    &mut self,
    slot: &'v mut Option<A>,
  ) -> Result<&'v mut A> {
    self.fill(slot, false)
  }

  fn fill<'v, A: Artifact>(
    &mut self,
    slot: &'v mut Option<A>,
    degrades: bool,
  ) -> Result<&'v mut A> {
    let value = match slot.take() {
      Some(value) => value,
      None => match self.store.load::<A>().map_err(|e| Error::Load {
        artifact: A::KIND,
        source:   Box::new(e),
      })? {
        Some(value) => {
          debug!(artifact = %A::KIND, "loaded artifact from store");
          value
        }
        None if degrades => {
          warn!(
            artifact = %A::KIND,
            "prerequisite artifact missing; continuing with an empty default"
          );
          self.degraded.push(A::KIND);
          A::default()
        }
        None => {
          info!(
            artifact = %A::KIND,
            "no state from earlier runs; starting empty"
          );
          A::default()
        }
      },
    };
    Ok(slot.insert(value))
  }

  fn lookups<'v>(
    &mut self,
    inventory: &mut Option<Inventory>,
    lookups: &'v mut Option<MetadataLookups>,
    scope: &DatabaseScope,
  ) -> Result<&'v MetadataLookups> {
    let built = match lookups.take() {
      Some(built) => built,
      None => MetadataLookups::new(self.require(inventory)?, scope),
    };
    Ok(lookups.insert(built))
  }
}

// ─── Pipeline ────────────────────────────────────────────────────────────────

/// Runs a validated plan against a catalog source and an artifact store.
pub struct Pipeline<'a, S, C, K> {
  plan:   &'a RunPlan,
  store:  &'a S,
  source: &'a C,
  clock:  &'a K,
}

impl<'a, S, C, K> Pipeline<'a, S, C, K>
where
  S: ArtifactStore,
  C: CatalogSource,
  K: Clock,
{
  pub fn new(
    plan: &'a RunPlan,
    store: &'a S,
    source: &'a C,
    clock: &'a K,
  ) -> Self {
    Self {
      plan,
      store,
      source,
      clock,
    }
  }

  /// Describe what [`run`](Self::run) would do, touching nothing but the
  /// store's presence checks.
  pub fn plan(&self) -> Result<Vec<PlannedStage>> {
    let mut produced = Vec::new();
    let mut planned = Vec::new();
    for stage in Stage::all() {
      let runs = self.plan.runs(stage);
      let mut requires = Vec::new();
      if runs {
        for &artifact in self.requirements(stage) {
          let source = if produced.contains(&artifact) {
            PrerequisiteSource::ThisRun
          } else if self.store.contains(artifact).map_err(|e| Error::Load {
            artifact,
            source: Box::new(e),
          })? {
            PrerequisiteSource::Stored
          } else {
            PrerequisiteSource::Missing
          };
          requires.push(Prerequisite { artifact, source });
        }
        produced.extend_from_slice(stage.produces());
      }
      planned.push(PlannedStage {
        stage,
        runs,
        requires,
      });
    }
    Ok(planned)
  }

  /// Requirements of `stage` under this plan's run mode.
  fn requirements(&self, stage: Stage) -> &'static [ArtifactKind] {
    use ArtifactKind::*;
    match (stage, self.plan.mode) {
      (Stage::Merge, RunMode::Append) => {
        &[Inventory, ConfirmedCandidates, CandidateSet, RunHistory]
      }
      _ => stage.requires(),
    }
  }

  /// Execute the plan.
  pub fn run(&self) -> Result<RunOutcome> {
    let run_id = Uuid::new_v4();
    let now = self.clock.now();
    info!(
      %run_id,
      mode = %self.plan.mode,
      scope = %self.plan.scope,
      start = %self.plan.start,
      stop_after = %self.plan.stop_after,
      "starting run"
    );

    let backup = if self.plan.mode == RunMode::Fresh
      && self.plan.backup_before_fresh
    {
      let label = format!("backup_{}", now.format("%Y%m%d_%H%M%S"));
      let location = self
        .store
        .backup(&label)
        .map_err(|e| Error::Backup(Box::new(e)))?;
      if let Some(location) = &location {
        info!(%location, "backed up prior artifacts");
      }
      location
    } else {
      None
    };

    let mut state = RunState::default();
    let mut loader = Loader {
      store:    self.store,
      degraded: Vec::new(),
    };
    let mut stages = Vec::new();

    for stage in Stage::all() {
      let status = if stage < self.plan.start {
        info!(%stage, "skipping stage before start");
        StageStatus::Skipped
      } else if stage > self.plan.stop_after {
        StageStatus::NotReached
      } else {
        let started = Instant::now();
        info!(%stage, "stage started");
        self.execute(stage, &mut state, &mut loader, run_id, now)?;
        info!(
          %stage,
          elapsed_ms = started.elapsed().as_millis() as u64,
          "stage completed"
        );
        StageStatus::Completed
      };
      stages.push(StageOutcome {
        stage,
        status,
        degraded: std::mem::take(&mut loader.degraded),
      });
    }

    let report = match (state.summary, state.candidates, state.table_scores) {
      (Some(summary), Some(candidates), Some(table_scores)) => {
        Some(RunReport {
          summary,
          candidates: candidates.iter().cloned().collect(),
          table_scores: table_scores.0,
        })
      }
      _ => None,
    };

    let outcome = RunOutcome {
      run_id,
      backup,
      stages,
      report,
    };
    if outcome.is_degraded() {
      warn!(%run_id, "run finished with missing prerequisites");
    } else {
      info!(%run_id, "run finished");
    }
    Ok(outcome)
  }

  fn persist<A: Artifact>(&self, artifact: &A) -> Result<()> {
    self.store.save(artifact).map_err(|e| Error::Persist {
      artifact: A::KIND,
      source:   Box::new(e),
    })?;
    debug!(artifact = %A::KIND, "persisted artifact");
    Ok(())
  }

  fn execute(
    &self,
    stage: Stage,
    state: &mut RunState,
    loader: &mut Loader<'_, S>,
    run_id: Uuid,
    now: DateTime<Utc>,
  ) -> Result<()> {
    let plan = self.plan;
    let scope = &plan.scope;

    match stage {
      Stage::Discover => {
        let raw = RawCatalog::fetch(self.source, scope)
          .map_err(|e| Error::Source(Box::new(e)))?;
        info!(rows = raw.row_count(), "fetched catalog rows");
        let (inventory, stats) = Inventory::from_raw(raw, scope);
        info!(
          tables = inventory.tables.len(),
          columns = inventory.columns.len(),
          stages = inventory.stages.len(),
          deleted = stats.deleted,
          out_of_scope = stats.out_of_scope,
          defective = stats.defective,
          duplicates = stats.duplicates,
          "built inventory"
        );
        self.persist(&inventory)?;
        state.lookups = Some(MetadataLookups::new(&inventory, scope));
        state.inventory = Some(inventory);
      }

      Stage::Identify => {
        let lookups =
          loader.lookups(&mut state.inventory, &mut state.lookups, scope)?;
        let detected =
          DetectedCandidates(detect::identify(lookups, &plan.detection));
        info!(candidates = detected.0.len(), "identified candidates");
        self.persist(&detected)?;
        state.detected = Some(detected);
      }

      Stage::Profile => {
        let lookups =
          loader.lookups(&mut state.inventory, &mut state.lookups, scope)?;
        let detected = loader.require(&mut state.detected)?;
        let profiles =
          ColumnProfiles::build(&detected.0, lookups, &plan.estimates);
        info!(profiles = profiles.len(), "estimated column profiles");
        self.persist(&profiles)?;
        state.profiles = Some(profiles);
      }

      Stage::TableReadiness => {
        let lookups =
          loader.lookups(&mut state.inventory, &mut state.lookups, scope)?;
        let scores =
          TableScores(score::score_tables(lookups, &plan.readiness, now));
        info!(tables = scores.0.len(), "scored table readiness");
        self.persist(&scores)?;
        state.table_scores = Some(scores);
      }

      Stage::Score => {
        let lookups =
          loader.lookups(&mut state.inventory, &mut state.lookups, scope)?;
        let detected = loader.require(&mut state.detected)?;
        let profiles = loader.require(&mut state.profiles)?;
        let cache = loader.carried(&mut state.cache)?;

        let (mut hits, mut misses) = (0usize, 0usize);
        let mut scored = Vec::with_capacity(detected.0.len());
        for candidate in &detected.0 {
          let key = candidate.key();
          let cached = if plan.force_reanalysis {
            None
          } else {
            let fingerprint = cache::fingerprint(
              candidate,
              lookups,
              &plan.scoring,
              &plan.estimates,
            )?;
            let altered =
              lookups.table(&candidate.table).and_then(|t| t.last_altered);
            match cache.lookup(&key, altered, &fingerprint) {
              Ok(entry) => Some(entry.scores),
              Err(miss) => {
                debug!(candidate = %key, %miss, "scoring candidate");
                None
              }
            }
          };
          let scores = match cached {
            Some(scores) => {
              hits += 1;
              scores
            }
            None => {
              misses += 1;
              score::score_candidate(
                candidate,
                profiles.get(&key),
                lookups,
                &plan.scoring,
                &plan.estimates,
              )
            }
          };
          let mut candidate = candidate.clone();
          candidate.scores = Some(scores);
          scored.push(candidate);
        }

        info!(
          candidates = scored.len(),
          cached = hits,
          scored = misses,
          forced = plan.force_reanalysis,
          "scored candidates"
        );
        let scored = ScoredCandidates(scored);
        self.persist(&scored)?;
        state.scored = Some(scored);
      }

      Stage::Confirm => {
        let scored = loader.require(&mut state.scored)?;
        let profiles = loader.require(&mut state.profiles)?;
        let confirmed: Vec<_> = scored
          .0
          .iter()
          .cloned()
          .map(|mut candidate| {
            let profile = profiles.get(&candidate.key());
            confirm::apply(&mut candidate, profile, &plan.confirmation);
            candidate
          })
          .collect();
        info!(
          candidates = confirmed.len(),
          confirmed = confirmed.iter().filter(|c| c.is_confirmed).count(),
          "applied confirmation policy"
        );
        let confirmed = ConfirmedCandidates(confirmed);
        self.persist(&confirmed)?;
        state.confirmed = Some(confirmed);
      }

      Stage::SaveCache => {
        let lookups =
          loader.lookups(&mut state.inventory, &mut state.lookups, scope)?;
        let scored = loader.require(&mut state.scored)?;
        let profiles = loader.require(&mut state.profiles)?;
        let cache = loader.carried(&mut state.cache)?;

        let run_keys: Vec<_> = scored.0.iter().map(|c| c.key()).collect();
        let mut next = cache.clone();
        next.retain(|key| {
          !scope.includes(key.database()) || run_keys.contains(key)
        });

        let mut refreshed = 0usize;
        for (candidate, key) in scored.0.iter().zip(run_keys.iter()) {
          let Some(scores) = candidate.scores else {
            continue;
          };
          let fingerprint = cache::fingerprint(
            candidate,
            lookups,
            &plan.scoring,
            &plan.estimates,
          )?;
          let altered =
            lookups.table(&candidate.table).and_then(|t| t.last_altered);
          if !plan.force_reanalysis
            && cache.lookup(key, altered, &fingerprint).is_ok()
          {
            continue;
          }
          next.insert(CacheEntry {
            key: key.clone(),
            analyzed_at: now,
            source_last_altered: altered,
            fingerprint,
            scores,
            profile: profiles.get(key).cloned().unwrap_or_default(),
          });
          refreshed += 1;
        }

        info!(
          entries = next.len(),
          refreshed,
          "saved analysis cache"
        );
        self.persist(&next)?;
        *cache = next;
      }

      Stage::Merge => {
        let lookups =
          loader.lookups(&mut state.inventory, &mut state.lookups, scope)?;
        let confirmed = loader.require(&mut state.confirmed)?;
        let prior = match plan.mode {
          RunMode::Append => loader.carried(&mut state.candidates)?.clone(),
          RunMode::Fresh => CandidateSet::default(),
        };

        let (set, stats) =
          merge::merge(prior, confirmed.0.clone(), plan.mode);
        info!(
          mode = %plan.mode,
          total = set.len(),
          added = stats.added,
          replaced = stats.replaced,
          preserved = stats.preserved,
          "merged candidate set"
        );

        let history = loader.carried(&mut state.history)?;
        history.record(RunHistoryEntry {
          run_id,
          timestamp: now,
          mode: plan.mode,
          databases: lookups.databases().clone(),
          scope: scope.to_string(),
        });
        self.persist(&set)?;
        self.persist(&*history)?;
        state.candidates = Some(set);
      }

      Stage::Publish => {
        let set = loader.require(&mut state.candidates)?;
        let scores = loader.require(&mut state.table_scores)?;
        let confirmed = ConfirmedSet(set.confirmed().cloned().collect());
        let summary = RunSummary::build(set, &scores.0, plan.mode, now);
        info!(
          candidates = summary.total_candidates,
          confirmed = summary.confirmed_candidates,
          tables = summary.tables_scored,
          "published results"
        );
        self.persist(&confirmed)?;
        self.persist(&summary)?;
        state.summary = Some(summary);
      }
    }
    Ok(())
  }
}
