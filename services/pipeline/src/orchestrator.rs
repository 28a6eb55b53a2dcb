//! Sequencing of the stages of one (experiment, date) run.
//!
//! The run is a small state machine. [`PipelineState::next`] is the pure
//! transition function; disabled optional stages are simply never entered.
//! A required stage failing moves the run to `Failed(stage)` and stops it; an
//! optional stage failing is recorded and the sequence continues. Nothing is
//! retried here.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use ocean_common::{PipelineError, StagePaths};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::{Destination, StageFlags};
use crate::metrics;
use crate::stages::{stage_for, RunContext, Stage, StageKind};

/// Which stages a run enters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagePlan {
    pub draw_observations: bool,
    pub validation: bool,
    pub lagrangian: bool,
    pub dissemination: bool,
}

impl StagePlan {
    pub fn from_flags(flags: &StageFlags) -> Self {
        Self {
            draw_observations: flags.draw_l3,
            validation: flags.make_alongtrack_rmse,
            lagrangian: flags.make_lagrangian_diags,
            dissemination: flags.destination != Destination::None,
        }
    }

    /// Every stage enabled.
    pub fn full() -> Self {
        Self {
            draw_observations: true,
            validation: true,
            lagrangian: true,
            dissemination: true,
        }
    }

    /// Required stages only.
    pub fn required_only() -> Self {
        Self {
            draw_observations: false,
            validation: false,
            lagrangian: false,
            dissemination: false,
        }
    }

    pub fn is_enabled(&self, kind: StageKind) -> bool {
        match kind {
            StageKind::DrawObservations => self.draw_observations,
            StageKind::Validation => self.validation,
            StageKind::Lagrangian => self.lagrangian,
            StageKind::Dissemination => self.dissemination,
            _ => true,
        }
    }

    /// Enabled stages in execution order.
    pub fn stages(&self) -> Vec<StageKind> {
        StageKind::ALL.into_iter().filter(|k| self.is_enabled(*k)).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Pending,
    Downloading,
    BoundaryFilling,
    Assimilating,
    DrawingObservations,
    PostProcessing,
    Validating,
    LagrangianDiagnostics,
    Disseminating,
    Done,
    Failed(StageKind),
}

impl PipelineState {
    pub fn running(kind: StageKind) -> Self {
        match kind {
            StageKind::Download => PipelineState::Downloading,
            StageKind::BoundaryFill => PipelineState::BoundaryFilling,
            StageKind::Assimilation => PipelineState::Assimilating,
            StageKind::DrawObservations => PipelineState::DrawingObservations,
            StageKind::PostProcess => PipelineState::PostProcessing,
            StageKind::Validation => PipelineState::Validating,
            StageKind::Lagrangian => PipelineState::LagrangianDiagnostics,
            StageKind::Dissemination => PipelineState::Disseminating,
        }
    }

    /// The stage running in this state.
    pub fn stage(&self) -> Option<StageKind> {
        StageKind::ALL.into_iter().find(|k| Self::running(*k) == *self)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed(_))
    }

    /// State after the current one completed successfully. Terminal states
    /// map to themselves.
    pub fn next(&self, plan: &StagePlan) -> PipelineState {
        let start = match self {
            PipelineState::Done | PipelineState::Failed(_) => return *self,
            PipelineState::Pending => 0,
            running => match running.stage().and_then(|k| StageKind::ALL.iter().position(|s| *s == k)) {
                Some(pos) => pos + 1,
                None => return PipelineState::Done,
            },
        };
        StageKind::ALL
            .into_iter()
            .skip(start)
            .find(|k| plan.is_enabled(*k))
            .map_or(PipelineState::Done, Self::running)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    Completed,
    Skipped,
    Failed(String),
}

/// A stage failure, identifying the run and the resource to look at.
#[derive(Debug, Error)]
#[error("stage {stage} failed for experiment {experiment} on {date}: {source}")]
pub struct StageFailure {
    pub stage: StageKind,
    pub experiment: String,
    pub date: NaiveDate,
    #[source]
    pub source: PipelineError,
}

impl StageFailure {
    pub fn resource_path(&self) -> Option<&std::path::PathBuf> {
        self.source.resource_path()
    }
}

#[derive(Debug)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub experiment: String,
    pub date: NaiveDate,
    pub visited: Vec<PipelineState>,
    /// One entry per stage, in execution order.
    pub outcomes: Vec<(StageKind, StageOutcome)>,
    /// The failure that stopped the run, if any.
    pub failure: Option<StageFailure>,
}

impl RunSummary {
    pub fn final_state(&self) -> PipelineState {
        self.visited.last().copied().unwrap_or(PipelineState::Pending)
    }

    pub fn outcome(&self, kind: StageKind) -> Option<&StageOutcome> {
        self.outcomes.iter().find(|(k, _)| *k == kind).map(|(_, o)| o)
    }

    /// Optional stages that failed without stopping the run.
    pub fn optional_failures(&self) -> Vec<StageKind> {
        self.outcomes
            .iter()
            .filter(|(k, o)| !k.is_required() && matches!(o, StageOutcome::Failed(_)))
            .map(|(k, _)| *k)
            .collect()
    }

    /// `0` success, `1` the run stopped on a failure, `2` the run completed
    /// but an optional stage failed.
    pub fn exit_code(&self) -> i32 {
        if self.failure.is_some() {
            1
        } else if !self.optional_failures().is_empty() {
            2
        } else {
            0
        }
    }

    pub fn into_result(mut self) -> Result<RunSummary, StageFailure> {
        match self.failure.take() {
            Some(failure) => Err(failure),
            None => Ok(self),
        }
    }
}

pub struct Orchestrator {
    ctx: RunContext,
    plan: StagePlan,
    stages: HashMap<StageKind, Box<dyn Stage>>,
}

impl Orchestrator {
    /// Orchestrator with the production stages and the configured plan.
    pub fn new(ctx: RunContext) -> Self {
        let plan = StagePlan::from_flags(&ctx.config.stages);
        let stages = StageKind::ALL.into_iter().map(|k| (k, stage_for(k))).collect();
        Self { ctx, plan, stages }
    }

    pub fn with_plan(mut self, plan: StagePlan) -> Self {
        self.plan = plan;
        self
    }

    /// Replace the implementation of one stage.
    pub fn with_stage(mut self, stage: Box<dyn Stage>) -> Self {
        self.stages.insert(stage.kind(), stage);
        self
    }

    pub fn plan(&self) -> &StagePlan {
        &self.plan
    }

    pub fn paths(&self) -> &StagePaths {
        &self.ctx.paths
    }

    /// Run the stage sequence to a terminal state.
    pub async fn execute(&self) -> RunSummary {
        let config = &self.ctx.config;
        let span = info_span!(
            "run",
            run_id = %self.ctx.run_id,
            experiment = %config.experiment,
            date = %config.window.final_date,
        );
        self.execute_inner().instrument(span).await
    }

    async fn execute_inner(&self) -> RunSummary {
        let config = &self.ctx.config;
        info!(
            init_date = %config.window.init_date,
            days = config.window.day_count(),
            bbox = %config.bbox.to_arg_string(),
            stages = ?self.plan.stages().iter().map(StageKind::as_str).collect::<Vec<_>>(),
            "Starting run"
        );

        let mut state = PipelineState::Pending;
        let mut visited = vec![state];
        let mut results: HashMap<StageKind, StageOutcome> = HashMap::new();
        let mut failure = None;

        loop {
            state = state.next(&self.plan);
            visited.push(state);
            let Some(kind) = state.stage() else {
                break;
            };

            match self.run_stage(kind).await {
                Ok(()) => {
                    results.insert(kind, StageOutcome::Completed);
                }
                Err(e) if kind.is_required() || matches!(e, PipelineError::Cancelled) => {
                    error!(stage = kind.as_str(), kind = e.kind(), error = %e, "Run stopped");
                    results.insert(kind, StageOutcome::Failed(e.to_string()));
                    visited.push(PipelineState::Failed(kind));
                    failure = Some(StageFailure {
                        stage: kind,
                        experiment: config.experiment.clone(),
                        date: config.window.final_date,
                        source: e,
                    });
                    break;
                }
                Err(e) => {
                    warn!(stage = kind.as_str(), kind = e.kind(), error = %e, "Optional stage failed, continuing");
                    results.insert(kind, StageOutcome::Failed(e.to_string()));
                }
            }
        }

        let outcomes = StageKind::ALL
            .into_iter()
            .map(|k| (k, results.remove(&k).unwrap_or(StageOutcome::Skipped)))
            .collect();
        let summary = RunSummary {
            run_id: self.ctx.run_id,
            experiment: config.experiment.clone(),
            date: config.window.final_date,
            visited,
            outcomes,
            failure,
        };
        info!(
            final_state = ?summary.final_state(),
            optional_failures = summary.optional_failures().len(),
            "Run finished"
        );
        summary
    }

    /// One stage under the per-stage timeout and the run's cancellation token.
    async fn run_stage(&self, kind: StageKind) -> Result<(), PipelineError> {
        let stage = self
            .stages
            .get(&kind)
            .ok_or_else(|| PipelineError::Config(format!("no implementation for stage {}", kind)))?;
        let timeout = self.ctx.config.stage_timeout;
        let cancel = self.ctx.cancel.clone();
        let started = Instant::now();

        let result = async {
            info!("Stage started");
            let work = with_timeout(kind, timeout, stage.run(&self.ctx));
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(PipelineError::Cancelled),
                result = work => result,
            }
        }
        .instrument(info_span!("stage", stage = kind.as_str()))
        .await;

        let elapsed = started.elapsed();
        metrics::record_stage_duration(kind, elapsed);
        match &result {
            Ok(()) => info!(stage = kind.as_str(), elapsed_ms = elapsed.as_millis() as u64, "Stage completed"),
            Err(_) => metrics::record_stage_failure(kind),
        }
        result
    }
}

async fn with_timeout<F>(kind: StageKind, timeout: Option<Duration>, work: F) -> Result<(), PipelineError>
where
    F: std::future::Future<Output = Result<(), PipelineError>>,
{
    match timeout {
        Some(after) => tokio::time::timeout(after, work).await.unwrap_or_else(|_| {
            Err(PipelineError::Timeout {
                stage: kind.as_str().to_string(),
                after,
            })
        }),
        None => work.await,
    }
}
