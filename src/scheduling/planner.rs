//! End-to-end orchestration: validate, build, solve, extract.

use std::collections::BTreeMap;

use super::builder::{build_congestion, build_price_weighted, build_stability, ScheduleModel};
use super::config::PlannerConfig;
use super::error::BuildError;
use super::task::{AgentId, TaskSet};
use crate::schedule::{PerAgentOutcome, ScheduleOutcome};
use crate::solver::SolverOptions;

/// Runs the three objective variants over a task set.
#[derive(Debug, Clone, Default)]
pub struct Planner {
    config: PlannerConfig,
}

impl Planner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// One independent price-weighted solve per agent.
    ///
    /// Every agent's model is validated and built before the first solve, so
    /// a bad task aborts the run without any solver work.
    pub fn plan_price_weighted(&self, tasks: &TaskSet) -> Result<PerAgentOutcome, BuildError> {
        self.config.check()?;
        let cfg = &self.config;
        let models = tasks
            .agents()
            .map(|(agent, list)| {
                build_price_weighted(agent, list, &cfg.horizon, &cfg.prices, &cfg.group_caps)
                    .map(|model| (agent.clone(), model))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let outcomes = if cfg.parallel && models.len() > 1 {
            solve_parallel(&models, &cfg.solver, self.worker_count(models.len()))
        } else {
            models
                .iter()
                .map(|(agent, model)| (agent.clone(), model.solve(&cfg.solver)))
                .collect()
        };

        for (agent, outcome) in &outcomes {
            tracing::info!(
                component = "planner",
                kind = "price-weighted",
                agent = %agent,
                status = %outcome.status(),
                cost = outcome.schedule().map(|s| s.total_cost()),
                "Agent solved"
            );
        }
        Ok(PerAgentOutcome::new(outcomes))
    }

    /// Single joint solve trading price against temporal variation.
    pub fn plan_stability(&self, tasks: &TaskSet) -> Result<ScheduleOutcome, BuildError> {
        self.config.check()?;
        let cfg = &self.config;
        let model = build_stability(
            tasks,
            &cfg.horizon,
            &cfg.prices,
            &cfg.group_caps,
            &cfg.stability,
        )?;
        Ok(self.solve_joint(&model))
    }

    /// Single joint solve under quadratic congestion pricing.
    pub fn plan_congestion(&self, tasks: &TaskSet) -> Result<ScheduleOutcome, BuildError> {
        self.config.check()?;
        let cfg = &self.config;
        let model = build_congestion(tasks, &cfg.horizon, &cfg.group_caps, &cfg.congestion)?;
        Ok(self.solve_joint(&model))
    }

    fn solve_joint(&self, model: &ScheduleModel) -> ScheduleOutcome {
        let outcome = model.solve(&self.config.solver);
        tracing::info!(
            component = "planner",
            kind = %model.kind,
            status = %outcome.status(),
            cost = outcome.schedule().map(|s| s.total_cost()),
            "Joint solve finished"
        );
        outcome
    }

    fn worker_count(&self, jobs: usize) -> usize {
        self.config
            .workers
            .or_else(|| std::thread::available_parallelism().ok().map(|n| n.get()))
            .unwrap_or(1)
            .clamp(1, jobs.max(1))
    }
}

/// Solves per-agent models on scoped worker threads. Each worker owns a
/// contiguous batch of agents; results are merged after every worker joins.
fn solve_parallel(
    models: &[(AgentId, ScheduleModel)],
    options: &SolverOptions,
    workers: usize,
) -> BTreeMap<AgentId, ScheduleOutcome> {
    let batch_size = models.len().div_ceil(workers);
    std::thread::scope(|scope| {
        let handles: Vec<_> = models
            .chunks(batch_size)
            .map(|batch| {
                scope.spawn(move || {
                    batch
                        .iter()
                        .map(|(agent, model)| (agent.clone(), model.solve(options)))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut outcomes = BTreeMap::new();
        for handle in handles {
            match handle.join() {
                Ok(batch) => outcomes.extend(batch),
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }
        outcomes
    })
}
