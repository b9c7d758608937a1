//! Reading solved models back into domain terms.
//!
//! A [`Schedule`] is produced only from an optimal solve. Every other status
//! is surfaced as [`ScheduleOutcome::NotOptimal`] with no partial allocation,
//! so a failed solve can never be mistaken for an all-zero plan.

use std::collections::BTreeMap;

use crate::scheduling::{AgentId, Horizon, ScheduleKind, ScheduleModel, SlotPricing, TaskKey};
use crate::solver::{self, Solution, SolveStatus, SolverOptions};
use crate::Id;

#[cfg(test)]
mod tests;

/// Distance from a bound under which reported values are moved onto it.
pub const SNAP_TOLERANCE: f64 = 1e-9;

/// Power assigned to one task over its window.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TaskAllocation {
    pub key: TaskKey,
    pub ready: usize,
    /// One value per slot of `[ready, deadline]`.
    pub values: Vec<f64>,
}

impl TaskAllocation {
    pub fn deadline(&self) -> usize {
        self.ready + self.values.len().saturating_sub(1)
    }

    /// Power in `slot`; zero outside the window.
    pub fn get(&self, slot: usize) -> f64 {
        slot.checked_sub(self.ready)
            .and_then(|offset| self.values.get(offset))
            .copied()
            .unwrap_or(0.0)
    }

    /// Sum of power over the window.
    pub fn total_power(&self) -> f64 {
        self.values.iter().sum()
    }
}

/// Per-task, per-slot power allocation.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Allocation {
    /// Sorted by key.
    tasks: Vec<TaskAllocation>,
}

impl Allocation {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn task(&self, key: &TaskKey) -> Option<&TaskAllocation> {
        self.tasks
            .binary_search_by(|t| t.key.cmp(key))
            .ok()
            .map(|i| &self.tasks[i])
    }

    /// Power of `key` in `slot`; zero for unknown tasks or slots outside the
    /// window.
    pub fn get(&self, key: &TaskKey, slot: usize) -> f64 {
        self.task(key).map_or(0.0, |t| t.get(slot))
    }

    pub fn iter(&self) -> impl Iterator<Item = &TaskAllocation> {
        self.tasks.iter()
    }

    /// Dense `tasks × slots` matrix in key order.
    pub fn to_matrix(&self, slots: usize) -> Vec<Vec<f64>> {
        self.tasks
            .iter()
            .map(|t| (0..slots).map(|s| t.get(s)).collect())
            .collect()
    }
}

/// Optimal plan for one model.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Schedule {
    id: Id,
    kind: ScheduleKind,
    horizon: Horizon,
    allocation: Allocation,
    usage: Vec<f64>,
    agent_usage: BTreeMap<AgentId, Vec<f64>>,
    slot_costs: Vec<f64>,
    total_cost: f64,
    objective_value: f64,
    iterations: usize,
}

impl Schedule {
    /// Unique run identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> ScheduleKind {
        self.kind
    }

    pub fn horizon(&self) -> &Horizon {
        &self.horizon
    }

    pub fn allocation(&self) -> &Allocation {
        &self.allocation
    }

    /// Aggregate power per slot over all tasks.
    pub fn usage(&self) -> &[f64] {
        &self.usage
    }

    pub fn agent_usage(&self, agent: &str) -> Option<&[f64]> {
        self.agent_usage.get(agent).map(Vec::as_slice)
    }

    pub fn agents(&self) -> impl Iterator<Item = (&AgentId, &[f64])> {
        self.agent_usage.iter().map(|(a, u)| (a, u.as_slice()))
    }

    pub fn slot_costs(&self) -> &[f64] {
        &self.slot_costs
    }

    pub fn total_cost(&self) -> f64 {
        self.total_cost
    }

    /// Objective of the solved model re-evaluated at the reported values.
    pub fn objective_value(&self) -> f64 {
        self.objective_value
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Energy delivered to `key` over its window.
    pub fn delivered(&self, key: &TaskKey) -> f64 {
        self.allocation
            .task(key)
            .map_or(0.0, |t| t.total_power() * self.horizon.slot_hours())
    }

    /// Average price paid per unit of energy in each slot; zero for idle slots.
    pub fn unit_prices(&self) -> Vec<f64> {
        let slot_hours = self.horizon.slot_hours();
        self.slot_costs
            .iter()
            .zip(&self.usage)
            .map(|(&cost, &usage)| {
                if usage > SNAP_TOLERANCE {
                    cost / (usage * slot_hours)
                } else {
                    0.0
                }
            })
            .collect()
    }
}

/// Result of solving one schedule model.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScheduleOutcome {
    Optimal(Schedule),
    NotOptimal(SolveStatus),
}

impl ScheduleOutcome {
    pub fn status(&self) -> SolveStatus {
        match self {
            ScheduleOutcome::Optimal(_) => SolveStatus::Optimal,
            ScheduleOutcome::NotOptimal(status) => *status,
        }
    }

    pub fn is_optimal(&self) -> bool {
        matches!(self, ScheduleOutcome::Optimal(_))
    }

    pub fn schedule(&self) -> Option<&Schedule> {
        match self {
            ScheduleOutcome::Optimal(schedule) => Some(schedule),
            ScheduleOutcome::NotOptimal(_) => None,
        }
    }

    pub fn into_schedule(self) -> Option<Schedule> {
        match self {
            ScheduleOutcome::Optimal(schedule) => Some(schedule),
            ScheduleOutcome::NotOptimal(_) => None,
        }
    }
}

impl ScheduleModel {
    /// Solves the model and extracts the schedule.
    pub fn solve(&self, options: &SolverOptions) -> ScheduleOutcome {
        let solution = solver::solve(&self.model, options);
        self.extract(&solution)
    }

    /// Maps a solution of this model back to tasks and slots.
    pub fn extract(&self, solution: &Solution) -> ScheduleOutcome {
        if !solution.is_optimal() || solution.values.len() != self.model.num_variables() {
            return ScheduleOutcome::NotOptimal(solution.status);
        }

        let values: Vec<f64> = self
            .model
            .variables()
            .iter()
            .zip(&solution.values)
            .map(|(var, &v)| var.snap(v, SNAP_TOLERANCE))
            .collect();

        let slots = self.horizon.slots();
        let mut usage = vec![0.0; slots];
        let mut agent_usage: BTreeMap<AgentId, Vec<f64>> = BTreeMap::new();
        let mut tasks = Vec::with_capacity(self.layout.tasks().len());
        for task in self.layout.tasks() {
            let per_agent = agent_usage
                .entry(task.key.agent.clone())
                .or_insert_with(|| vec![0.0; slots]);
            let mut power = Vec::with_capacity(task.vars.len());
            for (slot, var) in task.slots() {
                let v = values[var.index()];
                usage[slot] += v;
                per_agent[slot] += v;
                power.push(v);
            }
            tasks.push(TaskAllocation {
                key: task.key.clone(),
                ready: task.ready,
                values: power,
            });
        }
        tasks.sort_by(|a, b| a.key.cmp(&b.key));

        let slot_hours = self.horizon.slot_hours();
        let slot_costs: Vec<f64> = match &self.pricing {
            SlotPricing::Linear(prices) => usage
                .iter()
                .enumerate()
                .map(|(s, &u)| prices[s] * u * slot_hours)
                .collect(),
            SlotPricing::Congestion(curve) => usage.iter().map(|&u| curve.slot_cost(u)).collect(),
        };
        let total_cost = slot_costs.iter().sum();
        let objective_value = self.model.evaluate(&values);

        let schedule = Schedule {
            id: crate::generate_id(),
            kind: self.kind,
            horizon: self.horizon,
            allocation: Allocation { tasks },
            usage,
            agent_usage,
            slot_costs,
            total_cost,
            objective_value,
            iterations: solution.iterations,
        };
        tracing::debug!(
            component = "schedule",
            id = %schedule.id,
            kind = %schedule.kind,
            total_cost,
            objective_value,
            "Schedule extracted"
        );
        ScheduleOutcome::Optimal(schedule)
    }
}

/// Price-weighted results of independent per-agent solves.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PerAgentOutcome {
    outcomes: BTreeMap<AgentId, ScheduleOutcome>,
}

impl PerAgentOutcome {
    pub(crate) fn new(outcomes: BTreeMap<AgentId, ScheduleOutcome>) -> Self {
        Self { outcomes }
    }

    pub fn get(&self, agent: &str) -> Option<&ScheduleOutcome> {
        self.outcomes.get(agent)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AgentId, &ScheduleOutcome)> {
        self.outcomes.iter()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn all_optimal(&self) -> bool {
        self.outcomes.values().all(ScheduleOutcome::is_optimal)
    }

    /// Agents whose solve did not reach optimality.
    pub fn failures(&self) -> Vec<(&AgentId, SolveStatus)> {
        self.outcomes
            .iter()
            .filter(|(_, o)| !o.is_optimal())
            .map(|(a, o)| (a, o.status()))
            .collect()
    }

    /// Sum of per-agent costs; `None` unless every agent solved optimally.
    pub fn total_cost(&self) -> Option<f64> {
        self.outcomes
            .values()
            .try_fold(0.0, |acc, o| o.schedule().map(|s| acc + s.total_cost()))
    }

    /// Aggregate usage over all agents; `None` unless every agent solved
    /// optimally.
    pub fn usage(&self) -> Option<Vec<f64>> {
        let mut total: Option<Vec<f64>> = None;
        for outcome in self.outcomes.values() {
            let usage = outcome.schedule()?.usage();
            let acc = total.get_or_insert_with(|| vec![0.0; usage.len()]);
            for (a, u) in acc.iter_mut().zip(usage) {
                *a += u;
            }
        }
        total
    }
}
