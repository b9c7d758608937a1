//! Translation of tasks, prices and caps into optimisation models.
//!
//! All three variants share the same core: one variable `x[task, slot]` in
//! `[0, cap]` per slot of each task window and one demand row
//! `Σ x·slot_hours = demand` per task. They differ in the aggregate variables
//! they add on top and in the objective:
//!
//! | Variant        | Extra variables             | Objective                         |
//! |----------------|-----------------------------|-----------------------------------|
//! | price-weighted | none                        | `Σ price·slot_hours·x`            |
//! | stability      | `X[s]`, `cost[s]`, `diff[s]`| `α·Σ cost + β·Σ diff`             |
//! | congestion     | `X[s]`                      | `Σ 0.5·curvature·X²`              |
//!
//! Every task is validated before the first variable is created, so a bad
//! task never yields a half-built model.

use super::config::{CongestionCurve, StabilityMetric, StabilityWeights};
use super::error::BuildError;
use super::horizon::Horizon;
use super::prices::{GroupCaps, PriceCurve};
use super::task::{Task, TaskKey, TaskSet};
use crate::model::{LinearExpr, Model, ModelBuilder, QuadraticTerm, Relation, VarId};

/// Objective variant a model was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScheduleKind {
    PriceWeighted,
    Stability,
    Congestion,
}

impl std::fmt::Display for ScheduleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ScheduleKind::PriceWeighted => "price-weighted",
            ScheduleKind::Stability => "stability",
            ScheduleKind::Congestion => "congestion",
        };
        f.write_str(name)
    }
}

/// How the cost of a slot is derived from its aggregate usage.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotPricing {
    /// `price × usage × slot_hours`.
    Linear(PriceCurve),
    /// `0.5 × curvature × usage²`.
    Congestion(CongestionCurve),
}

/// Allocation variables of one task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskVars {
    pub key: TaskKey,
    pub ready: usize,
    pub cap: f64,
    /// One variable per slot of `[ready, deadline]`.
    pub vars: Vec<VarId>,
}

impl TaskVars {
    pub fn var(&self, slot: usize) -> Option<VarId> {
        slot.checked_sub(self.ready)
            .and_then(|offset| self.vars.get(offset))
            .copied()
    }

    pub fn slots(&self) -> impl Iterator<Item = (usize, VarId)> + '_ {
        self.vars
            .iter()
            .enumerate()
            .map(move |(offset, &var)| (self.ready + offset, var))
    }
}

/// Where each domain quantity lives in the model's variable vector.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VarLayout {
    tasks: Vec<TaskVars>,
    usage: Vec<VarId>,
    cost: Vec<VarId>,
    diff: Vec<VarId>,
}

impl VarLayout {
    /// Tasks in agent order, then task order.
    pub fn tasks(&self) -> &[TaskVars] {
        &self.tasks
    }

    pub fn task(&self, key: &TaskKey) -> Option<&TaskVars> {
        self.tasks.iter().find(|t| &t.key == key)
    }

    /// `x[task, slot]`, or `None` outside the task window.
    pub fn allocation(&self, key: &TaskKey, slot: usize) -> Option<VarId> {
        self.task(key)?.var(slot)
    }

    /// `X[slot]`; empty for the price-weighted variant.
    pub fn usage(&self) -> &[VarId] {
        &self.usage
    }

    /// `cost[slot]`; stability variant only.
    pub fn cost(&self) -> &[VarId] {
        &self.cost
    }

    /// `diff[slot]` for `slot < H - 1`; stability variant only.
    pub fn diff(&self) -> &[VarId] {
        &self.diff
    }

    fn active(&self, slot: usize) -> impl Iterator<Item = (&TaskVars, VarId)> + '_ {
        self.tasks
            .iter()
            .filter_map(move |t| t.var(slot).map(|v| (t, v)))
    }
}

/// A built model together with the information needed to read it back.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleModel {
    pub model: Model,
    pub layout: VarLayout,
    pub kind: ScheduleKind,
    pub horizon: Horizon,
    pub pricing: SlotPricing,
}

/// Per-agent price-weighted model.
pub fn build_price_weighted(
    agent: &str,
    tasks: &[Task],
    horizon: &Horizon,
    prices: &PriceCurve,
    caps: &GroupCaps,
) -> Result<ScheduleModel, BuildError> {
    prices.check(horizon)?;
    caps.check(horizon)?;
    check_tasks(agent, tasks, horizon)?;

    let mut asm = Assembler::new(horizon);
    asm.add_tasks(agent, tasks, Some(prices))?;
    asm.add_group_caps(caps)?;
    asm.finish(ScheduleKind::PriceWeighted, SlotPricing::Linear(prices.clone()))
}

/// Joint model trading price against temporal variation.
pub fn build_stability(
    tasks: &TaskSet,
    horizon: &Horizon,
    prices: &PriceCurve,
    caps: &GroupCaps,
    weights: &StabilityWeights,
) -> Result<ScheduleModel, BuildError> {
    prices.check(horizon)?;
    caps.check(horizon)?;
    weights.check()?;
    for (agent, list) in tasks.agents() {
        check_tasks(agent, list, horizon)?;
    }

    let mut asm = Assembler::new(horizon);
    for (agent, list) in tasks.agents() {
        asm.add_tasks(agent, list, None)?;
    }
    let usage_bounds = asm.add_usage(None)?;
    let cost_bounds = asm.add_costs(prices, weights.alpha)?;
    let (metric, bounds) = match weights.metric {
        StabilityMetric::Usage => (asm.layout.usage.clone(), usage_bounds),
        StabilityMetric::Cost => (asm.layout.cost.clone(), cost_bounds),
    };
    asm.add_diffs(&metric, &bounds, weights.beta)?;
    asm.add_group_caps(caps)?;
    asm.finish(ScheduleKind::Stability, SlotPricing::Linear(prices.clone()))
}

/// Joint model with quadratic congestion pricing on aggregate usage.
pub fn build_congestion(
    tasks: &TaskSet,
    horizon: &Horizon,
    caps: &GroupCaps,
    curve: &CongestionCurve,
) -> Result<ScheduleModel, BuildError> {
    caps.check(horizon)?;
    curve.check()?;
    for (agent, list) in tasks.agents() {
        check_tasks(agent, list, horizon)?;
    }

    let mut asm = Assembler::new(horizon);
    for (agent, list) in tasks.agents() {
        asm.add_tasks(agent, list, None)?;
    }
    asm.add_usage(Some(curve.curvature))?;
    asm.add_group_caps(caps)?;
    asm.finish(ScheduleKind::Congestion, SlotPricing::Congestion(*curve))
}

fn check_tasks(agent: &str, tasks: &[Task], horizon: &Horizon) -> Result<(), BuildError> {
    for (index, task) in tasks.iter().enumerate() {
        task.check(horizon)
            .map_err(|reason| BuildError::InfeasibleTaskSpec {
                agent: agent.to_string(),
                task: index,
                reason,
            })?;
    }
    Ok(())
}

/// Incremental model assembly shared by the three variants.
struct Assembler<'h> {
    horizon: &'h Horizon,
    builder: ModelBuilder,
    layout: VarLayout,
    linear: LinearExpr,
    quadratic: QuadraticTerm,
}

impl<'h> Assembler<'h> {
    fn new(horizon: &'h Horizon) -> Self {
        Self {
            horizon,
            builder: ModelBuilder::new(),
            layout: VarLayout::default(),
            linear: LinearExpr::new(),
            quadratic: QuadraticTerm::new(),
        }
    }

    /// Allocation variables and demand rows; with `prices`, also the
    /// price-weighted objective terms.
    fn add_tasks(
        &mut self,
        agent: &str,
        tasks: &[Task],
        prices: Option<&PriceCurve>,
    ) -> Result<(), BuildError> {
        let slot_hours = self.horizon.slot_hours();
        for (index, task) in tasks.iter().enumerate() {
            let mut vars = Vec::with_capacity(task.window_len());
            let mut demand = LinearExpr::new();
            for slot in task.window() {
                let var = self.builder.add_variable(0.0, task.cap)?;
                if let Some(prices) = prices {
                    self.linear.add_term(var, prices[slot] * slot_hours);
                }
                demand.add_term(var, slot_hours);
                vars.push(var);
            }
            self.builder
                .add_constraint(demand, Relation::Eq, task.demand)?;
            self.layout.tasks.push(TaskVars {
                key: TaskKey::new(agent, index),
                ready: task.ready,
                cap: task.cap,
                vars,
            });
        }
        Ok(())
    }

    /// `Σ x[task, slot] <= limit` over each agent's active tasks.
    fn add_group_caps(&mut self, caps: &GroupCaps) -> Result<(), BuildError> {
        if caps.is_empty() {
            return Ok(());
        }
        let mut agents: Vec<&str> = self
            .layout
            .tasks
            .iter()
            .map(|t| t.key.agent.as_str())
            .collect();
        agents.dedup();

        let mut rows = Vec::new();
        for agent in agents {
            for (slot, limit) in caps.iter() {
                let expr: LinearExpr = self
                    .layout
                    .active(slot)
                    .filter(|(t, _)| t.key.agent == agent)
                    .map(|(_, var)| (var, 1.0))
                    .collect();
                if !expr.is_empty() {
                    rows.push((expr, limit));
                }
            }
        }
        for (expr, limit) in rows {
            self.builder.add_constraint(expr, Relation::Le, limit)?;
        }
        Ok(())
    }

    /// `X[slot] = Σ x[task, slot]`, bounded by the sum of active caps.
    /// Returns the bounds of each `X`.
    fn add_usage(&mut self, curvature: Option<f64>) -> Result<Vec<(f64, f64)>, BuildError> {
        let mut bounds = Vec::with_capacity(self.horizon.slots());
        for slot in 0..self.horizon.slots() {
            let (mut link, upper) = self.layout.active(slot).fold(
                (LinearExpr::new(), 0.0),
                |(mut expr, upper), (t, var)| {
                    expr.add_term(var, -1.0);
                    (expr, upper + t.cap)
                },
            );
            let usage = self.builder.add_variable(0.0, upper)?;
            if let Some(q) = curvature {
                self.quadratic.set(usage, q);
            }
            link.add_term(usage, 1.0);
            self.builder.add_constraint(link, Relation::Eq, 0.0)?;
            self.layout.usage.push(usage);
            bounds.push((0.0, upper));
        }
        Ok(bounds)
    }

    /// `cost[slot] = price·slot_hours·Σ x[task, slot]`, weighted by `alpha`
    /// in the objective. Returns the bounds of each `cost`.
    fn add_costs(
        &mut self,
        prices: &PriceCurve,
        alpha: f64,
    ) -> Result<Vec<(f64, f64)>, BuildError> {
        let slot_hours = self.horizon.slot_hours();
        let mut bounds = Vec::with_capacity(self.horizon.slots());
        for slot in 0..self.horizon.slots() {
            let rate = prices[slot] * slot_hours;
            let mut link = LinearExpr::new();
            let (mut lower, mut upper) = (0.0_f64, 0.0_f64);
            for (t, var) in self.layout.active(slot) {
                link.add_term(var, -rate);
                lower += (rate * t.cap).min(0.0);
                upper += (rate * t.cap).max(0.0);
            }
            let cost = self.builder.add_variable(lower, upper)?;
            self.linear.add_term(cost, alpha);
            link.add_term(cost, 1.0);
            self.builder.add_constraint(link, Relation::Eq, 0.0)?;
            self.layout.cost.push(cost);
            bounds.push((lower, upper));
        }
        Ok(bounds)
    }

    /// `diff[s] >= |m[s+1] - m[s]|`, weighted by `beta` in the objective.
    fn add_diffs(
        &mut self,
        metric: &[VarId],
        bounds: &[(f64, f64)],
        beta: f64,
    ) -> Result<(), BuildError> {
        for s in 0..metric.len().saturating_sub(1) {
            let (lo_a, hi_a) = bounds[s];
            let (lo_b, hi_b) = bounds[s + 1];
            let width = hi_a.max(hi_b) - lo_a.min(lo_b);
            let diff = self.builder.add_variable(0.0, width)?;
            self.linear.add_term(diff, beta);

            let rise = LinearExpr::new()
                .with_term(diff, 1.0)
                .with_term(metric[s + 1], -1.0)
                .with_term(metric[s], 1.0);
            let fall = LinearExpr::new()
                .with_term(diff, 1.0)
                .with_term(metric[s], -1.0)
                .with_term(metric[s + 1], 1.0);
            self.builder.add_constraint(rise, Relation::Ge, 0.0)?;
            self.builder.add_constraint(fall, Relation::Ge, 0.0)?;
            self.layout.diff.push(diff);
        }
        Ok(())
    }

    fn finish(
        mut self,
        kind: ScheduleKind,
        pricing: SlotPricing,
    ) -> Result<ScheduleModel, BuildError> {
        let quadratic = (!self.quadratic.is_empty()).then_some(self.quadratic);
        self.builder.set_objective(self.linear, quadratic)?;
        let model = self.builder.build();
        tracing::debug!(
            component = "scheduling",
            operation = "build",
            kind = %kind,
            tasks = self.layout.tasks.len(),
            variables = model.num_variables(),
            constraints = model.num_constraints(),
            "Schedule model built"
        );
        Ok(ScheduleModel {
            model,
            layout: self.layout,
            kind,
            horizon: *self.horizon,
            pricing,
        })
    }
}
