//! Configuration for the planner and the objective variants.

use super::error::BuildError;
use super::horizon::Horizon;
use super::prices::{GroupCaps, PriceCurve};
use crate::scenario;
use crate::solver::SolverOptions;

/// Quantity whose slot-to-slot variation the stability objective penalises.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StabilityMetric {
    /// Aggregate power `X[slot]`.
    #[default]
    Usage,
    /// Per-slot cost `price × X[slot] × slot_hours`.
    Cost,
}

/// Weights of the stability objective `α·Σ cost + β·Σ |m[s+1] - m[s]|`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StabilityWeights {
    pub alpha: f64,
    pub beta: f64,
    pub metric: StabilityMetric,
}

impl StabilityWeights {
    pub fn new(alpha: f64, beta: f64) -> Self {
        Self {
            alpha,
            beta,
            metric: StabilityMetric::Usage,
        }
    }

    pub fn with_metric(mut self, metric: StabilityMetric) -> Self {
        self.metric = metric;
        self
    }

    pub(crate) fn check(&self) -> Result<(), BuildError> {
        check_weight("alpha", self.alpha)?;
        check_weight("beta", self.beta)
    }
}

impl Default for StabilityWeights {
    /// Pure smoothing, no price term.
    fn default() -> Self {
        Self::new(0.0, 1.0)
    }
}

/// Quadratic congestion pricing: slot cost `0.5 × curvature × X²`, so the
/// marginal price grows linearly with aggregate usage.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CongestionCurve {
    pub curvature: f64,
}

impl CongestionCurve {
    pub fn new(curvature: f64) -> Self {
        Self { curvature }
    }

    /// Marginal price at aggregate usage `usage`.
    pub fn unit_price(&self, usage: f64) -> f64 {
        self.curvature * usage
    }

    pub fn slot_cost(&self, usage: f64) -> f64 {
        0.5 * self.curvature * usage * usage
    }

    pub(crate) fn check(&self) -> Result<(), BuildError> {
        check_weight("curvature", self.curvature)
    }
}

impl Default for CongestionCurve {
    fn default() -> Self {
        Self::new(1.0)
    }
}

fn check_weight(name: &'static str, value: f64) -> Result<(), BuildError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(BuildError::InvalidWeight { name, value })
    }
}

/// Everything the planner needs besides the tasks themselves.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PlannerConfig {
    pub horizon: Horizon,
    pub prices: PriceCurve,
    pub group_caps: GroupCaps,
    pub stability: StabilityWeights,
    pub congestion: CongestionCurve,
    pub solver: SolverOptions,
    /// Run per-agent solves on worker threads.
    pub parallel: bool,
    /// Worker threads for per-agent solves; `None` uses the available
    /// parallelism.
    pub workers: Option<usize>,
}

impl PlannerConfig {
    /// Validates the parts shared by every variant.
    pub fn check(&self) -> Result<(), BuildError> {
        self.prices.check(&self.horizon)?;
        self.group_caps.check(&self.horizon)?;
        self.stability.check()?;
        self.congestion.check()
    }

    pub fn with_group_caps(mut self, caps: GroupCaps) -> Self {
        self.group_caps = caps;
        self
    }

    pub fn with_stability(mut self, stability: StabilityWeights) -> Self {
        self.stability = stability;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

impl Default for PlannerConfig {
    /// One day of hourly slots with the reference prices and group caps.
    fn default() -> Self {
        Self {
            horizon: Horizon::hourly(24),
            prices: scenario::reference_prices(),
            group_caps: scenario::reference_group_caps(),
            stability: StabilityWeights::default(),
            congestion: CongestionCurve::default(),
            solver: SolverOptions::default(),
            parallel: false,
            workers: None,
        }
    }
}
