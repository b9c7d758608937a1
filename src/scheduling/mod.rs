//! Scheduling domain: tasks, horizons, prices and the model builders.
//!
//! Tasks belong to agents and may draw power in any slot of their window.
//! The builders turn a task set into a [`ScheduleModel`] for one of three
//! objective variants; the [`Planner`] runs the whole pipeline.

mod builder;
mod config;
mod error;
mod horizon;
mod planner;
mod prices;
mod task;

pub use builder::{
    build_congestion, build_price_weighted, build_stability, ScheduleKind, ScheduleModel,
    SlotPricing, TaskVars, VarLayout,
};
pub use config::{CongestionCurve, PlannerConfig, StabilityMetric, StabilityWeights};
pub use error::{BuildError, TaskDefect};
pub use horizon::Horizon;
pub use planner::Planner;
pub use prices::{GroupCaps, PriceCurve};
pub use task::{AgentId, Task, TaskKey, TaskSet};
