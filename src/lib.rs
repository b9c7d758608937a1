//! loadshift - deadline-constrained load scheduling
//!
//! Allocates deferrable power demand to time slots. Each agent owns tasks
//! with a time window, a per-slot power cap and an energy requirement; the
//! crate finds a per-slot allocation meeting every requirement while
//! minimising a price-weighted cost, a temporal-stability penalty or a
//! quadratic congestion cost.
//!
//! The crate is self-contained: [`model`] describes bounded LP/QP problems,
//! [`solver`] solves them (bounded revised simplex and a diagonal-Hessian
//! active-set method), [`scheduling`] turns tasks into models and
//! [`schedule`] reads the solutions back.
//!
//! ```
//! use loadshift::scheduling::{GroupCaps, Horizon, PriceCurve, Task, TaskSet};
//! use loadshift::scheduling::build_price_weighted;
//! use loadshift::solver::SolverOptions;
//!
//! let horizon = Horizon::hourly(2);
//! let prices = PriceCurve::new(vec![1.0, 2.0]);
//! let tasks = [Task::new(0, 1, 1.0, 1.0)];
//! let model = build_price_weighted("User1", &tasks, &horizon, &prices, &GroupCaps::new())
//!     .unwrap();
//! let schedule = model.solve(&SolverOptions::default()).into_schedule().unwrap();
//! assert!((schedule.total_cost() - 1.0).abs() < 1e-9);
//! ```

pub mod model;
pub mod scenario;
pub mod schedule;
pub mod scheduling;
pub mod solver;
pub mod units;

pub use schedule::{PerAgentOutcome, Schedule, ScheduleOutcome};
pub use scheduling::{Planner, PlannerConfig};
pub use solver::{solve, Solution, SolveStatus, SolverOptions};
pub use units::SameDim;

/// Identifier type used for schedule runs.
pub type Id = String;

/// Generates a new unique identifier (UUID v4).
pub fn generate_id() -> Id {
    uuid::Uuid::new_v4().to_string()
}
