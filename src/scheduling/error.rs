use thiserror::Error;

use super::AgentId;
use crate::model::ModelError;

/// Why a task cannot be satisfied regardless of prices or weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TaskDefect {
    /// `ready > deadline`.
    EmptyWindow,
    /// The deadline lies past the last slot of the horizon.
    WindowOutsideHorizon,
    /// Demand is larger than `cap × window length × slot hours`.
    DemandExceedsCapacity,
    /// Negative or non-finite cap or demand.
    NegativeValue,
}

impl std::fmt::Display for TaskDefect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            TaskDefect::EmptyWindow => "ready slot is after the deadline",
            TaskDefect::WindowOutsideHorizon => "deadline is outside the horizon",
            TaskDefect::DemandExceedsCapacity => "demand exceeds cap over the window",
            TaskDefect::NegativeValue => "cap and demand must be finite and non-negative",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BuildError {
    #[error("Task {task} of agent {agent} is infeasible: {reason}")]
    InfeasibleTaskSpec {
        agent: AgentId,
        task: usize,
        reason: TaskDefect,
    },

    #[error("Price curve has {actual} entries, horizon has {expected} slots")]
    PriceLengthMismatch { expected: usize, actual: usize },

    #[error("Price for slot {slot} is not finite")]
    NonFinitePrice { slot: usize },

    #[error("Invalid group cap at slot {slot}: limit {limit}")]
    InvalidGroupCap { slot: usize, limit: f64 },

    #[error("Invalid weight {name} = {value}: must be finite and non-negative")]
    InvalidWeight { name: &'static str, value: f64 },

    #[error("Horizon must contain at least one slot")]
    EmptyHorizon,

    #[error("Slot length must be finite and positive, got {0} h")]
    InvalidSlotLength(f64),

    #[error(transparent)]
    Model(#[from] ModelError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infeasible_task_display() {
        let e = BuildError::InfeasibleTaskSpec {
            agent: "User1".to_string(),
            task: 3,
            reason: TaskDefect::DemandExceedsCapacity,
        };
        assert_eq!(
            e.to_string(),
            "Task 3 of agent User1 is infeasible: demand exceeds cap over the window"
        );
    }

    #[test]
    fn test_price_length_display() {
        let e = BuildError::PriceLengthMismatch {
            expected: 24,
            actual: 23,
        };
        assert_eq!(
            e.to_string(),
            "Price curve has 23 entries, horizon has 24 slots"
        );
    }

    #[test]
    fn test_invalid_weight_display() {
        let e = BuildError::InvalidWeight {
            name: "alpha",
            value: -1.0,
        };
        assert!(e.to_string().contains("alpha = -1"));
    }

    #[test]
    fn test_empty_horizon_display() {
        assert_eq!(
            BuildError::EmptyHorizon.to_string(),
            "Horizon must contain at least one slot"
        );
    }

    #[test]
    fn test_model_error_is_wrapped() {
        let inner = ModelError::NonFiniteCoefficient(f64::INFINITY);
        let e: BuildError = inner.clone().into();
        assert_eq!(e, BuildError::Model(inner.clone()));
        assert_eq!(e.to_string(), inner.to_string());
    }

    #[test]
    fn test_error_equality() {
        assert_eq!(BuildError::EmptyHorizon, BuildError::EmptyHorizon);
        assert_ne!(BuildError::EmptyHorizon, BuildError::InvalidSlotLength(0.0));
    }
}
