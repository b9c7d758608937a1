use thiserror::Error;

use super::expr::VarId;

/// Errors raised while assembling a [`Model`](super::Model).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("Invalid bounds for {var}: lower {lower} must be finite and not exceed upper {upper}")]
    InvalidBound { var: VarId, lower: f64, upper: f64 },

    #[error("Quadratic coefficient for {var} must be nonnegative, got {coefficient}")]
    NegativeQuadraticCoefficient { var: VarId, coefficient: f64 },

    #[error("Variable {0} is not part of this model")]
    UnknownVariable(VarId),

    #[error("Non-finite coefficient or right-hand side: {0}")]
    NonFiniteCoefficient(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_bound_display() {
        let e = ModelError::InvalidBound {
            var: VarId(3),
            lower: 2.0,
            upper: 1.0,
        };
        assert_eq!(
            e.to_string(),
            "Invalid bounds for x3: lower 2 must be finite and not exceed upper 1"
        );
    }

    #[test]
    fn test_negative_quadratic_display() {
        let e = ModelError::NegativeQuadraticCoefficient {
            var: VarId(0),
            coefficient: -0.5,
        };
        assert!(e.to_string().contains("nonnegative"));
    }

    #[test]
    fn test_unknown_variable_display() {
        let e = ModelError::UnknownVariable(VarId(9));
        assert_eq!(e.to_string(), "Variable x9 is not part of this model");
    }
}
