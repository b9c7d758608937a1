//! Minimisation objective: a linear term plus an optional separable quadratic.

use std::collections::BTreeMap;

use super::expr::{LinearExpr, VarId};

/// Diagonal quadratic term `Σ 0.5 · q_i · x_i²`.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QuadraticTerm {
    coefficients: BTreeMap<VarId, f64>,
}

impl QuadraticTerm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `q_i` for `var`, replacing any previous value.
    pub fn with_term(mut self, var: VarId, q: f64) -> Self {
        self.set(var, q);
        self
    }

    pub fn set(&mut self, var: VarId, q: f64) {
        self.coefficients.insert(var, q);
    }

    pub fn coefficient(&self, var: VarId) -> f64 {
        self.coefficients.get(&var).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (VarId, f64)> + '_ {
        self.coefficients.iter().map(|(&v, &q)| (v, q))
    }

    pub fn is_empty(&self) -> bool {
        self.coefficients.is_empty()
    }

    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.iter()
            .map(|(v, q)| {
                let x = values.get(v.index()).copied().unwrap_or(0.0);
                0.5 * q * x * x
            })
            .sum()
    }
}

impl FromIterator<(VarId, f64)> for QuadraticTerm {
    fn from_iter<I: IntoIterator<Item = (VarId, f64)>>(iter: I) -> Self {
        Self {
            coefficients: iter.into_iter().collect(),
        }
    }
}

/// Objective of a model. Models always minimise.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Objective {
    linear: LinearExpr,
    quadratic: QuadraticTerm,
}

impl Objective {
    pub(crate) fn new(linear: LinearExpr, quadratic: QuadraticTerm) -> Self {
        Self { linear, quadratic }
    }

    pub fn linear(&self) -> &LinearExpr {
        &self.linear
    }

    pub fn quadratic(&self) -> &QuadraticTerm {
        &self.quadratic
    }

    /// True when at least one quadratic coefficient is strictly positive.
    pub fn is_quadratic(&self) -> bool {
        self.quadratic.iter().any(|(_, q)| q > 0.0)
    }

    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.linear.evaluate(values) + self.quadratic.evaluate(values)
    }
}
