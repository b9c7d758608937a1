//! Solver-agnostic optimisation model.
//!
//! A [`Model`] is assembled incrementally through a [`ModelBuilder`] and then
//! frozen. Once built it exposes no mutating operations, so a model handed to a
//! solver cannot change underneath it.
//!
//! ```
//! use loadshift::model::{LinearExpr, ModelBuilder, Relation};
//!
//! let mut builder = ModelBuilder::new();
//! let x = builder.add_variable(0.0, 1.0).unwrap();
//! let y = builder.add_variable(0.0, 1.0).unwrap();
//! builder
//!     .add_constraint(LinearExpr::sum([x, y]), Relation::Eq, 1.0)
//!     .unwrap();
//! builder
//!     .set_objective(LinearExpr::new().with_term(x, 1.0).with_term(y, 2.0), None)
//!     .unwrap();
//! let model = builder.build();
//! assert_eq!(model.num_variables(), 2);
//! assert_eq!(model.num_constraints(), 1);
//! ```

mod constraint;
mod decompose;
mod error;
mod expr;
mod objective;

pub use constraint::{Constraint, ConstraintId, Relation};
pub use decompose::{Component, Decomposition};
pub use error::ModelError;
pub use expr::{LinearExpr, VarId};
pub use objective::{Objective, QuadraticTerm};

/// Box bounds `lower <= x <= upper` of one decision variable.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Variable {
    lower: f64,
    upper: f64,
}

impl Variable {
    pub fn lower(&self) -> f64 {
        self.lower
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }

    /// Moves `value` onto a bound when it lies within `tol` of it.
    pub fn snap(&self, value: f64, tol: f64) -> f64 {
        if (value - self.lower).abs() <= tol {
            self.lower
        } else if (value - self.upper).abs() <= tol {
            self.upper
        } else {
            value
        }
    }
}

/// Incremental constructor for a [`Model`].
///
/// Variables and constraints are append-only; every call validates its
/// arguments and leaves the builder untouched on error.
#[derive(Debug, Clone, Default)]
pub struct ModelBuilder {
    variables: Vec<Variable>,
    constraints: Vec<Constraint>,
    objective: Objective,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    /// Adds a variable with bounds `[lower, upper]`.
    ///
    /// `lower` must be finite; `upper` may be `+inf`.
    pub fn add_variable(&mut self, lower: f64, upper: f64) -> Result<VarId, ModelError> {
        let var = VarId(self.variables.len());
        let valid = lower.is_finite() && !upper.is_nan() && lower <= upper;
        if !valid {
            return Err(ModelError::InvalidBound { var, lower, upper });
        }
        self.variables.push(Variable { lower, upper });
        Ok(var)
    }

    /// Appends the constraint `expr (relation) rhs`.
    pub fn add_constraint(
        &mut self,
        expr: LinearExpr,
        relation: Relation,
        rhs: f64,
    ) -> Result<ConstraintId, ModelError> {
        self.check_expr(&expr)?;
        if !rhs.is_finite() {
            return Err(ModelError::NonFiniteCoefficient(rhs));
        }
        let id = ConstraintId(self.constraints.len());
        self.constraints.push(Constraint::new(expr, relation, rhs));
        Ok(id)
    }

    /// Replaces the objective with `linear + Σ 0.5·q_i·x_i²`.
    pub fn set_objective(
        &mut self,
        linear: LinearExpr,
        quadratic: Option<QuadraticTerm>,
    ) -> Result<(), ModelError> {
        self.check_expr(&linear)?;
        let quadratic = quadratic.unwrap_or_default();
        for (var, q) in quadratic.iter() {
            self.check_var(var)?;
            if q < 0.0 {
                return Err(ModelError::NegativeQuadraticCoefficient {
                    var,
                    coefficient: q,
                });
            }
            if !q.is_finite() {
                return Err(ModelError::NonFiniteCoefficient(q));
            }
        }
        self.objective = Objective::new(linear, quadratic);
        Ok(())
    }

    /// Freezes the builder into an immutable model.
    pub fn build(self) -> Model {
        tracing::debug!(
            component = "model",
            operation = "build",
            variables = self.variables.len(),
            constraints = self.constraints.len(),
            quadratic = self.objective.is_quadratic(),
            "Model built"
        );
        Model {
            variables: self.variables,
            constraints: self.constraints,
            objective: self.objective,
        }
    }

    fn check_var(&self, var: VarId) -> Result<(), ModelError> {
        if var.index() < self.variables.len() {
            Ok(())
        } else {
            Err(ModelError::UnknownVariable(var))
        }
    }

    fn check_expr(&self, expr: &LinearExpr) -> Result<(), ModelError> {
        for (var, a) in expr.iter() {
            self.check_var(var)?;
            if !a.is_finite() {
                return Err(ModelError::NonFiniteCoefficient(a));
            }
        }
        Ok(())
    }
}

/// Immutable snapshot of variables, constraints and objective (minimised).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Model {
    variables: Vec<Variable>,
    constraints: Vec<Constraint>,
    objective: Objective,
}

impl Model {
    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variable(&self, var: VarId) -> Option<&Variable> {
        self.variables.get(var.index())
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn constraint(&self, id: ConstraintId) -> Option<&Constraint> {
        self.constraints.get(id.index())
    }

    pub fn objective(&self) -> &Objective {
        &self.objective
    }

    /// Objective value at `values`.
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.objective.evaluate(values)
    }

    /// Largest bound or constraint violation at `values`.
    pub fn max_violation(&self, values: &[f64]) -> f64 {
        let bounds = self.variables.iter().enumerate().map(|(j, var)| {
            let x = values.get(j).copied().unwrap_or(0.0);
            (var.lower - x).max(x - var.upper).max(0.0)
        });
        let rows = self.constraints.iter().map(|c| c.violation(values));
        bounds.chain(rows).fold(0.0, f64::max)
    }
}

/// Replays the serialized parts through a [`ModelBuilder`] so a decoded model
/// passes the same checks as one built in code.
#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Model {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;

        // serde_json writes an infinite upper bound as null
        #[derive(serde::Deserialize)]
        struct RawVariable {
            lower: f64,
            upper: Option<f64>,
        }

        #[derive(serde::Deserialize)]
        struct Raw {
            variables: Vec<RawVariable>,
            constraints: Vec<Constraint>,
            objective: Objective,
        }

        let raw = Raw::deserialize(deserializer)?;
        let mut builder = ModelBuilder::new();
        for var in raw.variables {
            builder
                .add_variable(var.lower, var.upper.unwrap_or(f64::INFINITY))
                .map_err(D::Error::custom)?;
        }
        for c in raw.constraints {
            builder
                .add_constraint(c.expr().clone(), c.relation(), c.rhs())
                .map_err(D::Error::custom)?;
        }
        builder
            .set_objective(
                raw.objective.linear().clone(),
                Some(raw.objective.quadratic().clone()),
            )
            .map_err(D::Error::custom)?;
        Ok(builder.build())
    }
}
