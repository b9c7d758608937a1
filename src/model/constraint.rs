//! Linear constraints `expr (=|<=|>=) rhs`.

use std::fmt::Display;

use super::expr::LinearExpr;

/// Handle of a constraint inside one [`Model`](super::Model).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConstraintId(pub(crate) usize);

impl ConstraintId {
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Comparison between a constraint's expression and its right-hand side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Relation {
    Eq,
    Le,
    Ge,
}

impl Relation {
    /// Amount by which `lhs (relation) rhs` is violated; zero when satisfied.
    pub fn violation(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            Relation::Eq => (lhs - rhs).abs(),
            Relation::Le => (lhs - rhs).max(0.0),
            Relation::Ge => (rhs - lhs).max(0.0),
        }
    }

    pub const fn symbol(self) -> &'static str {
        match self {
            Relation::Eq => "=",
            Relation::Le => "<=",
            Relation::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Constraint {
    expr: LinearExpr,
    relation: Relation,
    rhs: f64,
}

impl Constraint {
    pub(crate) fn new(expr: LinearExpr, relation: Relation, rhs: f64) -> Self {
        Self {
            expr,
            relation,
            rhs,
        }
    }

    pub fn expr(&self) -> &LinearExpr {
        &self.expr
    }

    pub fn relation(&self) -> Relation {
        self.relation
    }

    pub fn rhs(&self) -> f64 {
        self.rhs
    }

    pub fn violation(&self, values: &[f64]) -> f64 {
        self.relation.violation(self.expr.evaluate(values), self.rhs)
    }
}

impl Display for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.expr, self.relation.symbol(), self.rhs)
    }
}
