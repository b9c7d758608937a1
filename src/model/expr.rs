//! Sparse linear expressions over model variables.

use std::collections::BTreeMap;
use std::fmt::Display;

/// Stable handle of a decision variable inside one [`Model`](super::Model).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VarId(pub(crate) usize);

impl VarId {
    /// Position of the variable in the model's variable list.
    pub const fn index(self) -> usize {
        self.0
    }
}

impl Display for VarId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "x{}", self.0)
    }
}

/// Weighted sum of variables, `Σ a_j · x_j`.
///
/// Terms are kept ordered by variable index. Adding a variable that is already
/// present accumulates into its coefficient; unmentioned variables have
/// coefficient zero.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LinearExpr {
    terms: BTreeMap<VarId, f64>,
}

impl LinearExpr {
    pub fn new() -> Self {
        Self {
            terms: BTreeMap::new(),
        }
    }

    /// Sum of `vars`, each with coefficient one.
    pub fn sum<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = VarId>,
    {
        vars.into_iter().map(|v| (v, 1.0)).collect()
    }

    /// Builder-style variant of [`add_term`](Self::add_term).
    pub fn with_term(mut self, var: VarId, coefficient: f64) -> Self {
        self.add_term(var, coefficient);
        self
    }

    pub fn add_term(&mut self, var: VarId, coefficient: f64) {
        *self.terms.entry(var).or_insert(0.0) += coefficient;
    }

    pub fn coefficient(&self, var: VarId) -> f64 {
        self.terms.get(&var).copied().unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Iterates `(variable, coefficient)` pairs in variable order.
    pub fn iter(&self) -> impl Iterator<Item = (VarId, f64)> + '_ {
        self.terms.iter().map(|(&v, &a)| (v, a))
    }

    pub fn variables(&self) -> impl Iterator<Item = VarId> + '_ {
        self.terms.keys().copied()
    }

    /// Evaluates the expression at `values`, indexed by [`VarId::index`].
    ///
    /// Variables beyond the end of `values` contribute zero.
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.iter()
            .map(|(v, a)| a * values.get(v.index()).copied().unwrap_or(0.0))
            .sum()
    }
}

impl FromIterator<(VarId, f64)> for LinearExpr {
    fn from_iter<I: IntoIterator<Item = (VarId, f64)>>(iter: I) -> Self {
        let mut expr = LinearExpr::new();
        for (var, coefficient) in iter {
            expr.add_term(var, coefficient);
        }
        expr
    }
}

impl Display for LinearExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "0");
        }
        for (i, (var, a)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, " + ")?;
            }
            write!(f, "{}·{}", a, var)?;
        }
        Ok(())
    }
}
