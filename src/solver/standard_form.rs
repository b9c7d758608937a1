//! Equality form `A·x = b, l <= x <= u` shared by the simplex and active-set
//! engines.
//!
//! Each inequality row receives one slack column (`+1` for `<=`, `-1` for
//! `>=`, bounded to `[0, +inf)`); bounds stay on the columns, so the row count
//! equals the model's constraint count.

use crate::model::{Model, Relation};

/// Sparse column: `(row, coefficient)` pairs in increasing row order.
pub(crate) type Column = Vec<(usize, f64)>;

#[derive(Debug, Clone)]
pub(crate) struct StandardForm {
    /// Number of rows.
    pub rows: usize,
    /// Number of leading columns that are model variables.
    pub structural: usize,
    pub columns: Vec<Column>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    pub cost: Vec<f64>,
    /// Diagonal Hessian entries (`q_j`), zero for slacks.
    pub quad: Vec<f64>,
    pub rhs: Vec<f64>,
    /// Slack column of each inequality row.
    pub slack_of_row: Vec<Option<usize>>,
}

impl StandardForm {
    /// Builds the equality form of `model`. Coefficients with magnitude below
    /// `tol` are dropped.
    pub fn from_model(model: &Model, tol: f64) -> Self {
        let n = model.num_variables();
        let rows = model.num_constraints();
        let mut columns: Vec<Column> = vec![Vec::new(); n];
        let mut rhs = Vec::with_capacity(rows);

        for (i, constraint) in model.constraints().iter().enumerate() {
            for (var, a) in constraint.expr().iter() {
                if a.abs() > tol {
                    columns[var.index()].push((i, a));
                }
            }
            rhs.push(constraint.rhs());
        }

        let mut lower: Vec<f64> = model.variables().iter().map(|v| v.lower()).collect();
        let mut upper: Vec<f64> = model.variables().iter().map(|v| v.upper()).collect();
        let mut cost = vec![0.0; n];
        for (var, c) in model.objective().linear().iter() {
            cost[var.index()] = c;
        }
        let mut quad = vec![0.0; n];
        for (var, q) in model.objective().quadratic().iter() {
            quad[var.index()] = q;
        }

        let mut slack_of_row = vec![None; rows];
        for (i, constraint) in model.constraints().iter().enumerate() {
            let sign = match constraint.relation() {
                Relation::Eq => continue,
                Relation::Le => 1.0,
                Relation::Ge => -1.0,
            };
            slack_of_row[i] = Some(columns.len());
            columns.push(vec![(i, sign)]);
            lower.push(0.0);
            upper.push(f64::INFINITY);
            cost.push(0.0);
            quad.push(0.0);
        }

        Self {
            rows,
            structural: n,
            columns,
            lower,
            upper,
            cost,
            quad,
            rhs,
            slack_of_row,
        }
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// `y · a_j`.
    pub fn column_dot(&self, j: usize, y: &[f64]) -> f64 {
        self.columns[j].iter().map(|&(i, a)| y[i] * a).sum()
    }
}
