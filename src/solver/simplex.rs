//! Two-phase bounded-variable revised simplex.
//!
//! Bounds live on the columns: a nonbasic column sits at its lower or upper
//! bound and may "flip" between them without a basis change, so the basis has
//! exactly one column per row. The basis inverse is held in product form (see
//! [`Basis`]) and refactored every [`REFACTOR_INTERVAL`] exchanges. The
//! simplex multipliers are updated with each exchange rather than recomputed.
//!
//! Phase 1 starts from a crash basis of slack columns (where the slack can
//! absorb the row residual) and artificial columns (everywhere else) and
//! minimises the sum of artificials. Phase 2 reuses the final phase-1 basis.
//! Both phases price with Bland's rule: the entering column is the smallest
//! eligible index, and ratio-test ties leave with the smallest basic index.

use super::basis::Basis;
use super::standard_form::{Column, StandardForm};
use super::{Limits, Solution, SolveStatus};
use crate::model::Model;

/// Basis exchanges between two refactorisations.
pub(super) const REFACTOR_INTERVAL: usize = 64;

/// Minimum pivot magnitude when removing leftover artificials after phase 1.
const DRIVE_OUT_PIVOT: f64 = 1e-7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColumnState {
    Basic,
    AtLower,
    AtUpper,
    /// Strictly between its bounds without being basic. Only the active-set
    /// engine moves columns here.
    Superbasic,
}

/// Reason a simplex phase stopped short of optimality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stop {
    Infeasible,
    Unbounded,
    IterationLimit,
    Singular,
}

impl From<Stop> for SolveStatus {
    fn from(stop: Stop) -> Self {
        match stop {
            Stop::Infeasible => SolveStatus::Infeasible,
            Stop::Unbounded => SolveStatus::Unbounded,
            Stop::IterationLimit | Stop::Singular => SolveStatus::NumericalFailure,
        }
    }
}

pub(crate) struct Simplex<'a> {
    pub(super) sf: &'a StandardForm,
    pub(super) tol: f64,
    /// Standard-form columns; artificials are numbered from here on.
    real: usize,
    artificial: Vec<Column>,
    artificial_row: Vec<usize>,
    pub(super) lower: Vec<f64>,
    pub(super) upper: Vec<f64>,
    /// Costs of the running phase.
    pub(super) cost: Vec<f64>,
    pub(super) x: Vec<f64>,
    pub(super) state: Vec<ColumnState>,
    pub(super) basis: Basis,
    /// Multipliers `y = c_B·B⁻¹` of the running phase.
    y: Vec<f64>,
    pivots: usize,
    flips: usize,
    pivot_cap: usize,
    flip_cap: usize,
    redundant_rows: Vec<usize>,
}

impl<'a> Simplex<'a> {
    /// Sets up the crash basis: every column at its lower bound, one slack or
    /// artificial basic per row. Caps are `factor × rows` pivots and
    /// `factor × columns` bound flips.
    pub fn new(sf: &'a StandardForm, limits: Limits) -> Self {
        let m = sf.rows;
        let real = sf.num_columns();
        let mut lower = sf.lower.clone();
        let mut upper = sf.upper.clone();
        let mut x = sf.lower.clone();
        let mut state = vec![ColumnState::AtLower; real];

        let mut residual = sf.rhs.clone();
        for (j, col) in sf.columns.iter().enumerate() {
            for &(i, a) in col {
                residual[i] -= a * x[j];
            }
        }

        let mut head = vec![0; m];
        let mut signs = vec![1.0; m];
        let mut artificial = Vec::new();
        let mut artificial_row = Vec::new();
        for i in 0..m {
            if let Some(s) = sf.slack_of_row[i] {
                let sign = sf.columns[s][0].1;
                let value = residual[i] / sign;
                if value >= 0.0 {
                    head[i] = s;
                    signs[i] = sign;
                    state[s] = ColumnState::Basic;
                    x[s] = value;
                    continue;
                }
            }
            let sign = if residual[i] < 0.0 { -1.0 } else { 1.0 };
            head[i] = real + artificial.len();
            signs[i] = sign;
            artificial.push(vec![(i, sign)]);
            artificial_row.push(i);
            lower.push(0.0);
            upper.push(f64::INFINITY);
            x.push(residual[i].abs());
            state.push(ColumnState::Basic);
        }

        let total = real + artificial.len();
        Self {
            sf,
            tol: limits.tol,
            real,
            artificial,
            artificial_row,
            lower,
            upper,
            cost: vec![0.0; total],
            x,
            state,
            basis: Basis::unit(head, &signs),
            y: vec![0.0; m],
            pivots: 0,
            flips: 0,
            pivot_cap: limits.iteration_factor * m,
            flip_cap: limits.iteration_factor * total,
            redundant_rows: Vec::new(),
        }
    }

    pub fn iterations(&self) -> usize {
        self.pivots + self.flips
    }

    /// Values of the standard-form columns.
    pub fn values(&self) -> &[f64] {
        &self.x[..self.real]
    }

    /// Rows found to be linearly dependent on the others.
    pub fn redundant_rows(&self) -> &[usize] {
        &self.redundant_rows
    }

    pub(super) fn total(&self) -> usize {
        self.real + self.artificial.len()
    }

    pub(super) fn column(&self, j: usize) -> &[(usize, f64)] {
        if j < self.real {
            &self.sf.columns[j]
        } else {
            &self.artificial[j - self.real]
        }
    }

    /// Diagonal Hessian entry of column `j`; artificials have none.
    pub(super) fn quad(&self, j: usize) -> f64 {
        if j < self.real {
            self.sf.quad[j]
        } else {
            0.0
        }
    }

    fn is_artificial(&self, j: usize) -> bool {
        j >= self.real
    }

    /// Finds a feasible basis, or reports the model infeasible.
    pub fn phase_one(&mut self) -> Result<(), Stop> {
        if self.artificial.is_empty() {
            return Ok(());
        }
        self.cost = vec![0.0; self.total()];
        for j in self.real..self.total() {
            self.cost[j] = 1.0;
        }
        self.run()?;

        let infeasibility: f64 = (self.real..self.total()).map(|j| self.x[j]).sum();
        let rhs_scale = self.sf.rhs.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        if infeasibility > self.tol * (1.0 + rhs_scale) {
            tracing::debug!(
                component = "simplex",
                infeasibility,
                iterations = self.iterations(),
                "Phase 1 left artificial mass"
            );
            return Err(Stop::Infeasible);
        }
        self.drive_out_artificials();
        Ok(())
    }

    /// Optimises the model's linear objective from the current feasible basis.
    pub fn phase_two(&mut self) -> Result<(), Stop> {
        let mut cost = vec![0.0; self.total()];
        cost[..self.real].copy_from_slice(&self.sf.cost);
        self.cost = cost;
        self.run()
    }

    /// `cᵀ·B⁻¹` for a per-column vector `c` restricted to the basic columns.
    pub(super) fn multipliers(&self, c: &[f64]) -> Vec<f64> {
        let basic: Vec<(usize, f64)> = self
            .basis
            .head()
            .iter()
            .enumerate()
            .filter(|&(_, &j)| c[j] != 0.0)
            .map(|(i, &j)| (i, c[j]))
            .collect();
        self.basis.btran(&basic)
    }

    /// Simplex multipliers `y = c_B·B⁻¹` for the current phase costs.
    pub fn duals(&self) -> Vec<f64> {
        self.multipliers(&self.cost)
    }

    fn run(&mut self) -> Result<(), Stop> {
        self.y = self.duals();
        loop {
            if self.basis.updates() >= REFACTOR_INTERVAL {
                self.refactor()?;
            }
            let Some((entering, reduced)) = self.select_entering() else {
                return Ok(());
            };
            let alpha = self.basis.ftran(self.column(entering));
            let direction = if self.state[entering] == ColumnState::AtLower {
                1.0
            } else {
                -1.0
            };
            let leaving = self.ratio_test(&alpha, direction);
            let range = self.upper[entering] - self.lower[entering];

            match leaving {
                Some((row, step)) if step < range => {
                    if self.pivots >= self.pivot_cap {
                        return Err(Stop::IterationLimit);
                    }
                    self.pivots += 1;
                    self.pivot(row, entering, &alpha, step, direction);
                    // y' = y + d_q·(row r of the new B⁻¹)
                    let rho = self.basis.row(row);
                    for (y, r) in self.y.iter_mut().zip(rho) {
                        *y += reduced * r;
                    }
                }
                _ if range.is_finite() => {
                    if self.flips >= self.flip_cap {
                        return Err(Stop::IterationLimit);
                    }
                    self.flips += 1;
                    self.flip(entering, &alpha, range, direction);
                }
                _ => return Err(Stop::Unbounded),
            }
        }
    }

    /// Bland's rule: the first column whose reduced cost improves the
    /// objective, with that reduced cost.
    fn select_entering(&self) -> Option<(usize, f64)> {
        (0..self.total()).find_map(|j| {
            let state = self.state[j];
            if state == ColumnState::Basic || self.upper[j] - self.lower[j] <= 0.0 {
                return None;
            }
            let reduced = self.cost[j]
                - self
                    .column(j)
                    .iter()
                    .map(|&(i, a)| self.y[i] * a)
                    .sum::<f64>();
            let improves = match state {
                ColumnState::AtLower => reduced < -self.tol,
                ColumnState::AtUpper => reduced > self.tol,
                ColumnState::Basic | ColumnState::Superbasic => false,
            };
            improves.then_some((j, reduced))
        })
    }

    /// Smallest step at which a basic column reaches a bound, with ties going
    /// to the smallest basic column index.
    fn ratio_test(&self, alpha: &[f64], direction: f64) -> Option<(usize, f64)> {
        let head = self.basis.head();
        let limits: Vec<(usize, f64)> = alpha
            .iter()
            .enumerate()
            .filter(|(_, a)| a.abs() > self.tol)
            .filter_map(|(i, &a)| {
                let b = head[i];
                let rate = -direction * a;
                let step = if rate < 0.0 {
                    (self.x[b] - self.lower[b]) / -rate
                } else if self.upper[b].is_finite() {
                    (self.upper[b] - self.x[b]) / rate
                } else {
                    return None;
                };
                Some((i, step.max(0.0)))
            })
            .collect();

        let min_step = limits.iter().map(|&(_, t)| t).fold(f64::INFINITY, f64::min);
        limits
            .into_iter()
            .filter(|&(_, t)| t <= min_step + self.tol)
            .min_by_key(|&(i, _)| head[i])
            .map(|(i, _)| (i, min_step))
    }

    fn move_basic(&mut self, alpha: &[f64], delta: f64) {
        for (i, &a) in alpha.iter().enumerate() {
            if a != 0.0 {
                let b = self.basis.head()[i];
                self.x[b] -= a * delta;
            }
        }
    }

    fn flip(&mut self, entering: usize, alpha: &[f64], range: f64, direction: f64) {
        self.move_basic(alpha, direction * range);
        if direction > 0.0 {
            self.x[entering] = self.upper[entering];
            self.state[entering] = ColumnState::AtUpper;
        } else {
            self.x[entering] = self.lower[entering];
            self.state[entering] = ColumnState::AtLower;
        }
    }

    fn pivot(&mut self, row: usize, entering: usize, alpha: &[f64], step: f64, direction: f64) {
        self.x[entering] += direction * step;
        self.move_basic(alpha, direction * step);
        let to_lower = -direction * alpha[row] < 0.0;
        self.exchange(row, entering, alpha, to_lower);
    }

    /// Makes `entering` basic at position `row` and parks the leaving column
    /// on its lower or upper bound.
    pub(super) fn exchange(&mut self, row: usize, entering: usize, alpha: &[f64], to_lower: bool) {
        let leaving = self.basis.head()[row];
        self.basis.replace(row, entering, alpha);
        self.state[entering] = ColumnState::Basic;
        if self.is_artificial(leaving) {
            // artificials never re-enter once they leave
            self.upper[leaving] = 0.0;
            self.x[leaving] = 0.0;
            self.state[leaving] = ColumnState::AtLower;
        } else {
            self.fix(leaving, to_lower);
        }
    }

    pub(super) fn fix(&mut self, j: usize, to_lower: bool) {
        if to_lower {
            self.x[j] = self.lower[j];
            self.state[j] = ColumnState::AtLower;
        } else {
            self.x[j] = self.upper[j];
            self.state[j] = ColumnState::AtUpper;
        }
    }

    /// Refactors the basis and recomputes the basic values and multipliers.
    pub(super) fn refactor(&mut self) -> Result<(), Stop> {
        let head = self.basis.head().to_vec();
        let columns: Vec<&[(usize, f64)]> = head.iter().map(|&j| self.column(j)).collect();
        let basis = Basis::factor(&head, &columns, self.tol).map_err(|e| {
            tracing::debug!(component = "simplex", column = e.column, "Singular basis");
            Stop::Singular
        })?;
        self.basis = basis;

        let mut residual = self.sf.rhs.clone();
        for j in 0..self.total() {
            if self.state[j] != ColumnState::Basic && self.x[j] != 0.0 {
                for &(i, a) in self.column(j) {
                    residual[i] -= a * self.x[j];
                }
            }
        }
        let nonzero: Vec<(usize, f64)> = residual
            .into_iter()
            .enumerate()
            .filter(|&(_, r)| r != 0.0)
            .collect();
        let basic = self.basis.ftran(&nonzero);
        for (i, value) in basic.into_iter().enumerate() {
            let j = self.basis.head()[i];
            self.x[j] = value;
        }
        self.y = self.duals();
        Ok(())
    }

    /// Replaces zero-level artificials left in the basis by real columns.
    /// Rows where no real column can take over are linearly dependent on the
    /// others and are recorded as redundant; their artificial stays basic,
    /// pinned at zero.
    fn drive_out_artificials(&mut self) {
        for row in 0..self.basis.rows() {
            let art = self.basis.head()[row];
            if !self.is_artificial(art) {
                continue;
            }
            let rho = self.basis.row(row);
            let replacement = (0..self.real).find(|&j| {
                self.state[j] != ColumnState::Basic
                    && self.sf.column_dot(j, &rho).abs() > DRIVE_OUT_PIVOT
            });
            match replacement {
                Some(j) => {
                    let alpha = self.basis.ftran(self.column(j));
                    self.pivot(row, j, &alpha, 0.0, 1.0);
                }
                None => self.redundant_rows.push(self.artificial_row[art - self.real]),
            }
        }
        for j in self.real..self.total() {
            self.upper[j] = 0.0;
            if self.state[j] != ColumnState::Basic {
                self.x[j] = 0.0;
                self.state[j] = ColumnState::AtLower;
            }
        }
        self.redundant_rows.sort_unstable();
    }
}

/// Solves a model with a linear objective.
pub(crate) fn solve_lp(model: &Model, limits: Limits) -> Solution {
    let sf = StandardForm::from_model(model, limits.tol);
    let mut simplex = Simplex::new(&sf, limits);

    let outcome = simplex.phase_one().and_then(|_| simplex.phase_two());
    let iterations = simplex.iterations();
    match outcome {
        Ok(()) => {
            let values = simplex.values()[..sf.structural].to_vec();
            let objective = model.evaluate(&values);
            let duals = simplex.duals();
            tracing::debug!(
                component = "simplex",
                status = "optimal",
                iterations,
                redundant_rows = simplex.redundant_rows().len(),
                objective,
                "LP solved"
            );
            Solution::optimal(values, objective, iterations).with_duals(duals)
        }
        Err(stop) => {
            tracing::debug!(component = "simplex", ?stop, iterations, "LP stopped");
            Solution::failed(stop.into(), iterations)
        }
    }
}
