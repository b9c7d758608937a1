//! LP and QP solvers over a frozen [`Model`].
//!
//! Solver outcomes are reported as a [`SolveStatus`] inside a [`Solution`],
//! never as errors: an infeasible or unbounded model is a legitimate answer.
//!
//! [`solve`] is the usual entry point. It picks the simplex or the active-set
//! engine from the objective, optionally splits the model into independent
//! blocks, and retries once with a looser tolerance after a numerical failure.

mod active_set;
mod basis;
mod linalg;
mod simplex;
mod standard_form;

use crate::model::{Model, VarId};

/// Outcome of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    Unbounded,
    /// An iteration cap was hit or a basis or reduced Hessian was singular.
    NumericalFailure,
}

impl SolveStatus {
    /// Precedence when merging the statuses of independent blocks.
    fn severity(self) -> u8 {
        match self {
            SolveStatus::Optimal => 0,
            SolveStatus::NumericalFailure => 1,
            SolveStatus::Unbounded => 2,
            SolveStatus::Infeasible => 3,
        }
    }
}

impl std::fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SolveStatus::Optimal => "optimal",
            SolveStatus::Infeasible => "infeasible",
            SolveStatus::Unbounded => "unbounded",
            SolveStatus::NumericalFailure => "numerical failure",
        };
        f.write_str(name)
    }
}

/// Result of one solver invocation.
///
/// `values` and `duals` are empty unless `status` is [`SolveStatus::Optimal`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Solution {
    pub status: SolveStatus,
    /// One value per model variable, indexed by [`VarId::index`].
    pub values: Vec<f64>,
    /// Objective evaluated at `values`; `NaN` when not optimal.
    pub objective: f64,
    /// Simplex pivots and bound flips plus active-set iterations.
    pub iterations: usize,
    /// One multiplier per constraint.
    pub duals: Vec<f64>,
}

impl Solution {
    pub(crate) fn optimal(values: Vec<f64>, objective: f64, iterations: usize) -> Self {
        Self {
            status: SolveStatus::Optimal,
            values,
            objective,
            iterations,
            duals: Vec::new(),
        }
    }

    pub(crate) fn failed(status: SolveStatus, iterations: usize) -> Self {
        Self {
            status,
            values: Vec::new(),
            objective: f64::NAN,
            iterations,
            duals: Vec::new(),
        }
    }

    pub(crate) fn with_duals(mut self, duals: Vec<f64>) -> Self {
        self.duals = duals;
        self
    }

    pub fn is_optimal(&self) -> bool {
        self.status == SolveStatus::Optimal
    }

    pub fn value(&self, var: VarId) -> Option<f64> {
        self.values.get(var.index()).copied()
    }
}

/// Numerical settings shared by both engines.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SolverOptions {
    /// Feasibility and optimality tolerance; coefficients below it are zero.
    pub tolerance: f64,
    /// Tolerance for the single retry after a numerical failure.
    pub relaxed_tolerance: Option<f64>,
    /// Largest bound or row violation accepted in an optimal answer.
    pub verify_tolerance: f64,
    /// Solve independent blocks of the model separately.
    pub decompose: bool,
    /// Iteration caps are this multiple of the problem size: rows for simplex
    /// pivots, columns for bound flips, rows plus columns for active-set
    /// steps.
    pub iteration_factor: usize,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-9,
            relaxed_tolerance: Some(1e-7),
            verify_tolerance: 1e-6,
            decompose: true,
            iteration_factor: 50,
        }
    }
}

/// Tolerance and caps handed to one engine run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Limits {
    pub tol: f64,
    pub iteration_factor: usize,
}

impl Limits {
    fn new(options: &SolverOptions, tol: f64) -> Self {
        Self {
            tol,
            iteration_factor: options.iteration_factor,
        }
    }
}

impl Default for Limits {
    fn default() -> Self {
        let options = SolverOptions::default();
        Self::new(&options, options.tolerance)
    }
}

/// A solver engine.
pub trait Solver {
    fn solve(&self, model: &Model) -> Solution;
}

/// Two-phase bounded simplex. Only the linear part of the objective is
/// optimised; quadratic terms are ignored during the search but still counted
/// in the reported objective value.
#[derive(Debug, Clone, Default)]
pub struct SimplexSolver {
    pub options: SolverOptions,
}

impl SimplexSolver {
    pub fn new(options: SolverOptions) -> Self {
        Self { options }
    }
}

impl Solver for SimplexSolver {
    fn solve(&self, model: &Model) -> Solution {
        solve_with(model, &self.options, Engine::Simplex)
    }
}

/// Active-set QP solver; models without curvature go straight to the simplex.
#[derive(Debug, Clone, Default)]
pub struct ActiveSetSolver {
    pub options: SolverOptions,
}

impl ActiveSetSolver {
    pub fn new(options: SolverOptions) -> Self {
        Self { options }
    }
}

impl Solver for ActiveSetSolver {
    fn solve(&self, model: &Model) -> Solution {
        solve_with(model, &self.options, Engine::ByObjective)
    }
}

#[derive(Debug, Clone, Copy)]
enum Engine {
    Simplex,
    ByObjective,
}

/// Solves `model` with the engine suited to its objective.
pub fn solve(model: &Model, options: &SolverOptions) -> Solution {
    solve_with(model, options, Engine::ByObjective)
}

fn solve_with(model: &Model, options: &SolverOptions, engine: Engine) -> Solution {
    let first = solve_once(model, options, options.tolerance, engine);
    if first.status != SolveStatus::NumericalFailure {
        return first;
    }
    let Some(relaxed) = options.relaxed_tolerance else {
        return first;
    };
    tracing::warn!(
        component = "solver",
        tolerance = options.tolerance,
        relaxed,
        iterations = first.iterations,
        "Numerical failure, retrying with relaxed tolerance"
    );
    let mut retry = solve_once(model, options, relaxed, engine);
    retry.iterations += first.iterations;
    retry
}

fn solve_once(model: &Model, options: &SolverOptions, tol: f64, engine: Engine) -> Solution {
    let limits = Limits::new(options, tol);
    let solution = if options.decompose {
        solve_by_blocks(model, limits, engine)
    } else {
        solve_block(model, limits, engine)
    };
    let solution = verify(model, solution, options.verify_tolerance);
    tracing::debug!(
        component = "solver",
        status = %solution.status,
        iterations = solution.iterations,
        variables = model.num_variables(),
        constraints = model.num_constraints(),
        "Solve finished"
    );
    solution
}

fn solve_block(model: &Model, limits: Limits, engine: Engine) -> Solution {
    match engine {
        Engine::ByObjective if model.objective().is_quadratic() => {
            active_set::solve_quadratic(model, limits)
        }
        _ => simplex::solve_lp(model, limits),
    }
}

/// Solves every independent block on its own and stitches the answers.
fn solve_by_blocks(model: &Model, limits: Limits, engine: Engine) -> Solution {
    let decomposition = model.decompose();
    for id in &decomposition.empty_constraints {
        let violated = model
            .constraint(*id)
            .is_some_and(|c| c.violation(&[]) > limits.tol);
        if violated {
            return Solution::failed(SolveStatus::Infeasible, 0);
        }
    }

    let mut values = vec![0.0; model.num_variables()];
    let mut duals = vec![0.0; model.num_constraints()];
    let mut iterations = 0;
    let mut status = SolveStatus::Optimal;

    for component in &decomposition.components {
        let block = solve_block(&model.restrict(component), limits, engine);
        iterations += block.iterations;
        if block.status != SolveStatus::Optimal {
            if block.status.severity() > status.severity() {
                status = block.status;
            }
            continue;
        }
        for (var, v) in component.variables().iter().zip(&block.values) {
            values[var.index()] = *v;
        }
        for (id, y) in component.constraints().iter().zip(&block.duals) {
            duals[id.index()] = *y;
        }
    }

    tracing::debug!(
        component = "solver",
        blocks = decomposition.components.len(),
        status = %status,
        "Block solve merged"
    );
    if status != SolveStatus::Optimal {
        return Solution::failed(status, iterations);
    }
    let objective = model.evaluate(&values);
    Solution::optimal(values, objective, iterations).with_duals(duals)
}

/// Downgrades an optimal answer that violates the model beyond `limit`.
fn verify(model: &Model, solution: Solution, limit: f64) -> Solution {
    if !solution.is_optimal() {
        return solution;
    }
    let violation = model.max_violation(&solution.values);
    if violation > limit {
        tracing::warn!(
            component = "solver",
            violation,
            limit,
            "Optimal point violates the model"
        );
        return Solution::failed(SolveStatus::NumericalFailure, solution.iterations);
    }
    solution
}
