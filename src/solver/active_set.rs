//! Reduced-gradient active-set method for convex quadratic objectives with a
//! diagonal Hessian.
//!
//! The method continues from the simplex basis of the linear part. Besides
//! basic columns and columns fixed at a bound it keeps *superbasic* columns,
//! which move strictly inside their bounds while the basic columns follow to
//! keep the rows satisfied. The Newton step over the superbasics solves
//!
//! ```text
//! (Q_S + Wᵀ·Q_B·W)·d_S = -(g_S - Wᵀ·g_B),    W = B⁻¹·A_S
//! ```
//!
//! whose size is the number of superbasics, not the number of rows. A basic
//! column reaching a bound is exchanged with the superbasic that has the
//! largest entry in its row.
//!
//! Once the superbasics are stationary, the fixed columns are priced against
//! `y = g_B·B⁻¹` and the first one with the wrong sign is released. A released
//! column without curvature moves along a feasible direction until its own
//! optimum or a bound, so the reduced Hessian stays regular.

use super::linalg::Lu;
use super::simplex::{ColumnState, Simplex, Stop, REFACTOR_INTERVAL};
use super::standard_form::StandardForm;
use super::{Limits, Solution, SolveStatus};
use crate::model::Model;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mover {
    /// The column being released.
    Released,
    Superbasic,
    /// Basic at the given basis position.
    Basic(usize),
}

/// One column moving at `rate` per unit step.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Move {
    column: usize,
    rate: f64,
    mover: Mover,
}

/// Superbasic columns, their images under `B⁻¹` and the factored reduced
/// Hessian.
struct Subspace {
    columns: Vec<usize>,
    images: Vec<Vec<f64>>,
    /// Basis positions holding a column with curvature.
    curved: Vec<usize>,
    hessian: Lu,
}

impl Subspace {
    fn new(simplex: &Simplex, tol: f64) -> Result<Self, Stop> {
        let columns: Vec<usize> = (0..simplex.total())
            .filter(|&j| simplex.state[j] == ColumnState::Superbasic)
            .collect();
        let images: Vec<Vec<f64>> = columns
            .iter()
            .map(|&s| simplex.basis.ftran(simplex.column(s)))
            .collect();
        let head = simplex.basis.head();
        let curved: Vec<usize> = (0..head.len())
            .filter(|&i| simplex.quad(head[i]) > 0.0)
            .collect();

        let n = columns.len();
        let mut reduced = vec![0.0; n * n];
        for a in 0..n {
            reduced[a * n + a] += simplex.quad(columns[a]);
            for b in a..n {
                let v: f64 = curved
                    .iter()
                    .map(|&i| simplex.quad(head[i]) * images[a][i] * images[b][i])
                    .sum();
                reduced[a * n + b] += v;
                if b != a {
                    reduced[b * n + a] += v;
                }
            }
        }
        let hessian = Lu::factor(reduced, n, tol).map_err(|_| {
            tracing::debug!(component = "active_set", superbasics = n, "Singular reduced Hessian");
            Stop::Singular
        })?;
        Ok(Self {
            columns,
            images,
            curved,
            hessian,
        })
    }

    fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// `v_B - W·d` over the basis positions.
    fn follow(&self, mut v_b: Vec<f64>, d: &[f64]) -> Vec<f64> {
        for (image, &ds) in self.images.iter().zip(d) {
            if ds != 0.0 {
                for (v, w) in v_b.iter_mut().zip(image) {
                    *v -= w * ds;
                }
            }
        }
        v_b
    }

    fn candidates(&self) -> impl Iterator<Item = (usize, &[f64])> {
        self.columns
            .iter()
            .zip(&self.images)
            .map(|(&s, image)| (s, image.as_slice()))
    }

    fn moves(&self, d_s: &[f64], d_b: &[f64], head: &[usize]) -> Vec<Move> {
        let superbasic = self.columns.iter().zip(d_s).map(|(&column, &rate)| Move {
            column,
            rate,
            mover: Mover::Superbasic,
        });
        let basic = head.iter().zip(d_b).enumerate().map(|(i, (&column, &rate))| Move {
            column,
            rate,
            mover: Mover::Basic(i),
        });
        superbasic.chain(basic).collect()
    }
}

struct ActiveSet<'s, 'a> {
    simplex: &'s mut Simplex<'a>,
    tol: f64,
    cap: usize,
    steps: usize,
}

impl<'s, 'a> ActiveSet<'s, 'a> {
    fn new(simplex: &'s mut Simplex<'a>, cap: usize) -> Self {
        let tol = simplex.tol;
        Self {
            simplex,
            tol,
            cap,
            steps: 0,
        }
    }

    fn gradient(&self) -> Vec<f64> {
        let s = &*self.simplex;
        (0..s.total()).map(|j| s.cost[j] + s.quad(j) * s.x[j]).collect()
    }

    /// Largest step up to `limit` along `moves`, and the move that blocks
    /// it first.
    fn ratio_test(&self, moves: &[Move], limit: f64) -> (f64, Option<Move>) {
        let s = &*self.simplex;
        let mut best = (limit, None);
        for mv in moves {
            let j = mv.column;
            let step = if mv.rate < -self.tol {
                (s.x[j] - s.lower[j]) / -mv.rate
            } else if mv.rate > self.tol && s.upper[j].is_finite() {
                (s.upper[j] - s.x[j]) / mv.rate
            } else {
                continue;
            };
            let step = step.max(0.0);
            if step < best.0 {
                best = (step, Some(*mv));
            }
        }
        best
    }

    fn advance(&mut self, moves: &[Move], step: f64) {
        let s = &mut *self.simplex;
        for mv in moves {
            if mv.rate != 0.0 {
                let j = mv.column;
                s.x[j] = (s.x[j] + step * mv.rate).clamp(s.lower[j], s.upper[j]);
            }
        }
    }

    /// Exchanges the basic column at `row` for the candidate whose image has
    /// the largest entry there; ties go to the earlier candidate.
    fn exchange(
        &mut self,
        row: usize,
        candidates: &[(usize, &[f64])],
        to_lower: bool,
    ) -> Result<(), Stop> {
        let widest = candidates.iter().fold(None, |best: Option<&(usize, &[f64])>, c| {
            match best {
                Some(b) if b.1[row].abs() >= c.1[row].abs() => Some(b),
                _ => Some(c),
            }
        });
        let Some(&(entering, image)) = widest else {
            return Err(Stop::Singular);
        };
        if image[row].abs() <= self.tol {
            return Err(Stop::Singular);
        }
        self.simplex.exchange(row, entering, image, to_lower);
        Ok(())
    }

    /// Iterates to a stationary point and returns its row multipliers.
    fn run(&mut self) -> Result<Vec<f64>, Stop> {
        loop {
            if self.steps >= self.cap {
                return Err(Stop::IterationLimit);
            }
            self.steps += 1;
            if self.simplex.basis.updates() >= REFACTOR_INTERVAL {
                self.simplex.refactor()?;
            }

            let g = self.gradient();
            let sub = Subspace::new(&*self.simplex, self.tol)?;
            let head = self.simplex.basis.head().to_vec();

            if !sub.is_empty() && self.newton_step(&sub, &g, &head)? {
                continue;
            }

            // stationary on the superbasics: price the fixed columns
            let y = self.simplex.multipliers(&g);
            let g_scale = 1.0 + g.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
            let s = &*self.simplex;
            let release = (0..s.total())
                .filter(|&j| s.upper[j] - s.lower[j] > 0.0)
                .find_map(|j| {
                    let reduced =
                        g[j] - s.column(j).iter().map(|&(i, a)| y[i] * a).sum::<f64>();
                    let wrong_sign = match s.state[j] {
                        ColumnState::AtLower => reduced < -self.tol * g_scale,
                        ColumnState::AtUpper => reduced > self.tol * g_scale,
                        ColumnState::Basic | ColumnState::Superbasic => false,
                    };
                    wrong_sign.then_some((j, reduced))
                });

            let Some((j, reduced)) = release else {
                tracing::debug!(
                    component = "active_set",
                    steps = self.steps,
                    superbasics = sub.columns.len(),
                    "QP stationary point reached"
                );
                return Ok(y);
            };
            self.release(&sub, &head, j, reduced)?;
        }
    }

    /// Takes the Newton step over the superbasics. Returns `false` when the
    /// step is negligible.
    fn newton_step(&mut self, sub: &Subspace, g: &[f64], head: &[usize]) -> Result<bool, Stop> {
        let rhs: Vec<f64> = sub
            .columns
            .iter()
            .zip(&sub.images)
            .map(|(&s, w)| -(g[s] - w.iter().zip(head).map(|(wi, &b)| wi * g[b]).sum::<f64>()))
            .collect();
        let d_s = sub.hessian.solve(&rhs);
        let d_b = sub.follow(vec![0.0; head.len()], &d_s);

        let x_scale = 1.0 + self.simplex.x.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        let largest = d_s.iter().chain(&d_b).fold(0.0_f64, |m, d| m.max(d.abs()));
        if largest <= self.tol * x_scale {
            return Ok(false);
        }

        let moves = sub.moves(&d_s, &d_b, head);
        let (step, blocking) = self.ratio_test(&moves, 1.0);
        self.advance(&moves, step);
        match blocking {
            Some(Move {
                rate,
                mover: Mover::Basic(row),
                ..
            }) => {
                let candidates: Vec<(usize, &[f64])> = sub.candidates().collect();
                self.exchange(row, &candidates, rate < 0.0)?;
            }
            Some(Move { column, rate, .. }) => self.simplex.fix(column, rate < 0.0),
            None => {}
        }
        Ok(true)
    }

    /// Moves the fixed column `j` off its bound along a direction that keeps
    /// the superbasics stationary.
    fn release(
        &mut self,
        sub: &Subspace,
        head: &[usize],
        j: usize,
        reduced: f64,
    ) -> Result<(), Stop> {
        let sigma = if self.simplex.state[j] == ColumnState::AtLower {
            1.0
        } else {
            -1.0
        };
        let w = self.simplex.basis.ftran(self.simplex.column(j));
        let quad = |k: usize| self.simplex.quad(k);

        // R·p_S = -σ·Wᵀ·Q_B·w
        let coupling: Vec<f64> = sub
            .images
            .iter()
            .map(|image| {
                -sigma
                    * sub
                        .curved
                        .iter()
                        .map(|&i| quad(head[i]) * image[i] * w[i])
                        .sum::<f64>()
            })
            .collect();
        let p_s = sub.hessian.solve(&coupling);
        let p_b = sub.follow(w.iter().map(|wi| -sigma * wi).collect(), &p_s);

        let curvature = quad(j)
            + sub
                .columns
                .iter()
                .zip(&p_s)
                .map(|(&s, p)| quad(s) * p * p)
                .sum::<f64>()
            + sub
                .curved
                .iter()
                .map(|&i| quad(head[i]) * p_b[i] * p_b[i])
                .sum::<f64>();
        let optimal_step = if curvature > self.tol {
            -sigma * reduced / curvature
        } else {
            f64::INFINITY
        };

        let mut moves = vec![Move {
            column: j,
            rate: sigma,
            mover: Mover::Released,
        }];
        moves.extend(sub.moves(&p_s, &p_b, head));
        let (limit, blocking) = self.ratio_test(&moves, f64::INFINITY);
        if optimal_step.is_infinite() && limit.is_infinite() {
            return Err(Stop::Unbounded);
        }
        self.advance(&moves, optimal_step.min(limit));

        if optimal_step <= limit {
            self.simplex.state[j] = ColumnState::Superbasic;
            return Ok(());
        }
        match blocking {
            Some(Move {
                rate,
                mover: Mover::Released,
                ..
            }) => self.simplex.fix(j, rate < 0.0),
            Some(Move {
                column,
                rate,
                mover: Mover::Superbasic,
            }) => {
                self.simplex.fix(column, rate < 0.0);
                self.simplex.state[j] = ColumnState::Superbasic;
            }
            Some(Move {
                rate,
                mover: Mover::Basic(row),
                ..
            }) => {
                let mut candidates: Vec<(usize, &[f64])> = vec![(j, w.as_slice())];
                candidates.extend(sub.candidates());
                self.simplex.state[j] = ColumnState::Superbasic;
                self.exchange(row, &candidates, rate < 0.0)?;
            }
            None => {}
        }
        Ok(())
    }
}

/// Solves a model with a quadratic objective: simplex for a starting basis,
/// then active-set iterations on that basis.
pub(crate) fn solve_quadratic(model: &Model, limits: Limits) -> Solution {
    let sf = StandardForm::from_model(model, limits.tol);
    let mut simplex = Simplex::new(&sf, limits);

    if let Err(stop) = simplex.phase_one() {
        return Solution::failed(stop.into(), simplex.iterations());
    }
    // an unbounded linear part leaves a valid vertex for the QP to start from
    match simplex.phase_two() {
        Ok(()) | Err(Stop::Unbounded) => {}
        Err(stop) => return Solution::failed(stop.into(), simplex.iterations()),
    }

    let lp_iterations = simplex.iterations();
    let cap = limits.iteration_factor * (sf.rows + sf.num_columns());
    let mut active = ActiveSet::new(&mut simplex, cap);
    let outcome = active.run();
    let steps = active.steps;
    let iterations = lp_iterations + steps;
    match outcome {
        Ok(duals) => {
            let values = simplex.values()[..sf.structural].to_vec();
            let objective = model.evaluate(&values);
            tracing::debug!(
                component = "active_set",
                status = "optimal",
                lp_iterations,
                steps,
                objective,
                "QP solved"
            );
            Solution::optimal(values, objective, iterations).with_duals(duals)
        }
        Err(stop) => {
            let status = SolveStatus::from(stop);
            tracing::debug!(component = "active_set", ?stop, lp_iterations, steps, "QP stopped");
            Solution::failed(status, iterations)
        }
    }
}
