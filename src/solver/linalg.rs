//! Dense LU factorisation with partial pivoting.
//!
//! Only the reduced Hessian of the active-set engine is factored here. Its
//! size is the number of superbasic columns, so a dense row-major layout is
//! adequate.

/// A pivot fell below the singularity threshold during factorisation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Singular {
    pub column: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct Lu {
    n: usize,
    lu: Vec<f64>,
    perm: Vec<usize>,
}

impl Lu {
    /// Factors the `n × n` row-major matrix `a` as `P·A = L·U`.
    ///
    /// A pivot with magnitude below `tol × max|a_ij|` marks the matrix singular.
    pub fn factor(mut a: Vec<f64>, n: usize, tol: f64) -> Result<Self, Singular> {
        debug_assert_eq!(a.len(), n * n);
        let scale = a.iter().fold(1.0_f64, |m, v| m.max(v.abs()));
        let threshold = tol * scale;
        let mut perm: Vec<usize> = (0..n).collect();

        for k in 0..n {
            let (p, pivot) = (k..n)
                .map(|i| (i, a[i * n + k].abs()))
                .fold((k, -1.0), |best, cur| if cur.1 > best.1 { cur } else { best });
            if pivot <= threshold {
                return Err(Singular { column: k });
            }
            if p != k {
                for j in 0..n {
                    a.swap(k * n + j, p * n + j);
                }
                perm.swap(k, p);
            }
            let diag = a[k * n + k];
            for i in (k + 1)..n {
                let factor = a[i * n + k] / diag;
                a[i * n + k] = factor;
                if factor != 0.0 {
                    for j in (k + 1)..n {
                        a[i * n + j] -= factor * a[k * n + j];
                    }
                }
            }
        }
        Ok(Self { n, lu: a, perm })
    }

    /// Solves `A·x = b`, returning `x`.
    pub fn solve(&self, b: &[f64]) -> Vec<f64> {
        let n = self.n;
        let mut x: Vec<f64> = self.perm.iter().map(|&p| b[p]).collect();
        for i in 0..n {
            let mut s = x[i];
            for j in 0..i {
                s -= self.lu[i * n + j] * x[j];
            }
            x[i] = s;
        }
        for i in (0..n).rev() {
            let mut s = x[i];
            for j in (i + 1)..n {
                s -= self.lu[i * n + j] * x[j];
            }
            x[i] = s / self.lu[i * n + i];
        }
        x
    }
}
