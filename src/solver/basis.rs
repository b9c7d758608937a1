//! Product-form basis inverse.
//!
//! `B⁻¹` is kept as a file of elementary eta matrices, `B⁻¹ = E_k ⋯ E_1`.
//! Each eta records one column exchange: the pivot position, the pivot value
//! and the other nonzeros of the transformed entering column. A basis change
//! appends one eta; [`Basis::factor`] rebuilds a short file from the basic
//! columns themselves. Solves cost the nonzeros of the file, not `m²`.

use super::linalg::Singular;

#[derive(Debug, Clone)]
struct Eta {
    row: usize,
    pivot: f64,
    /// `(i, alpha_i)` for the nonzeros off the pivot row.
    others: Vec<(usize, f64)>,
}

impl Eta {
    fn new(row: usize, alpha: &[f64]) -> Self {
        let others = alpha
            .iter()
            .enumerate()
            .filter(|&(i, &a)| i != row && a != 0.0)
            .map(|(i, &a)| (i, a))
            .collect();
        Self {
            row,
            pivot: alpha[row],
            others,
        }
    }

    /// `v ← E·v`
    fn apply(&self, v: &mut [f64]) {
        if v[self.row] == 0.0 {
            return;
        }
        let vr = v[self.row] / self.pivot;
        v[self.row] = vr;
        for &(i, a) in &self.others {
            v[i] -= a * vr;
        }
    }

    /// `u ← uᵀ·E`
    fn apply_transposed(&self, u: &mut [f64]) {
        let s = self
            .others
            .iter()
            .fold(u[self.row], |s, &(i, a)| s - u[i] * a);
        u[self.row] = s / self.pivot;
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Basis {
    /// Column basic at each row position.
    head: Vec<usize>,
    etas: Vec<Eta>,
    updates: usize,
}

impl Basis {
    /// Basis of signed unit columns: `head[i]` is `signs[i]·e_i`.
    pub fn unit(head: Vec<usize>, signs: &[f64]) -> Self {
        let etas = signs
            .iter()
            .enumerate()
            .map(|(row, &pivot)| Eta {
                row,
                pivot,
                others: Vec::new(),
            })
            .collect();
        Self {
            head,
            etas,
            updates: 0,
        }
    }

    /// Factors the basis whose position `k` would hold `head[k]` with entries
    /// `columns[k]`.
    ///
    /// Columns are inserted shortest first, each at the untaken position with
    /// the largest pivot, so the positions of the result may differ from the
    /// input order. A pivot at or below `tol` marks the basis singular.
    pub fn factor(
        head: &[usize],
        columns: &[&[(usize, f64)]],
        tol: f64,
    ) -> Result<Self, Singular> {
        let m = head.len();
        let mut basis = Self {
            head: vec![0; m],
            etas: Vec::with_capacity(m),
            updates: 0,
        };
        let mut order: Vec<usize> = (0..m).collect();
        order.sort_by_key(|&k| (columns[k].len(), head[k]));

        let mut taken = vec![false; m];
        for k in order {
            let alpha = basis.ftran(columns[k]);
            let (row, magnitude) = alpha
                .iter()
                .enumerate()
                .filter(|&(i, _)| !taken[i])
                .map(|(i, a)| (i, a.abs()))
                .fold((0, 0.0), |best, cur| if cur.1 > best.1 { cur } else { best });
            if magnitude <= tol {
                return Err(Singular { column: head[k] });
            }
            taken[row] = true;
            basis.etas.push(Eta::new(row, &alpha));
            basis.head[row] = head[k];
        }
        Ok(basis)
    }

    pub fn rows(&self) -> usize {
        self.head.len()
    }

    pub fn head(&self) -> &[usize] {
        &self.head
    }

    /// Column exchanges since the last factorisation.
    pub fn updates(&self) -> usize {
        self.updates
    }

    /// `B⁻¹·a` for a sparse column `a`.
    pub fn ftran(&self, column: &[(usize, f64)]) -> Vec<f64> {
        let mut v = vec![0.0; self.rows()];
        for &(i, a) in column {
            v[i] += a;
        }
        for eta in &self.etas {
            eta.apply(&mut v);
        }
        v
    }

    /// `cᵀ·B⁻¹` for a sparse `c` indexed by basis position.
    pub fn btran(&self, c: &[(usize, f64)]) -> Vec<f64> {
        let mut u = vec![0.0; self.rows()];
        for &(i, v) in c {
            u[i] += v;
        }
        for eta in self.etas.iter().rev() {
            eta.apply_transposed(&mut u);
        }
        u
    }

    /// Row `r` of `B⁻¹`.
    pub fn row(&self, r: usize) -> Vec<f64> {
        self.btran(&[(r, 1.0)])
    }

    /// Makes `entering` basic at position `row`, where `alpha` is
    /// `B⁻¹·a_entering` for the current basis.
    pub fn replace(&mut self, row: usize, entering: usize, alpha: &[f64]) {
        self.etas.push(Eta::new(row, alpha));
        self.head[row] = entering;
        self.updates += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: &[f64], b: &[f64]) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < 1e-12, "{:?} != {:?}", a, b);
        }
    }

    #[test]
    fn test_unit_basis_divides_by_sign() {
        let basis = Basis::unit(vec![7, 8], &[-1.0, 1.0]);
        assert_close(&basis.ftran(&[(0, 2.0), (1, 3.0)]), &[-2.0, 3.0]);
        assert_close(&basis.btran(&[(0, 2.0)]), &[-2.0, 0.0]);
        assert_eq!(basis.head(), &[7, 8]);
    }

    #[test]
    fn test_replace_matches_direct_factor() {
        // B = [[1, 1], [0, 2]] reached by swapping column 5 = (1, 2) into row 1
        let mut updated = Basis::unit(vec![4, 9], &[1.0, 1.0]);
        let a5 = [(0, 1.0), (1, 2.0)];
        let alpha = updated.ftran(&a5);
        updated.replace(1, 5, &alpha);
        assert_eq!(updated.head(), &[4, 5]);
        assert_eq!(updated.updates(), 1);

        let a4: &[(usize, f64)] = &[(0, 1.0)];
        let factored = Basis::factor(&[4, 5], &[a4, &a5], 1e-12).unwrap();
        assert_eq!(factored.head(), &[4, 5]);
        assert_eq!(factored.updates(), 0);

        // B·[1, 2] = [3, 4]
        let rhs = [(0, 3.0), (1, 4.0)];
        assert_close(&updated.ftran(&rhs), &[1.0, 2.0]);
        assert_close(&factored.ftran(&rhs), &[1.0, 2.0]);
        // B⁻¹ = [[1, -0.5], [0, 0.5]]
        assert_close(&updated.row(0), &[1.0, -0.5]);
        assert_close(&factored.row(1), &[0.0, 0.5]);
    }

    #[test]
    fn test_factor_reorders_positions() {
        // the longer column is inserted last and takes the free position
        let long: &[(usize, f64)] = &[(0, 1.0), (1, 1.0)];
        let short: &[(usize, f64)] = &[(1, 3.0)];
        let basis = Basis::factor(&[2, 6], &[long, short], 1e-12).unwrap();
        assert_eq!(basis.head(), &[2, 6]);
        let basis = Basis::factor(&[6, 2], &[short, long], 1e-12).unwrap();
        assert_eq!(basis.head(), &[2, 6]);
        assert_close(&basis.ftran(&[(0, 1.0), (1, 4.0)]), &[1.0, 1.0]);
    }

    #[test]
    fn test_dependent_columns_are_singular() {
        let a: &[(usize, f64)] = &[(0, 1.0), (1, 1.0)];
        let b: &[(usize, f64)] = &[(0, 2.0), (1, 2.0)];
        let err = Basis::factor(&[3, 4], &[a, b], 1e-9).unwrap_err();
        assert_eq!(err.column, 4);
    }

    #[test]
    fn test_empty_basis() {
        let basis = Basis::factor(&[], &[], 1e-9).unwrap();
        assert!(basis.ftran(&[]).is_empty());
        assert!(basis.btran(&[]).is_empty());
    }
}
