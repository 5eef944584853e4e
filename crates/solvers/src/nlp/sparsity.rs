use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

use super::{EvalError, Nlp};

/// Relative perturbation used when probing for structural nonzeros.
///
/// Large enough that a variable entering a function only quadratically
/// still changes its value after rounding.
const DETECTION_STEP: f64 = 1e-3;

/// The structural nonzeros of a matrix, stored by column.
///
/// Row indices within each column are sorted and unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    nrows: usize,
    ncols: usize,
    cols: Vec<Vec<usize>>,
}

impl Pattern {
    /// Creates a pattern with no nonzeros.
    #[must_use]
    pub fn empty(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            cols: vec![Vec::new(); ncols],
        }
    }

    /// Creates a pattern where every entry is a nonzero.
    #[must_use]
    pub fn dense(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            cols: vec![(0..nrows).collect(); ncols],
        }
    }

    /// Creates a pattern from `(row, col)` pairs.
    ///
    /// Duplicates are merged.
    ///
    /// # Panics
    ///
    /// Panics if an entry lies outside `nrows` by `ncols`.
    pub fn from_entries(
        nrows: usize,
        ncols: usize,
        entries: impl IntoIterator<Item = (usize, usize)>,
    ) -> Self {
        let mut pattern = Self::empty(nrows, ncols);
        for (row, col) in entries {
            assert!(
                row < nrows && col < ncols,
                "entry ({row}, {col}) outside a {nrows}x{ncols} pattern"
            );
            pattern.cols[col].push(row);
        }
        for rows in &mut pattern.cols {
            rows.sort_unstable();
            rows.dedup();
        }
        pattern
    }

    #[must_use]
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    #[must_use]
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Number of structural nonzeros.
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.cols.iter().map(Vec::len).sum()
    }

    #[must_use]
    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.cols
            .get(col)
            .is_some_and(|rows| rows.binary_search(&row).is_ok())
    }

    /// Sorted row indices of the nonzeros in column `col`.
    #[must_use]
    pub fn column(&self, col: usize) -> &[usize] {
        &self.cols[col]
    }

    pub fn columns(&self) -> impl Iterator<Item = &[usize]> {
        self.cols.iter().map(Vec::as_slice)
    }

    /// Every nonzero as a `(row, col)` pair, in column-major order.
    pub fn entries(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.cols
            .iter()
            .enumerate()
            .flat_map(|(col, rows)| rows.iter().map(move |&row| (row, col)))
    }

    /// Returns the pattern containing the nonzeros of both operands.
    ///
    /// # Panics
    ///
    /// Panics if the shapes differ.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        assert_eq!(
            (self.nrows, self.ncols),
            (other.nrows, other.ncols),
            "pattern shapes differ"
        );
        Self::from_entries(self.nrows, self.ncols, self.entries().chain(other.entries()))
    }

    /// Partitions the nonempty columns into structurally orthogonal groups.
    ///
    /// No two columns in a group share a row, so all of a group's columns
    /// can be perturbed in one function evaluation. Columns are assigned
    /// greedily to the first compatible group in index order.
    #[must_use]
    pub fn color_columns(&self) -> Vec<Vec<usize>> {
        let mut groups: Vec<Vec<usize>> = Vec::new();
        let mut occupied: Vec<Vec<bool>> = Vec::new();

        for (col, rows) in self.cols.iter().enumerate() {
            if rows.is_empty() {
                continue;
            }
            let slot = occupied
                .iter()
                .position(|taken| rows.iter().all(|&row| !taken[row]));
            let slot = slot.unwrap_or_else(|| {
                groups.push(Vec::new());
                occupied.push(vec![false; self.nrows]);
                groups.len() - 1
            });
            groups[slot].push(col);
            for &row in rows {
                occupied[slot][row] = true;
            }
        }

        groups
    }

    /// Writes the pattern as a MatrixMarket coordinate file.
    ///
    /// Indices are 1-based and entries are listed in row-major order.
    ///
    /// # Errors
    ///
    /// Returns any I/O error from creating or writing the file.
    pub fn write_matrix_market(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let mut entries: Vec<_> = self.entries().collect();
        entries.sort_unstable();

        let mut out = BufWriter::new(File::create(path)?);
        writeln!(out, "%%MatrixMarket matrix coordinate pattern general")?;
        writeln!(out, "{} {} {}", self.nrows, self.ncols, entries.len())?;
        for (row, col) in entries {
            writeln!(out, "{} {}", row + 1, col + 1)?;
        }
        out.flush()
    }
}

/// Detects the constraint Jacobian and objective gradient patterns of `nlp`.
///
/// Each variable is perturbed in turn at every point in `points`, and each
/// function output whose value changes is marked as a nonzero. The result
/// is the union over all points, so more points give a more reliable
/// pattern. Returns `(jacobian, gradient)`.
///
/// # Errors
///
/// Propagates any evaluation failure from the NLP.
///
/// # Panics
///
/// Panics if a point's length differs from the number of variables.
pub fn detect<N: Nlp>(nlp: &N, points: &[Vec<f64>]) -> Result<(Pattern, Pattern), EvalError> {
    let n = nlp.num_variables();
    let m = nlp.num_constraints();
    let mut jacobian = Vec::new();
    let mut gradient = Vec::new();

    let mut g0 = vec![0.0; m];
    let mut g1 = vec![0.0; m];

    for x in points {
        assert_eq!(x.len(), n, "detection point has the wrong length");
        let f0 = nlp.objective(x)?;
        nlp.constraints(x, &mut g0)?;

        let mut work = x.clone();
        for j in 0..n {
            work[j] = x[j] + DETECTION_STEP * x[j].abs().max(1.0);

            let f1 = nlp.objective(&work)?;
            if f1.to_bits() != f0.to_bits() {
                gradient.push((0, j));
            }

            nlp.constraints(&work, &mut g1)?;
            jacobian.extend(
                g0.iter()
                    .zip(&g1)
                    .enumerate()
                    .filter(|(_, (a, b))| a.to_bits() != b.to_bits())
                    .map(|(i, _)| (i, j)),
            );

            work[j] = x[j];
        }
    }

    Ok((
        Pattern::from_entries(m, n, jacobian),
        Pattern::from_entries(1, n, gradient),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    use colloc_core::Bounds;

    #[test]
    fn coloring_separates_shared_rows() {
        // Tridiagonal 4x4: only columns 0 and 3 share no row.
        let pattern = Pattern::from_entries(
            4,
            4,
            [
                (0, 0),
                (1, 0),
                (0, 1),
                (1, 1),
                (2, 1),
                (1, 2),
                (2, 2),
                (3, 2),
                (2, 3),
                (3, 3),
            ],
        );

        let groups = pattern.color_columns();

        assert_eq!(groups, vec![vec![0, 3], vec![1], vec![2]]);
        for group in &groups {
            for (a, &c1) in group.iter().enumerate() {
                for &c2 in &group[a + 1..] {
                    assert!(
                        pattern
                            .column(c1)
                            .iter()
                            .all(|r| !pattern.column(c2).contains(r))
                    );
                }
            }
        }
    }

    #[test]
    fn dense_pattern_needs_one_color_per_column() {
        assert_eq!(Pattern::dense(3, 4).color_columns().len(), 4);
        assert_eq!(Pattern::dense(3, 4).nnz(), 12);
        assert!(Pattern::empty(3, 4).color_columns().is_empty());
    }

    #[test]
    fn union_and_contains() {
        let a = Pattern::from_entries(2, 2, [(0, 0), (1, 1)]);
        let b = Pattern::from_entries(2, 2, [(0, 0), (0, 1)]);

        let both = a.union(&b);

        assert_eq!(both.nnz(), 3);
        assert!(both.contains(0, 1));
        assert!(!both.contains(1, 0));
    }

    struct Chain {
        bounds: Vec<Bounds>,
    }

    impl Nlp for Chain {
        fn variable_bounds(&self) -> &[Bounds] {
            &self.bounds
        }

        fn constraint_bounds(&self) -> &[Bounds] {
            &self.bounds[..2]
        }

        fn objective(&self, x: &[f64]) -> Result<f64, EvalError> {
            Ok(x[2] * x[2])
        }

        fn constraints(&self, x: &[f64], g: &mut [f64]) -> Result<(), EvalError> {
            g[0] = x[0] - x[1];
            g[1] = x[1] * x[2];
            Ok(())
        }
    }

    #[test]
    fn detects_structure_by_perturbation() {
        let nlp = Chain {
            bounds: vec![Bounds::unbounded(); 3],
        };

        let (jacobian, gradient) = detect(&nlp, &[vec![1.0, 2.0, 3.0]]).unwrap();

        let expected = Pattern::from_entries(2, 3, [(0, 0), (0, 1), (1, 1), (1, 2)]);
        assert_eq!(jacobian, expected);
        assert_eq!(gradient, Pattern::from_entries(1, 3, [(0, 2)]));
    }

    #[test]
    fn products_vanishing_at_the_probe_point_are_missed() {
        let nlp = Chain {
            bounds: vec![Bounds::unbounded(); 3],
        };

        let (at_zero, _) = detect(&nlp, &[vec![0.0; 3]]).unwrap();
        let (merged, _) = detect(&nlp, &[vec![0.0; 3], vec![1.0, 2.0, 3.0]]).unwrap();

        assert!(!at_zero.contains(1, 1));
        assert!(merged.contains(1, 1));
        assert!(merged.contains(1, 2));
    }

    #[test]
    fn writes_matrix_market() {
        let pattern = Pattern::from_entries(2, 3, [(1, 2), (0, 0)]);
        let path = std::env::temp_dir().join(format!(
            "colloc_sparsity_test_{}.mtx",
            std::process::id()
        ));

        pattern.write_matrix_market(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(
            text,
            "%%MatrixMarket matrix coordinate pattern general\n2 3 2\n1 1\n2 3\n"
        );
    }
}
