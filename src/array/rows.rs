//! Row-set operations over the uniform numeric representation.
//!
//! Deduplication, joins and grouping all funnel through a
//! [`NumericMatrix`]: every column label-encoded or cast to f64, missing
//! entries as NaN. Working on one representation keeps the row comparisons
//! backend-agnostic.
//!
//! NaN compares equal to NaN here (f64 total order), so rows with missing
//! keys form stable, repeatable groups instead of each NaN spawning its own
//! group.

use std::cmp::Ordering;

use crate::error::{Error, Result};

/// Row-major matrix of f64 values.
#[derive(Debug, Clone)]
pub struct NumericMatrix {
    data: Vec<f64>,
    nrows: usize,
    ncols: usize,
}

impl NumericMatrix {
    pub fn new(data: Vec<f64>, nrows: usize, ncols: usize) -> Result<Self> {
        if data.len() != nrows * ncols {
            return Err(Error::Consistency(format!(
                "matrix buffer holds {} values, expected {}x{}",
                data.len(),
                nrows,
                ncols
            )));
        }
        Ok(NumericMatrix { data, nrows, ncols })
    }

    /// Stack equal-length columns side by side.
    pub fn from_columns(columns: &[Vec<f64>]) -> Result<Self> {
        let ncols = columns.len();
        let nrows = columns.first().map_or(0, |c| c.len());
        for c in columns {
            if c.len() != nrows {
                return Err(Error::LengthMismatch {
                    expected: nrows,
                    actual: c.len(),
                });
            }
        }
        let mut data = Vec::with_capacity(nrows * ncols);
        for r in 0..nrows {
            for c in columns {
                data.push(c[r]);
            }
        }
        Ok(NumericMatrix { data, nrows, ncols })
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.ncols..(i + 1) * self.ncols]
    }

    pub fn values(&self) -> &[f64] {
        &self.data
    }

    /// Stack `other` below `self`.
    pub fn vstack(&self, other: &NumericMatrix) -> Result<NumericMatrix> {
        if self.ncols != other.ncols {
            return Err(Error::LengthMismatch {
                expected: self.ncols,
                actual: other.ncols,
            });
        }
        let mut data = self.data.clone();
        data.extend_from_slice(&other.data);
        NumericMatrix::new(data, self.nrows + other.nrows, self.ncols)
    }

    /// Copy of the rows in `[start, end)`.
    pub fn row_range(&self, start: usize, end: usize) -> Result<NumericMatrix> {
        if end < start || end > self.nrows {
            return Err(Error::IndexOutOfBounds {
                index: end as i64,
                size: self.nrows,
            });
        }
        let data = self.data[start * self.ncols..end * self.ncols].to_vec();
        NumericMatrix::new(data, end - start, self.ncols)
    }

    fn gather_rows(&self, indices: &[usize]) -> NumericMatrix {
        let mut data = Vec::with_capacity(indices.len() * self.ncols);
        for &i in indices {
            data.extend_from_slice(self.row(i));
        }
        NumericMatrix {
            data,
            nrows: indices.len(),
            ncols: self.ncols,
        }
    }
}

/// Lexicographic row comparison under f64 total order (NaN == NaN, NaN
/// sorts last).
fn cmp_rows(a: &[f64], b: &[f64]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        match x.total_cmp(y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// Output of [`unique_rows`].
#[derive(Debug, Clone)]
pub struct UniqueRows {
    /// One row per distinct key combination.
    pub rows: NumericMatrix,
    /// Original row index of each unique row's first occurrence.
    pub first_index: Vec<usize>,
    /// Maps every original row to its unique-row id.
    pub inverse: Vec<usize>,
    /// Occurrences of each unique row in the input.
    pub counts: Vec<usize>,
}

/// Deduplicate the rows of `m`.
///
/// With `sorted` true the unique rows come back in lexicographic order;
/// otherwise in order of first occurrence. The inverse mapping and counts
/// follow whichever order was chosen.
pub fn unique_rows(m: &NumericMatrix, sorted: bool) -> UniqueRows {
    let mut order: Vec<usize> = (0..m.nrows()).collect();
    order.sort_by(|&a, &b| cmp_rows(m.row(a), m.row(b)));

    // Stable sort keeps equal rows in original order, so the head of each
    // run is that key's first occurrence.
    let mut first_index: Vec<usize> = Vec::new();
    let mut counts: Vec<usize> = Vec::new();
    let mut inverse = vec![0usize; m.nrows()];
    for (rank, &row) in order.iter().enumerate() {
        let is_new = rank == 0 || cmp_rows(m.row(order[rank - 1]), m.row(row)) != Ordering::Equal;
        if is_new {
            first_index.push(row);
            counts.push(0);
        }
        let id = first_index.len() - 1;
        inverse[row] = id;
        counts[id] += 1;
    }

    if !sorted {
        // Remap ids so that unique rows appear in first-occurrence order.
        let n_unique = first_index.len();
        let mut by_first: Vec<usize> = (0..n_unique).collect();
        by_first.sort_by_key(|&id| first_index[id]);
        let mut remap = vec![0usize; n_unique];
        for (new_id, &old_id) in by_first.iter().enumerate() {
            remap[old_id] = new_id;
        }
        let mut new_first = vec![0usize; n_unique];
        let mut new_counts = vec![0usize; n_unique];
        for old_id in 0..n_unique {
            new_first[remap[old_id]] = first_index[old_id];
            new_counts[remap[old_id]] = counts[old_id];
        }
        for inv in inverse.iter_mut() {
            *inv = remap[*inv];
        }
        first_index = new_first;
        counts = new_counts;
    }

    let rows = m.gather_rows(&first_index);
    UniqueRows {
        rows,
        first_index,
        inverse,
        counts,
    }
}

/// Rows common to `a` and `b`, both assumed deduplicated. Returns the
/// matching row indices into each input, ordered lexicographically by row
/// value.
pub fn intersect_rows(a: &NumericMatrix, b: &NumericMatrix) -> Result<(Vec<usize>, Vec<usize>)> {
    if a.ncols() != b.ncols() {
        return Err(Error::LengthMismatch {
            expected: a.ncols(),
            actual: b.ncols(),
        });
    }
    let mut a_order: Vec<usize> = (0..a.nrows()).collect();
    a_order.sort_by(|&x, &y| cmp_rows(a.row(x), a.row(y)));
    let mut b_order: Vec<usize> = (0..b.nrows()).collect();
    b_order.sort_by(|&x, &y| cmp_rows(b.row(x), b.row(y)));

    let mut a_idx = Vec::new();
    let mut b_idx = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a_order.len() && j < b_order.len() {
        match cmp_rows(a.row(a_order[i]), b.row(b_order[j])) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                a_idx.push(a_order[i]);
                b_idx.push(b_order[j]);
                i += 1;
                j += 1;
            }
        }
    }
    Ok((a_idx, b_idx))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(rows: &[&[f64]]) -> NumericMatrix {
        let ncols = rows.first().map_or(0, |r| r.len());
        let data: Vec<f64> = rows.iter().flat_map(|r| r.iter().copied()).collect();
        NumericMatrix::new(data, rows.len(), ncols).unwrap()
    }

    #[test]
    fn unique_rows_first_occurrence_order() {
        let m = matrix(&[&[2.0, 0.0], &[1.0, 1.0], &[2.0, 0.0], &[0.0, 5.0]]);
        let u = unique_rows(&m, false);
        assert_eq!(u.first_index, vec![0, 1, 3]);
        assert_eq!(u.inverse, vec![0, 1, 0, 2]);
        assert_eq!(u.counts, vec![2, 1, 1]);
        assert_eq!(u.rows.row(0), &[2.0, 0.0]);
    }

    #[test]
    fn unique_rows_sorted_order() {
        let m = matrix(&[&[2.0], &[1.0], &[2.0], &[0.0]]);
        let u = unique_rows(&m, true);
        assert_eq!(u.rows.row(0), &[0.0]);
        assert_eq!(u.rows.row(1), &[1.0]);
        assert_eq!(u.rows.row(2), &[2.0]);
        assert_eq!(u.inverse, vec![2, 1, 2, 0]);
    }

    #[test]
    fn unique_rows_collapses_nan_keys() {
        let m = matrix(&[&[f64::NAN], &[1.0], &[f64::NAN]]);
        let u = unique_rows(&m, false);
        assert_eq!(u.rows.nrows(), 2);
        assert_eq!(u.inverse[0], u.inverse[2]);
    }

    #[test]
    fn intersect_rows_matches_common_keys() {
        let a = matrix(&[&[1.0], &[3.0], &[2.0]]);
        let b = matrix(&[&[2.0], &[1.0], &[9.0]]);
        let (ai, bi) = intersect_rows(&a, &b).unwrap();
        assert_eq!(ai, vec![0, 2]);
        assert_eq!(bi, vec![1, 0]);
    }
}
