//! Merge (equi-join) between DataFrames.
//!
//! Only single/multi-key inner joins are supported. The algorithm works on
//! the uniform numeric key representation: both key subsets are
//! concatenated before label encoding so codes agree across the two sides,
//! each side's key rows are deduplicated with occurrence counts, the unique
//! key sets are intersected, and every original row whose key survives is
//! expanded into the cross-product of matching rows from the other side.
//! Right-side duplicates for a given left row come out contiguous, matching
//! conventional relational equi-join output.

use log::debug;

use crate::array::rows::{intersect_rows, unique_rows};
use crate::array::{Array, Idx};
use crate::dataframe::base::{concat, ColSelector, DataFrame};
use crate::error::{Error, Result};

/// Join strategy. Everything except `Inner` is recognized but not
/// implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinHow {
    Inner,
    Left,
    Right,
    Outer,
}

/// Options for [`DataFrame::merge`].
#[derive(Debug, Clone)]
pub struct MergeOptions {
    pub how: JoinHow,
    /// Shared key names; mutually exclusive with `left_on`/`right_on`.
    pub on: Option<Vec<String>>,
    pub left_on: Option<Vec<String>>,
    pub right_on: Option<Vec<String>>,
    /// Appended to colliding non-key column names, left and right.
    pub suffixes: (String, String),
}

impl Default for MergeOptions {
    fn default() -> Self {
        MergeOptions {
            how: JoinHow::Inner,
            on: None,
            left_on: None,
            right_on: None,
            suffixes: ("_x".to_string(), "_y".to_string()),
        }
    }
}

impl MergeOptions {
    pub fn on(keys: &[&str]) -> Self {
        MergeOptions {
            on: Some(keys.iter().map(|s| s.to_string()).collect()),
            ..MergeOptions::default()
        }
    }
}

impl DataFrame {
    /// Inner equi-join with `other` on the resolved key columns.
    ///
    /// Without explicit keys the join is on the name intersection, in this
    /// table's column order. Duplicate keys on either side produce the full
    /// cartesian product of matches; output rows are grouped by key, left
    /// occurrences in order, right matches contiguous per left row.
    pub fn merge(&self, other: &DataFrame, options: &MergeOptions) -> Result<DataFrame> {
        if options.how != JoinHow::Inner {
            return Err(Error::NotImplemented(format!(
                "{:?} join; only inner joins are supported",
                options.how
            )));
        }

        let (left_on, right_on) = self.resolve_keys(other, options)?;

        // Concatenate the key subsets before numeric coercion so that
        // label codes agree across both sides.
        let left_keys = self.select(&ColSelector::Names(left_on.clone()), &Idx::All)?;
        let rename: Vec<(&str, &str)> = right_on
            .iter()
            .zip(&left_on)
            .map(|(r, l)| (r.as_str(), l.as_str()))
            .collect();
        let right_keys = other
            .select(&ColSelector::Names(right_on.clone()), &Idx::All)?
            .rename(&rename)?;
        let combined = concat(&[&left_keys, &right_keys], 0)?.to_numeric_matrix()?;
        let larr = combined.row_range(0, self.len())?;
        let rarr = combined.row_range(self.len(), combined.nrows())?;

        let lu = unique_rows(&larr, false);
        let ru = unique_rows(&rarr, false);
        let (l_ids, r_ids) = intersect_rows(&lu.rows, &ru.rows)?;
        debug!(
            "merge: {} left keys, {} right keys, {} in common",
            lu.rows.nrows(),
            ru.rows.nrows(),
            l_ids.len()
        );

        let mut left_rows_by_id: Vec<Vec<usize>> = vec![Vec::new(); lu.rows.nrows()];
        for (row, &id) in lu.inverse.iter().enumerate() {
            left_rows_by_id[id].push(row);
        }
        let mut right_rows_by_id: Vec<Vec<usize>> = vec![Vec::new(); ru.rows.nrows()];
        for (row, &id) in ru.inverse.iter().enumerate() {
            right_rows_by_id[id].push(row);
        }

        let mut lindices: Vec<i64> = Vec::new();
        let mut rindices: Vec<i64> = Vec::new();
        for (&lid, &rid) in l_ids.iter().zip(&r_ids) {
            for &lrow in &left_rows_by_id[lid] {
                for &rrow in &right_rows_by_id[rid] {
                    lindices.push(lrow as i64);
                    rindices.push(rrow as i64);
                }
            }
        }
        debug!("merge: emitting {} rows", lindices.len());

        let l_take = Array::from(lindices);
        let r_take = Array::from(rindices);
        let left = self.select(&ColSelector::All, &Idx::Take(&l_take))?;
        let mut right = other.select(&ColSelector::All, &Idx::Take(&r_take))?;

        // Shared key columns are already present on the left.
        let dup_keys: Vec<&str> = left_on
            .iter()
            .filter(|l| right_on.contains(l))
            .map(|s| s.as_str())
            .collect();
        if !dup_keys.is_empty() {
            right.delete(&dup_keys)?;
        }

        let left_rename: Vec<(String, String)> = left
            .column_names()
            .iter()
            .filter(|name| right.contains_column(name.as_str()))
            .map(|name| (name.clone(), format!("{}{}", name, options.suffixes.0)))
            .collect();
        let right_rename: Vec<(String, String)> = right
            .column_names()
            .iter()
            .filter(|name| left.contains_column(name.as_str()))
            .map(|name| (name.clone(), format!("{}{}", name, options.suffixes.1)))
            .collect();
        let left = left.rename(
            &left_rename
                .iter()
                .map(|(a, b)| (a.as_str(), b.as_str()))
                .collect::<Vec<_>>(),
        )?;
        let right = right.rename(
            &right_rename
                .iter()
                .map(|(a, b)| (a.as_str(), b.as_str()))
                .collect::<Vec<_>>(),
        )?;

        concat(&[&left, &right], 1)
    }

    fn resolve_keys(
        &self,
        other: &DataFrame,
        options: &MergeOptions,
    ) -> Result<(Vec<String>, Vec<String>)> {
        if let Some(on) = &options.on {
            if options.left_on.is_some() || options.right_on.is_some() {
                return Err(Error::InvalidInput(
                    "left_on/right_on must be unset when on is given".to_string(),
                ));
            }
            return Ok((on.clone(), on.clone()));
        }
        match (&options.left_on, &options.right_on) {
            (Some(l), Some(r)) => {
                if l.len() != r.len() {
                    return Err(Error::LengthMismatch {
                        expected: l.len(),
                        actual: r.len(),
                    });
                }
                Ok((l.clone(), r.clone()))
            }
            (None, None) => {
                let shared: Vec<String> = self
                    .column_names()
                    .iter()
                    .filter(|name| other.contains_column(name.as_str()))
                    .cloned()
                    .collect();
                if shared.is_empty() {
                    return Err(Error::InvalidInput(
                        "no common columns to merge on".to_string(),
                    ));
                }
                Ok((shared.clone(), shared))
            }
            _ => Err(Error::InvalidInput(
                "left_on and right_on must be given together".to_string(),
            )),
        }
    }
}
