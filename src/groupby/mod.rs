//! Grouped aggregation over a DataFrame.
//!
//! [`DataFrameGroupBy`] partitions the source table's rows by the values of
//! the key columns. The expensive part — deduplicating key rows into the
//! `groups` table and the row→group index — happens eagerly at
//! construction; aggregates are computed lazily inside one [`agg`] call
//! with a dependency cache keyed by (column, function), so `mean` reuses
//! `sum` and `count`, `var` reuses `mean`, and so on.
//!
//! [`agg`]: DataFrameGroupBy::agg

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::array::rows::unique_rows;
use crate::array::{Array, Idx};
use crate::backend::tensor::deterministic_scatter_enabled;
use crate::backend::{DeterministicScatter, Scalar};
use crate::dataframe::base::{ColSelector, DataFrame};
use crate::error::{Error, Result};

/// Per-group reduction.
#[derive(Clone)]
pub enum AggFunc {
    /// Number of rows in the group.
    Count,
    /// Sum of the column over the group.
    Sum,
    /// `sum / count`.
    Mean,
    /// Bessel-corrected sample variance (divides by `count - 1`).
    Var,
    /// `sqrt(var)`.
    Std,
    /// Standard error of the mean: `std / sqrt(count)`.
    Sem,
    Min,
    Max,
    /// Caller-supplied reduction over each group's raw values. Not
    /// memoized, and invoked once per group including missing-key groups.
    Custom(Arc<dyn Fn(&Array) -> Result<Scalar> + Send + Sync>),
}

impl fmt::Debug for AggFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggFunc::Count => write!(f, "Count"),
            AggFunc::Sum => write!(f, "Sum"),
            AggFunc::Mean => write!(f, "Mean"),
            AggFunc::Var => write!(f, "Var"),
            AggFunc::Std => write!(f, "Std"),
            AggFunc::Sem => write!(f, "Sem"),
            AggFunc::Min => write!(f, "Min"),
            AggFunc::Max => write!(f, "Max"),
            AggFunc::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// Cache key for the named reductions (custom closures bypass the cache).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum AggKind {
    Count,
    Sum,
    Mean,
    Var,
    Std,
    Sem,
    Min,
    Max,
}

impl AggFunc {
    fn kind(&self) -> Option<AggKind> {
        match self {
            AggFunc::Count => Some(AggKind::Count),
            AggFunc::Sum => Some(AggKind::Sum),
            AggFunc::Mean => Some(AggKind::Mean),
            AggFunc::Var => Some(AggKind::Var),
            AggFunc::Std => Some(AggKind::Std),
            AggFunc::Sem => Some(AggKind::Sem),
            AggFunc::Min => Some(AggKind::Min),
            AggFunc::Max => Some(AggKind::Max),
            AggFunc::Custom(_) => None,
        }
    }
}

type AggCache = HashMap<(String, AggKind), Array>;

pub struct DataFrameGroupBy<'a> {
    df: &'a DataFrame,
    by: Vec<String>,
    dropna: bool,
    /// One row per distinct key combination, missing-key groups included.
    groups: DataFrame,
    /// Per-group flag: any key column missing for this group.
    na: Vec<bool>,
    /// Maps every source row to its group index.
    row_to_group: Array,
}

impl DataFrame {
    /// Group by the key columns with sorted group order, dropping
    /// missing-key groups from visible output.
    pub fn groupby(&self, by: &[&str]) -> Result<DataFrameGroupBy<'_>> {
        self.groupby_opts(by, true, true)
    }

    /// Group by the key columns. `sort` selects sorted versus
    /// first-occurrence group order; `dropna` hides groups whose key
    /// contains a missing value.
    pub fn groupby_opts(
        &self,
        by: &[&str],
        sort: bool,
        dropna: bool,
    ) -> Result<DataFrameGroupBy<'_>> {
        if by.is_empty() {
            return Err(Error::InvalidInput("no key columns selected".to_string()));
        }
        let by: Vec<String> = by.iter().map(|s| s.to_string()).collect();
        let key_df = self.select(&ColSelector::Names(by.clone()), &Idx::All)?;

        let matrix = key_df.to_numeric_matrix()?;
        let uniq = unique_rows(&matrix, sort);
        debug!(
            "groupby: {} rows collapse to {} groups over keys {:?}",
            self.len(),
            uniq.rows.nrows(),
            by
        );

        let first = Array::from(
            uniq.first_index
                .iter()
                .map(|&i| i as i64)
                .collect::<Vec<i64>>(),
        );
        let mut groups = DataFrame::new();
        for name in &by {
            groups.set_column(name, self.column(name)?.get(&Idx::Take(&first))?)?;
        }

        // Any-key-missing flag, computed on the deduplicated key subset.
        let mut na = vec![false; groups.len()];
        for name in &by {
            let flags = groups.column(name)?.isna();
            for (g, slot) in na.iter_mut().enumerate() {
                if flags.raw_i64_at(g) != 0 {
                    *slot = true;
                }
            }
        }

        let row_to_group = Array::from(
            uniq.inverse
                .iter()
                .map(|&i| i as i64)
                .collect::<Vec<i64>>(),
        );

        Ok(DataFrameGroupBy {
            df: self,
            by,
            dropna,
            groups,
            na,
            row_to_group,
        })
    }
}

impl<'a> DataFrameGroupBy<'a> {
    /// Total group count, missing-key groups included.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn keys(&self) -> &[String] {
        &self.by
    }

    /// The distinct key combinations as a table. With `dropna` set,
    /// missing-key groups are hidden (they stay present internally so the
    /// group index space is stable).
    pub fn groups(&self) -> Result<DataFrame> {
        if self.dropna {
            let keep = Array::from(self.na.iter().map(|&b| !b).collect::<Vec<bool>>());
            self.groups.select(&ColSelector::All, &Idx::Mask(&keep))
        } else {
            self.groups.select(&ColSelector::All, &Idx::All)
        }
    }

    /// Lazy iteration of (key tuple, sub-table of matching rows) pairs over
    /// the non-key columns, skipping missing-key groups when `dropna` is
    /// set.
    pub fn iter(&self) -> GroupIter<'_> {
        let non_key: Vec<String> = self
            .df
            .column_names()
            .iter()
            .filter(|name| !self.by.contains(*name))
            .cloned()
            .collect();
        GroupIter {
            gb: self,
            non_key,
            next_group: 0,
        }
    }

    /// Compute the named reductions, returning the (filtered) group keys
    /// plus one column per requested aggregate, in request order.
    pub fn agg(&self, specs: &[(&str, &str, AggFunc)]) -> Result<DataFrame> {
        let mut cache: AggCache = HashMap::new();
        let mut outputs: Vec<(String, Array)> = Vec::new();
        for (out_name, column, func) in specs {
            let result = self.compute(column, func, &mut cache)?;
            outputs.push((out_name.to_string(), result));
        }

        let mut table = self.groups()?;
        let keep = Array::from(self.na.iter().map(|&b| !b).collect::<Vec<bool>>());
        for (name, arr) in outputs {
            let arr = if self.dropna {
                arr.get(&Idx::Mask(&keep))?
            } else {
                arr
            };
            table.set_column(&name, arr)?;
        }
        Ok(table)
    }

    fn compute(&self, column: &str, func: &AggFunc, cache: &mut AggCache) -> Result<Array> {
        match func.kind() {
            Some(kind) => self.compute_named(column, kind, cache),
            None => match func {
                AggFunc::Custom(f) => self.compute_custom(column, f),
                _ => Err(Error::Consistency(
                    "named aggregate reported no cache kind".to_string(),
                )),
            },
        }
    }

    fn compute_named(&self, column: &str, kind: AggKind, cache: &mut AggCache) -> Result<Array> {
        let key = (column.to_string(), kind);
        if let Some(hit) = cache.get(&key) {
            return Ok(hit.clone());
        }

        let col = self.df.column(column)?;
        // Group indices on the target column's backend and device, dtype
        // untouched.
        let group_idx = self.row_to_group.like(col, false, true)?;

        let result = match kind {
            AggKind::Count => group_idx.bincount(None)?,
            AggKind::Sum => group_idx.bincount(Some(col))?,
            AggKind::Mean => {
                let sum = self.compute_named(column, AggKind::Sum, cache)?;
                let count = self.compute_named(column, AggKind::Count, cache)?;
                sum.div(&count)?
            }
            AggKind::Var => {
                let count = self.compute_named(column, AggKind::Count, cache)?;
                let mean = self.compute_named(column, AggKind::Mean, cache)?;
                let mean_per_row = mean.get(&Idx::Take(&group_idx))?;
                let dev = col.sub(&mean_per_row)?;
                let sq = dev.pow_scalar(2.0)?;
                let ssq = group_idx.bincount(Some(&sq))?;
                ssq.div(&count.sub_scalar(1i64)?)?
            }
            AggKind::Std => {
                let var = self.compute_named(column, AggKind::Var, cache)?;
                var.pow_scalar(0.5)?
            }
            AggKind::Sem => {
                let std = self.compute_named(column, AggKind::Std, cache)?;
                let count = self.compute_named(column, AggKind::Count, cache)?;
                std.div(&count.pow_scalar(0.5)?)?
            }
            AggKind::Min => self.extreme(col, &group_idx, true)?,
            AggKind::Max => self.extreme(col, &group_idx, false)?,
        };
        cache.insert(key, result.clone());
        Ok(result)
    }

    /// Min/max via argsort plus scatter. Values are written in sort order
    /// and the last write per group index wins, so sorting descending
    /// leaves the minimum and ascending leaves the maximum. Duplicate
    /// group indices make the tensor backend's scatter order undefined
    /// unless deterministic algorithms are on, so the flag is acquired for
    /// the duration of the scatter and restored afterwards, failures
    /// included.
    fn extreme(&self, col: &Array, group_idx: &Array, min: bool) -> Result<Array> {
        let order = col.argsort(min);
        let g_sorted = group_idx.get(&Idx::Take(&order))?;
        let v_sorted = col.get(&Idx::Take(&order))?;
        let mut result = Array::empty(
            self.group_count(),
            false,
            col.backend(),
            col.dtype(),
            col.device(),
        )?;

        let _guard = if col.is_tensor() && !deterministic_scatter_enabled() {
            Some(DeterministicScatter::enable())
        } else {
            None
        };
        result.set(&Idx::Take(&g_sorted), &v_sorted)?;
        Ok(result)
    }

    /// Arbitrary reduction: invoked on every group's raw values, missing-
    /// key groups included, writing each scalar into the fixed-capacity
    /// result at the group's original index.
    fn compute_custom(
        &self,
        column: &str,
        func: &Arc<dyn Fn(&Array) -> Result<Scalar> + Send + Sync>,
    ) -> Result<Array> {
        let col = self.df.column(column)?;
        let mut result = Array::empty(
            self.group_count(),
            false,
            col.backend(),
            col.dtype(),
            col.device(),
        )?;
        for g in 0..self.group_count() {
            let keep = self.rows_in_group(g);
            let values = col.get(&Idx::Mask(&keep))?;
            let reduced = func(&values)?;
            result.set_scalar(g as i64, &reduced)?;
        }
        Ok(result)
    }

    fn rows_in_group(&self, group: usize) -> Array {
        Array::from(
            (0..self.df.len())
                .map(|i| self.row_to_group.raw_i64_at(i) == group as i64)
                .collect::<Vec<bool>>(),
        )
    }
}

/// Iterator over (group key, sub-table) pairs.
pub struct GroupIter<'a> {
    gb: &'a DataFrameGroupBy<'a>,
    non_key: Vec<String>,
    next_group: usize,
}

impl<'a> Iterator for GroupIter<'a> {
    type Item = Result<(Vec<Scalar>, DataFrame)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let g = self.next_group;
            if g >= self.gb.group_count() {
                return None;
            }
            self.next_group += 1;
            if self.gb.dropna && self.gb.na[g] {
                continue;
            }
            let key = match self.gb.groups.row(&ColSelector::All, g as i64) {
                Ok(key) => key,
                Err(e) => return Some(Err(e)),
            };
            let keep = self.gb.rows_in_group(g);
            let sub = self
                .gb
                .df
                .select(&ColSelector::Names(self.non_key.clone()), &Idx::Mask(&keep));
            return Some(sub.map(|table| (key, table)));
        }
    }
}
