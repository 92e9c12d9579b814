//! Columnar table over backend-unifying arrays.
//!
//! A [`DataFrame`] is an ordered mapping from column name to [`Array`];
//! every column has the same length and is one-dimensional. Columns from
//! both backends can live side by side in one table, each keeping its own
//! dtype, device and missing-value semantics.

use std::collections::HashMap;
use std::fmt;

use rayon::prelude::*;

use crate::array::rows::NumericMatrix;
use crate::array::{concat as concat_arrays, Array, Idx};
use crate::backend::dense::merge_dtypes;
use crate::backend::{Backend, Buffer, DType, Device, Scalar, Tensor};
use crate::error::{Error, Result};

/// Column selector: a single name, an explicit list, or every column.
///
/// There is deliberately no bounded positional slice over columns — whether
/// `1..3` means names or positions is ambiguous, so only the unconstrained
/// "all columns" form exists.
#[derive(Debug, Clone)]
pub enum ColSelector {
    Name(String),
    Names(Vec<String>),
    All,
}

impl From<&str> for ColSelector {
    fn from(name: &str) -> Self {
        ColSelector::Name(name.to_string())
    }
}

impl From<&[&str]> for ColSelector {
    fn from(names: &[&str]) -> Self {
        ColSelector::Names(names.iter().map(|s| s.to_string()).collect())
    }
}

/// Value forms accepted by multi-column assignment. The batch dimension is
/// trailing: one entry per selected column, each entry then broadcast down
/// that column's rows.
#[derive(Debug, Clone)]
pub enum ColumnsValue<'a> {
    /// One scalar for every selected column.
    Scalar(Scalar),
    /// One scalar per column, taken element-wise from a 1-D array of
    /// length 1 or the number of selected columns.
    PerColumn(&'a Array),
    /// One value array per column (length 1 or the number of selected
    /// columns).
    Rows(&'a [Array]),
}

/// A 2-D stack of the table's columns on the tensor backend, row-major.
#[derive(Debug, Clone)]
pub struct TensorMatrix {
    pub values: Array,
    pub nrows: usize,
    pub ncols: usize,
}

#[derive(Debug, Clone, Default)]
pub struct DataFrame {
    columns: Vec<Array>,
    column_names: Vec<String>,
    column_indices: HashMap<String, usize>,
}

impl DataFrame {
    /// Create an empty DataFrame.
    pub fn new() -> Self {
        DataFrame::default()
    }

    /// Build from (name, column) pairs, broadcasting length-1 columns to
    /// the common length. With `copy` true every column gets fresh
    /// writeable storage; otherwise columns alias their inputs.
    pub fn from_pairs(pairs: Vec<(&str, Array)>, copy: bool) -> Result<Self> {
        let mut target: Option<usize> = None;
        for (_, arr) in &pairs {
            if arr.len() != 1 {
                match target {
                    Some(t) if t != arr.len() => {
                        return Err(Error::LengthMismatch {
                            expected: t,
                            actual: arr.len(),
                        });
                    }
                    _ => target = Some(arr.len()),
                }
            }
        }
        // All length-1 columns broadcast against each other to length 1.
        let target = target.unwrap_or(1);

        let mut df = DataFrame::new();
        for (name, arr) in pairs {
            // Only genuinely short columns go through the broadcast view;
            // full-length columns keep their own writeability.
            let arr = if arr.len() == target {
                arr
            } else {
                arr.broadcast_to(target)?
            };
            let arr = if copy { arr.copy() } else { arr };
            df.push_column(name, arr)?;
        }
        Ok(df)
    }

    /// Build from a 2-D numeric matrix; names default to positional
    /// integers.
    pub fn from_matrix(m: &NumericMatrix, columns: Option<Vec<String>>) -> Result<Self> {
        let names = match columns {
            Some(names) => {
                if names.len() != m.ncols() {
                    return Err(Error::LengthMismatch {
                        expected: m.ncols(),
                        actual: names.len(),
                    });
                }
                names
            }
            None => (0..m.ncols()).map(|i| i.to_string()).collect(),
        };
        let mut df = DataFrame::new();
        for (j, name) in names.iter().enumerate() {
            let col: Vec<f64> = (0..m.nrows()).map(|i| m.row(i)[j]).collect();
            df.push_column(name, Array::from(col))?;
        }
        Ok(df)
    }

    /// Build from a 2-D tensor stack; names default to positional integers.
    pub fn from_tensor_matrix(m: &TensorMatrix, columns: Option<Vec<String>>) -> Result<Self> {
        if m.values.len() != m.nrows * m.ncols {
            return Err(Error::Consistency(format!(
                "tensor matrix holds {} values, expected {}x{}",
                m.values.len(),
                m.nrows,
                m.ncols
            )));
        }
        let names: Vec<String> = match columns {
            Some(names) => {
                if names.len() != m.ncols {
                    return Err(Error::LengthMismatch {
                        expected: m.ncols,
                        actual: names.len(),
                    });
                }
                names
            }
            None => (0..m.ncols).map(|i| i.to_string()).collect(),
        };
        let mut df = DataFrame::new();
        for (j, name) in names.iter().enumerate() {
            let indices: Vec<i64> = (0..m.nrows).map(|i| (i * m.ncols + j) as i64).collect();
            let idx = Array::from(indices);
            let col = m.values.get(&Idx::Take(&idx))?;
            df.push_column(name, col)?;
        }
        Ok(df)
    }

    /// Row count.
    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, |c| c.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// (rows, columns).
    pub fn shape(&self) -> (usize, usize) {
        (self.len(), self.columns.len())
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn contains_column(&self, name: &str) -> bool {
        self.column_indices.contains_key(name)
    }

    pub fn column(&self, name: &str) -> Result<&Array> {
        self.column_indices
            .get(name)
            .map(|&i| &self.columns[i])
            .ok_or_else(|| Error::ColumnNotFound(name.to_string()))
    }

    fn column_mut(&mut self, name: &str) -> Result<&mut Array> {
        match self.column_indices.get(name) {
            Some(&i) => Ok(&mut self.columns[i]),
            None => Err(Error::ColumnNotFound(name.to_string())),
        }
    }

    fn push_column(&mut self, name: &str, arr: Array) -> Result<()> {
        if self.contains_column(name) {
            return Err(Error::DuplicateColumnName(name.to_string()));
        }
        if !self.columns.is_empty() && arr.len() != self.len() {
            return Err(Error::LengthMismatch {
                expected: self.len(),
                actual: arr.len(),
            });
        }
        self.column_indices
            .insert(name.to_string(), self.columns.len());
        self.column_names.push(name.to_string());
        self.columns.push(arr);
        Ok(())
    }

    fn remove_column(&mut self, name: &str) -> Result<Array> {
        let idx = *self
            .column_indices
            .get(name)
            .ok_or_else(|| Error::ColumnNotFound(name.to_string()))?;
        self.column_names.remove(idx);
        let removed = self.columns.remove(idx);
        self.column_indices.remove(name);
        for (_, v) in self.column_indices.iter_mut() {
            if *v > idx {
                *v -= 1;
            }
        }
        Ok(removed)
    }

    /// Verify the table invariants: equal-length one-dimensional columns
    /// and a consistent name index. A failure here is a bug in biframe.
    pub fn validate(&self) -> Result<()> {
        if self.column_names.len() != self.columns.len()
            || self.column_indices.len() != self.columns.len()
        {
            return Err(Error::Consistency(format!(
                "column bookkeeping out of sync: {} names, {} arrays, {} index entries",
                self.column_names.len(),
                self.columns.len(),
                self.column_indices.len()
            )));
        }
        let expected = self.len();
        for (name, arr) in self.column_names.iter().zip(&self.columns) {
            if arr.len() != expected {
                return Err(Error::Consistency(format!(
                    "column {:?} has length {}, expected {}",
                    name,
                    arr.len(),
                    expected
                )));
            }
        }
        Ok(())
    }

    fn resolve_cols(&self, sel: &ColSelector) -> Result<Vec<String>> {
        match sel {
            ColSelector::Name(name) => {
                self.column(name)?;
                Ok(vec![name.clone()])
            }
            ColSelector::Names(names) => {
                for name in names {
                    self.column(name)?;
                }
                Ok(names.clone())
            }
            ColSelector::All => Ok(self.column_names.clone()),
        }
    }

    // Indexing. One method per return shape: 0-d/0-d yields a scalar,
    // 0-d/1-d a raw array, 1-d/0-d a row of scalars, 1-d/1-d a sub-frame.

    /// Single element.
    pub fn cell(&self, col: &str, row: i64) -> Result<Scalar> {
        self.column(col)?.get_scalar(row)
    }

    /// Selected rows of one column, as a raw array (not a table).
    pub fn column_rows(&self, col: &str, rows: &Idx) -> Result<Array> {
        self.column(col)?.get(rows)
    }

    /// One row across the selected columns, in selection order.
    pub fn row(&self, cols: &ColSelector, row: i64) -> Result<Vec<Scalar>> {
        let names = self.resolve_cols(cols)?;
        names
            .iter()
            .map(|name| self.column(name)?.get_scalar(row))
            .collect()
    }

    /// Sub-frame of the selected columns and rows.
    pub fn select(&self, cols: &ColSelector, rows: &Idx) -> Result<DataFrame> {
        let names = self.resolve_cols(cols)?;
        let mut df = DataFrame::new();
        for name in &names {
            let picked = self.column(name)?.get(rows)?;
            // Full/range selections hand back views; a sub-frame owns its
            // columns, so materialize those.
            let picked = match rows {
                Idx::All | Idx::Range(_, _) => picked.copy(),
                _ => picked,
            };
            df.push_column(name, picked)?;
        }
        Ok(df)
    }

    /// Replace (or lazily create) a whole column. The value broadcasts to
    /// the table's row count; on an empty table it defines the row count.
    pub fn set_column(&mut self, name: &str, value: Array) -> Result<()> {
        let target = if self.columns.is_empty() {
            value.len()
        } else {
            self.len()
        };
        let arr = value.broadcast_to(target)?;
        if self.contains_column(name) {
            *self.column_mut(name)? = arr;
            Ok(())
        } else {
            self.push_column(name, arr)
        }
    }

    /// Write `value` into the selected rows of a column, creating the
    /// column (typed and backend-matched to the value, fully missing) when
    /// absent, and copying a non-writeable column before mutating it.
    ///
    /// If the write itself fails on a column that was auto-created, the
    /// fresh column is removed again so the table is left unchanged.
    pub fn set(&mut self, col: &str, rows: &Idx, value: &Array) -> Result<()> {
        let created = if self.contains_column(col) {
            false
        } else {
            let empty = Array::empty(
                self.len(),
                !value.is_tensor(),
                value.backend(),
                value.dtype(),
                value.device(),
            )?;
            self.push_column(col, empty)?;
            true
        };

        let outcome = (|| {
            let slot = self.column_mut(col)?;
            if !slot.writeable() {
                *slot = slot.copy();
            }
            slot.set(rows, value)
        })();

        if outcome.is_err() && created {
            let _ = self.remove_column(col);
        }
        outcome
    }

    /// Convenience single-cell write.
    pub fn set_cell(&mut self, col: &str, row: i64, value: &Scalar) -> Result<()> {
        self.set(col, &Idx::At(row), &Array::from_scalar(value)?)
    }

    /// Assign to several columns at once. The value's batch dimension is
    /// trailing: it is broadcast to the number of selected columns first,
    /// and each per-column entry is then written down that column's rows
    /// (`rows = None` replaces whole columns via broadcast).
    pub fn set_columns(
        &mut self,
        cols: &ColSelector,
        rows: Option<&Idx>,
        value: &ColumnsValue,
    ) -> Result<()> {
        // Names are not required to exist yet: assignment creates columns.
        let names: Vec<String> = match cols {
            ColSelector::Name(n) => vec![n.clone()],
            ColSelector::Names(ns) => ns.clone(),
            ColSelector::All => self.column_names.clone(),
        };
        let n = names.len();

        let per_column: Vec<Array> = match value {
            ColumnsValue::Scalar(s) => {
                let one = Array::from_scalar(s)?;
                vec![one; n]
            }
            ColumnsValue::PerColumn(arr) => {
                if arr.len() != n && arr.len() != 1 {
                    return Err(Error::LengthMismatch {
                        expected: n,
                        actual: arr.len(),
                    });
                }
                (0..n)
                    .map(|i| {
                        let j = if arr.len() == 1 { 0 } else { i as i64 };
                        Array::from_scalar(&arr.get_scalar(j)?)
                    })
                    .collect::<Result<Vec<_>>>()?
            }
            ColumnsValue::Rows(arrays) => {
                if arrays.len() != n && arrays.len() != 1 {
                    return Err(Error::LengthMismatch {
                        expected: n,
                        actual: arrays.len(),
                    });
                }
                (0..n)
                    .map(|i| arrays[if arrays.len() == 1 { 0 } else { i }].clone())
                    .collect()
            }
        };

        for (name, v) in names.iter().zip(per_column) {
            match rows {
                None => self.set_column(name, v)?,
                Some(idx) => self.set(name, idx, &v)?,
            }
        }
        Ok(())
    }

    /// Deep copy: every column gets fresh writeable storage.
    pub fn copy(&self) -> DataFrame {
        let mut df = DataFrame::new();
        for (name, arr) in self.column_names.iter().zip(&self.columns) {
            df.push_column(name, arr.copy())
                .expect("copying preserves uniqueness and lengths");
        }
        df
    }

    /// Move every column to `device` (a no-op for dense columns).
    pub fn to(&self, device: Device) -> DataFrame {
        let copied = self.copy();
        let mut df = DataFrame::new();
        for (name, arr) in copied.column_names.iter().zip(&copied.columns) {
            df.push_column(name, arr.to(device))
                .expect("moving preserves uniqueness and lengths");
        }
        df
    }

    /// Copied columns in table order.
    pub fn to_list(&self) -> Vec<Array> {
        self.columns.iter().map(|c| c.copy()).collect()
    }

    /// Copied (name, column) pairs in table order.
    pub fn to_dict(&self) -> Vec<(String, Array)> {
        self.column_names
            .iter()
            .cloned()
            .zip(self.columns.iter().map(|c| c.copy()))
            .collect()
    }

    /// Stack all columns into a 2-D numeric matrix (columns along axis 1).
    /// Tensor columns are detached and pulled to cpu first.
    pub fn to_matrix(&self) -> Result<NumericMatrix> {
        let cols: Vec<Vec<f64>> = self
            .columns
            .iter()
            .map(|arr| {
                if !arr.dtype().is_numeric() {
                    return Err(Error::Cast(format!(
                        "cannot stack a {} column into a numeric matrix",
                        arr.dtype()
                    )));
                }
                Ok(arr.detach().cpu().to_f64_vec())
            })
            .collect::<Result<Vec<_>>>()?;
        NumericMatrix::from_columns(&cols)
    }

    /// Stack all columns into a 2-D tensor on `device` (cpu by default).
    /// Fails if any column's dtype has no tensor equivalent.
    pub fn to_tensor_matrix(&self, device: Option<Device>) -> Result<TensorMatrix> {
        let device = device.unwrap_or(Device::Cpu);
        let mut dtype: Option<DType> = None;
        for arr in &self.columns {
            if !arr.dtype().has_tensor_equivalent() {
                return Err(Error::Cast(format!(
                    "column dtype {} has no tensor representation",
                    arr.dtype()
                )));
            }
            dtype = Some(match dtype {
                None => arr.dtype(),
                Some(prev) => merge_dtypes(prev, arr.dtype())?,
            });
        }
        let dtype = dtype.unwrap_or(DType::Float64);

        let (nrows, ncols) = self.shape();
        let tensors: Vec<Array> = self
            .columns
            .iter()
            .map(|arr| Ok(arr.as_tensor()?.to(device).astype(dtype)?))
            .collect::<Result<Vec<_>>>()?;

        let mut buf = Buffer::filled(dtype, nrows * ncols);
        for (j, t) in tensors.iter().enumerate() {
            for i in 0..nrows {
                buf.set(i * ncols + j, &t.get_scalar(i as i64)?)?;
            }
        }
        Ok(TensorMatrix {
            values: Array::from_tensor(Tensor::on_device(buf, device)?),
            nrows,
            ncols,
        })
    }

    /// Materialize every column onto the dense backend (detach + cpu +
    /// bridge), the step before any conventional row/column presentation.
    pub fn to_dense(&self) -> Result<DataFrame> {
        let mut df = DataFrame::new();
        for (name, arr) in self.column_names.iter().zip(&self.columns) {
            df.push_column(name, arr.detach().cpu().as_dense()?.copy())?;
        }
        Ok(df)
    }

    /// Uniform numeric representation used by every dedup/set/join
    /// operation: non-numeric columns are label-encoded to integer codes
    /// and missing entries become NaN. Columns are coerced in parallel.
    pub(crate) fn to_numeric_matrix(&self) -> Result<NumericMatrix> {
        let cols: Vec<Vec<f64>> = self
            .columns
            .par_iter()
            .map(|arr| {
                // Everything happens on the dense backend.
                let arr = arr.detach().cpu().as_dense()?;
                let mut values = if arr.dtype().is_numeric() {
                    arr.to_f64_vec()
                } else {
                    let (_, inverse, _) = arr.unique()?;
                    inverse.to_f64_vec()
                };
                let na = arr.isna();
                for (i, v) in values.iter_mut().enumerate() {
                    if na.raw_i64_at(i) != 0 {
                        *v = f64::NAN;
                    }
                }
                Ok(values)
            })
            .collect::<Result<Vec<_>>>()?;
        NumericMatrix::from_columns(&cols)
    }

    /// Per-column metadata summary as a table.
    pub fn info(&self) -> DataFrame {
        let mut names = Vec::new();
        let mut n_rows = Vec::new();
        let mut backends = Vec::new();
        let mut dtypes = Vec::new();
        let mut devices = Vec::new();
        let mut nbytes = Vec::new();
        for (name, arr) in self.column_names.iter().zip(&self.columns) {
            names.push(name.clone());
            n_rows.push(arr.len() as i64);
            backends.push(arr.backend().to_string());
            dtypes.push(arr.dtype().to_string());
            devices.push(arr.device().to_string());
            nbytes.push(arr.nbytes() as i64);
        }
        let mut df = DataFrame::new();
        for (col, arr) in [
            ("column", Array::from(names)),
            ("n_rows", Array::from(n_rows)),
            ("backend", Array::from(backends)),
            ("dtype", Array::from(dtypes)),
            ("device", Array::from(devices)),
            ("nbytes", Array::from(nbytes)),
        ] {
            df.push_column(col, arr)
                .expect("info column names are unique and lengths equal");
        }
        df
    }

    /// Iterate rows as scalar vectors in column order.
    pub fn iter_rows(&self) -> impl Iterator<Item = Vec<Scalar>> + '_ {
        (0..self.len()).map(move |i| {
            self.columns
                .iter()
                .map(|arr| {
                    arr.get_scalar(i as i64)
                        .expect("row index bounded by table length")
                })
                .collect()
        })
    }

    /// Iterate (name, column) pairs in table order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Array)> + '_ {
        self.column_names.iter().zip(self.columns.iter())
    }

    /// Copy of the table without the named columns; with no names this is
    /// a content-equal copy.
    pub fn drop(&self, names: &[&str]) -> Result<DataFrame> {
        let mut df = self.clone();
        for name in names {
            df.remove_column(name)?;
        }
        Ok(df)
    }

    /// Bulk column removal.
    pub fn delete(&mut self, names: &[&str]) -> Result<()> {
        for name in names {
            self.remove_column(name)?;
        }
        Ok(())
    }

    /// Rename columns, preserving order; names absent from the mapping are
    /// unchanged.
    pub fn rename(&self, mapping: &[(&str, &str)]) -> Result<DataFrame> {
        let map: HashMap<&str, &str> = mapping.iter().copied().collect();
        let mut df = DataFrame::new();
        for (name, arr) in self.column_names.iter().zip(&self.columns) {
            let new_name = map.get(name.as_str()).copied().unwrap_or(name.as_str());
            df.push_column(new_name, arr.clone())?;
        }
        Ok(df)
    }

    /// Per-column dtypes, in table order.
    pub fn dtypes(&self) -> Vec<(String, DType)> {
        self.iter().map(|(n, a)| (n.clone(), a.dtype())).collect()
    }

    /// Per-column devices, in table order.
    pub fn devices(&self) -> Vec<(String, Device)> {
        self.iter().map(|(n, a)| (n.clone(), a.device())).collect()
    }

    /// Per-column backend tags, in table order.
    pub fn backends(&self) -> Vec<(String, Backend)> {
        self.iter().map(|(n, a)| (n.clone(), a.backend())).collect()
    }

    /// Total bytes held by the columns' base buffers.
    pub fn nbytes(&self) -> usize {
        self.columns.iter().map(|a| a.nbytes()).sum()
    }

    /// HTML table rendering with head/tail elision.
    pub fn to_html(
        &self,
        max_rows: Option<usize>,
        show_dimensions: bool,
        show_column_info: bool,
    ) -> String {
        let n = self.len();
        let max_rows = max_rows.map_or(n, |m| m.min(n));
        let row_indices: Vec<Option<usize>> = if n <= max_rows {
            (0..n).map(Some).collect()
        } else {
            let n_top = max_rows / 2;
            let n_bottom = max_rows - n_top;
            let mut rows: Vec<Option<usize>> = (0..n_top).map(Some).collect();
            rows.push(None);
            rows.extend((n - n_bottom..n).map(Some));
            rows
        };

        let mut html = String::from("<table><thead><tr><th></th>");
        for (name, arr) in self.iter() {
            if show_column_info {
                html.push_str(&format!(
                    "<th>{}<br/>{}<br/>{}<br/>{}</th>",
                    name,
                    arr.backend(),
                    arr.dtype(),
                    arr.device()
                ));
            } else {
                html.push_str(&format!("<th>{}</th>", name));
            }
        }
        html.push_str("</tr></thead><tbody>");
        for row in &row_indices {
            match row {
                None => {
                    html.push_str("<tr>");
                    for _ in 0..=self.column_count() {
                        html.push_str("<td>...</td>");
                    }
                    html.push_str("</tr>");
                }
                Some(i) => {
                    html.push_str(&format!("<tr><td><b>{}</b></td>", i));
                    for arr in &self.columns {
                        let cell = arr
                            .get_scalar(*i as i64)
                            .expect("row index bounded by table length");
                        html.push_str(&format!("<td>{}</td>", cell));
                    }
                    html.push_str("</tr>");
                }
            }
        }
        html.push_str("</tbody></table>");
        if show_dimensions {
            html.push_str(&format!(
                "<p>{} rows × {} columns</p>",
                n,
                self.column_count()
            ));
        }
        html
    }
}

impl fmt::Display for DataFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const MAX_ROWS: usize = 10;

        if self.columns.is_empty() {
            return write!(f, "DataFrame (0 rows x 0 columns)");
        }
        writeln!(
            f,
            "DataFrame ({} rows x {} columns):",
            self.len(),
            self.column_count()
        )?;

        write!(f, "{:<5} |", "idx")?;
        for name in &self.column_names {
            write!(f, " {:<15} |", name)?;
        }
        writeln!(f)?;
        write!(f, "{:-<5}-+", "")?;
        for _ in &self.column_names {
            write!(f, "-{:-<15}-+", "")?;
        }
        writeln!(f)?;

        let display_rows = self.len().min(MAX_ROWS);
        for i in 0..display_rows {
            write!(f, "{:<5} |", i)?;
            for arr in &self.columns {
                let cell = arr
                    .get_scalar(i as i64)
                    .expect("row index bounded by table length");
                write!(f, " {:<15} |", cell.to_string())?;
            }
            writeln!(f)?;
        }
        if self.len() > MAX_ROWS {
            writeln!(f, "... ({} more rows)", self.len() - MAX_ROWS)?;
        }
        Ok(())
    }
}

/// Concatenate tables. Axis 0 stacks rows and requires identical column
/// sets in identical order; axis 1 joins columns and requires the names to
/// be disjoint, preserving per-table insertion order.
pub fn concat(dfs: &[&DataFrame], axis: usize) -> Result<DataFrame> {
    if dfs.is_empty() {
        return Err(Error::InvalidInput(
            "concat requires at least one DataFrame".to_string(),
        ));
    }
    match axis {
        0 => {
            let columns = dfs[0].column_names();
            for df in &dfs[1..] {
                if df.column_names() != columns {
                    return Err(Error::InvalidInput(format!(
                        "concat along axis 0 requires identical columns, got {:?} and {:?}",
                        columns,
                        df.column_names()
                    )));
                }
            }
            let mut out = DataFrame::new();
            for name in columns {
                let parts: Vec<&Array> = dfs
                    .iter()
                    .map(|df| df.column(name))
                    .collect::<Result<Vec<_>>>()?;
                out.push_column(name, concat_arrays(&parts)?)?;
            }
            Ok(out)
        }
        1 => {
            let mut out = DataFrame::new();
            for df in dfs {
                for (name, arr) in df.iter() {
                    if out.contains_column(name) {
                        return Err(Error::InvalidInput(format!(
                            "concat along axis 1 requires disjoint columns, {:?} repeats",
                            name
                        )));
                    }
                    out.push_column(name, arr.clone())?;
                }
            }
            Ok(out)
        }
        other => Err(Error::InvalidInput(format!(
            "axis must be 0 (rows) or 1 (columns), got {}",
            other
        ))),
    }
}
