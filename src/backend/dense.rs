//! Masked-capable dense array backend.
//!
//! A [`DenseArray`] is a one-dimensional typed buffer in host memory with an
//! optional element mask (true = missing). Views produced by slicing and
//! broadcasting share the underlying [`Buffer`] through `Arc`; whether a
//! derived array is a view is decided statically by the operation that
//! produces it, never by comparing storage pointers after the fact.
//!
//! The mask and the data always share one layout (`offset`/`stride`/`len`),
//! so broadcasting a masked array broadcasts the mask alongside the data.

use std::cmp::Ordering;
use std::sync::{Arc, RwLock};

use crate::backend::{BinOp, Buffer, DType, Scalar};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct DenseArray {
    storage: Arc<RwLock<Buffer>>,
    mask: Option<Arc<RwLock<Vec<bool>>>>,
    offset: usize,
    /// 1 for ordinary arrays, 0 for scalar-broadcast views.
    stride: usize,
    len: usize,
}

impl DenseArray {
    pub fn new(data: Buffer) -> Self {
        let len = data.len();
        DenseArray {
            storage: Arc::new(RwLock::new(data)),
            mask: None,
            offset: 0,
            stride: 1,
            len,
        }
    }

    pub fn with_mask(data: Buffer, mask: Vec<bool>) -> Result<Self> {
        if data.len() != mask.len() {
            return Err(Error::LengthMismatch {
                expected: data.len(),
                actual: mask.len(),
            });
        }
        let len = data.len();
        Ok(DenseArray {
            storage: Arc::new(RwLock::new(data)),
            mask: Some(Arc::new(RwLock::new(mask))),
            offset: 0,
            stride: 1,
            len,
        })
    }

    /// Wrap an existing buffer handle; the zero-copy bridge from the tensor
    /// backend comes through here. The result carries no mask.
    pub(crate) fn from_handle(
        storage: Arc<RwLock<Buffer>>,
        offset: usize,
        stride: usize,
        len: usize,
    ) -> Self {
        DenseArray {
            storage,
            mask: None,
            offset,
            stride,
            len,
        }
    }

    /// Allocation with every element masked out, used by the typed `empty`
    /// constructor.
    pub fn all_masked(dtype: DType, len: usize) -> Self {
        DenseArray::with_mask(Buffer::filled(dtype, len), vec![true; len])
            .expect("buffer and mask allocated with the same length")
    }

    /// Build an array from loose scalars, inferring the dtype. Nulls become
    /// masked elements; mixing strings with numbers is rejected.
    pub fn from_scalars(values: &[Scalar]) -> Result<Self> {
        let mut dtype: Option<DType> = None;
        for v in values {
            if let Some(dt) = v.dtype() {
                dtype = Some(match dtype {
                    None => dt,
                    Some(prev) => merge_dtypes(prev, dt)?,
                });
            }
        }
        let dtype = dtype.unwrap_or(DType::Float64);

        let mut buf = Buffer::filled(dtype, values.len());
        let mut mask = vec![false; values.len()];
        let mut any_masked = false;
        for (i, v) in values.iter().enumerate() {
            if v.is_null() {
                mask[i] = true;
                any_masked = true;
            } else {
                buf.set(i, v)?;
            }
        }
        if any_masked {
            DenseArray::with_mask(buf, mask)
        } else {
            Ok(DenseArray::new(buf))
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn dtype(&self) -> DType {
        self.storage.read().expect("storage lock poisoned").dtype()
    }

    pub fn has_mask(&self) -> bool {
        self.mask.is_some()
    }

    /// Whether two arrays alias the same underlying buffer.
    pub fn shares_storage(&self, other: &DenseArray) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }

    pub(crate) fn buffer_handle(&self) -> Arc<RwLock<Buffer>> {
        Arc::clone(&self.storage)
    }

    pub(crate) fn layout(&self) -> (usize, usize, usize) {
        (self.offset, self.stride, self.len)
    }

    fn phys(&self, i: usize) -> usize {
        self.offset + i * self.stride
    }

    fn mask_at(&self, i: usize) -> bool {
        match &self.mask {
            Some(m) => m.read().expect("mask lock poisoned")[self.phys(i)],
            None => false,
        }
    }

    /// Element at logical index `i`; masked elements come back as `Null`.
    pub fn get(&self, i: usize) -> Scalar {
        if self.mask_at(i) {
            return Scalar::Null;
        }
        self.raw_get(i)
    }

    /// Element at logical index `i` ignoring the mask.
    pub fn raw_get(&self, i: usize) -> Scalar {
        let buf = self.storage.read().expect("storage lock poisoned");
        buf.get(self.phys(i))
    }

    pub fn raw_f64(&self, i: usize) -> f64 {
        let buf = self.storage.read().expect("storage lock poisoned");
        buf.f64_at(self.phys(i))
    }

    pub fn raw_i64(&self, i: usize) -> i64 {
        let buf = self.storage.read().expect("storage lock poisoned");
        buf.i64_at(self.phys(i))
    }

    /// Whether element `i` is missing: explicitly masked, or a float NaN.
    /// Both sources of missing-ness are honored.
    pub fn is_na(&self, i: usize) -> bool {
        if self.mask_at(i) {
            return true;
        }
        match self.raw_get(i) {
            Scalar::F64(v) => v.is_nan(),
            _ => false,
        }
    }

    pub fn isna(&self) -> Vec<bool> {
        (0..self.len).map(|i| self.is_na(i)).collect()
    }

    /// In-place element write. `Null` marks the element masked when a mask
    /// is present, or writes NaN into float storage; writing a value clears
    /// any mask bit at that position.
    pub fn set(&mut self, i: usize, value: &Scalar) -> Result<()> {
        let p = self.phys(i);
        if value.is_null() {
            if let Some(m) = &self.mask {
                m.write().expect("mask lock poisoned")[p] = true;
                return Ok(());
            }
            let mut buf = self.storage.write().expect("storage lock poisoned");
            if buf.dtype().is_float() {
                buf.set(p, &Scalar::F64(f64::NAN))?;
                return Ok(());
            }
            return Err(Error::InvalidInput(format!(
                "cannot write NA into an unmasked {} array",
                buf.dtype()
            )));
        }
        {
            let mut buf = self.storage.write().expect("storage lock poisoned");
            buf.set(p, value)?;
        }
        if let Some(m) = &self.mask {
            m.write().expect("mask lock poisoned")[p] = false;
        }
        Ok(())
    }

    /// Zero-copy view of `count` elements starting at logical `start`.
    pub fn view_range(&self, start: usize, count: usize) -> Result<Self> {
        if start + count > self.len {
            return Err(Error::IndexOutOfBounds {
                index: (start + count) as i64,
                size: self.len,
            });
        }
        Ok(DenseArray {
            storage: Arc::clone(&self.storage),
            mask: self.mask.clone(),
            offset: self.offset + start * self.stride,
            stride: self.stride,
            len: count,
        })
    }

    /// Zero-copy broadcast to `len` elements. Only a length-1 (or already
    /// matching) array can broadcast; the result is a stride-0 view. The
    /// mask shares the same layout, so it is broadcast alongside the data.
    pub fn broadcast_to(&self, len: usize) -> Result<Self> {
        if self.len == len {
            return Ok(self.clone());
        }
        if self.len != 1 {
            return Err(Error::InvalidInput(format!(
                "cannot broadcast array of length {} to length {}",
                self.len, len
            )));
        }
        Ok(DenseArray {
            storage: Arc::clone(&self.storage),
            mask: self.mask.clone(),
            offset: self.offset,
            stride: 0,
            len,
        })
    }

    /// Deep copy: fresh storage (and mask) holding the logical elements.
    pub fn copy(&self) -> Self {
        let dtype = self.dtype();
        let mut buf = Buffer::filled(dtype, self.len);
        for i in 0..self.len {
            buf.set(i, &self.raw_get(i))
                .expect("raw element always fits its own dtype");
        }
        match &self.mask {
            Some(_) => {
                let mask = (0..self.len).map(|i| self.mask_at(i)).collect();
                DenseArray::with_mask(buf, mask).expect("copy preserves length")
            }
            None => DenseArray::new(buf),
        }
    }

    /// Gather by (possibly negative) indices into a fresh owned array.
    pub fn take(&self, indices: &[i64]) -> Result<Self> {
        let dtype = self.dtype();
        let mut buf = Buffer::filled(dtype, indices.len());
        let mut mask = vec![false; indices.len()];
        let mut any_masked = false;
        for (out, &raw_idx) in indices.iter().enumerate() {
            let i = normalize_index(raw_idx, self.len)?;
            buf.set(out, &self.raw_get(i))
                .expect("raw element always fits its own dtype");
            if self.mask_at(i) {
                mask[out] = true;
                any_masked = true;
            }
        }
        if any_masked || self.has_mask() {
            DenseArray::with_mask(buf, mask)
        } else {
            Ok(DenseArray::new(buf))
        }
    }

    /// Select elements where `keep` is true, into a fresh owned array.
    pub fn filter(&self, keep: &[bool]) -> Result<Self> {
        if keep.len() != self.len {
            return Err(Error::LengthMismatch {
                expected: self.len,
                actual: keep.len(),
            });
        }
        let indices: Vec<i64> = keep
            .iter()
            .enumerate()
            .filter_map(|(i, &k)| if k { Some(i as i64) } else { None })
            .collect();
        self.take(&indices)
    }

    /// Materialized reversed copy (the descending-argsort building block).
    pub fn reverse(&self) -> Self {
        let indices: Vec<i64> = (0..self.len as i64).rev().collect();
        self.take(&indices).expect("reversal indices are in bounds")
    }

    /// Cast to `dtype`. Casting to the same dtype is a zero-copy view over
    /// the existing buffer.
    pub fn astype(&self, dtype: DType) -> Result<Self> {
        if dtype == self.dtype() {
            return Ok(self.clone());
        }
        let mut buf = Buffer::filled(dtype, self.len);
        for i in 0..self.len {
            let v = cast_scalar(&self.raw_get(i), dtype)?;
            buf.set(i, &v)?;
        }
        match &self.mask {
            Some(_) => {
                let mask = (0..self.len).map(|i| self.mask_at(i)).collect();
                DenseArray::with_mask(buf, mask)
            }
            None => Ok(DenseArray::new(buf)),
        }
    }

    fn cmp_raw(&self, a: usize, b: usize) -> Ordering {
        let na_a = self.is_na(a);
        let na_b = self.is_na(b);
        match (na_a, na_b) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater, // missing sorts last
            (false, true) => Ordering::Less,
            (false, false) => match (self.raw_get(a), self.raw_get(b)) {
                (Scalar::F64(x), Scalar::F64(y)) => x.total_cmp(&y),
                (Scalar::I64(x), Scalar::I64(y)) => x.cmp(&y),
                (Scalar::Bool(x), Scalar::Bool(y)) => x.cmp(&y),
                (Scalar::Str(x), Scalar::Str(y)) => x.cmp(&y),
                _ => Ordering::Equal,
            },
        }
    }

    /// Stable ascending argsort; `descending` reverses the ascending result
    /// wholesale (there is no native descending sort on this backend).
    pub fn argsort(&self, descending: bool) -> DenseArray {
        let mut order: Vec<i64> = (0..self.len as i64).collect();
        order.sort_by(|&a, &b| self.cmp_raw(a as usize, b as usize));
        let asc = DenseArray::new(Buffer::I64(order));
        if descending {
            asc.reverse()
        } else {
            asc
        }
    }

    /// Sorted unique values with inverse mapping and per-value counts.
    /// Operates on raw storage; the mask is not consulted.
    pub fn unique(&self) -> (DenseArray, Vec<i64>, Vec<i64>) {
        let mut order: Vec<usize> = (0..self.len).collect();
        order.sort_by(|&a, &b| self.cmp_raw(a, b));

        let mut unique_indices: Vec<i64> = Vec::new();
        let mut inverse = vec![0i64; self.len];
        let mut counts: Vec<i64> = Vec::new();
        for (rank, &row) in order.iter().enumerate() {
            let is_new = rank == 0 || self.cmp_raw(order[rank - 1], row) != Ordering::Equal;
            if is_new {
                unique_indices.push(row as i64);
                counts.push(0);
            }
            let id = unique_indices.len() - 1;
            inverse[row] = id as i64;
            counts[id] += 1;
        }
        let values = self
            .take(&unique_indices)
            .expect("unique indices are in bounds");
        (values, inverse, counts)
    }

    /// Count occurrences of each non-negative integer id, optionally
    /// weighted. Result length is `max(id) + 1`.
    pub fn bincount(&self, weights: Option<&DenseArray>) -> Result<DenseArray> {
        if self.dtype() != DType::Int64 {
            return Err(Error::InvalidInput(format!(
                "bincount requires an i64 array, got {}",
                self.dtype()
            )));
        }
        if let Some(w) = weights {
            if w.len() != self.len {
                return Err(Error::LengthMismatch {
                    expected: self.len,
                    actual: w.len(),
                });
            }
        }
        let mut nbins = 0usize;
        for i in 0..self.len {
            let id = self.raw_i64(i);
            if id < 0 {
                return Err(Error::InvalidInput(format!(
                    "bincount ids must be non-negative, got {}",
                    id
                )));
            }
            nbins = nbins.max(id as usize + 1);
        }
        match weights {
            None => {
                let mut counts = vec![0i64; nbins];
                for i in 0..self.len {
                    counts[self.raw_i64(i) as usize] += 1;
                }
                Ok(DenseArray::new(Buffer::I64(counts)))
            }
            Some(w) => {
                let mut sums = vec![0.0f64; nbins];
                for i in 0..self.len {
                    sums[self.raw_i64(i) as usize] += w.raw_f64(i);
                }
                Ok(DenseArray::new(Buffer::F64(sums)))
            }
        }
    }

    /// Element-wise binary operation with length broadcasting (n against n
    /// or 1). Masks propagate by logical OR; arithmetic itself runs on raw
    /// storage, so a masked slot's result is garbage guarded by the mask.
    pub fn binary_op(&self, other: &DenseArray, op: BinOp) -> Result<DenseArray> {
        let out_len = broadcast_len(self.len, other.len)?;
        let dtype = op.result_dtype(self.dtype(), other.dtype())?;
        let ia = |i: usize| if self.len == 1 { 0 } else { i };
        let ib = |i: usize| if other.len == 1 { 0 } else { i };

        let buf = match dtype {
            DType::Float64 => {
                let mut out = Vec::with_capacity(out_len);
                for i in 0..out_len {
                    out.push(op.apply_f64(self.raw_f64(ia(i)), other.raw_f64(ib(i))));
                }
                Buffer::F64(out)
            }
            DType::Int64 => {
                let mut out = Vec::with_capacity(out_len);
                for i in 0..out_len {
                    out.push(op.apply_i64(self.raw_i64(ia(i)), other.raw_i64(ib(i)))?);
                }
                Buffer::I64(out)
            }
            other_dtype => {
                return Err(Error::Consistency(format!(
                    "arithmetic produced unexpected dtype {}",
                    other_dtype
                )))
            }
        };

        if self.has_mask() || other.has_mask() {
            let mask = (0..out_len)
                .map(|i| self.mask_at(ia(i)) || other.mask_at(ib(i)))
                .collect();
            DenseArray::with_mask(buf, mask)
        } else {
            Ok(DenseArray::new(buf))
        }
    }

    /// Concatenate arrays of one dtype family. Numeric dtypes promote to
    /// the widest member; strings only concatenate with strings.
    pub fn concat(arrs: &[&DenseArray]) -> Result<DenseArray> {
        if arrs.is_empty() {
            return Err(Error::InvalidInput(
                "concat requires at least one array".to_string(),
            ));
        }
        let mut dtype = arrs[0].dtype();
        for a in &arrs[1..] {
            dtype = merge_dtypes(dtype, a.dtype())?;
        }
        let total: usize = arrs.iter().map(|a| a.len()).sum();
        let any_mask = arrs.iter().any(|a| a.has_mask());

        let mut buf = Buffer::filled(dtype, total);
        let mut mask = vec![false; total];
        let mut out = 0;
        for a in arrs {
            for i in 0..a.len() {
                let v = cast_scalar(&a.raw_get(i), dtype)?;
                buf.set(out, &v)?;
                mask[out] = a.mask_at(i);
                out += 1;
            }
        }
        if any_mask {
            DenseArray::with_mask(buf, mask)
        } else {
            Ok(DenseArray::new(buf))
        }
    }

    /// Logical elements as f64, ignoring the mask.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        (0..self.len).map(|i| self.raw_f64(i)).collect()
    }

    /// Bytes held by the base buffer this array ultimately refers to.
    pub fn nbytes(&self) -> usize {
        self.storage.read().expect("storage lock poisoned").nbytes()
    }
}

/// Numeric promotion for mixed-dtype aggregation: floats win over ints,
/// ints over bools; strings never mix with numerics.
pub(crate) fn merge_dtypes(a: DType, b: DType) -> Result<DType> {
    if a == b {
        return Ok(a);
    }
    match (a, b) {
        (DType::Str, _) | (_, DType::Str) => Err(Error::Cast(format!(
            "cannot combine {} with {}",
            a, b
        ))),
        (DType::Float64, _) | (_, DType::Float64) => Ok(DType::Float64),
        (DType::Int64, _) | (_, DType::Int64) => Ok(DType::Int64),
        _ => Ok(DType::Bool),
    }
}

pub(crate) fn normalize_index(idx: i64, len: usize) -> Result<usize> {
    let adjusted = if idx < 0 { idx + len as i64 } else { idx };
    if adjusted < 0 || adjusted as usize >= len {
        return Err(Error::IndexOutOfBounds {
            index: idx,
            size: len,
        });
    }
    Ok(adjusted as usize)
}

pub(crate) fn broadcast_len(a: usize, b: usize) -> Result<usize> {
    if a == b || b == 1 {
        Ok(a)
    } else if a == 1 {
        Ok(b)
    } else {
        Err(Error::LengthMismatch {
            expected: a,
            actual: b,
        })
    }
}

/// Scalar cast used by `astype` and concatenation promotion. String
/// conversions go through parsing/formatting, like the dense backend's
/// native casts.
pub(crate) fn cast_scalar(value: &Scalar, dtype: DType) -> Result<Scalar> {
    if value.is_null() {
        return Ok(Scalar::Null);
    }
    let out = match dtype {
        DType::Float64 => match value {
            Scalar::Str(s) => Scalar::F64(s.trim().parse::<f64>().map_err(|_| {
                Error::Cast(format!("cannot parse {:?} as f64", s))
            })?),
            v => Scalar::F64(v.to_f64().ok_or_else(|| {
                Error::Cast(format!("cannot cast {:?} to f64", v))
            })?),
        },
        DType::Int64 => match value {
            Scalar::Str(s) => Scalar::I64(s.trim().parse::<i64>().map_err(|_| {
                Error::Cast(format!("cannot parse {:?} as i64", s))
            })?),
            v => Scalar::I64(v.to_i64().ok_or_else(|| {
                Error::Cast(format!("cannot cast {:?} to i64", v))
            })?),
        },
        DType::Bool => match value {
            Scalar::Bool(b) => Scalar::Bool(*b),
            Scalar::I64(n) => Scalar::Bool(*n != 0),
            Scalar::F64(n) => Scalar::Bool(*n != 0.0),
            Scalar::Str(s) => Scalar::Bool(s.trim().parse::<bool>().map_err(|_| {
                Error::Cast(format!("cannot parse {:?} as bool", s))
            })?),
            Scalar::Null => Scalar::Null,
        },
        DType::Str => Scalar::Str(value.to_string()),
    };
    Ok(out)
}
