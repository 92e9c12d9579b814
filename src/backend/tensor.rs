//! Device-resident tensor backend with gradient tracking.
//!
//! A [`Tensor`] is a one-dimensional typed buffer tagged with a [`Device`]
//! and a `requires_grad` flag. Storage sits behind `Arc<RwLock<_>>` so that
//! views — detachment, same-device transfer, range slicing, broadcasting —
//! share the buffer and clone only the handle, while transfers to a
//! different device copy.
//!
//! Scatter-writes with duplicate indices are only ordered when the
//! process-wide deterministic flag is on; [`DeterministicScatter`] is the
//! scoped guard that sets the flag and restores the previous value on every
//! exit path, including unwinding.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, RwLock};

use crate::backend::dense::{broadcast_len, cast_scalar, merge_dtypes, normalize_index};
use crate::backend::{BinOp, Buffer, DType, Device, Scalar};
use crate::error::{Error, Result};

static DETERMINISTIC_SCATTER: AtomicBool = AtomicBool::new(false);

/// Whether duplicate-index scatter-writes are currently guaranteed to apply
/// in index order.
pub fn deterministic_scatter_enabled() -> bool {
    DETERMINISTIC_SCATTER.load(AtomicOrdering::SeqCst)
}

/// Scoped acquisition of the process-wide deterministic-scatter flag.
///
/// Saves the current value, sets the flag, and restores the saved value on
/// drop. Restoration runs during unwinding too, so a panicking aggregate
/// cannot leak the flag.
pub struct DeterministicScatter {
    prev: bool,
}

impl DeterministicScatter {
    pub fn enable() -> Self {
        let prev = DETERMINISTIC_SCATTER.swap(true, AtomicOrdering::SeqCst);
        DeterministicScatter { prev }
    }
}

impl Drop for DeterministicScatter {
    fn drop(&mut self) {
        DETERMINISTIC_SCATTER.store(self.prev, AtomicOrdering::SeqCst);
    }
}

#[derive(Debug, Clone)]
pub struct Tensor {
    storage: Arc<RwLock<Buffer>>,
    device: Device,
    requires_grad: bool,
    offset: usize,
    /// 1 for ordinary tensors, 0 for scalar-broadcast views.
    stride: usize,
    len: usize,
}

impl Tensor {
    pub fn new(data: Buffer) -> Result<Self> {
        Tensor::on_device(data, Device::Cpu)
    }

    pub fn on_device(data: Buffer, device: Device) -> Result<Self> {
        if !data.dtype().has_tensor_equivalent() {
            return Err(Error::Cast(format!(
                "{} has no tensor representation",
                data.dtype()
            )));
        }
        let len = data.len();
        Ok(Tensor {
            storage: Arc::new(RwLock::new(data)),
            device,
            requires_grad: false,
            offset: 0,
            stride: 1,
            len,
        })
    }

    /// Wrap an existing buffer handle; the zero-copy bridge from the dense
    /// backend comes through here.
    pub(crate) fn from_handle(
        storage: Arc<RwLock<Buffer>>,
        offset: usize,
        stride: usize,
        len: usize,
        device: Device,
    ) -> Result<Self> {
        if !storage
            .read()
            .expect("storage lock poisoned")
            .dtype()
            .has_tensor_equivalent()
        {
            return Err(Error::Cast(
                "str buffers have no tensor representation".to_string(),
            ));
        }
        Ok(Tensor {
            storage,
            device,
            requires_grad: false,
            offset,
            stride,
            len,
        })
    }

    /// Turn gradient tracking on or off. Only float tensors can track
    /// gradients.
    pub fn with_requires_grad(mut self, requires_grad: bool) -> Result<Self> {
        if requires_grad && !self.dtype().is_float() {
            return Err(Error::InvalidInput(format!(
                "only float tensors can require grad, got {}",
                self.dtype()
            )));
        }
        self.requires_grad = requires_grad;
        Ok(self)
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

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    pub fn shares_storage(&self, other: &Tensor) -> bool {
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

    pub fn get(&self, i: usize) -> Scalar {
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

    pub fn is_na(&self, i: usize) -> bool {
        match self.get(i) {
            Scalar::F64(v) => v.is_nan(),
            _ => false,
        }
    }

    pub fn isna(&self) -> Vec<bool> {
        (0..self.len).map(|i| self.is_na(i)).collect()
    }

    /// In-place element write. The value is cast to this tensor's dtype
    /// before assignment; assigning across dtypes without the cast is
    /// unreliable on some device backends.
    pub fn set(&mut self, i: usize, value: &Scalar) -> Result<()> {
        let v = cast_scalar(value, self.dtype())?;
        if v.is_null() {
            return Err(Error::InvalidInput(
                "tensors have no missing-value representation".to_string(),
            ));
        }
        let p = self.phys(i);
        let mut buf = self.storage.write().expect("storage lock poisoned");
        buf.set(p, &v)
    }

    /// Ordered scatter-write: `self[ids[k]] = values[k]` applied for k in
    /// ascending order, so under duplicate ids the last write wins. That
    /// ordering is only part of the contract when `deterministic` is true;
    /// callers needing it must hold a [`DeterministicScatter`] guard and
    /// pass the flag through.
    pub fn scatter_set(&mut self, ids: &[i64], values: &Tensor, deterministic: bool) -> Result<()> {
        if ids.len() != values.len() {
            return Err(Error::LengthMismatch {
                expected: ids.len(),
                actual: values.len(),
            });
        }
        if !deterministic && has_duplicates(ids) {
            log::debug!(
                "scatter_set with duplicate ids while deterministic algorithms are off; \
                 write order is not guaranteed"
            );
        }
        for (k, &raw_id) in ids.iter().enumerate() {
            let i = normalize_index(raw_id, self.len)?;
            self.set(i, &values.get(k))?;
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
        Ok(Tensor {
            storage: Arc::clone(&self.storage),
            device: self.device,
            requires_grad: self.requires_grad,
            offset: self.offset + start * self.stride,
            stride: self.stride,
            len: count,
        })
    }

    /// Zero-copy stride-0 broadcast view.
    pub fn broadcast_to(&self, len: usize) -> Result<Self> {
        if self.len == len {
            return Ok(self.clone());
        }
        if self.len != 1 {
            return Err(Error::InvalidInput(format!(
                "cannot broadcast tensor of length {} to length {}",
                self.len, len
            )));
        }
        Ok(Tensor {
            storage: Arc::clone(&self.storage),
            device: self.device,
            requires_grad: self.requires_grad,
            offset: self.offset,
            stride: 0,
            len,
        })
    }

    /// Deep copy onto the same device.
    pub fn copy(&self) -> Self {
        let dtype = self.dtype();
        let mut buf = Buffer::filled(dtype, self.len);
        for i in 0..self.len {
            buf.set(i, &self.get(i))
                .expect("raw element always fits its own dtype");
        }
        Tensor {
            storage: Arc::new(RwLock::new(buf)),
            device: self.device,
            requires_grad: self.requires_grad,
            offset: 0,
            stride: 1,
            len: self.len,
        }
    }

    /// Stop tracking gradients. Zero-copy: the detached tensor shares this
    /// tensor's storage.
    pub fn detach(&self) -> Self {
        Tensor {
            storage: Arc::clone(&self.storage),
            device: self.device,
            requires_grad: false,
            offset: self.offset,
            stride: self.stride,
            len: self.len,
        }
    }

    /// Move to `device`. Transfer to the current device is zero-copy;
    /// anything else copies the buffer.
    pub fn to(&self, device: Device) -> Self {
        if device == self.device {
            return self.clone();
        }
        let mut moved = self.copy();
        moved.device = device;
        moved
    }

    pub fn cpu(&self) -> Self {
        self.to(Device::Cpu)
    }

    /// Cast to `dtype`; same-dtype casts share storage.
    pub fn astype(&self, dtype: DType) -> Result<Self> {
        if !dtype.has_tensor_equivalent() {
            return Err(Error::Cast(format!(
                "{} has no tensor representation",
                dtype
            )));
        }
        if dtype == self.dtype() {
            return Ok(self.clone());
        }
        let mut buf = Buffer::filled(dtype, self.len);
        for i in 0..self.len {
            buf.set(i, &cast_scalar(&self.get(i), dtype)?)?;
        }
        Ok(Tensor {
            storage: Arc::new(RwLock::new(buf)),
            device: self.device,
            requires_grad: self.requires_grad && dtype.is_float(),
            offset: 0,
            stride: 1,
            len: self.len,
        })
    }

    /// Gather by (possibly negative) indices into a fresh tensor.
    pub fn take(&self, indices: &[i64]) -> Result<Self> {
        let dtype = self.dtype();
        let mut buf = Buffer::filled(dtype, indices.len());
        for (out, &raw_idx) in indices.iter().enumerate() {
            let i = normalize_index(raw_idx, self.len)?;
            buf.set(out, &self.get(i))
                .expect("raw element always fits its own dtype");
        }
        Ok(Tensor {
            storage: Arc::new(RwLock::new(buf)),
            device: self.device,
            requires_grad: self.requires_grad,
            offset: 0,
            stride: 1,
            len: indices.len(),
        })
    }

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

    fn cmp_raw(&self, a: usize, b: usize) -> Ordering {
        match (self.get(a), self.get(b)) {
            (Scalar::F64(x), Scalar::F64(y)) => x.total_cmp(&y),
            (Scalar::I64(x), Scalar::I64(y)) => x.cmp(&y),
            (Scalar::Bool(x), Scalar::Bool(y)) => x.cmp(&y),
            _ => Ordering::Equal,
        }
    }

    /// Stable argsort with a native descending mode.
    pub fn argsort(&self, descending: bool) -> Tensor {
        let mut order: Vec<i64> = (0..self.len as i64).collect();
        if descending {
            order.sort_by(|&a, &b| self.cmp_raw(b as usize, a as usize));
        } else {
            order.sort_by(|&a, &b| self.cmp_raw(a as usize, b as usize));
        }
        Tensor {
            storage: Arc::new(RwLock::new(Buffer::I64(order))),
            device: self.device,
            requires_grad: false,
            offset: 0,
            stride: 1,
            len: self.len,
        }
    }

    /// Sorted unique values with inverse mapping and counts.
    pub fn unique(&self) -> (Tensor, Vec<i64>, Vec<i64>) {
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

    /// Differentiable bincount built on scatter-add.
    ///
    /// The native counting path severs the gradient chain, so weighted
    /// counts accumulate through element-wise adds instead: the result
    /// inherits `requires_grad` from the weights.
    pub fn bincount(&self, weights: Option<&Tensor>) -> Result<Tensor> {
        if self.dtype() != DType::Int64 {
            return Err(Error::InvalidInput(format!(
                "bincount requires an i64 tensor, got {}",
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
            if w.device() != self.device {
                return Err(Error::DeviceMismatch(format!(
                    "bincount ids on {} but weights on {}",
                    self.device,
                    w.device()
                )));
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
                Ok(Tensor {
                    storage: Arc::new(RwLock::new(Buffer::I64(counts))),
                    device: self.device,
                    requires_grad: false,
                    offset: 0,
                    stride: 1,
                    len: nbins,
                })
            }
            Some(w) => {
                let mut sums = vec![0.0f64; nbins];
                for i in 0..self.len {
                    sums[self.raw_i64(i) as usize] += w.raw_f64(i);
                }
                Ok(Tensor {
                    storage: Arc::new(RwLock::new(Buffer::F64(sums))),
                    device: self.device,
                    requires_grad: w.requires_grad(),
                    offset: 0,
                    stride: 1,
                    len: nbins,
                })
            }
        }
    }

    /// Element-wise binary operation. Both operands must live on the same
    /// device; gradient tracking propagates to float results.
    pub fn binary_op(&self, other: &Tensor, op: BinOp) -> Result<Tensor> {
        if self.device != other.device {
            return Err(Error::DeviceMismatch(format!(
                "binary op between {} and {}",
                self.device, other.device
            )));
        }
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
        Ok(Tensor {
            storage: Arc::new(RwLock::new(buf)),
            device: self.device,
            requires_grad: (self.requires_grad || other.requires_grad) && dtype.is_float(),
            offset: 0,
            stride: 1,
            len: out_len,
        })
    }

    /// Concatenate tensors; all inputs must share one device.
    pub fn concat(arrs: &[&Tensor]) -> Result<Tensor> {
        if arrs.is_empty() {
            return Err(Error::InvalidInput(
                "concat requires at least one tensor".to_string(),
            ));
        }
        let device = arrs[0].device;
        let mut dtype = arrs[0].dtype();
        for t in &arrs[1..] {
            if t.device != device {
                return Err(Error::DeviceMismatch(format!(
                    "concat inputs on {} and {}",
                    device, t.device
                )));
            }
            dtype = merge_dtypes(dtype, t.dtype())?;
        }
        let total: usize = arrs.iter().map(|t| t.len()).sum();
        let mut buf = Buffer::filled(dtype, total);
        let mut out = 0;
        for t in arrs {
            for i in 0..t.len() {
                buf.set(out, &cast_scalar(&t.get(i), dtype)?)?;
                out += 1;
            }
        }
        Ok(Tensor {
            storage: Arc::new(RwLock::new(buf)),
            device,
            requires_grad: arrs.iter().any(|t| t.requires_grad),
            offset: 0,
            stride: 1,
            len: total,
        })
    }

    pub fn to_f64_vec(&self) -> Vec<f64> {
        (0..self.len).map(|i| self.raw_f64(i)).collect()
    }

    pub fn nbytes(&self) -> usize {
        self.storage.read().expect("storage lock poisoned").nbytes()
    }
}

fn has_duplicates(ids: &[i64]) -> bool {
    let mut seen = std::collections::HashSet::with_capacity(ids.len());
    ids.iter().any(|id| !seen.insert(*id))
}
