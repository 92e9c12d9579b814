//! Backend-unifying array.
//!
//! [`Array`] wraps either a masked-capable [`DenseArray`] or a
//! device-resident [`Tensor`] and exposes one operation surface for both.
//! The backend tag is fixed at construction; every operation dispatches
//! with an exhaustive match over it, so adding a backend variant surfaces
//! every call site that needs a decision.
//!
//! Writeability is a per-array permission bit. Operations that produce
//! storage-sharing views (slicing, same-dtype casts, detachment, the
//! dense/tensor bridge, same-device transfer) inherit it; operations that
//! copy start writeable; broadcasting is never writeable. The decision is
//! made statically by the operation, not by inspecting storage pointers.

pub mod rows;

use std::fmt;

use crate::backend::dense::normalize_index;
use crate::backend::{Backend, BinOp, Buffer, DType, DenseArray, Device, Scalar, Tensor};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub enum ArrayData {
    Dense(DenseArray),
    Tensor(Tensor),
}

#[derive(Debug, Clone)]
pub struct Array {
    data: ArrayData,
    writeable: bool,
}

/// Index into a one-dimensional array.
#[derive(Debug, Clone)]
pub enum Idx<'a> {
    /// Single element; negative counts from the end.
    At(i64),
    /// Half-open logical range.
    Range(usize, usize),
    /// Every element.
    All,
    /// Boolean selection mask, same length as the target.
    Mask(&'a Array),
    /// Integer gather indices; duplicates allowed on assignment (scatter).
    Take(&'a Array),
}

impl Array {
    pub fn from_dense(data: DenseArray) -> Self {
        Array {
            data: ArrayData::Dense(data),
            writeable: true,
        }
    }

    pub fn from_tensor(data: Tensor) -> Self {
        Array {
            data: ArrayData::Tensor(data),
            writeable: true,
        }
    }

    fn view(&self, data: ArrayData) -> Self {
        Array {
            data,
            writeable: self.writeable,
        }
    }

    /// Build a dense array from loose scalars (nulls become masked).
    pub fn from_scalars(values: &[Scalar]) -> Result<Self> {
        Ok(Array::from_dense(DenseArray::from_scalars(values)?))
    }

    /// Single-element dense array, the operand form of a bare scalar.
    pub fn from_scalar(value: &Scalar) -> Result<Self> {
        Array::from_scalars(std::slice::from_ref(value))
    }

    /// Allocate an array pre-filled with the missing-value sentinel (NaN
    /// for floats). `masked` additionally marks every element missing on
    /// the dense backend; the tensor backend has no masked representation
    /// yet.
    pub fn empty(
        len: usize,
        masked: bool,
        backend: Backend,
        dtype: DType,
        device: Device,
    ) -> Result<Self> {
        match backend {
            Backend::Dense => {
                if !device.is_cpu() {
                    return Err(Error::InvalidInput(format!(
                        "dense arrays live on cpu, requested {}",
                        device
                    )));
                }
                if masked {
                    Ok(Array::from_dense(DenseArray::all_masked(dtype, len)))
                } else {
                    Ok(Array::from_dense(DenseArray::new(Buffer::filled(
                        dtype, len,
                    ))))
                }
            }
            Backend::Tensor => {
                if masked {
                    // TODO: support masked tensors once the tensor backend
                    // grows a masked representation.
                    return Err(Error::NotImplemented(
                        "masked tensor allocation".to_string(),
                    ));
                }
                Ok(Array::from_tensor(Tensor::on_device(
                    Buffer::filled(dtype, len),
                    device,
                )?))
            }
        }
    }

    pub fn len(&self) -> usize {
        match &self.data {
            ArrayData::Dense(a) => a.len(),
            ArrayData::Tensor(t) => t.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> DType {
        match &self.data {
            ArrayData::Dense(a) => a.dtype(),
            ArrayData::Tensor(t) => t.dtype(),
        }
    }

    pub fn backend(&self) -> Backend {
        match &self.data {
            ArrayData::Dense(_) => Backend::Dense,
            ArrayData::Tensor(_) => Backend::Tensor,
        }
    }

    pub fn is_tensor(&self) -> bool {
        matches!(self.data, ArrayData::Tensor(_))
    }

    /// Dense arrays report the cpu placeholder device.
    pub fn device(&self) -> Device {
        match &self.data {
            ArrayData::Dense(_) => Device::Cpu,
            ArrayData::Tensor(t) => t.device(),
        }
    }

    pub fn writeable(&self) -> bool {
        self.writeable
    }

    /// Flip the permission bit. Setting it back to true on a shared view is
    /// almost never what you want; copy instead.
    pub fn set_writeable(&mut self, writeable: bool) {
        self.writeable = writeable;
    }

    pub fn requires_grad(&self) -> bool {
        match &self.data {
            ArrayData::Dense(_) => false,
            ArrayData::Tensor(t) => t.requires_grad(),
        }
    }

    pub fn has_mask(&self) -> bool {
        match &self.data {
            ArrayData::Dense(a) => a.has_mask(),
            ArrayData::Tensor(_) => false,
        }
    }

    pub fn nbytes(&self) -> usize {
        match &self.data {
            ArrayData::Dense(a) => a.nbytes(),
            ArrayData::Tensor(t) => t.nbytes(),
        }
    }

    /// Whether two arrays alias the same underlying buffer.
    pub fn shares_storage(&self, other: &Array) -> bool {
        match (&self.data, &other.data) {
            (ArrayData::Dense(a), ArrayData::Dense(b)) => a.shares_storage(b),
            (ArrayData::Tensor(a), ArrayData::Tensor(b)) => a.shares_storage(b),
            (ArrayData::Dense(a), ArrayData::Tensor(b)) => {
                std::sync::Arc::ptr_eq(&a.buffer_handle(), &b.buffer_handle())
            }
            (ArrayData::Tensor(a), ArrayData::Dense(b)) => {
                std::sync::Arc::ptr_eq(&a.buffer_handle(), &b.buffer_handle())
            }
        }
    }

    /// Element at `i` (negative counts from the end); masked elements come
    /// back as `Null`.
    pub fn get_scalar(&self, i: i64) -> Result<Scalar> {
        let i = normalize_index(i, self.len())?;
        Ok(match &self.data {
            ArrayData::Dense(a) => a.get(i),
            ArrayData::Tensor(t) => t.get(i),
        })
    }

    /// In-place single-element write, gated by the writeable flag.
    pub fn set_scalar(&mut self, i: i64, value: &Scalar) -> Result<()> {
        if !self.writeable {
            return Err(Error::NotWriteable(
                "cannot assign through a non-writeable array; copy it first".to_string(),
            ));
        }
        let i = normalize_index(i, self.len())?;
        match &mut self.data {
            ArrayData::Dense(a) => a.set(i, value),
            ArrayData::Tensor(t) => t.set(i, value),
        }
    }

    /// Select elements. `Range`/`All` produce storage-sharing views that
    /// inherit this array's writeability; `Mask`/`Take` produce fresh
    /// writeable copies. A tensor-typed index living on another device is
    /// moved to this array's device first.
    pub fn get(&self, idx: &Idx) -> Result<Array> {
        match idx {
            Idx::At(i) => {
                let v = self.get_scalar(*i)?;
                match &self.data {
                    ArrayData::Dense(_) => Array::from_scalar(&v),
                    ArrayData::Tensor(t) => {
                        let one = t.take(&[normalize_index(*i, self.len())? as i64])?;
                        Ok(Array::from_tensor(one))
                    }
                }
            }
            Idx::All => Ok(self.view(self.data.clone())),
            Idx::Range(start, end) => {
                if end < start {
                    return Err(Error::InvalidInput(format!(
                        "range start {} exceeds end {}",
                        start, end
                    )));
                }
                let data = match &self.data {
                    ArrayData::Dense(a) => ArrayData::Dense(a.view_range(*start, end - start)?),
                    ArrayData::Tensor(t) => ArrayData::Tensor(t.view_range(*start, end - start)?),
                };
                Ok(self.view(data))
            }
            Idx::Mask(m) => {
                let keep = self.mask_index_to_vec(m)?;
                let data = match &self.data {
                    ArrayData::Dense(a) => ArrayData::Dense(a.filter(&keep)?),
                    ArrayData::Tensor(t) => ArrayData::Tensor(t.filter(&keep)?),
                };
                Ok(Array {
                    data,
                    writeable: true,
                })
            }
            Idx::Take(t) => {
                let indices = self.take_index_to_vec(t)?;
                let data = match &self.data {
                    ArrayData::Dense(a) => ArrayData::Dense(a.take(&indices)?),
                    ArrayData::Tensor(tt) => ArrayData::Tensor(tt.take(&indices)?),
                };
                Ok(Array {
                    data,
                    writeable: true,
                })
            }
        }
    }

    /// Assign `value` at the selected positions. Fails with a mutability
    /// error when this array is not writeable. The value is coerced to this
    /// array's backend, dtype and device before any element is written.
    pub fn set(&mut self, idx: &Idx, value: &Array) -> Result<()> {
        if !self.writeable {
            return Err(Error::NotWriteable(
                "cannot assign through a non-writeable array; copy it first".to_string(),
            ));
        }
        let v = value.like(self, true, true)?;

        if let Idx::Take(t) = idx {
            if self.is_tensor() {
                // Scatter path: duplicate indices are only ordered under
                // the deterministic-algorithms flag.
                let ids = self.take_index_to_vec(t)?;
                let v = if v.len() == 1 && ids.len() != 1 {
                    v.broadcast_to(ids.len())?
                } else {
                    v
                };
                if v.len() != ids.len() {
                    return Err(Error::LengthMismatch {
                        expected: ids.len(),
                        actual: v.len(),
                    });
                }
                let vt = match &v.data {
                    ArrayData::Tensor(vt) => vt.clone(),
                    ArrayData::Dense(_) => {
                        return Err(Error::Consistency(
                            "like() returned a dense value for a tensor target".to_string(),
                        ))
                    }
                };
                let deterministic = crate::backend::tensor::deterministic_scatter_enabled();
                return match &mut self.data {
                    ArrayData::Tensor(dst) => dst.scatter_set(&ids, &vt, deterministic),
                    ArrayData::Dense(_) => Err(Error::Consistency(
                        "backend tag changed during scatter".to_string(),
                    )),
                };
            }
        }

        let positions: Vec<usize> = match idx {
            Idx::At(i) => vec![normalize_index(*i, self.len())?],
            Idx::All => (0..self.len()).collect(),
            Idx::Range(start, end) => {
                if *end > self.len() || end < start {
                    return Err(Error::IndexOutOfBounds {
                        index: *end as i64,
                        size: self.len(),
                    });
                }
                (*start..*end).collect()
            }
            Idx::Mask(m) => {
                let keep = self.mask_index_to_vec(m)?;
                keep.iter()
                    .enumerate()
                    .filter_map(|(i, &k)| if k { Some(i) } else { None })
                    .collect()
            }
            Idx::Take(t) => {
                let mut out = Vec::new();
                for raw in self.take_index_to_vec(t)? {
                    out.push(normalize_index(raw, self.len())?);
                }
                out
            }
        };

        if v.len() != positions.len() && v.len() != 1 {
            return Err(Error::LengthMismatch {
                expected: positions.len(),
                actual: v.len(),
            });
        }
        let elems: Vec<Scalar> = (0..positions.len())
            .map(|k| v.get_scalar(if v.len() == 1 { 0 } else { k as i64 }))
            .collect::<Result<_>>()?;
        // Validate every element up front so a cast failure cannot leave
        // the array half-written.
        for elem in &elems {
            if elem.is_null() {
                let accepts_null = match &self.data {
                    ArrayData::Dense(a) => a.has_mask() || a.dtype().is_float(),
                    ArrayData::Tensor(_) => false,
                };
                if !accepts_null {
                    return Err(Error::InvalidInput(
                        "cannot write NA into an array without a missing-value slot"
                            .to_string(),
                    ));
                }
            } else {
                crate::backend::dense::cast_scalar(elem, self.dtype())?;
            }
        }
        for (&p, elem) in positions.iter().zip(&elems) {
            match &mut self.data {
                ArrayData::Dense(a) => a.set(p, elem)?,
                ArrayData::Tensor(t) => t.set(p, elem)?,
            }
        }
        Ok(())
    }

    fn mask_index_to_vec(&self, m: &Array) -> Result<Vec<bool>> {
        if m.dtype() != DType::Bool {
            return Err(Error::InvalidInput(format!(
                "mask index must be bool, got {}",
                m.dtype()
            )));
        }
        // An index tensor on another device is moved to self's device; for
        // a dense target that means pulling it to cpu.
        let m = if m.is_tensor() && m.device() != self.device() {
            m.to(self.device())
        } else {
            m.clone()
        };
        if m.len() != self.len() {
            return Err(Error::LengthMismatch {
                expected: self.len(),
                actual: m.len(),
            });
        }
        Ok((0..m.len())
            .map(|i| match &m.data {
                ArrayData::Dense(a) => a.raw_i64(i) != 0,
                ArrayData::Tensor(t) => t.raw_i64(i) != 0,
            })
            .collect())
    }

    fn take_index_to_vec(&self, t: &Array) -> Result<Vec<i64>> {
        if !matches!(t.dtype(), DType::Int64) {
            return Err(Error::InvalidInput(format!(
                "take index must be i64, got {}",
                t.dtype()
            )));
        }
        let t = if t.is_tensor() && t.device() != self.device() {
            t.to(self.device())
        } else {
            t.clone()
        };
        Ok((0..t.len())
            .map(|i| match &t.data {
                ArrayData::Dense(a) => a.raw_i64(i),
                ArrayData::Tensor(tt) => tt.raw_i64(i),
            })
            .collect())
    }

    // Arithmetic. Operands are unwrapped to their backend form, mixed
    // dense/tensor pairs promote the dense side onto the tensor's device,
    // and the result is re-wrapped writeable.

    fn binary(&self, other: &Array, op: BinOp) -> Result<Array> {
        match (&self.data, &other.data) {
            (ArrayData::Dense(a), ArrayData::Dense(b)) => {
                Ok(Array::from_dense(a.binary_op(b, op)?))
            }
            (ArrayData::Tensor(a), ArrayData::Tensor(b)) => {
                Ok(Array::from_tensor(a.binary_op(b, op)?))
            }
            (ArrayData::Dense(_), ArrayData::Tensor(b)) => {
                let a = self.as_tensor()?.to(b.device());
                a.binary(other, op)
            }
            (ArrayData::Tensor(a), ArrayData::Dense(_)) => {
                let b = other.as_tensor()?.to(a.device());
                self.binary(&b, op)
            }
        }
    }

    pub fn add(&self, other: &Array) -> Result<Array> {
        self.binary(other, BinOp::Add)
    }

    pub fn sub(&self, other: &Array) -> Result<Array> {
        self.binary(other, BinOp::Sub)
    }

    pub fn mul(&self, other: &Array) -> Result<Array> {
        self.binary(other, BinOp::Mul)
    }

    pub fn div(&self, other: &Array) -> Result<Array> {
        self.binary(other, BinOp::Div)
    }

    pub fn pow(&self, other: &Array) -> Result<Array> {
        self.binary(other, BinOp::Pow)
    }

    /// Reflected addition: `other + self`.
    pub fn radd(&self, other: &Array) -> Result<Array> {
        other.binary(self, BinOp::Add)
    }

    /// Reflected subtraction: `other - self`.
    pub fn rsub(&self, other: &Array) -> Result<Array> {
        other.binary(self, BinOp::Sub)
    }

    /// Reflected multiplication: `other * self`.
    pub fn rmul(&self, other: &Array) -> Result<Array> {
        other.binary(self, BinOp::Mul)
    }

    /// Reflected division: `other / self`.
    pub fn rdiv(&self, other: &Array) -> Result<Array> {
        other.binary(self, BinOp::Div)
    }

    /// Reflected exponentiation: `other ** self`.
    pub fn rpow(&self, other: &Array) -> Result<Array> {
        other.binary(self, BinOp::Pow)
    }

    pub fn add_scalar(&self, value: impl Into<Scalar>) -> Result<Array> {
        self.binary(&Array::from_scalar(&value.into())?, BinOp::Add)
    }

    pub fn sub_scalar(&self, value: impl Into<Scalar>) -> Result<Array> {
        self.binary(&Array::from_scalar(&value.into())?, BinOp::Sub)
    }

    pub fn mul_scalar(&self, value: impl Into<Scalar>) -> Result<Array> {
        self.binary(&Array::from_scalar(&value.into())?, BinOp::Mul)
    }

    pub fn div_scalar(&self, value: impl Into<Scalar>) -> Result<Array> {
        self.binary(&Array::from_scalar(&value.into())?, BinOp::Div)
    }

    pub fn pow_scalar(&self, value: impl Into<Scalar>) -> Result<Array> {
        self.binary(&Array::from_scalar(&value.into())?, BinOp::Pow)
    }

    /// Cast to `dtype`. Same-dtype casts are zero-copy views and inherit
    /// writeability; real conversions copy and start writeable.
    pub fn astype(&self, dtype: DType) -> Result<Array> {
        let zero_copy = dtype == self.dtype();
        let data = match &self.data {
            ArrayData::Dense(a) => ArrayData::Dense(a.astype(dtype)?),
            ArrayData::Tensor(t) => ArrayData::Tensor(t.astype(dtype)?),
        };
        Ok(Array {
            data,
            writeable: if zero_copy { self.writeable } else { true },
        })
    }

    /// Move to `device`. A no-op for dense arrays (they live on cpu);
    /// same-device tensor transfer shares storage, anything else copies.
    pub fn to(&self, device: Device) -> Array {
        match &self.data {
            ArrayData::Dense(_) => self.view(self.data.clone()),
            ArrayData::Tensor(t) => {
                let zero_copy = t.device() == device;
                let moved = t.to(device);
                Array {
                    data: ArrayData::Tensor(moved),
                    writeable: if zero_copy { self.writeable } else { true },
                }
            }
        }
    }

    pub fn cpu(&self) -> Array {
        self.to(Device::Cpu)
    }

    /// Stop gradient tracking; a no-op on the dense backend.
    pub fn detach(&self) -> Array {
        match &self.data {
            ArrayData::Dense(_) => self.view(self.data.clone()),
            ArrayData::Tensor(t) => self.view(ArrayData::Tensor(t.detach())),
        }
    }

    /// Coerce onto the dense backend through the zero-copy bridge. The
    /// tensor must already be on cpu; its buffer is shared, not copied, so
    /// writeability carries over. The bridge has no mask slot.
    pub fn as_dense(&self) -> Result<Array> {
        match &self.data {
            ArrayData::Dense(_) => Ok(self.view(self.data.clone())),
            ArrayData::Tensor(t) => {
                if !t.device().is_cpu() {
                    return Err(Error::DeviceMismatch(format!(
                        "cannot view a {} tensor as a dense array; move it to cpu first",
                        t.device()
                    )));
                }
                let (offset, stride, len) = t.layout();
                Ok(self.view(ArrayData::Dense(DenseArray::from_handle(
                    t.buffer_handle(),
                    offset,
                    stride,
                    len,
                ))))
            }
        }
    }

    /// Coerce onto the tensor backend through the zero-copy bridge. The
    /// buffer is shared, so writeability carries over; an explicit mask is
    /// dropped, exactly like wrapping a masked array's raw buffer.
    pub fn as_tensor(&self) -> Result<Array> {
        match &self.data {
            ArrayData::Tensor(_) => Ok(self.view(self.data.clone())),
            ArrayData::Dense(a) => {
                let (offset, stride, len) = a.layout();
                Ok(self.view(ArrayData::Tensor(Tensor::from_handle(
                    a.buffer_handle(),
                    offset,
                    stride,
                    len,
                    Device::Cpu,
                )?)))
            }
        }
    }

    /// Coerce self to match `other`'s backend, and optionally its dtype and
    /// device. Each of the four backend pairings has its own required
    /// operation order; converting a non-cpu tensor to the dense backend is
    /// incoherent unless the device move is allowed.
    pub fn like(&self, other: &Array, dtype: bool, device: bool) -> Result<Array> {
        let arr = match (&self.data, &other.data) {
            (ArrayData::Tensor(_), ArrayData::Tensor(_)) => {
                let mut arr = self.view(self.data.clone());
                if dtype {
                    arr = arr.astype(other.dtype())?;
                }
                if device {
                    arr = arr.to(other.device());
                }
                arr
            }
            (ArrayData::Tensor(t), ArrayData::Dense(_)) => {
                if !device && !t.device().is_cpu() {
                    return Err(Error::InvalidInput(format!(
                        "device must be allowed to change when converting a {} tensor \
                         to the dense backend",
                        t.device()
                    )));
                }
                let mut arr = self.detach().cpu().as_dense()?;
                if dtype {
                    arr = arr.astype(other.dtype())?;
                }
                arr
            }
            (ArrayData::Dense(_), ArrayData::Tensor(_)) => {
                let mut arr = self.as_tensor()?;
                if dtype {
                    arr = arr.astype(other.dtype())?;
                }
                if device {
                    arr = arr.to(other.device());
                }
                arr
            }
            (ArrayData::Dense(_), ArrayData::Dense(_)) => {
                let mut arr = self.view(self.data.clone());
                if dtype {
                    arr = arr.astype(other.dtype())?;
                }
                arr
            }
        };
        Ok(arr)
    }

    /// Zero-copy broadcast to `len`. Broadcast views are never writeable.
    /// On the dense backend the mask shares the data's layout, so it is
    /// broadcast alongside rather than left behind.
    pub fn broadcast_to(&self, len: usize) -> Result<Array> {
        let data = match &self.data {
            ArrayData::Dense(a) => ArrayData::Dense(a.broadcast_to(len)?),
            ArrayData::Tensor(t) => ArrayData::Tensor(t.broadcast_to(len)?),
        };
        Ok(Array {
            data,
            writeable: false,
        })
    }

    /// Element-wise missing test. For the dense backend this is NaN OR the
    /// explicit mask; tensors only know NaN.
    pub fn isna(&self) -> Array {
        match &self.data {
            ArrayData::Dense(a) => Array::from_dense(DenseArray::new(Buffer::Bool(a.isna()))),
            ArrayData::Tensor(t) => {
                let flags = Buffer::Bool(t.isna());
                let out = Tensor::on_device(flags, t.device())
                    .expect("bool buffers always have a tensor representation");
                Array::from_tensor(out)
            }
        }
    }

    /// Sorted unique values, the inverse mapping from each element to its
    /// unique id, and per-value counts. All three come back on this
    /// array's backend and device.
    pub fn unique(&self) -> Result<(Array, Array, Array)> {
        match &self.data {
            ArrayData::Dense(a) => {
                let (values, inverse, counts) = a.unique();
                Ok((
                    Array::from_dense(values),
                    Array::from_dense(DenseArray::new(Buffer::I64(inverse))),
                    Array::from_dense(DenseArray::new(Buffer::I64(counts))),
                ))
            }
            ArrayData::Tensor(t) => {
                let (values, inverse, counts) = t.unique();
                let device = t.device();
                Ok((
                    Array::from_tensor(values),
                    Array::from_tensor(Tensor::on_device(Buffer::I64(inverse), device)?),
                    Array::from_tensor(Tensor::on_device(Buffer::I64(counts), device)?),
                ))
            }
        }
    }

    /// Count occurrences of each non-negative id, optionally weighted.
    /// Weights are coerced onto this array's backend and device first. On
    /// the tensor backend the scatter-add implementation keeps the result
    /// differentiable with respect to the weights.
    pub fn bincount(&self, weights: Option<&Array>) -> Result<Array> {
        let coerced;
        let weights = match weights {
            Some(w) => {
                coerced = w.like(self, false, true)?;
                Some(&coerced)
            }
            None => None,
        };
        match &self.data {
            ArrayData::Dense(a) => {
                let w = match weights {
                    Some(Array {
                        data: ArrayData::Dense(d),
                        ..
                    }) => Some(d),
                    None => None,
                    _ => {
                        return Err(Error::Consistency(
                            "like() returned a tensor for a dense target".to_string(),
                        ))
                    }
                };
                Ok(Array::from_dense(a.bincount(w)?))
            }
            ArrayData::Tensor(t) => {
                let w = match weights {
                    Some(Array {
                        data: ArrayData::Tensor(wt),
                        ..
                    }) => Some(wt),
                    None => None,
                    _ => {
                        return Err(Error::Consistency(
                            "like() returned a dense value for a tensor target".to_string(),
                        ))
                    }
                };
                Ok(Array::from_tensor(t.bincount(w)?))
            }
        }
    }

    /// Indices that would sort the array. The dense backend has no native
    /// descending sort, so descending is ascending followed by a full
    /// reversal; the tensor backend sorts descending natively.
    pub fn argsort(&self, descending: bool) -> Array {
        match &self.data {
            ArrayData::Dense(a) => Array::from_dense(a.argsort(descending)),
            ArrayData::Tensor(t) => Array::from_tensor(t.argsort(descending)),
        }
    }

    /// Deep copy; the result owns fresh storage and is writeable.
    pub fn copy(&self) -> Array {
        let data = match &self.data {
            ArrayData::Dense(a) => ArrayData::Dense(a.copy()),
            ArrayData::Tensor(t) => ArrayData::Tensor(t.copy()),
        };
        Array {
            data,
            writeable: true,
        }
    }

    /// Logical elements as scalars (masked slots as `Null`).
    pub fn to_scalars(&self) -> Vec<Scalar> {
        (0..self.len())
            .map(|i| match &self.data {
                ArrayData::Dense(a) => a.get(i),
                ArrayData::Tensor(t) => t.get(i),
            })
            .collect()
    }

    /// Raw numeric view of the logical elements.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        match &self.data {
            ArrayData::Dense(a) => a.to_f64_vec(),
            ArrayData::Tensor(t) => t.to_f64_vec(),
        }
    }

    pub(crate) fn raw_i64_at(&self, i: usize) -> i64 {
        match &self.data {
            ArrayData::Dense(a) => a.raw_i64(i),
            ArrayData::Tensor(t) => t.raw_i64(i),
        }
    }
}

/// Concatenate arrays along the only dimension. All inputs must share one
/// backend tag; concatenation across backends is ill-defined and rejected.
pub fn concat(arrs: &[&Array]) -> Result<Array> {
    if arrs.is_empty() {
        return Err(Error::InvalidInput(
            "concat requires at least one array".to_string(),
        ));
    }
    let backend = arrs[0].backend();
    if arrs.iter().any(|a| a.backend() != backend) {
        return Err(Error::InvalidInput(
            "concat inputs must all share one backend".to_string(),
        ));
    }
    match backend {
        Backend::Dense => {
            let parts: Vec<&DenseArray> = arrs
                .iter()
                .map(|a| match &a.data {
                    ArrayData::Dense(d) => d,
                    ArrayData::Tensor(_) => unreachable!("backend tags checked above"),
                })
                .collect();
            Ok(Array::from_dense(DenseArray::concat(&parts)?))
        }
        Backend::Tensor => {
            let parts: Vec<&Tensor> = arrs
                .iter()
                .map(|a| match &a.data {
                    ArrayData::Tensor(t) => t,
                    ArrayData::Dense(_) => unreachable!("backend tags checked above"),
                })
                .collect();
            Ok(Array::from_tensor(Tensor::concat(&parts)?))
        }
    }
}

impl fmt::Display for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Array([")?;
        for (i, v) in self.to_scalars().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", v)?;
        }
        write!(
            f,
            "], backend={}, dtype={}, device={})",
            self.backend(),
            self.dtype(),
            self.device()
        )
    }
}

impl From<Vec<f64>> for Array {
    fn from(v: Vec<f64>) -> Self {
        Array::from_dense(DenseArray::new(Buffer::F64(v)))
    }
}

impl From<Vec<i64>> for Array {
    fn from(v: Vec<i64>) -> Self {
        Array::from_dense(DenseArray::new(Buffer::I64(v)))
    }
}

impl From<Vec<bool>> for Array {
    fn from(v: Vec<bool>) -> Self {
        Array::from_dense(DenseArray::new(Buffer::Bool(v)))
    }
}

impl From<Vec<String>> for Array {
    fn from(v: Vec<String>) -> Self {
        Array::from_dense(DenseArray::new(Buffer::Str(v)))
    }
}

impl From<Vec<&str>> for Array {
    fn from(v: Vec<&str>) -> Self {
        Array::from_dense(DenseArray::new(Buffer::Str(
            v.into_iter().map(|s| s.to_string()).collect(),
        )))
    }
}
