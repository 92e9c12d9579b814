//! Raw array backends and their shared vocabulary types.
//!
//! Two backends exist: a masked-capable dense array that always lives in
//! host memory ([`DenseArray`]) and a device-resident tensor with gradient
//! tracking ([`Tensor`]). Both store elements in a [`Buffer`] behind
//! `Arc<RwLock<_>>`, which is what makes the zero-copy bridge between them
//! possible: converting a dense array to a tensor (or back) shares the same
//! buffer and clones only the handle.

pub mod dense;
pub mod tensor;

pub use dense::DenseArray;
pub use tensor::{DeterministicScatter, Tensor};

use std::fmt;

use num_traits::NumCast;

use crate::error::{Error, Result};

/// Tag identifying which backend an array belongs to.
///
/// Fixed at construction and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    Dense,
    Tensor,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Dense => write!(f, "dense"),
            Backend::Tensor => write!(f, "tensor"),
        }
    }
}

/// Compute device. Dense arrays always live on [`Device::Cpu`]; tensors may
/// live on any device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Device {
    Cpu,
    Cuda(usize),
}

impl Device {
    pub fn is_cpu(&self) -> bool {
        matches!(self, Device::Cpu)
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(n) => write!(f, "cuda:{}", n),
        }
    }
}

/// Element data type of an array.
///
/// Stored inside every array so operations can dispatch to the correct
/// typed implementation at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    Float64,
    Int64,
    Bool,
    Str,
}

impl DType {
    pub fn is_float(&self) -> bool {
        matches!(self, DType::Float64)
    }

    /// Whether values of this dtype participate in arithmetic.
    pub fn is_numeric(&self) -> bool {
        matches!(self, DType::Float64 | DType::Int64 | DType::Bool)
    }

    /// String columns have no tensor-backend representation.
    pub fn has_tensor_equivalent(&self) -> bool {
        !matches!(self, DType::Str)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DType::Float64 => "f64",
            DType::Int64 => "i64",
            DType::Bool => "bool",
            DType::Str => "str",
        };
        write!(f, "{}", s)
    }
}

/// Element-wise binary operations shared by both backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinOp {
    /// Result dtype of `a op b`. True division and exponentiation always
    /// produce floats; otherwise floats are contagious and bools promote to
    /// ints.
    pub fn result_dtype(&self, a: DType, b: DType) -> Result<DType> {
        if !a.is_numeric() || !b.is_numeric() {
            return Err(Error::Cast(format!(
                "arithmetic requires numeric operands, got {} and {}",
                a, b
            )));
        }
        match self {
            BinOp::Div | BinOp::Pow => Ok(DType::Float64),
            _ if a.is_float() || b.is_float() => Ok(DType::Float64),
            _ => Ok(DType::Int64),
        }
    }

    pub fn apply_f64(&self, a: f64, b: f64) -> f64 {
        match self {
            BinOp::Add => a + b,
            BinOp::Sub => a - b,
            BinOp::Mul => a * b,
            BinOp::Div => a / b,
            BinOp::Pow => a.powf(b),
        }
    }

    /// Integer path. Only `Add`/`Sub`/`Mul` can reach here: `result_dtype`
    /// routes `Div`/`Pow` to the float path.
    pub fn apply_i64(&self, a: i64, b: i64) -> Result<i64> {
        match self {
            BinOp::Add => Ok(a.wrapping_add(b)),
            BinOp::Sub => Ok(a.wrapping_sub(b)),
            BinOp::Mul => Ok(a.wrapping_mul(b)),
            BinOp::Div | BinOp::Pow => Err(Error::Consistency(
                "integer arithmetic path received a float-only operator".to_string(),
            )),
        }
    }
}

/// A single element value, used for element get/set, row extraction and
/// expression literals. `Null` is the missing-value sentinel of the masked
/// dense backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    F64(f64),
    I64(i64),
    Bool(bool),
    Str(String),
    Null,
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// The dtype this scalar naturally stores as; `None` for `Null`.
    pub fn dtype(&self) -> Option<DType> {
        match self {
            Scalar::F64(_) => Some(DType::Float64),
            Scalar::I64(_) => Some(DType::Int64),
            Scalar::Bool(_) => Some(DType::Bool),
            Scalar::Str(_) => Some(DType::Str),
            Scalar::Null => None,
        }
    }

    /// Numeric view of the scalar; `None` for strings and nulls.
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Scalar::F64(v) => Some(*v),
            Scalar::I64(v) => Some(*v as f64),
            Scalar::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            Scalar::Str(_) | Scalar::Null => None,
        }
    }

    pub fn to_i64(&self) -> Option<i64> {
        match self {
            Scalar::F64(v) => NumCast::from(*v),
            Scalar::I64(v) => Some(*v),
            Scalar::Bool(v) => Some(*v as i64),
            Scalar::Str(_) | Scalar::Null => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::F64(v) => write!(f, "{}", v),
            Scalar::I64(v) => write!(f, "{}", v),
            Scalar::Bool(v) => write!(f, "{}", v),
            Scalar::Str(v) => write!(f, "{}", v),
            Scalar::Null => write!(f, "NA"),
        }
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::F64(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::I64(v)
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Str(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Str(v)
    }
}

/// Typed element buffer shared by both backends.
///
/// This is the unit of storage sharing: views, device transfers back to the
/// same device, detachment and the dense/tensor bridge all clone the
/// `Arc<RwLock<Buffer>>` handle rather than the data.
#[derive(Debug, Clone, PartialEq)]
pub enum Buffer {
    F64(Vec<f64>),
    I64(Vec<i64>),
    Bool(Vec<bool>),
    Str(Vec<String>),
}

impl Buffer {
    pub fn len(&self) -> usize {
        match self {
            Buffer::F64(v) => v.len(),
            Buffer::I64(v) => v.len(),
            Buffer::Bool(v) => v.len(),
            Buffer::Str(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> DType {
        match self {
            Buffer::F64(_) => DType::Float64,
            Buffer::I64(_) => DType::Int64,
            Buffer::Bool(_) => DType::Bool,
            Buffer::Str(_) => DType::Str,
        }
    }

    /// Allocate a buffer of `len` elements pre-filled with the dtype's
    /// missing-value sentinel: NaN for floats, zero/false/empty otherwise.
    pub fn filled(dtype: DType, len: usize) -> Buffer {
        match dtype {
            DType::Float64 => Buffer::F64(vec![f64::NAN; len]),
            DType::Int64 => Buffer::I64(vec![0; len]),
            DType::Bool => Buffer::Bool(vec![false; len]),
            DType::Str => Buffer::Str(vec![String::new(); len]),
        }
    }

    /// Raw element at physical index `i`. Masking is the dense array's
    /// concern, not the buffer's.
    pub fn get(&self, i: usize) -> Scalar {
        match self {
            Buffer::F64(v) => Scalar::F64(v[i]),
            Buffer::I64(v) => Scalar::I64(v[i]),
            Buffer::Bool(v) => Scalar::Bool(v[i]),
            Buffer::Str(v) => Scalar::Str(v[i].clone()),
        }
    }

    /// Write `value` at physical index `i`, casting it to this buffer's
    /// dtype first.
    pub fn set(&mut self, i: usize, value: &Scalar) -> Result<()> {
        match self {
            Buffer::F64(v) => {
                v[i] = value.to_f64().ok_or_else(|| cast_err(value, DType::Float64))?;
            }
            Buffer::I64(v) => {
                v[i] = value.to_i64().ok_or_else(|| cast_err(value, DType::Int64))?;
            }
            Buffer::Bool(v) => {
                v[i] = match value {
                    Scalar::Bool(b) => *b,
                    Scalar::I64(n) => *n != 0,
                    Scalar::F64(n) => *n != 0.0,
                    _ => return Err(cast_err(value, DType::Bool)),
                };
            }
            Buffer::Str(v) => {
                v[i] = match value {
                    Scalar::Str(s) => s.clone(),
                    _ => return Err(cast_err(value, DType::Str)),
                };
            }
        }
        Ok(())
    }

    /// Numeric view at physical index `i`; NaN for strings, which the
    /// numeric call sites exclude up front by dtype check.
    pub fn f64_at(&self, i: usize) -> f64 {
        match self {
            Buffer::F64(v) => v[i],
            Buffer::I64(v) => v[i] as f64,
            Buffer::Bool(v) => {
                if v[i] {
                    1.0
                } else {
                    0.0
                }
            }
            Buffer::Str(_) => f64::NAN,
        }
    }

    pub fn i64_at(&self, i: usize) -> i64 {
        match self {
            Buffer::F64(v) => v[i] as i64,
            Buffer::I64(v) => v[i],
            Buffer::Bool(v) => v[i] as i64,
            Buffer::Str(_) => 0,
        }
    }

    /// Size of the buffer contents in bytes.
    pub fn nbytes(&self) -> usize {
        match self {
            Buffer::F64(v) => v.len() * std::mem::size_of::<f64>(),
            Buffer::I64(v) => v.len() * std::mem::size_of::<i64>(),
            Buffer::Bool(v) => v.len(),
            Buffer::Str(v) => v.iter().map(|s| s.len()).sum(),
        }
    }
}

fn cast_err(value: &Scalar, target: DType) -> Error {
    Error::Cast(format!("cannot store {:?} into a {} buffer", value, target))
}
