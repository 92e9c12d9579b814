#![allow(clippy::len_without_is_empty)]

//! biframe: a dual-backend DataFrame library.
//!
//! One columnar table abstraction over two heterogeneous array backends —
//! masked-capable dense arrays and device-resident, gradient-tracking
//! tensors — plus a grouped-aggregation engine built on top of it.

pub mod array;
pub mod backend;
pub mod dataframe;
pub mod error;
pub mod groupby;

// Re-export commonly used types
pub use array::{concat as concat_arrays, Array, Idx};
pub use backend::{
    Backend, Buffer, DType, DenseArray, DeterministicScatter, Device, Scalar, Tensor,
};
pub use dataframe::{
    concat, ColSelector, ColumnsValue, DataFrame, JoinHow, MergeOptions, QueryContext,
    TensorMatrix,
};
pub use error::{Error, Result};
pub use groupby::{AggFunc, DataFrameGroupBy};

// Export version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
