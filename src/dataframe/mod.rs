// DataFrame implementation module
pub mod base;
pub mod join;
pub mod query;

// Re-exports for convenience
pub use base::{concat, ColSelector, ColumnsValue, DataFrame, TensorMatrix};
pub use join::{JoinHow, MergeOptions};
pub use query::{Expr, QueryContext};
