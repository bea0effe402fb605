// ABOUTME: Data-flow engine for passing task outputs into later task inputs
// ABOUTME: Exports the expression resolver, path helpers and data transforms

pub mod error;
pub mod expression;
pub mod transform;

pub use error::{DataFlowError, Result};
pub use expression::{lookup, parse_literal, parse_path, walk, ExpressionResolver};
pub use transform::{merge, AggregateOp, FilterOperator, MergeStrategy, Transform};
