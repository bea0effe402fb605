// ABOUTME: Error types for the data-flow expression language
// ABOUTME: Reports malformed reference expressions detected before resolution

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataFlowError {
    #[error("Unbalanced braces in expression '{expression}'")]
    UnbalancedBraces { expression: String },

    #[error("Nested reference in expression '{expression}'")]
    NestedReference { expression: String },

    #[error("Empty reference in expression '{expression}'")]
    EmptyReference { expression: String },

    #[error("Parameter '{parameter}': {source}")]
    InvalidParameter {
        parameter: String,
        #[source]
        source: Box<DataFlowError>,
    },
}

pub type Result<T> = std::result::Result<T, DataFlowError>;
