use std::fmt;

use thiserror::Error;

/// Which operand of a binary operator an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Left => "left",
            Side::Right => "right",
        })
    }
}

/// Errors raised during evaluation.
///
/// These all mean "the expression asked for an invalid operation". The other
/// possible outcome of an evaluation step, "there is no value here", is not
/// an error: it is represented by `Value::Undefined` and propagates silently.
/// Evaluator bugs (e.g. a placeholder node reaching dispatch) are panics,
/// never a variant of this enum.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("{side} side of the \"{op}\" operator must evaluate to a number")]
    NonNumberOperand { op: String, side: Side },

    #[error("{side} side of the range operator must evaluate to an integer")]
    NonIntegerRangeBound { side: Side },

    #[error("range operator produces more than {max} items")]
    MaxRangeItemsExceeded { max: usize },

    #[error("the \"{op}\" operator produced an infinite result")]
    NumberOverflow { op: String },

    #[error("the \"{op}\" operator produced an invalid (NaN) result")]
    NumberInvalid { op: String },

    #[error("{side} side of the \"{op}\" operator must evaluate to a number or a string")]
    NonComparableOperand { op: String, side: Side },

    #[error("both sides of the \"{op}\" operator must have the same type")]
    TypeMismatch { op: String },

    #[error("duplicate object key \"{key}\"")]
    DuplicateKey { key: String },

    #[error("object key must evaluate to a string")]
    IllegalKey,

    #[error("sort term values must be all numbers or all strings")]
    SortMismatch,

    #[error("sort term values must be numbers or strings")]
    NonSortableValue,

    #[error("\"{name}\" is not a function")]
    NonCallableTarget { name: String },

    #[error("partial application target is not a function")]
    NonCallablePartialTarget,

    #[error("right side of the \"~>\" operator is not a function")]
    NonCallableApplyTarget,

    #[error("argument {index} of function \"{function}\" must be a {expected}")]
    ArgumentType {
        function: String,
        index: usize,
        expected: &'static str,
    },

    #[error("function \"{function}\" takes {expected} argument(s), got {actual}")]
    ArgumentCount {
        function: String,
        expected: String,
        actual: usize,
    },

    #[error("transform update must evaluate to an object")]
    InvalidTransformUpdate,

    #[error("transform delete must evaluate to a string or an array of strings")]
    InvalidTransformDelete,
}

pub type Result<T> = std::result::Result<T, EvalError>;
