use thiserror::Error;

use crate::structure::NodeId;

/// Errors raised by the multiset algebra and the membrane tree.
///
/// `InvalidOperation` surfacing during rule application signals a broken
/// engine invariant (applicability is checked first), not a user mistake.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("object not found: '{0}'")]
    ObjectNotFound(char),

    #[error("not enough objects: '{symbol}' has {available}, requested {requested}")]
    NotEnoughObjects {
        symbol:    char,
        requested: usize,
        available: usize,
    },

    #[error("invalid operation: {0}")]
    InvalidOperation(&'static str),

    #[error("node not found: {0}")]
    NodeNotFound(NodeId),
}

/// Recoverable format errors from structure strings, rule strings and
/// persisted documents. The caller is expected to re-prompt, never to abort
/// a running simulation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("unbalanced or mismatched brackets")]
    UnbalancedBrackets,

    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("structure string contains no region")]
    EmptyStructure,

    #[error("structure string has more than one outermost region")]
    MultipleRoots,

    #[error("rule is missing the '->' arrow")]
    MissingArrow,

    #[error("more than one priority separator")]
    ExtraPrioritySeparator,

    #[error("priority rule members must be rewriting rules")]
    InvalidPriorityOperand,

    #[error("transport rule carries neither an imported nor an exported multiset")]
    EmptyTransportRule,

    #[error("transport section '{0}:' given twice")]
    DuplicateTransportSection(&'static str),

    #[error("transport rule of kind {kind} is missing its {side} multiset")]
    MissingTransportSide { kind: &'static str, side: &'static str },

    #[error("no output region marked with '#'")]
    MissingOutputRegion,

    #[error("unknown model type: {0}")]
    UnknownModelType(String),

    #[error("document carries no structure string to replay")]
    MissingStructure,
}
