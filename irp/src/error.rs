use std::fmt;

/// Everything that can go wrong while parsing, rendering or converting a
/// signal. Errors are scoped to the single call that raised them.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// A parameter value outside its declared `min..max` domain.
    #[error("{0}")]
    DomainViolation(String),
    /// Evaluation reached a name with no binding.
    #[error("{0}")]
    Unassigned(String),
    /// Structurally malformed input.
    #[error("{0}")]
    IncompatibleArgument(String),
    /// Nested infinite repeats, or variations inside an infinite repeat.
    #[error("{0}")]
    InvalidRepeat(String),
    /// Division by zero, or a duration in periods/units without a usable
    /// frequency/unit.
    #[error("{0}")]
    Arithmetic(String),
    /// The IRP text could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn incompatible(msg: impl fmt::Display) -> Self {
        Error::IncompatibleArgument(msg.to_string())
    }

    pub(crate) fn arithmetic(msg: impl fmt::Display) -> Self {
        Error::Arithmetic(msg.to_string())
    }

    /// Short name of the error kind, as printed by the command line tool
    pub fn kind(&self) -> &'static str {
        match self {
            Error::DomainViolation(_) => "domain violation",
            Error::Unassigned(_) => "unassigned",
            Error::IncompatibleArgument(_) => "incompatible argument",
            Error::InvalidRepeat(_) => "invalid repeat",
            Error::Arithmetic(_) => "arithmetic",
            Error::Parse(_) => "parse",
        }
    }
}
