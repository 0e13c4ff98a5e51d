use thiserror::Error;

/// Category of a runtime evaluation fault
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvalFault {
    /// Operand has the wrong type for the operation
    Type,
    /// Position test or focus function used outside a positional context
    Position,
    /// Relative expression evaluated without a context item
    NoContext,
    /// Division by zero and similar arithmetic failures
    Arithmetic,
    /// Expression nesting exceeded the configured depth
    DepthExceeded,
}

impl std::fmt::Display for EvalFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EvalFault::Type => "type",
            EvalFault::Position => "position",
            EvalFault::NoContext => "no context",
            EvalFault::Arithmetic => "arithmetic",
            EvalFault::DepthExceeded => "depth exceeded",
        };
        f.write_str(name)
    }
}

/// Main error type for Arbor operations
#[derive(Error, Debug)]
pub enum ArborError {
    #[error("Compile error: {0}")]
    Compile(String),

    #[error("Evaluation error ({fault}): {message}")]
    Eval { fault: EvalFault, message: String },

    #[error("Query cancelled")]
    Cancelled,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for Arbor operations
pub type Result<T> = std::result::Result<T, ArborError>;

impl ArborError {
    /// Build an evaluation fault
    pub fn eval(fault: EvalFault, message: impl Into<String>) -> Self {
        ArborError::Eval {
            fault,
            message: message.into(),
        }
    }

    /// Fault category, if this is an evaluation error
    pub fn fault(&self) -> Option<EvalFault> {
        match self {
            ArborError::Eval { fault, .. } => Some(*fault),
            _ => None,
        }
    }

    /// Check if this error is the cooperative cancellation signal
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ArborError::Cancelled)
    }
}
