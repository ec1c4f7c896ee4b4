//! Error types for the preprocessor engine

/// Result type for preprocessor operations
pub type PreprocessResult<T> = Result<T, PreprocessError>;

/// Errors that stop macro expansion. Line numbers are 1-based.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PreprocessError {
    #[error("line {line}: unknown directive #{directive}")]
    UnknownDirective { directive: String, line: usize },

    #[error("line {line}: unresolved #include")]
    UnresolvedInclude { line: usize },

    #[error("line {line}: malformed #{directive}: {message}")]
    Malformed {
        directive: String,
        message: String,
        line: usize,
    },

    #[error("line {line}: #{directive} without matching #if")]
    UnbalancedConditional { directive: String, line: usize },

    #[error("{count} conditional block(s) left open, first opened at line {line}")]
    UnterminatedConditional { count: usize, line: usize },

    #[error("line {line}: #error {message}")]
    ErrorDirective { message: String, line: usize },

    #[error("line {line}: invalid #if expression: {message}")]
    InvalidExpression { message: String, line: usize },

    #[error("line {line}: macro {name} expects {expected} argument(s), got {found}")]
    ArgumentMismatch {
        name: String,
        expected: usize,
        found: usize,
        line: usize,
    },

    #[error("line {line}: unterminated argument list for macro {name}")]
    UnterminatedArguments { name: String, line: usize },

    #[error("line {line}: expansion of macro {name} nested deeper than {depth}")]
    RecursionLimit {
        name: String,
        depth: usize,
        line: usize,
    },
}
