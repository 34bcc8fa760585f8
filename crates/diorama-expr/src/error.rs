use std::fmt;

/// A syntax error raised while tokenizing or parsing an expression.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    /// 1-based column (in chars) where the error occurred.
    pub col: usize,
}

impl ParseError {
    pub(crate) fn new(msg: impl Into<String>, col: usize) -> Self {
        Self { message: msg.into(), col }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "syntax error at column {}: {}", self.col, self.message)
    }
}

impl std::error::Error for ParseError {}

/// Why an evaluation failed.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    /// The expression text could not be parsed.
    Syntax(ParseError),
    /// An identifier did not resolve to any binding.
    Undefined(String),
    /// An operator or conversion was applied to the wrong type.
    Type(String),
    /// A built-in was called with the wrong number of arguments.
    Arity { function: String, expected: String, got: usize },
    /// Anything else a built-in rejects (e.g. a malformed color string).
    Invalid(String),
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Syntax(e) => write!(f, "{e}"),
            ErrorKind::Undefined(name) => write!(f, "{name} is not defined"),
            ErrorKind::Type(msg) => write!(f, "type error: {msg}"),
            ErrorKind::Arity { function, expected, got } => {
                write!(f, "{function} expects {expected} argument(s), got {got}")
            }
            ErrorKind::Invalid(msg) => f.write_str(msg),
        }
    }
}

/// An expression failed to evaluate.
///
/// Carries the original message and the expression text so callers can log
/// exactly what the author wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationError {
    pub kind: ErrorKind,
    pub expression: String,
}

impl EvaluationError {
    pub fn new(kind: ErrorKind, expression: impl Into<String>) -> Self {
        Self { kind, expression: expression.into() }
    }

    /// Human-readable message without the expression text.
    pub fn message(&self) -> String {
        self.kind.to_string()
    }
}

impl fmt::Display for EvaluationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in expression `{}`", self.kind, self.expression)
    }
}

impl std::error::Error for EvaluationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Syntax(e) => Some(e),
            _ => None,
        }
    }
}

/// Errors raised inside the evaluator before the expression text is attached.
pub(crate) type EvalResult<T> = Result<T, ErrorKind>;

pub(crate) fn type_err<T>(msg: impl Into<String>) -> EvalResult<T> {
    Err(ErrorKind::Type(msg.into()))
}
