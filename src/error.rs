//! Error types for alias scripts
//!
//! Provides structured error handling with script line and column locations.

use std::fmt;

use thiserror::Error;

use crate::token::{Comparator, Operator};
use crate::types::TypeTag;

/// Error kinds raised while compiling, binding or running an alias
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErrorKind {
    // Expression errors
    #[error("unexpected '{0}'")]
    UnexpectedToken(String),
    #[error("unterminated string")]
    UnterminatedString,
    #[error("expected expression")]
    ExpectedExpression,
    #[error("operand can't directly follow another operand")]
    OperandAfterOperand,
    #[error("operator can't directly follow another operator")]
    OperatorAfterOperator,
    #[error("expression can't start with operator '{0}'")]
    LeadingOperator(Operator),
    #[error("expression can't end with operator '{0}'")]
    TrailingOperator(Operator),
    #[error("unmatched parenthesis")]
    UnmatchedParenthesis,
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("no declaration or forward reference for '{0}'")]
    UndeclaredVariable(String),
    #[error("string type only supports concatenation, found '{0}'")]
    StringOperator(Operator),
    #[error("strings can only be compared with '=' or '!=', found '{0}'")]
    StringComparison(Comparator),
    #[error("cannot narrow {from} to {to}")]
    Narrowing { from: TypeTag, to: TypeTag },

    // Statement errors
    #[error("expected a comparator in condition")]
    ExpectedComparator,
    #[error("condition may only contain one comparator")]
    MultipleComparators,
    #[error("invalid variable name '{0}'")]
    InvalidName(String),
    #[error("'{0}' takes no arguments")]
    TrailingInput(&'static str),
    #[error("'end' without matching 'if' or 'while'")]
    UnmatchedEnd,
    #[error("'{0}' without matching 'if'")]
    BranchWithoutIf(&'static str),
    #[error("'{0}' after 'else'")]
    BranchAfterElse(&'static str),
    #[error("unterminated '{keyword}' block opened on line {line}")]
    UnterminatedBlock { keyword: &'static str, line: usize },
    #[error("cannot change '{name}' from {from} to {to} inside a block")]
    RetypeInBlock {
        name: String,
        from: TypeTag,
        to: TypeTag,
    },

    // Declaration errors
    #[error("unknown argument type '{0}'")]
    UnknownArgumentType(String),
    #[error("malformed argument declaration '{0}'")]
    InvalidDeclaration(String),
    #[error("selection '{0}' has no options")]
    EmptySelection(String),
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("'{0}' is declared more than once")]
    DuplicateDeclaration(String),

    // Runtime errors
    #[error("division by zero")]
    DivisionByZero,
    #[error("cannot apply '{symbol}' to {left} and {right}")]
    InvalidOperation {
        symbol: String,
        left: &'static str,
        right: &'static str,
    },
    #[error("command failed: {0}")]
    CommandFailed(String),
    #[error("expected {expected} arguments, got {got}. Usage: {usage}")]
    ArgumentCount {
        expected: usize,
        got: usize,
        usage: String,
    },
    #[error("invalid value for '{name}': {reason}")]
    InvalidArgument { name: String, reason: String },
    #[error("step budget of {0} exceeded")]
    StepBudgetExceeded(u64),
    #[error("expression stack underflow")]
    StackUnderflow,
    #[error("no alias named '{0}'")]
    UnknownAlias(String),

    // Persistence errors
    #[error("missing '{0}' header")]
    MissingHeader(&'static str),
    #[error("invalid header '{0}'")]
    InvalidHeader(String),
    #[error("{0}")]
    Io(String),
}

impl ErrorKind {
    /// Whether this kind is raised while compiling or declaring an alias,
    /// as opposed to while running one.
    pub fn is_compile_error(&self) -> bool {
        !matches!(
            self,
            ErrorKind::DivisionByZero
                | ErrorKind::InvalidOperation { .. }
                | ErrorKind::CommandFailed(_)
                | ErrorKind::ArgumentCount { .. }
                | ErrorKind::InvalidArgument { .. }
                | ErrorKind::StepBudgetExceeded(_)
                | ErrorKind::StackUnderflow
                | ErrorKind::UnknownAlias(_)
                | ErrorKind::MissingHeader(_)
                | ErrorKind::InvalidHeader(_)
                | ErrorKind::Io(_)
        )
    }
}

/// An alias error with location information
#[derive(Debug, Clone, PartialEq)]
pub struct AliasError {
    pub kind: ErrorKind,
    /// 1-based script line
    pub line: Option<usize>,
    /// 1-based column within the line
    pub column: Option<usize>,
    pub source_line: Option<String>,
}

impl AliasError {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            line: None,
            column: None,
            source_line: None,
        }
    }

    pub fn at_column(mut self, column: usize) -> Self {
        self.column.get_or_insert(column);
        self
    }

    /// Attach a script line number and its text, keeping any location
    /// already recorded.
    pub fn at_line(mut self, line: usize, text: &str) -> Self {
        if self.line.is_none() {
            self.line = Some(line);
            self.source_line = Some(text.to_string());
        }
        self
    }

    /// Attach a script line number without its text
    pub fn on_line(mut self, line: usize) -> Self {
        self.line.get_or_insert(line);
        self
    }

    /// Fill in the source line from a whole script
    pub fn with_source(mut self, source: &str) -> Self {
        if let Some(line) = self.line {
            if self.source_line.is_none() {
                self.source_line = source
                    .lines()
                    .nth(line.saturating_sub(1))
                    .map(str::to_string);
            }
        }
        self
    }

    pub fn is_compile_error(&self) -> bool {
        self.kind.is_compile_error()
    }
}

impl From<ErrorKind> for AliasError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl fmt::Display for AliasError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.line, self.column) {
            (Some(line), Some(column)) => {
                write!(f, "[line {}:{}] Error: {}", line, column, self.kind)?
            }
            (Some(line), None) => write!(f, "[line {}] Error: {}", line, self.kind)?,
            _ => write!(f, "Error: {}", self.kind)?,
        }

        if let Some(ref text) = self.source_line {
            write!(f, "\n  | {}", text)?;
            if let Some(column) = self.column {
                write!(f, "\n  | {}^", " ".repeat(column.saturating_sub(1)))?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for AliasError {}

/// Result type for alias operations
pub type Result<T> = std::result::Result<T, AliasError>;
