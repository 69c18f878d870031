//! Error types for the QASM parser.

use thiserror::Error;

/// Errors that can occur during parsing.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// Lexer error (invalid token).
    #[error("Lexer error at line {line}: {message}")]
    LexerError { line: usize, message: String },

    /// Unexpected token.
    #[error("Unexpected token at line {line}: expected {expected}, found {found}")]
    UnexpectedToken {
        line: usize,
        expected: String,
        found: String,
    },

    /// Unexpected end of input.
    #[error("Unexpected end of input: {0}")]
    UnexpectedEof(String),

    /// Invalid or unsupported version.
    #[error("Unsupported OPENQASM version: {0}")]
    InvalidVersion(String),

    /// Register used before declaration.
    #[error("Undefined register: {0}")]
    UndefinedRegister(String),

    /// Index out of bounds.
    #[error("Index {index} out of bounds for register '{register}' of size {size}")]
    IndexOutOfBounds {
        register: String,
        index: usize,
        size: usize,
    },

    /// Whole-register arguments of different sizes in one statement.
    #[error("Register arguments of '{operation}' have mismatched sizes at line {line}")]
    BroadcastMismatch { operation: String, line: usize },

    /// A construct this parser does not lower into a circuit.
    #[error("Unsupported construct at line {line}: {construct}")]
    Unsupported { line: usize, construct: String },

    /// IR error during circuit construction.
    #[error("Circuit error: {0}")]
    CircuitError(#[from] satmap_ir::IrError),
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;
