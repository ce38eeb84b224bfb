//! Sprig - evaluator core for a small S-expression functional language
//!
//! The language is deliberately tiny: integers, immutable lists, first-class
//! closures and three control constructs. Everything else is supplied by the
//! host as *extensions* (native Rust functions adapted into the language).
//!
//! ```text
//! (let sq (lambda x (mul x x))
//!      (sq 7))                               ; => 49
//!
//! (match (len xs) 0 "empty" _ (head xs) 0)   ; pattern dispatch with wildcard
//!
//! (add *[1 2 3] 4)                           ; splat a list into arguments
//! ```
//!
//! ## Evaluation model
//!
//! - Scopes are persistent: a [`evaluator::Frame`] is an immutable map and a
//!   [`evaluator::Stack`] is an immutable sequence of frames. Evaluation never
//!   writes into a frame it was handed, so closures capture a frame snapshot in
//!   O(1) and concurrent argument evaluation needs no locks.
//! - Calls in tail position overwrite the top frame instead of pushing one, so
//!   tail recursion runs in constant stack depth. Non-tail recursion is bounded
//!   by [`evaluator::Config::max_stack_depth`].
//! - Every evaluation step checks a cancellation token and an optional deadline.
//!
//! ## Modules
//!
//! - `ast`: expression tree ([`ast::Expr`]) and runtime values ([`ast::Value`])
//! - `evaluator`: the `Step` function, frames/stacks, runtime configuration
//! - `extension`: adapting native functions into the language, splat expansion
//! - `builtinops`: `let`, `lambda`, `match` and the standard extension library
//! - `sexpr`: reader for the textual surface syntax (feature `sexpr`)

use std::fmt;

/// Maximum parsing depth to prevent stack overflow attacks
/// This limits deeply nested structures in the reader
pub const MAX_PARSE_DEPTH: usize = 128;

/// Default bound on the number of frames an evaluation may hold.
/// Tail calls reuse the top frame and do not count against it.
pub const DEFAULT_MAX_STACK_DEPTH: usize = 1000;

/// Categorizes the different kinds of parsing errors.
#[derive(Debug, PartialEq, Clone)]
pub enum ParseErrorKind {
    /// Invalid or unexpected syntax (bad tokens, malformed expressions)
    InvalidSyntax,
    /// Input ended before the expression was complete (EOF, unterminated string, unclosed parens)
    Incomplete,
    /// Expression nesting exceeded the maximum parse depth
    TooDeeplyNested,
    /// Extra input found after a complete, valid expression
    TrailingContent,
}

/// A structured error providing detailed information about a parsing failure.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Context snippet from the input showing where the error occurred (max 100 chars)
    pub context: Option<String>,
}

impl ParseError {
    /// Create a ParseError with all fields
    pub fn new(kind: ParseErrorKind, message: impl Into<String>, context: Option<String>) -> Self {
        ParseError {
            kind,
            message: message.into(),
            context,
        }
    }

    /// Create a simple ParseError with a kind and message but no context
    pub fn from_message(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, None)
    }

    /// Create a ParseError with context extracted from input at a given byte offset
    pub fn with_context(
        kind: ParseErrorKind,
        message: impl Into<String>,
        input: &str,
        error_offset: usize,
    ) -> Self {
        const MAX_CONTEXT: usize = 100;

        // Window is measured in chars; the offset is a byte position
        let error_char = input
            .char_indices()
            .take_while(|(byte, _)| *byte < error_offset)
            .count();
        let context_start = error_char.saturating_sub(20);

        let mut chars = input.chars().skip(context_start);
        let context_str: String = chars.by_ref().take(MAX_CONTEXT).collect();

        let mut display_context = String::new();
        if context_start > 0 {
            display_context.push_str("[...]");
        }
        display_context.push_str(&context_str);
        if chars.next().is_some() {
            display_context.push_str("[...]");
        }

        let display_context = display_context.replace('\n', "\\n").replace('\r', "");

        Self::new(kind, message, Some(display_context))
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(context) = &self.context {
            write!(f, "\nContext: {context}")?;
        }
        Ok(())
    }
}

/// Error types for the interpreter
///
/// Errors are plain values: no construct in the language catches them, so
/// the first failure propagates to whoever called [`evaluator::Runtime::step`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("ParseError: {0}")]
    ParseError(ParseError),
    #[error("Name not found: {0}")]
    NameNotFound(String),
    #[error("Stack overflow: more than {limit} frames")]
    StackOverflow { limit: usize },
    #[error("Timeout: evaluation deadline exceeded")]
    Timeout,
    #[error("Interrupted: evaluation was cancelled")]
    Interrupted,
    #[error("Cannot execute: {0}")]
    CannotExecute(String),
    #[error("{}", fmt_arity(*expected, *got, context.as_deref()))]
    ArityMismatch {
        expected: usize,
        got: usize,
        context: Option<String>,
    },
    #[error("Malformed {construct}: {reason}")]
    MalformedControlConstruct {
        construct: &'static str,
        reason: String,
    },
    #[error("Invalid unwrap target: {0}")]
    InvalidUnwrapTarget(String),
    /// Unreachable while `match` insists on a trailing default.
    #[error("No matching case")]
    NoMatchingCase,
    #[error("Type error: {0}")]
    TypeError(String),
    #[error("EvaluationError: {0}")]
    EvalError(String),
}

fn fmt_arity(expected: usize, got: usize, context: Option<&str>) -> String {
    match context {
        Some(expr) => {
            format!("ArityMismatch: expression {expr}: expected {expected} arguments, got {got}")
        }
        None => format!("ArityMismatch: expected {expected} arguments but got {got}"),
    }
}

impl Error {
    /// Create an ArityMismatch without expression context
    pub fn arity_error(expected: usize, got: usize) -> Self {
        Error::ArityMismatch {
            expected,
            got,
            context: None,
        }
    }

    /// Create an ArityMismatch with expression context
    pub fn arity_error_with_expr(expected: usize, got: usize, expression: String) -> Self {
        Error::ArityMismatch {
            expected,
            got,
            context: Some(expression),
        }
    }

    pub(crate) fn malformed(construct: &'static str, reason: impl Into<String>) -> Self {
        Error::MalformedControlConstruct {
            construct,
            reason: reason.into(),
        }
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::ParseError(err)
    }
}

pub mod ast;
pub mod builtinops;
pub mod evaluator;
pub mod extension;

#[cfg(feature = "sexpr")]
pub mod sexpr;
