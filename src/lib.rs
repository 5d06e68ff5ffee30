//! Squill - an embeddable interpreter for a small, dynamically-typed
//! scripting language with C-like syntax.
//!
//! The language has first-class functions, tables that combine array
//! and record facets, and lexical block scoping resolved to flat slot
//! indices at parse time. The engine is a classic three-stage
//! front-end plus a tree-walking evaluator:
//!
//! - [`lexer`]: source text -> token stream (comments stripped,
//!   escapes decoded, greedy longest-match operator table)
//! - [`parser`]: tokens -> AST, resolving every identifier to a slot
//!   in its function's frame while parsing ([`scope`])
//! - [`eval`]: AST evaluation over a frame-stack virtual machine
//!   ([`vm`]) with explicit lvalue/rvalue modes and value-based
//!   control-flow unwinding
//!
//! ## Embedding
//!
//! Hosts register native functions, constants and namespaces as
//! ordinary script identifiers, then feed source fragments to a
//! persistent [`script::Script`]:
//!
//! ```rust
//! use squill::host;
//! use squill::script::Script;
//!
//! let mut script = Script::new();
//! script
//!     .register_identifier(host::function("double", |x: i64| x * 2))
//!     .unwrap();
//! script.append("double(20) + 2");
//! let result = script.execute().unwrap();
//! assert_eq!(result.to_string(), "42");
//! ```
//!
//! ## Script language at a glance
//!
//! ```text
//! t = [x = 1, y = 2, [10] = "ten"];    // table: record + keyed entries
//! f = function(n) { if (n < 2) n else f(n-1) + f(n-2) };
//! for (i = 0; i < 10; i = i + 1) acc = acc + i;
//! import math; math.sqrt(2.0)
//! @print("hello", t.x)                 // intrinsic call
//! ```
//!
//! State persists between fragments: the VM's value memory, its root
//! frame, and the top-level slot map survive; tokens and ASTs of each
//! fragment are transient (except lambda bodies, which closures keep
//! alive by reference counting).

use std::fmt;

/// Number of value slots pre-reserved for the root (top-level) frame.
/// The driver grows the root frame on demand, so this is a floor.
pub const DEFAULT_ROOT_SLOTS: usize = 1024;

/// Maximum call-frame depth before evaluation fails `StackOverflow`.
/// Bounds script recursion well below the native stack limit.
pub const MAX_FRAMES: usize = 256;

/// Errors produced while turning source text into tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    /// A `/* ... */` comment was still open at end of input.
    UnclosedComment,
    /// A string or char literal was still open at end of input.
    UnclosedLiteral,
    /// Backslash escape other than `\n \t \r \0 \' \" \\`.
    InvalidEscape(char),
    /// A numeric lexeme that could not be classified or parsed.
    InvalidNumber(String),
    /// A byte no dispatch rule recognizes.
    UnknownChar(char),
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LexError::UnclosedComment => write!(f, "unclosed block comment"),
            LexError::UnclosedLiteral => write!(f, "unclosed string or char literal"),
            LexError::InvalidEscape(c) => write!(f, "invalid escape sequence: \\{c}"),
            LexError::InvalidNumber(lexeme) => write!(f, "invalid number: {lexeme}"),
            LexError::UnknownChar(c) => write!(f, "unknown character: {c:?}"),
        }
    }
}

/// Errors produced while turning tokens into an AST.
///
/// Parse errors carry the offending lexeme (or `end of input`) so the
/// REPL can point at what it choked on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    UnexpectedToken(String),
    ExpectedToken {
        expected: &'static str,
        found: String,
    },
    /// `import` of a name the module registry does not know.
    ModuleNotFound(String),
    /// `import` of a name already bound in the current scope.
    DuplicateImport(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParseError::UnexpectedToken(found) => write!(f, "unexpected {found}"),
            ParseError::ExpectedToken { expected, found } => {
                write!(f, "expected {expected}, found {found}")
            }
            ParseError::ModuleNotFound(name) => write!(f, "unknown module: {name}"),
            ParseError::DuplicateImport(name) => write!(f, "module already imported: {name}"),
        }
    }
}

/// Parse-time name-resolution errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// A host identifier was registered under a name already declared
    /// at top level.
    IdentifierRedeclared(String),
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ResolveError::IdentifierRedeclared(name) => {
                write!(f, "identifier already declared: {name}")
            }
        }
    }
}

/// Runtime errors raised by the evaluator or the VM.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    /// Operand types an operator or conversion does not accept.
    TypeMismatch(String),
    /// Reading a slot that still holds Nil.
    UndefinedIdentifier(String),
    /// Calling a value that is not a function; carries its printable form.
    NotCallable(String),
    Arity {
        expected: usize,
        got: usize,
    },
    /// Asking a node kind for a storage location it cannot produce.
    NotAnLvalue(&'static str),
    AssignToConst,
    IndexOutOfRange {
        index: i64,
        len: usize,
    },
    /// Rvalue read of a table key or member that is absent.
    KeyMissing(String),
    DivByZero,
    UnknownOperator(String),
    /// `@name` with a name outside the intrinsic set.
    UnknownIntrinsic(String),
    /// Member or index access on a value that is not a table/array.
    NotATable(String),
    /// `break`/`continue`/`return` that escaped every handler.
    DanglingControlFlow(&'static str),
    StackOverflow,
    NoActiveFrame,
    SlotOutOfRange {
        slot: usize,
        len: usize,
    },
    LeaveWithoutEnter,
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EvalError::TypeMismatch(msg) => write!(f, "type mismatch: {msg}"),
            EvalError::UndefinedIdentifier(name) => write!(f, "undefined identifier: {name}"),
            EvalError::NotCallable(what) => {
                write!(f, "attempted to call a non-function value: {what}")
            }
            EvalError::Arity { expected, got } => {
                write!(f, "argument count mismatch (expected {expected}, got {got})")
            }
            EvalError::NotAnLvalue(kind) => {
                write!(f, "{kind} cannot be evaluated as an lvalue")
            }
            EvalError::AssignToConst => write!(f, "cannot assign to const value"),
            EvalError::IndexOutOfRange { index, len } => {
                write!(f, "array index {index} out of range (length {len})")
            }
            EvalError::KeyMissing(key) => write!(f, "key not found: {key}"),
            EvalError::DivByZero => write!(f, "division by zero"),
            EvalError::UnknownOperator(op) => write!(f, "unknown operator: {op}"),
            EvalError::UnknownIntrinsic(name) => write!(f, "unknown intrinsic: @{name}"),
            EvalError::NotATable(what) => {
                write!(f, "member or index access on non-table value: {what}")
            }
            EvalError::DanglingControlFlow(kind) => {
                write!(f, "{kind} outside of its enclosing construct")
            }
            EvalError::StackOverflow => write!(f, "call stack overflow"),
            EvalError::NoActiveFrame => write!(f, "no active frame"),
            EvalError::SlotOutOfRange { slot, len } => {
                write!(f, "slot {slot} out of range (frame has {len} slots)")
            }
            EvalError::LeaveWithoutEnter => write!(f, "frame leave without matching enter"),
        }
    }
}

/// Crate-level error: every stage's failure funneled into one type so
/// drivers report uniformly.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    Lex(LexError),
    Parse(ParseError),
    Resolve(ResolveError),
    Eval(EvalError),
    /// An error raised by a host-registered native function.
    Host(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Lex(e) => write!(f, "lex error: {e}"),
            Error::Parse(e) => write!(f, "parse error: {e}"),
            Error::Resolve(e) => write!(f, "resolve error: {e}"),
            Error::Eval(e) => write!(f, "eval error: {e}"),
            Error::Host(msg) => write!(f, "host error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<LexError> for Error {
    fn from(e: LexError) -> Self {
        Error::Lex(e)
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Error::Parse(e)
    }
}

impl From<ResolveError> for Error {
    fn from(e: ResolveError) -> Self {
        Error::Resolve(e)
    }
}

impl From<EvalError> for Error {
    fn from(e: EvalError) -> Self {
        Error::Eval(e)
    }
}

pub mod ast;
pub mod eval;
pub mod host;
pub mod lexer;
pub mod modules;
pub mod ops;
pub mod parser;
pub mod scope;
pub mod script;
pub mod value;
pub mod vm;
