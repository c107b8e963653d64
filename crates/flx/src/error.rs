//! Error taxonomy for every pipeline stage: loading, lexing, parsing,
//! semantic analysis and execution.
//!
//! Mirrors the host interpreter's hand-rolled `Display`-based error style:
//! no derive-macro error crate, explicit `From` conversions threading an
//! inner error up into `FlxError` for the CLI to print.

use std::fmt;

/// A source location, in 1-based line/column form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct CodeLoc {
    pub line: u32,
    pub col: u32,
}

impl CodeLoc {
    pub fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }
}

impl fmt::Display for CodeLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadError {
    NotFound { path: String },
    Io { path: String, message: String },
    Cycle { path: String },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::NotFound { path } => write!(f, "could not locate source for '{path}'"),
            LoadError::Io { path, message } => write!(f, "failed to read '{path}': {message}"),
            LoadError::Cycle { path } => write!(f, "dependency cycle detected while loading '{path}'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LexError {
    UnexpectedChar { ch: char, at: CodeLoc },
    UnterminatedString { at: CodeLoc },
    UnterminatedComment { at: CodeLoc },
    InvalidNumber { text: String, at: CodeLoc },
    InvalidEscape { ch: char, at: CodeLoc },
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::UnexpectedChar { ch, at } => write!(f, "{at}: unexpected character '{ch}'"),
            LexError::UnterminatedString { at } => write!(f, "{at}: unterminated string literal"),
            LexError::UnterminatedComment { at } => write!(f, "{at}: unterminated block comment"),
            LexError::InvalidNumber { text, at } => write!(f, "{at}: invalid numeric literal '{text}'"),
            LexError::InvalidEscape { ch, at } => write!(f, "{at}: invalid escape sequence '\\{ch}'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    UnexpectedToken { found: String, expected: String, at: CodeLoc },
    UnexpectedEof { expected: String },
    Lex(LexError),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnexpectedToken { found, expected, at } => {
                write!(f, "{at}: expected {expected}, found {found}")
            }
            ParseError::UnexpectedEof { expected } => write!(f, "unexpected end of input, expected {expected}"),
            ParseError::Lex(e) => write!(f, "{e}"),
        }
    }
}

impl From<LexError> for ParseError {
    fn from(e: LexError) -> Self {
        ParseError::Lex(e)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SemanticError {
    UndefinedName { name: String, at: CodeLoc },
    Redeclared { name: String, at: CodeLoc },
    TypeMismatch { expected: String, found: String, at: CodeLoc },
    NoMatchingOverload { name: String, at: CodeLoc },
    AmbiguousOverload { name: String, at: CodeLoc },
    NotCallable { name: String, at: CodeLoc },
    MissingReturn { function: String, at: CodeLoc },
    UnknownType { name: String, at: CodeLoc },
    UnknownField { ty: String, field: String, at: CodeLoc },
    InvalidNamespacePath { path: String, at: CodeLoc },
}

impl fmt::Display for SemanticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemanticError::UndefinedName { name, at } => write!(f, "{at}: undefined name '{name}'"),
            SemanticError::Redeclared { name, at } => write!(f, "{at}: '{name}' is already declared in this scope"),
            SemanticError::TypeMismatch { expected, found, at } => {
                write!(f, "{at}: expected type {expected}, found {found}")
            }
            SemanticError::NoMatchingOverload { name, at } => {
                write!(f, "{at}: no overload of '{name}' matches the given arguments")
            }
            SemanticError::AmbiguousOverload { name, at } => {
                write!(f, "{at}: call to '{name}' is ambiguous between multiple overloads")
            }
            SemanticError::NotCallable { name, at } => write!(f, "{at}: '{name}' is not callable"),
            SemanticError::MissingReturn { function, at } => {
                write!(f, "{at}: function '{function}' does not return a value on every path")
            }
            SemanticError::UnknownType { name, at } => write!(f, "{at}: unknown type '{name}'"),
            SemanticError::UnknownField { ty, field, at } => write!(f, "{at}: type '{ty}' has no field '{field}'"),
            SemanticError::InvalidNamespacePath { path, at } => write!(f, "{at}: invalid namespace path '{path}'"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum RuntimeError {
    DivisionByZero { at: CodeLoc },
    IndexOutOfBounds { index: i64, len: usize, at: CodeLoc },
    NullDereference { at: CodeLoc },
    Uncaught { value_repr: String, at: CodeLoc },
    StackOverflow,
    Internal { message: String },
}

impl RuntimeError {
    /// Location and message a `try`/`catch` binds this error as, or `None`
    /// if it's a fault that aborts the whole run instead. Mirrors the
    /// original interpreter catching `std::exception` generically around a
    /// `try` block: language-level runtime errors (bad division, an index
    /// out of range, a null dereference) are catchable the same way a
    /// `throw`n value is; a stack overflow or an internal bug is not.
    pub fn catch_loc(&self) -> Option<CodeLoc> {
        match self {
            RuntimeError::DivisionByZero { at } => Some(*at),
            RuntimeError::IndexOutOfBounds { at, .. } => Some(*at),
            RuntimeError::NullDereference { at } => Some(*at),
            RuntimeError::Uncaught { .. } | RuntimeError::StackOverflow | RuntimeError::Internal { .. } => None,
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::DivisionByZero { at } => write!(f, "{at}: division by zero"),
            RuntimeError::IndexOutOfBounds { index, len, at } => {
                write!(f, "{at}: index {index} out of bounds for array of length {len}")
            }
            RuntimeError::NullDereference { at } => write!(f, "{at}: dereference of an undefined value"),
            RuntimeError::Uncaught { value_repr, at } => write!(f, "{at}: uncaught exception: {value_repr}"),
            RuntimeError::StackOverflow => write!(f, "stack overflow"),
            RuntimeError::Internal { message } => write!(f, "internal error: {message}"),
        }
    }
}

/// Top-level error union produced by any pipeline stage, plus the
/// distinguished `exit(n)` control-flow signal.
///
/// `ExitRequested` is carried as an ordinary `Err` variant (not a panic) so
/// it unwinds through `?` like any other pipeline error, per the
/// cooperative-cancellation model.
#[derive(Debug, Clone)]
pub enum FlxError {
    Load(LoadError),
    Lex(LexError),
    Parse(ParseError),
    Semantic(SemanticError),
    Runtime(RuntimeError),
    ExitRequested(i32),
}

impl fmt::Display for FlxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlxError::Load(e) => write!(f, "load error: {e}"),
            FlxError::Lex(e) => write!(f, "lex error: {e}"),
            FlxError::Parse(e) => write!(f, "parse error: {e}"),
            FlxError::Semantic(e) => write!(f, "semantic error: {e}"),
            FlxError::Runtime(e) => write!(f, "runtime error: {e}"),
            FlxError::ExitRequested(code) => write!(f, "exit({code})"),
        }
    }
}

impl std::error::Error for FlxError {}

impl From<LoadError> for FlxError {
    fn from(e: LoadError) -> Self {
        FlxError::Load(e)
    }
}
impl From<LexError> for FlxError {
    fn from(e: LexError) -> Self {
        FlxError::Lex(e)
    }
}
impl From<ParseError> for FlxError {
    fn from(e: ParseError) -> Self {
        FlxError::Parse(e)
    }
}
impl From<SemanticError> for FlxError {
    fn from(e: SemanticError) -> Self {
        FlxError::Semantic(e)
    }
}
impl From<RuntimeError> for FlxError {
    fn from(e: RuntimeError) -> Self {
        FlxError::Runtime(e)
    }
}

impl FlxError {
    /// Exit code the CLI should use when this error reaches the top level.
    pub fn exit_code(&self) -> i32 {
        match self {
            FlxError::ExitRequested(code) => *code,
            _ => 1,
        }
    }
}
