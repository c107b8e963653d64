//! Token stream produced by the lexer and consumed by the parser.

use crate::error::CodeLoc;
use crate::intern::StringId;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // literals
    IntLit(i64),
    FloatLit(f64),
    CharLit(char),
    StringLit(String),
    BoolLit(bool),
    Ident(StringId),

    // keywords
    Using,
    Namespace,
    Include,
    Exclude,
    Let,
    Const,
    Func,
    Struct,
    If,
    Else,
    While,
    For,
    Foreach,
    In,
    Do,
    Switch,
    Case,
    Default,
    Break,
    Continue,
    Return,
    Exit,
    Try,
    Catch,
    Throw,
    New,
    Null,
    Void,
    TypeKw(PrimitiveKw),
    Any,
    Ref,
    Unref,
    Typeid,
    Typeof,
    Refid,
    IsAny,
    IsArray,
    IsStruct,

    // punctuation / operators
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semicolon,
    Comma,
    Colon,
    ColonColon,
    Dot,
    Arrow,
    Question,

    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    AmpAssign,
    PipeAssign,
    CaretAssign,
    ShlAssign,
    ShrAssign,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Amp,
    Pipe,
    Tilde,
    Shl,
    Shr,

    AndAnd,
    OrOr,
    Bang,

    EqEq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,

    PlusPlus,
    MinusMinus,

    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKw {
    Bool,
    Int,
    Float,
    Char,
    String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub loc: CodeLoc,
}

impl Token {
    pub fn new(kind: TokenKind, loc: CodeLoc) -> Self {
        Self { kind, loc }
    }
}
