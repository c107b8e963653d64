//! Abstract syntax tree produced by the parser and shared by the semantic
//! analyzer and both execution engines.
//!
//! Nodes are plain tagged enums addressed by value/`Box`, not an
//! arena-of-indices — the tree is built once per program and walked
//! read-only afterwards, so ownership via `Box` is simpler than threading an
//! arena through every visitor. Function and structure *definitions* do live
//! in arenas (`Program::functions`, `Program::structs`), addressed by
//! `FunctionId`/`StructId`, because overloads and recursive calls need a
//! stable handle that outlives any one expression tree.

use crate::error::CodeLoc;
use crate::intern::{FunctionId, StringId, StructId};
use crate::token::PrimitiveKw;

/// A (possibly dotted) namespace path, e.g. `math::geometry`.
pub type NsPath = Vec<StringId>;

#[derive(Debug, Clone, PartialEq)]
pub enum TypeRef {
    Void,
    Bool,
    Int,
    Float,
    Char,
    String,
    Any,
    Array(Box<TypeRef>),
    Struct(StringId),
    Function,
}

impl From<PrimitiveKw> for TypeRef {
    fn from(kw: PrimitiveKw) -> Self {
        match kw {
            PrimitiveKw::Bool => TypeRef::Bool,
            PrimitiveKw::Int => TypeRef::Int,
            PrimitiveKw::Float => TypeRef::Float,
            PrimitiveKw::Char => TypeRef::Char,
            PrimitiveKw::String => TypeRef::String,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    And,
    Or,
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompoundOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncDecOp {
    Inc,
    Dec,
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub loc: CodeLoc,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    IntLit(i64),
    FloatLit(f64),
    BoolLit(bool),
    CharLit(char),
    StringLit(String),
    NullLit,
    Identifier(StringId),
    ArrayLit(Vec<Expr>),
    StructLit { ty: StringId, fields: Vec<(StringId, Expr)> },
    New { ty: TypeRef, dims: Vec<Expr> },
    Unary(UnOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
    Assign(Box<Expr>, Box<Expr>),
    CompoundAssign(CompoundOp, Box<Expr>, Box<Expr>),
    IncDec(IncDecOp, Box<Expr>, /* prefix */ bool),
    Call { callee: Box<Expr>, args: Vec<Expr> },
    Index(Box<Expr>, Box<Expr>),
    Field(Box<Expr>, StringId),
    NsAccess(NsPath, StringId),
    FunctionLit { params: Vec<Param>, ret: TypeRef, body: Vec<Stmt> },
    Ref(Box<Expr>),
    Unref(Box<Expr>),
    TypeId(Box<Expr>),
    TypeOf(TypeRef),
    RefId(Box<Expr>),
    IsAny(Box<Expr>),
    IsArray(Box<Expr>),
    IsStruct(Box<Expr>),
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: StringId,
    pub ty: TypeRef,
    pub default: Option<Expr>,
    pub is_rest: bool,
    pub loc: CodeLoc,
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub loc: CodeLoc,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Expr(Expr),
    VarDecl {
        name: StringId,
        ty: Option<TypeRef>,
        is_const: bool,
        init: Option<Expr>,
    },
    Block(Vec<Stmt>),
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        step: Option<Expr>,
        body: Box<Stmt>,
    },
    Foreach {
        binding: StringId,
        binding_ty: Option<TypeRef>,
        iterable: Expr,
        body: Box<Stmt>,
    },
    Switch {
        subject: Expr,
        cases: Vec<SwitchCase>,
        default: Option<Vec<Stmt>>,
    },
    Break,
    Continue,
    Return(Option<Expr>),
    Exit(Expr),
    Try {
        body: Vec<Stmt>,
        catch_binding: Option<StringId>,
        catch_body: Vec<Stmt>,
    },
    Throw(Expr),
    FunctionDecl(FunctionId),
    StructDecl(StructId),
}

#[derive(Debug, Clone)]
pub struct SwitchCase {
    pub value: Expr,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: StringId,
    pub params: Vec<Param>,
    pub ret: TypeRef,
    pub body: Vec<Stmt>,
    pub namespace: NsPath,
    pub loc: CodeLoc,
}

#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: StringId,
    pub ty: TypeRef,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct StructDef {
    pub name: StringId,
    pub fields: Vec<FieldDef>,
    pub namespace: NsPath,
    pub loc: CodeLoc,
}

#[derive(Debug, Clone)]
pub struct UsingDecl {
    pub path: NsPath,
    pub include: Vec<StringId>,
    pub exclude: Vec<StringId>,
    pub loc: CodeLoc,
}

/// A single parsed source file, before dependency resolution stitches
/// multiple files into one `Program`.
#[derive(Debug, Clone, Default)]
pub struct SourceUnit {
    pub namespace: NsPath,
    pub usings: Vec<UsingDecl>,
    pub top_level: Vec<Stmt>,
}
