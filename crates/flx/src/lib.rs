//! Lexer, parser, dependency resolver, semantic analyzer, tree-walking
//! evaluator and bytecode compiler/VM for the flx scripting language.
//!
//! `run::Executor` is the front door for most callers: it loads a program
//! through a `resolver::SourceLoader`, runs `analyzer::analyze`, and then
//! executes it with either `evaluator::Evaluator` or `bytecode::Vm`. Each
//! module below can also be driven directly — the CLI's REPL, for example,
//! re-analyzes and re-runs each accumulated chunk through the same pieces
//! rather than going through `Executor`.

mod analyzer;
mod ast;
mod bytecode;
mod error;
mod evaluator;
mod function;
mod heap;
mod host;
mod intern;
mod io;
mod lexer;
mod operators;
mod parser;
mod program;
mod resolver;
mod run;
mod scope;
mod token;
mod typecheck;
mod types;
mod value;

pub use crate::{
    ast::{BinOp, Expr, ExprKind, FunctionDef, Param, Stmt, StmtKind, StructDef, TypeRef, UnOp},
    bytecode::{compile_program, compile_program_with_host, disassemble, CompiledProgram, Vm, VmOutcome},
    error::{CodeLoc, FlxError, LexError, LoadError, ParseError, RuntimeError, SemanticError},
    evaluator::{EvalOutcome, Evaluator},
    heap::{Heap, HeapId, HeapObject},
    host::{HostModule, HostRegistry, HostSignature},
    io::{CollectStringPrint, NoPrint, PrintWriter, StdPrint},
    program::Program,
    resolver::{load_program, MemoryLoader, SourceLoader},
    run::{Engine, Executor},
    types::{TypeDefinition, TypeTag},
    value::RuntimeValue,
};
