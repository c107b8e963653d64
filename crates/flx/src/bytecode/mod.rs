//! Bytecode representation, compiler and stack VM, sharing the operator and
//! value model in `crate::operators`/`crate::value` with the tree-walking
//! evaluator.

pub mod builder;
pub mod code;
pub mod compiler;
pub mod opcode;
pub mod vm;

pub use code::{disassemble, Code, ConstValue};
pub use compiler::{compile_program, compile_program_with_host, CompiledProgram};
pub use opcode::Opcode;
pub use vm::{Vm, VmOutcome};
