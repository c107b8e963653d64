//! Compiled bytecode for one function or module, plus its constant pool,
//! location table and exception-handler table.

use crate::error::CodeLoc;
use crate::intern::StringId;
use crate::value::RuntimeValue;
use std::fmt;

/// A compile-time constant. Immediate values are stored directly; `Str`
/// holds a literal's text, heap-allocated fresh by the VM each time the
/// owning `LoadConst` executes (this crate does not try to share one heap
/// string across every execution of a literal).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ConstValue {
    Undefined,
    Void,
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    Str(String),
}

impl ConstValue {
    /// Converts an immediate `RuntimeValue` (no heap payload) to a constant.
    /// Returns `None` for heap-backed variants, which can't be baked into
    /// the constant pool directly.
    pub fn from_immediate(value: &RuntimeValue) -> Option<Self> {
        Some(match value {
            RuntimeValue::Undefined => ConstValue::Undefined,
            RuntimeValue::Void => ConstValue::Void,
            RuntimeValue::Bool(b) => ConstValue::Bool(*b),
            RuntimeValue::Int(i) => ConstValue::Int(*i),
            RuntimeValue::Float(f) => ConstValue::Float(*f),
            RuntimeValue::Char(c) => ConstValue::Char(*c),
            RuntimeValue::String(_) | RuntimeValue::Array(_) | RuntimeValue::Struct(_) | RuntimeValue::Function(_) | RuntimeValue::Any(_) | RuntimeValue::Ref(_) => return None,
        })
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Undefined => write!(f, "undefined"),
            ConstValue::Void => write!(f, "void"),
            ConstValue::Bool(b) => write!(f, "{b}"),
            ConstValue::Int(i) => write!(f, "{i}"),
            ConstValue::Float(x) => write!(f, "{x}"),
            ConstValue::Char(c) => write!(f, "{c}"),
            ConstValue::Str(s) => write!(f, "{s:?}"),
        }
    }
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ConstPool {
    values: Vec<ConstValue>,
}

impl ConstPool {
    pub fn from_vec(values: Vec<ConstValue>) -> Self {
        Self { values }
    }

    /// # Panics
    /// Panics if `index` is out of bounds; indices are always compiler-generated.
    pub fn get(&self, index: u16) -> &ConstValue {
        &self.values[index as usize]
    }
}

/// Source location for one bytecode instruction, used to attribute runtime
/// errors back to a line/column.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct LocationEntry {
    bytecode_offset: u32,
    loc: CodeLoc,
}

impl LocationEntry {
    pub fn new(bytecode_offset: u32, loc: CodeLoc) -> Self {
        Self { bytecode_offset, loc }
    }

    pub fn loc(&self) -> CodeLoc {
        self.loc
    }
}

/// Maps a protected bytecode range to its handler, consulted when an
/// exception is thrown rather than maintained as a runtime handler stack.
/// Entries are ordered innermost-first for nested `try` blocks.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct ExceptionEntry {
    start: u32,
    end: u32,
    handler: u32,
    stack_depth: u16,
}

impl ExceptionEntry {
    pub fn new(start: u32, end: u32, handler: u32, stack_depth: u16) -> Self {
        Self { start, end, handler, stack_depth }
    }

    pub fn handler(&self) -> u32 {
        self.handler
    }

    pub fn stack_depth(&self) -> u16 {
        self.stack_depth
    }

    pub fn contains(&self, offset: u32) -> bool {
        offset >= self.start && offset < self.end
    }
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Code {
    bytecode: Vec<u8>,
    constants: ConstPool,
    location_table: Vec<LocationEntry>,
    exception_table: Vec<ExceptionEntry>,
    num_locals: u16,
    num_params: u16,
    stack_size: u16,
    local_names: Vec<StringId>,
    /// Function-literal bodies nested inside this one, addressed by
    /// `MakeClosure`'s operand. Cloned into a fresh heap closure each time
    /// the enclosing code creates one.
    nested: Vec<Code>,
}

impl Code {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bytecode: Vec<u8>,
        constants: ConstPool,
        location_table: Vec<LocationEntry>,
        exception_table: Vec<ExceptionEntry>,
        num_locals: u16,
        num_params: u16,
        stack_size: u16,
        local_names: Vec<StringId>,
        nested: Vec<Code>,
    ) -> Self {
        Self { bytecode, constants, location_table, exception_table, num_locals, num_params, stack_size, local_names, nested }
    }

    pub fn bytecode(&self) -> &[u8] {
        &self.bytecode
    }

    pub fn constants(&self) -> &ConstPool {
        &self.constants
    }

    pub fn num_locals(&self) -> u16 {
        self.num_locals
    }

    pub fn num_params(&self) -> u16 {
        self.num_params
    }

    pub fn stack_size(&self) -> u16 {
        self.stack_size
    }

    pub fn local_name(&self, slot: u16) -> Option<StringId> {
        self.local_names.get(slot as usize).copied()
    }

    pub fn nested(&self, index: u16) -> &Code {
        &self.nested[index as usize]
    }

    /// Finds the most recent location entry at or before `offset`.
    pub fn location_for_offset(&self, offset: usize) -> Option<CodeLoc> {
        let offset_u32 = u32::try_from(offset).expect("bytecode offset exceeds u32");
        self.location_table.iter().rev().find(|e| e.bytecode_offset <= offset_u32).map(|e| e.loc())
    }

    /// Returns the innermost exception handler protecting `offset`, if any.
    pub fn find_exception_handler(&self, offset: u32) -> Option<&ExceptionEntry> {
        self.exception_table.iter().find(|entry| entry.contains(offset))
    }
}

/// Produces a human-readable textual disassembly of `code`, used by the
/// `-d`/`--debug` CLI flag's bytecode dump.
pub fn disassemble(code: &Code, names: &crate::intern::Interns) -> String {
    use crate::bytecode::opcode::Opcode;
    use std::fmt::Write;

    let mut out = String::new();
    let bytes = code.bytecode();
    let mut offset = 0usize;
    while offset < bytes.len() {
        let opcode = Opcode::from_byte(bytes[offset]);
        let width = opcode.operand_width();
        let operand_bytes = &bytes[offset + 1..offset + 1 + width];
        let operand = read_operand(operand_bytes);
        let loc = code.location_for_offset(offset).unwrap_or_default();
        let _ = write!(out, "{offset:>6}  {:<20} {:<8} ; {loc}", format!("{opcode:?}"), operand);
        if matches!(opcode, Opcode::LoadConst) {
            let _ = write!(out, "  = {}", code.constants().get(operand as u16));
        }
        if matches!(opcode, Opcode::LoadLocal | Opcode::StoreLocal) {
            if let Some(name) = code.local_name(operand as u16) {
                let _ = write!(out, "  ({})", names.resolve(name));
            }
        }
        out.push('\n');
        offset += 1 + width;
    }
    out
}

fn read_operand(bytes: &[u8]) -> i32 {
    match bytes.len() {
        0 => 0,
        1 => bytes[0] as i32,
        2 => i16::from_le_bytes([bytes[0], bytes[1]]) as i32,
        _ => unreachable!("operand width > 2 is not defined"),
    }
}
