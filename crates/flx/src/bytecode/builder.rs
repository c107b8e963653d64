//! `CodeBuilder`: emits bytecode, patches forward/backward jumps, and
//! tracks source locations and stack depth during compilation.

use super::code::{Code, ConstPool, ConstValue, ExceptionEntry, LocationEntry};
use super::opcode::Opcode;
use crate::error::CodeLoc;
use crate::intern::StringId;
use crate::value::RuntimeValue;

/// A forward-reference to a jump instruction's operand, to be filled in by
/// `patch_jump` once the jump target is known.
#[derive(Debug, Clone, Copy)]
pub struct JumpLabel {
    operand_pos: usize,
}

#[derive(Debug, Default)]
pub struct CodeBuilder {
    bytecode: Vec<u8>,
    constants: Vec<ConstValue>,
    location_table: Vec<LocationEntry>,
    exception_table: Vec<ExceptionEntry>,
    current_loc: CodeLoc,
    current_stack_depth: i32,
    max_stack_depth: u16,
    local_names: Vec<Option<StringId>>,
    nested: Vec<Code>,
}

impl CodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_location(&mut self, loc: CodeLoc) {
        self.current_loc = loc;
    }

    fn record_location(&mut self) {
        let offset = self.bytecode.len() as u32;
        if self.location_table.last().is_none_or(|e| e.loc().line != self.current_loc.line || e.loc().col != self.current_loc.col) {
            self.location_table.push(LocationEntry::new(offset, self.current_loc));
        }
    }

    /// Adjusts the running/maximum stack-depth tracker. Positive `delta`
    /// pushes, negative pops.
    pub fn adjust_stack(&mut self, delta: i32) {
        self.current_stack_depth += delta;
        self.max_stack_depth = self.max_stack_depth.max(self.current_stack_depth.max(0) as u16);
    }

    pub fn emit(&mut self, opcode: Opcode) {
        self.record_location();
        self.bytecode.push(opcode.as_byte());
    }

    pub fn emit_u8(&mut self, opcode: Opcode, operand: u8) {
        self.record_location();
        self.bytecode.push(opcode.as_byte());
        self.bytecode.push(operand);
    }

    pub fn emit_u16(&mut self, opcode: Opcode, operand: u16) {
        self.record_location();
        self.bytecode.push(opcode.as_byte());
        self.bytecode.extend_from_slice(&operand.to_le_bytes());
    }

    /// Emits a jump with a placeholder operand, returning a label to patch
    /// once the target offset is known.
    pub fn emit_jump(&mut self, opcode: Opcode) -> JumpLabel {
        self.record_location();
        self.bytecode.push(opcode.as_byte());
        let operand_pos = self.bytecode.len();
        self.bytecode.extend_from_slice(&0i16.to_le_bytes());
        JumpLabel { operand_pos }
    }

    /// Patches `label`'s operand to jump to the bytecode position
    /// immediately after this call, as a relative `i16` offset measured
    /// from the instruction *following* the jump (`operand_pos + 2`).
    pub fn patch_jump(&mut self, label: JumpLabel) {
        let target = self.bytecode.len() as i64;
        let from = (label.operand_pos + 2) as i64;
        let offset: i16 = (target - from).try_into().expect("jump target out of i16 range");
        self.bytecode[label.operand_pos..label.operand_pos + 2].copy_from_slice(&offset.to_le_bytes());
    }

    /// Emits a backward jump (loop-back) to an already-known offset.
    pub fn emit_jump_to(&mut self, opcode: Opcode, target: usize) {
        self.record_location();
        self.bytecode.push(opcode.as_byte());
        let from = self.bytecode.len() + 2;
        let offset: i16 = (target as i64 - from as i64).try_into().expect("jump target out of i16 range");
        self.bytecode.extend_from_slice(&offset.to_le_bytes());
    }

    pub fn position(&self) -> usize {
        self.bytecode.len()
    }

    /// Interns an immediate constant (deduplicated). Heap-backed
    /// `RuntimeValue`s other than `Undefined`/`Void`/numeric/char cannot be
    /// added this way; use `add_const_string` for string literals.
    pub fn add_const(&mut self, value: RuntimeValue) -> u16 {
        let cv = ConstValue::from_immediate(&value).expect("only immediate values belong in the constant pool");
        self.push_const(cv)
    }

    pub fn add_const_string(&mut self, s: String) -> u16 {
        self.push_const(ConstValue::Str(s))
    }

    fn push_const(&mut self, cv: ConstValue) -> u16 {
        if let Some(idx) = self.constants.iter().position(|v| *v == cv) {
            return idx as u16;
        }
        let idx = self.constants.len();
        self.constants.push(cv);
        idx.try_into().expect("too many constants in one code object")
    }

    /// Registers a function-literal body compiled from within this code
    /// object, returning the index `MakeClosure` should reference.
    pub fn add_nested_code(&mut self, code: Code) -> u16 {
        let idx = self.nested.len();
        self.nested.push(code);
        idx.try_into().expect("too many nested function literals in one code object")
    }

    /// Registers `name` for `slot`, growing `local_names` if needed, so the
    /// compiled `Code` can render `NameError`-style diagnostics by slot.
    pub fn name_local(&mut self, slot: u16, name: StringId) {
        let slot = slot as usize;
        if self.local_names.len() <= slot {
            self.local_names.resize(slot + 1, None);
        }
        self.local_names[slot] = Some(name);
    }

    pub fn push_exception_handler(&mut self, start: u32, end: u32, handler: u32, stack_depth: u16) {
        self.exception_table.push(ExceptionEntry::new(start, end, handler, stack_depth));
    }

    pub fn build(self, num_locals: u16, num_params: u16) -> Code {
        Code::new(
            self.bytecode,
            ConstPool::from_vec(self.constants),
            self.location_table,
            self.exception_table,
            num_locals,
            num_params,
            self.max_stack_depth,
            self.local_names.into_iter().map(|n| n.unwrap_or(StringId::from_index(0))).collect(),
            self.nested,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_jump_patches_to_correct_relative_offset() {
        let mut b = CodeBuilder::new();
        let label = b.emit_jump(Opcode::Jump);
        b.emit(Opcode::Nop);
        b.emit(Opcode::Nop);
        b.patch_jump(label);
        let code = b.build(0, 0);
        let offset = i16::from_le_bytes([code.bytecode()[1], code.bytecode()[2]]);
        assert_eq!(offset, 2);
    }

    #[test]
    fn backward_jump_targets_earlier_offset() {
        let mut b = CodeBuilder::new();
        let loop_start = b.position();
        b.emit(Opcode::Nop);
        b.emit_jump_to(Opcode::Jump, loop_start);
        let code = b.build(0, 0);
        let jump_operand_pos = 2;
        let offset = i16::from_le_bytes([code.bytecode()[jump_operand_pos], code.bytecode()[jump_operand_pos + 1]]);
        assert_eq!(offset, -3);
    }

    #[test]
    fn deduplicates_identical_constants() {
        let mut b = CodeBuilder::new();
        let a = b.add_const(RuntimeValue::Int(1));
        let c = b.add_const(RuntimeValue::Int(1));
        assert_eq!(a, c);
    }

    #[test]
    fn tracks_max_stack_depth_through_push_pop_churn() {
        let mut b = CodeBuilder::new();
        b.adjust_stack(1);
        b.adjust_stack(1);
        b.adjust_stack(-1);
        b.adjust_stack(1);
        let code = b.build(0, 0);
        assert_eq!(code.stack_size(), 2);
    }

    #[test]
    fn string_constants_are_kept_separate_from_immediates() {
        let mut b = CodeBuilder::new();
        let s = b.add_const_string("hi".to_string());
        let i = b.add_const(RuntimeValue::Int(0));
        assert_eq!(s, 0);
        assert_eq!(i, 1);
    }
}
