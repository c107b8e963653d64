//! Stack-based virtual machine executing `Code` produced by `compiler.rs`.
//!
//! A single operand stack is shared across every call frame, CPython-style:
//! a `Call`/`CallValue` pops its arguments off the shared stack before
//! pushing a new frame, and `Return` pushes its result back onto the same
//! stack the caller was using, so no separate argument-passing convention is
//! needed. Each frame keeps its own flat locals array, addressed by the
//! slot numbers the compiler assigned.
//!
//! `try`/`catch` needs no runtime handler stack: `Code::exception_table`
//! already records, per function, which bytecode ranges are protected and
//! where their handler starts, so `Vm::throw` just scans the current
//! frame's table (then the caller's, and so on) for a range containing the
//! faulting offset. A `throw`ed value reaches `throw` directly; a built-in
//! `RuntimeError` that `RuntimeError::catch_loc` marks catchable (division
//! by zero, an out-of-bounds index, a null dereference) is turned into a
//! string value and routed through the same `throw` from `Vm::step` instead
//! of propagating as an `Err`. Faults `catch_loc` returns `None` for (a
//! stack overflow, an internal bug) still abort the run immediately.
//!
//! `ref`/`unref` are identity operations here: the aliasing a `VarRef`
//! provides only makes sense against `scope.rs`'s scope stack, which this
//! VM does not use (locals live in a flat per-frame array addressed by
//! slot, not by a stable scope/slot pair). The tree-walking evaluator is
//! where `ref`/`unref` do real work.

use super::code::{Code, ConstValue};
use super::compiler::CompiledProgram;
use super::opcode::Opcode;
use crate::ast::{BinOp, UnOp};
use crate::error::{CodeLoc, RuntimeError};
use crate::heap::{Heap, HeapObject};
use crate::host::HostRegistry;
use crate::intern::StringId;
use crate::io::{PrintWriter, StdPrint};
use crate::operators::{apply_binary, apply_unary, check_array_index};
use crate::program::Program;
use crate::types::TypeTag;
use crate::value::RuntimeValue;
use ahash::AHashMap;
use indexmap::IndexMap;
use std::rc::Rc;

pub enum VmOutcome {
    Completed,
    Exited(i32),
}

struct Frame {
    code: Rc<Code>,
    ip: usize,
    locals: Vec<RuntimeValue>,
    /// Position in the shared operand stack when this frame started;
    /// `Return` truncates back to here before pushing its result, and a
    /// caught exception truncates to `base + handler_stack_depth`.
    base: usize,
}

pub struct Vm {
    functions: Vec<Rc<Code>>,
    struct_fields: AHashMap<StringId, Vec<StringId>>,
    globals: AHashMap<StringId, RuntimeValue>,
    heap: Heap,
    stack: Vec<RuntimeValue>,
    frames: Vec<Frame>,
    host: Rc<HostRegistry>,
    out: Box<dyn PrintWriter>,
}

impl Vm {
    /// Builds a VM that prints host `print`/`println` output straight to
    /// stdout, backed by the one shipped `flx.std.io` host module.
    pub fn new(compiled: &CompiledProgram, program: &Program) -> Self {
        Self::with_host(compiled, program, Rc::new(HostRegistry::with_std()), Box::new(StdPrint))
    }

    pub fn with_host(
        compiled: &CompiledProgram,
        program: &Program,
        host: Rc<HostRegistry>,
        out: Box<dyn PrintWriter>,
    ) -> Self {
        let struct_fields =
            program.structs.iter().map(|s| (s.name, s.fields.iter().map(|f| f.name).collect())).collect();
        Self {
            functions: compiled.functions.iter().cloned().map(Rc::new).collect(),
            struct_fields,
            globals: AHashMap::default(),
            heap: Heap::new(),
            stack: Vec::new(),
            frames: vec![Frame {
                locals: vec![RuntimeValue::Undefined; compiled.main.num_locals() as usize],
                code: Rc::new(compiled.main.clone()),
                ip: 0,
                base: 0,
            }],
            host,
            out,
        }
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn run(&mut self) -> Result<VmOutcome, RuntimeError> {
        loop {
            if let Some(outcome) = self.step()? {
                return Ok(outcome);
            }
        }
    }

    fn step(&mut self) -> Result<Option<VmOutcome>, RuntimeError> {
        let frame_index = self.frames.len() - 1;
        let code = Rc::clone(&self.frames[frame_index].code);
        let ip = self.frames[frame_index].ip;
        let bytes = code.bytecode();
        let opcode = Opcode::from_byte(bytes[ip]);
        let width = opcode.operand_width();
        let operand = &bytes[ip + 1..ip + 1 + width];
        let loc = code.location_for_offset(ip).unwrap_or_default();
        self.frames[frame_index].ip = ip + 1 + width;
        match self.execute(opcode, operand, &code, loc) {
            Err(e) if e.catch_loc().is_some() => {
                let id = self.heap.allocate(HeapObject::Str(e.to_string()));
                self.throw(RuntimeValue::String(id), loc)?;
                Ok(None)
            }
            other => other,
        }
    }

    fn execute(&mut self, opcode: Opcode, operand: &[u8], code: &Rc<Code>, loc: CodeLoc) -> Result<Option<VmOutcome>, RuntimeError> {
        match opcode {
            Opcode::Nop => {}
            Opcode::LoadConst => {
                let value = match code.constants().get(read_u16(operand)).clone() {
                    ConstValue::Undefined => RuntimeValue::Undefined,
                    ConstValue::Void => RuntimeValue::Void,
                    ConstValue::Bool(b) => RuntimeValue::Bool(b),
                    ConstValue::Int(i) => RuntimeValue::Int(i),
                    ConstValue::Float(f) => RuntimeValue::Float(f),
                    ConstValue::Char(c) => RuntimeValue::Char(c),
                    ConstValue::Str(s) => RuntimeValue::String(self.heap.allocate(HeapObject::Str(s))),
                };
                self.push(value);
            }
            Opcode::LoadLocal => {
                let slot = read_u16(operand) as usize;
                let v = self.frames.last().unwrap().locals[slot].clone();
                self.push(v);
            }
            Opcode::StoreLocal => {
                let slot = read_u16(operand) as usize;
                let v = self.pop();
                self.frames.last_mut().unwrap().locals[slot] = v;
            }
            Opcode::LoadGlobal => {
                let name = StringId::from_index(read_u16(operand));
                let v = self.globals.get(&name).cloned().unwrap_or(RuntimeValue::Undefined);
                self.push(v);
            }
            Opcode::StoreGlobal => {
                let name = StringId::from_index(read_u16(operand));
                let v = self.pop();
                self.globals.insert(name, v);
            }
            Opcode::LoadField => {
                let field = StringId::from_index(read_u16(operand));
                let base = unwrap_any(self.pop());
                match base {
                    RuntimeValue::Struct(id) => {
                        let HeapObject::Struct { fields, .. } = self.heap.get(id) else { unreachable!() };
                        self.push(fields.get(&field).cloned().unwrap_or(RuntimeValue::Undefined));
                    }
                    other => return Err(not_a(other, "struct", loc)),
                }
            }
            Opcode::StoreField => {
                let field = StringId::from_index(read_u16(operand));
                let base = unwrap_any(self.pop());
                let value = self.pop();
                match base {
                    RuntimeValue::Struct(id) => {
                        let HeapObject::Struct { fields, .. } = self.heap.get_mut(id) else { unreachable!() };
                        fields.insert(field, value);
                    }
                    other => return Err(not_a(other, "struct", loc)),
                }
            }
            Opcode::LoadIndex => {
                let index = self.pop_int(loc)?;
                let base = unwrap_any(self.pop());
                match base {
                    RuntimeValue::Array(id) => {
                        let HeapObject::Array(items) = self.heap.get(id) else { unreachable!() };
                        let i = check_array_index(index, items.len(), loc)?;
                        self.push(items[i].clone());
                    }
                    RuntimeValue::String(id) => {
                        let HeapObject::Str(s) = self.heap.get(id) else { unreachable!() };
                        let chars: Vec<char> = s.chars().collect();
                        let i = check_array_index(index, chars.len(), loc)?;
                        self.push(RuntimeValue::Char(chars[i]));
                    }
                    other => return Err(not_a(other, "array or string", loc)),
                }
            }
            Opcode::StoreIndex => {
                let index = self.pop_int(loc)?;
                let base = unwrap_any(self.pop());
                let value = self.pop();
                match base {
                    RuntimeValue::Array(id) => {
                        let HeapObject::Array(items) = self.heap.get_mut(id) else { unreachable!() };
                        let i = check_array_index(index, items.len(), loc)?;
                        items[i] = value;
                    }
                    RuntimeValue::String(id) => {
                        let RuntimeValue::Char(c) = unwrap_any(value) else {
                            return Err(RuntimeError::Internal { message: format!("{loc}: assigning into a string requires a char value") });
                        };
                        let HeapObject::Str(s) = self.heap.get_mut(id) else { unreachable!() };
                        let mut chars: Vec<char> = s.chars().collect();
                        let i = check_array_index(index, chars.len(), loc)?;
                        chars[i] = c;
                        *s = chars.into_iter().collect();
                    }
                    other => return Err(not_a(other, "array or string", loc)),
                }
            }
            Opcode::NewArray => {
                let n = read_u16(operand) as usize;
                let start = self.stack.len() - n;
                let items = self.stack.split_off(start);
                let id = self.heap.allocate(HeapObject::Array(items));
                self.push(RuntimeValue::Array(id));
            }
            Opcode::NewArrayDefault => {
                let tag = TypeTag::from_repr(read_u8(operand)).expect("invalid type tag byte in NewArrayDefault");
                let count = self.pop_int(loc)?.max(0) as usize;
                let items = (0..count).map(|_| default_for_tag(&mut self.heap, tag)).collect();
                let id = self.heap.allocate(HeapObject::Array(items));
                self.push(RuntimeValue::Array(id));
            }
            Opcode::NewStruct => {
                let ty = StringId::from_index(read_u16(operand));
                let names = self.struct_fields.get(&ty).cloned().unwrap_or_default();
                let start = self.stack.len() - names.len();
                let values = self.stack.split_off(start);
                let fields: IndexMap<StringId, RuntimeValue> = names.into_iter().zip(values).collect();
                let id = self.heap.allocate(HeapObject::Struct { ty, fields });
                self.push(RuntimeValue::Struct(id));
            }
            Opcode::MakeClosure => {
                let nested = code.nested(read_u16(operand)).clone();
                let id = self.heap.allocate(HeapObject::Closure { code: Rc::new(nested), captured: AHashMap::default() });
                self.push(RuntimeValue::Function(id));
            }
            Opcode::Pop => {
                self.pop();
            }
            Opcode::Dup => {
                let v = self.stack.last().expect("Dup on empty operand stack").clone();
                self.push(v);
            }
            Opcode::Jump => self.jump(read_i16(operand)),
            Opcode::JumpIfFalse => {
                let v = self.pop();
                if !v.is_truthy() {
                    self.jump(read_i16(operand));
                }
            }
            Opcode::JumpIfTrue => {
                let v = self.pop();
                if v.is_truthy() {
                    self.jump(read_i16(operand));
                }
            }
            Opcode::Call => {
                let target = Rc::clone(&self.functions[read_u16(operand) as usize]);
                self.invoke(target);
            }
            Opcode::CallValue => {
                let argc = read_u16(operand) as usize;
                let start = self.stack.len() - argc;
                let args = self.stack.split_off(start);
                let callee = unwrap_any(self.pop());
                let RuntimeValue::Function(id) = callee else { return Err(not_a(callee, "function", loc)) };
                let target = match self.heap.get(id) {
                    HeapObject::Closure { code, .. } => Rc::clone(code),
                    _ => return Err(RuntimeError::Internal { message: "function value does not reference a closure".into() }),
                };
                self.stack.extend(args);
                self.invoke(target);
            }
            Opcode::CallHost => {
                let host_id = read_u16(operand);
                let argc = self.host.signature(host_id).params.len();
                let start = self.stack.len() - argc;
                let args = self.stack.split_off(start).into_iter().map(unwrap_any).collect();
                let host = Rc::clone(&self.host);
                let result = host.call(host_id, args, &mut self.heap, self.out.as_mut())?;
                self.push(result);
            }
            Opcode::Return => {
                let value = self.pop();
                if self.frames.len() == 1 {
                    return Ok(Some(VmOutcome::Completed));
                }
                let frame = self.frames.pop().unwrap();
                self.stack.truncate(frame.base);
                self.push(value);
                self.collect_garbage();
            }
            Opcode::BinaryOp => {
                let op = binop_from_byte(read_u8(operand));
                let rhs = self.pop();
                let lhs = self.pop();
                let result = apply_binary(op, &lhs, &rhs, &mut self.heap, loc)?;
                self.push(result);
            }
            Opcode::UnaryOp => {
                let op = unop_from_byte(read_u8(operand));
                let v = self.pop();
                let result = apply_unary(op, &v, loc)?;
                self.push(result);
            }
            Opcode::CompoundIndexOp => {
                return Err(RuntimeError::Internal { message: "CompoundIndexOp is not emitted by this compiler".into() });
            }
            Opcode::Throw => {
                let value = self.pop();
                self.throw(value, loc)?;
            }
            Opcode::PushTryBarrier | Opcode::PopTryBarrier => {}
            Opcode::Ref | Opcode::Unref => {}
            Opcode::TypeId | Opcode::TypeOf => {
                let v = self.pop();
                self.push(RuntimeValue::Int(v.concrete_tag() as i64));
            }
            Opcode::RefId => {
                let v = self.pop();
                self.push(RuntimeValue::Int(v.refid()));
            }
            Opcode::IsAny => {
                let v = self.pop();
                self.push(RuntimeValue::Bool(matches!(v, RuntimeValue::Any(_))));
            }
            Opcode::IsArray => {
                let v = unwrap_any(self.pop());
                self.push(RuntimeValue::Bool(matches!(v, RuntimeValue::Array(_))));
            }
            Opcode::IsStruct => {
                let v = unwrap_any(self.pop());
                self.push(RuntimeValue::Bool(matches!(v, RuntimeValue::Struct(_))));
            }
            Opcode::ArrayLen => {
                let v = unwrap_any(self.pop());
                let len = match v {
                    RuntimeValue::Array(id) => match self.heap.get(id) {
                        HeapObject::Array(items) => items.len(),
                        _ => 0,
                    },
                    RuntimeValue::String(id) => match self.heap.get(id) {
                        HeapObject::Str(s) => s.chars().count(),
                        _ => 0,
                    },
                    other => return Err(not_a(other, "array or string", loc)),
                };
                self.push(RuntimeValue::Int(len as i64));
            }
            Opcode::Exit => {
                let code = self.pop_int(loc)? as i32;
                return Ok(Some(VmOutcome::Exited(code)));
            }
            Opcode::Halt => return Ok(Some(VmOutcome::Completed)),
        }
        Ok(None)
    }

    fn invoke(&mut self, target: Rc<Code>) {
        let argc = target.num_params() as usize;
        let start = self.stack.len() - argc;
        let args = self.stack.split_off(start);
        let mut locals = vec![RuntimeValue::Undefined; target.num_locals() as usize];
        for (slot, value) in args.into_iter().enumerate() {
            locals[slot] = value;
        }
        let base = self.stack.len();
        self.frames.push(Frame { code: target, ip: 0, locals, base });
    }

    /// Finds the nearest enclosing `try` for the faulting offset, walking
    /// outward through caller frames when the current one has none. Returns
    /// `Err(RuntimeError::Uncaught)` once the outermost frame is exhausted.
    fn throw(&mut self, value: RuntimeValue, at: CodeLoc) -> Result<(), RuntimeError> {
        loop {
            let frame = self.frames.last().unwrap();
            let offset = frame.ip as u32;
            if let Some(entry) = frame.code.find_exception_handler(offset) {
                let base = frame.base;
                let target = entry.handler() as usize;
                let depth = entry.stack_depth() as usize;
                self.frames.last_mut().unwrap().ip = target;
                self.stack.truncate(base + depth);
                self.push(value);
                return Ok(());
            }
            if self.frames.len() == 1 {
                return Err(RuntimeError::Uncaught { value_repr: value.to_string(), at });
            }
            self.frames.pop();
        }
    }

    fn jump(&mut self, offset: i16) {
        let frame = self.frames.last_mut().unwrap();
        frame.ip = (frame.ip as i64 + offset as i64) as usize;
    }

    fn collect_garbage(&mut self) {
        let roots = self
            .globals
            .values()
            .cloned()
            .chain(self.frames.iter().flat_map(|f| f.locals.iter().cloned()))
            .chain(self.stack.iter().cloned())
            .collect::<Vec<_>>();
        self.heap.collect(roots);
    }

    fn push(&mut self, value: RuntimeValue) {
        self.stack.push(value);
    }

    fn pop(&mut self) -> RuntimeValue {
        self.stack.pop().expect("operand stack underflow")
    }

    fn pop_int(&mut self, at: CodeLoc) -> Result<i64, RuntimeError> {
        let v = self.pop();
        v.as_int().ok_or(RuntimeError::Internal { message: format!("{at}: expected an int on the operand stack") })
    }
}

fn unwrap_any(value: RuntimeValue) -> RuntimeValue {
    match value {
        RuntimeValue::Any(inner) => unwrap_any(*inner),
        other => other,
    }
}

fn not_a(value: RuntimeValue, expected: &str, at: CodeLoc) -> RuntimeError {
    RuntimeError::Internal { message: format!("{at}: expected {expected}, found {:?}", value.tag()) }
}

fn default_for_tag(heap: &mut Heap, tag: TypeTag) -> RuntimeValue {
    match tag {
        TypeTag::Undefined | TypeTag::Void => RuntimeValue::Undefined,
        TypeTag::Bool => RuntimeValue::Bool(false),
        TypeTag::Int => RuntimeValue::Int(0),
        TypeTag::Float => RuntimeValue::Float(0.0),
        TypeTag::Char => RuntimeValue::Char('\0'),
        TypeTag::String => RuntimeValue::String(heap.allocate(HeapObject::Str(String::new()))),
        TypeTag::Array => RuntimeValue::Array(heap.allocate(HeapObject::Array(Vec::new()))),
        TypeTag::Struct | TypeTag::Any | TypeTag::Function => RuntimeValue::Undefined,
    }
}

fn binop_from_byte(b: u8) -> BinOp {
    use BinOp::*;
    const TABLE: [BinOp; 18] =
        [Add, Sub, Mul, Div, Mod, BitAnd, BitOr, BitXor, Shl, Shr, And, Or, Eq, NotEq, Less, LessEq, Greater, GreaterEq];
    TABLE[b as usize]
}

fn unop_from_byte(b: u8) -> UnOp {
    use UnOp::*;
    const TABLE: [UnOp; 3] = [Neg, Not, BitNot];
    TABLE[b as usize]
}

fn read_u8(bytes: &[u8]) -> u8 {
    bytes[0]
}

fn read_u16(bytes: &[u8]) -> u16 {
    u16::from_le_bytes([bytes[0], bytes[1]])
}

fn read_i16(bytes: &[u8]) -> i16 {
    i16::from_le_bytes([bytes[0], bytes[1]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::compiler::compile_program;
    use crate::resolver::{load_program, MemoryLoader};

    fn run(src: &'static str) -> Vm {
        let loader = MemoryLoader::new([("main", src)]);
        let program = load_program(&loader, "main").unwrap();
        let compiled = compile_program(&program).unwrap();
        let mut vm = Vm::new(&compiled, &program);
        vm.run().unwrap();
        vm
    }

    #[test]
    fn arithmetic_and_global_assignment() {
        let vm = run("let x = 1 + 2 * 3;");
        let x = program_global(&vm, 0);
        assert_eq!(x, Some(RuntimeValue::Int(7)));
    }

    #[test]
    fn while_loop_accumulates() {
        let vm = run("let i = 0; let sum = 0; while (i < 5) { sum = sum + i; i = i + 1; }");
        assert_eq!(program_global(&vm, 1), Some(RuntimeValue::Int(10)));
    }

    #[test]
    fn function_call_returns_value() {
        let vm = run("func add(a: int, b: int): int { return a + b; } let r = add(4, 5);");
        assert_eq!(program_global(&vm, 3), Some(RuntimeValue::Int(9)));
    }

    #[test]
    fn try_catch_recovers_from_a_throw() {
        let vm = run("let x = 0; try { throw 1; } catch (e) { x = 99; }");
        assert_eq!(program_global(&vm, 0), Some(RuntimeValue::Int(99)));
    }

    #[test]
    fn division_by_zero_is_caught_by_try_catch() {
        let vm = run("let i = 10; try { i = i / 0; } catch (e) { i = -1; }");
        assert_eq!(program_global(&vm, 0), Some(RuntimeValue::Int(-1)));
    }

    #[test]
    fn an_index_out_of_bounds_error_is_caught_by_try_catch() {
        let vm = run("let x = 0; try { let a = [1]; let b = a[5]; } catch (e) { x = 1; }");
        assert_eq!(program_global(&vm, 0), Some(RuntimeValue::Int(1)));
    }

    #[test]
    fn string_index_assignment_replaces_a_byte_in_place() {
        let mut vm = run(r#"let s = "hello"; s[0] = 'H';"#);
        let id = match program_global(&vm, 0) {
            Some(RuntimeValue::String(id)) => id,
            other => panic!("expected a string global, got {other:?}"),
        };
        match vm.heap.get_mut(id) {
            HeapObject::Str(s) => assert_eq!(s, "Hello"),
            other => panic!("expected a heap string, got {other:?}"),
        }
    }

    fn program_global(vm: &Vm, index: u16) -> Option<RuntimeValue> {
        vm.globals.get(&StringId::from_index(index)).cloned()
    }
}
