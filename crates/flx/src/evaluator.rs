//! Tree-walking evaluator: runs a `Program`'s AST directly against
//! `scope::ScopeStack` and `heap::Heap`, sharing operator semantics
//! (`crate::operators`) and call resolution (`crate::typecheck`) with the
//! bytecode compiler/VM so the two engines never disagree about what a
//! program does.
//!
//! Two places are deliberately *not* shared with the VM, because they only
//! make sense for one engine or the other:
//!
//! - `ref`/`unref` do real work here (see `VarRef` in `scope.rs`): `ref x`
//!   captures a handle into the variable's slot rather than copying its
//!   value, and `unref` follows that handle back to the live slot. The VM
//!   treats both as no-ops because it has no notion of a variable slot once
//!   compiled to locals/globals.
//! - Calling through a `RuntimeValue::Function` that wraps a bytecode
//!   `Closure` (produced by the compiler) is out of scope for this engine;
//!   this evaluator only ever creates and invokes `HeapObject::AstClosure`
//!   values for function-literal expressions.
//!
//! Garbage collection runs whenever a scope is popped (function return,
//! block exit, loop iteration), mirroring the VM's "collect on `Return`"
//! timing documented in `bytecode::vm`.

use crate::ast::{BinOp, CompoundOp, Expr, ExprKind, FunctionDef, IncDecOp, Param, Stmt, StmtKind};
use crate::error::{CodeLoc, RuntimeError};
use crate::heap::{Heap, HeapObject};
use crate::host::HostRegistry;
use crate::intern::{FunctionId, StringId};
use crate::io::{PrintWriter, StdPrint};
use crate::operators::{apply_binary, apply_unary, check_array_index, values_equal};
use crate::program::Program;
use crate::scope::ScopeStack;
use crate::typecheck::{self, CallTarget};
use crate::types::{TypeDefinition, TypeTag};
use crate::value::RuntimeValue;
use indexmap::IndexMap;
use std::rc::Rc;

/// How a statement finished: fell through normally, or is unwinding to the
/// nearest loop/function boundary.
enum Flow {
    Normal,
    Break,
    Continue,
    Return(RuntimeValue),
}

/// Either a genuine runtime fault (fatal, never caught by `try`/`catch`), a
/// value thrown with `throw` (the only thing a `catch` clause can trap), or
/// a cooperative `exit(n)` request — matching `bytecode::vm::Vm::throw`'s
/// documented split, plus `exit` unwinding every enclosing scope the same
/// way a fault does (neither is catchable).
enum Signal {
    Fault(RuntimeError),
    Thrown(RuntimeValue, CodeLoc),
    Exit(i32),
}

/// How a full run finished: fell off the end of the program, or hit an
/// `exit(n)` statement. Mirrors `bytecode::vm::VmOutcome`.
#[derive(Debug)]
pub enum EvalOutcome {
    Completed,
    Exited(i32),
}

impl From<RuntimeError> for Signal {
    fn from(e: RuntimeError) -> Self {
        Signal::Fault(e)
    }
}

type EvalResult<T> = Result<T, Signal>;

const MAX_CALL_DEPTH: usize = 512;

pub struct Evaluator<'a> {
    program: &'a Program,
    host: Rc<HostRegistry>,
    heap: Heap,
    scopes: ScopeStack,
    out: Box<dyn PrintWriter>,
    call_depth: usize,
}

impl<'a> Evaluator<'a> {
    pub fn new(program: &'a Program, host: Rc<HostRegistry>) -> Self {
        Self::with_output(program, host, Box::new(StdPrint))
    }

    pub fn with_output(program: &'a Program, host: Rc<HostRegistry>, out: Box<dyn PrintWriter>) -> Self {
        Evaluator { program, host, heap: Heap::new(), scopes: ScopeStack::new(), out, call_depth: 0 }
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Runs the entry unit's top-level statements. A `throw` that escapes
    /// every `try` becomes `RuntimeError::Uncaught`, matching the VM.
    pub fn run(&mut self) -> Result<EvalOutcome, RuntimeError> {
        let program = self.program;
        let body = &program.units[program.main_unit].top_level;
        match self.exec_block(body) {
            Ok(_) => Ok(EvalOutcome::Completed),
            Err(Signal::Fault(e)) => Err(e),
            Err(Signal::Thrown(value, at)) => Err(RuntimeError::Uncaught { value_repr: value.to_string(), at }),
            Err(Signal::Exit(code)) => Ok(EvalOutcome::Exited(code)),
        }
    }

    fn collect_garbage(&mut self, extra: Vec<RuntimeValue>) {
        let roots: Vec<RuntimeValue> = self.scopes.iter_roots().chain(extra).collect();
        self.heap.collect(roots);
    }

    fn declare(&mut self, name: StringId, value: RuntimeValue, loc: CodeLoc) -> EvalResult<()> {
        self.scopes
            .current_mut()
            .declare_var(name, false, value, loc)
            .map(|_| ())
            .map_err(|e| Signal::Fault(RuntimeError::Internal { message: e.to_string() }))
    }

    fn exec_block(&mut self, body: &[Stmt]) -> EvalResult<Flow> {
        for stmt in body {
            match self.exec_stmt(stmt)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    /// Runs `body` in a fresh scope, always popping it (and collecting
    /// garbage) before propagating whatever the block produced — including
    /// a throw, so nothing rooted only in that scope survives collection.
    fn scoped_block(&mut self, body: &[Stmt]) -> EvalResult<Flow> {
        self.scopes.push();
        let result = self.exec_block(body);
        self.finish_scope(&result);
        result
    }

    fn finish_scope(&mut self, result: &EvalResult<Flow>) {
        self.scopes.pop();
        match result {
            Ok(Flow::Return(v)) => self.collect_garbage(vec![v.clone()]),
            Err(Signal::Thrown(v, _)) => self.collect_garbage(vec![v.clone()]),
            _ => self.collect_garbage(Vec::new()),
        }
    }

    /// Runs a `catch` body in a fresh scope with `value` optionally bound to
    /// `catch_binding`, for either a `throw`n value or a caught `RuntimeError`
    /// (see `RuntimeError::catch_loc`).
    fn run_catch(&mut self, value: RuntimeValue, catch_binding: Option<StringId>, catch_body: &[Stmt], loc: CodeLoc) -> EvalResult<Flow> {
        self.scopes.push();
        let result = (|| {
            if let Some(name) = catch_binding {
                self.declare(name, value, loc)?;
            }
            self.exec_block(catch_body)
        })();
        self.finish_scope(&result);
        result
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> EvalResult<Flow> {
        match &stmt.kind {
            StmtKind::Expr(e) => {
                self.eval_expr(e)?;
                Ok(Flow::Normal)
            }
            StmtKind::VarDecl { name, is_const, init, .. } => {
                let value = match init {
                    Some(e) => self.eval_expr(e)?,
                    None => RuntimeValue::Undefined,
                };
                self.scopes
                    .current_mut()
                    .declare_var(*name, *is_const, value, stmt.loc)
                    .map_err(|e| Signal::Fault(RuntimeError::Internal { message: e.to_string() }))?;
                Ok(Flow::Normal)
            }
            StmtKind::Block(body) => self.scoped_block(body),
            StmtKind::If { cond, then_branch, else_branch } => {
                if self.eval_expr(cond)?.is_truthy() {
                    self.exec_stmt(then_branch)
                } else if let Some(e) = else_branch {
                    self.exec_stmt(e)
                } else {
                    Ok(Flow::Normal)
                }
            }
            StmtKind::While { cond, body } => {
                loop {
                    if !self.eval_expr(cond)?.is_truthy() {
                        break;
                    }
                    match self.exec_stmt(body)? {
                        Flow::Break => break,
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Continue | Flow::Normal => {}
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::DoWhile { body, cond } => {
                loop {
                    match self.exec_stmt(body)? {
                        Flow::Break => break,
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Continue | Flow::Normal => {}
                    }
                    if !self.eval_expr(cond)?.is_truthy() {
                        break;
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::For { init, cond, step, body } => {
                self.scopes.push();
                let result = self.run_for(init, cond, step, body);
                self.finish_scope(&result);
                result
            }
            StmtKind::Foreach { binding, binding_ty: _, iterable, body } => self.run_foreach(*binding, iterable, body),
            StmtKind::Switch { subject, cases, default } => self.run_switch(subject, cases, default),
            StmtKind::Break => Ok(Flow::Break),
            StmtKind::Continue => Ok(Flow::Continue),
            StmtKind::Return(value) => {
                let v = match value {
                    Some(e) => self.eval_expr(e)?,
                    None => RuntimeValue::Void,
                };
                Ok(Flow::Return(v))
            }
            StmtKind::Try { body, catch_binding, catch_body } => match self.scoped_block(body) {
                Err(Signal::Thrown(value, _)) => self.run_catch(value, *catch_binding, catch_body, stmt.loc),
                Err(Signal::Fault(e)) if e.catch_loc().is_some() => {
                    let message = e.to_string();
                    let value = RuntimeValue::String(self.heap.allocate(HeapObject::Str(message)));
                    self.run_catch(value, *catch_binding, catch_body, stmt.loc)
                }
                other => other,
            },
            StmtKind::Throw(e) => {
                let v = self.eval_expr(e)?;
                Err(Signal::Thrown(v, stmt.loc))
            }
            StmtKind::Exit(code) => {
                let v = self.eval_expr(code)?;
                Err(Signal::Exit(v.as_int().unwrap_or(0) as i32))
            }
            StmtKind::FunctionDecl(_) | StmtKind::StructDecl(_) => Ok(Flow::Normal),
        }
    }

    /// `continue` in a `for` loop skips the step expression and jumps
    /// straight back to the condition check — the compiler's bytecode does
    /// the same (`continue_target` is the condition offset, not the step),
    /// so Rust's `continue` below (which re-enters the `loop` body above the
    /// step) reproduces it exactly.
    fn run_for(&mut self, init: &Option<Box<Stmt>>, cond: &Option<Expr>, step: &Option<Expr>, body: &Stmt) -> EvalResult<Flow> {
        if let Some(init) = init {
            self.exec_stmt(init)?;
        }
        loop {
            if let Some(cond) = cond {
                if !self.eval_expr(cond)?.is_truthy() {
                    break;
                }
            }
            match self.exec_stmt(body)? {
                Flow::Break => break,
                Flow::Return(v) => return Ok(Flow::Return(v)),
                Flow::Continue => continue,
                Flow::Normal => {}
            }
            if let Some(step) = step {
                self.eval_expr(step)?;
            }
        }
        Ok(Flow::Normal)
    }

    fn run_foreach(&mut self, binding: StringId, iterable: &Expr, body: &Stmt) -> EvalResult<Flow> {
        let iterable_val = unwrap_any(self.eval_expr(iterable)?);
        let items = match iterable_val {
            RuntimeValue::Array(id) => match self.heap.get(id) {
                HeapObject::Array(items) => items.clone(),
                _ => Vec::new(),
            },
            other => return Err(not_a(other, "array", iterable.loc).into()),
        };
        for item in items {
            self.scopes.push();
            let result = (|| {
                self.declare(binding, item, iterable.loc)?;
                self.exec_stmt(body)
            })();
            self.finish_scope(&result);
            match result? {
                Flow::Break => break,
                Flow::Return(v) => return Ok(Flow::Return(v)),
                Flow::Continue | Flow::Normal => {}
            }
        }
        Ok(Flow::Normal)
    }

    fn run_switch(&mut self, subject: &Expr, cases: &[crate::ast::SwitchCase], default: &Option<Vec<Stmt>>) -> EvalResult<Flow> {
        let subject_val = self.eval_expr(subject)?;
        for case in cases {
            let case_val = self.eval_expr(&case.value)?;
            if values_equal(&subject_val, &case_val, &self.heap) {
                return self.scoped_block(&case.body);
            }
        }
        match default {
            Some(body) => self.scoped_block(body),
            None => Ok(Flow::Normal),
        }
    }

    fn eval_expr(&mut self, expr: &Expr) -> EvalResult<RuntimeValue> {
        match &expr.kind {
            ExprKind::IntLit(v) => Ok(RuntimeValue::Int(*v)),
            ExprKind::FloatLit(v) => Ok(RuntimeValue::Float(*v)),
            ExprKind::BoolLit(v) => Ok(RuntimeValue::Bool(*v)),
            ExprKind::CharLit(v) => Ok(RuntimeValue::Char(*v)),
            ExprKind::NullLit => Ok(RuntimeValue::Undefined),
            ExprKind::StringLit(s) => Ok(RuntimeValue::String(self.heap.allocate(HeapObject::Str(s.clone())))),
            ExprKind::Identifier(name) | ExprKind::NsAccess(_, name) => Ok(self
                .scopes
                .resolve_var(*name)
                .and_then(|r| self.scopes.deref(r))
                .map(|v| v.value.clone())
                .unwrap_or(RuntimeValue::Undefined)),
            ExprKind::ArrayLit(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval_expr(item)?);
                }
                Ok(RuntimeValue::Array(self.heap.allocate(HeapObject::Array(values))))
            }
            ExprKind::StructLit { ty, fields } => self.eval_struct_lit(*ty, fields, expr.loc),
            ExprKind::New { ty, dims } => {
                let count = match dims.first() {
                    Some(e) => self.eval_expr(e)?.as_int().unwrap_or(0).max(0) as usize,
                    None => 0,
                };
                let tag = typecheck::resolve_type_ref(ty).tag();
                let items = (0..count).map(|_| default_for_tag(&mut self.heap, tag)).collect();
                Ok(RuntimeValue::Array(self.heap.allocate(HeapObject::Array(items))))
            }
            ExprKind::Unary(op, inner) => {
                let v = self.eval_expr(inner)?;
                Ok(apply_unary(*op, &v, expr.loc)?)
            }
            ExprKind::Binary(op, lhs, rhs) => {
                let l = self.eval_expr(lhs)?;
                let r = self.eval_expr(rhs)?;
                Ok(apply_binary(*op, &l, &r, &mut self.heap, expr.loc)?)
            }
            ExprKind::Ternary(cond, a, b) => {
                if self.eval_expr(cond)?.is_truthy() {
                    self.eval_expr(a)
                } else {
                    self.eval_expr(b)
                }
            }
            ExprKind::Assign(target, value) => {
                let v = self.eval_expr(value)?;
                self.assign_to(target, v.clone())?;
                Ok(v)
            }
            ExprKind::CompoundAssign(op, target, value) => {
                let cur = self.eval_expr(target)?;
                let rhs = self.eval_expr(value)?;
                let result = apply_binary(compound_to_binop(*op), &cur, &rhs, &mut self.heap, expr.loc)?;
                self.assign_to(target, result.clone())?;
                Ok(result)
            }
            ExprKind::IncDec(op, target, prefix) => {
                let cur = self.eval_expr(target)?;
                let one = RuntimeValue::Int(1);
                let binop = match op {
                    IncDecOp::Inc => BinOp::Add,
                    IncDecOp::Dec => BinOp::Sub,
                };
                let updated = apply_binary(binop, &cur, &one, &mut self.heap, expr.loc)?;
                self.assign_to(target, updated.clone())?;
                Ok(if *prefix { updated } else { cur })
            }
            ExprKind::Call { callee, args } => self.eval_call(callee, args, expr.loc),
            ExprKind::Index(base, index) => {
                let base_v = unwrap_any(self.eval_expr(base)?);
                let idx = self.eval_expr(index)?.as_int().ok_or_else(|| int_expected(expr.loc))?;
                match base_v {
                    RuntimeValue::Array(id) => {
                        let HeapObject::Array(items) = self.heap.get(id) else { unreachable!() };
                        let i = check_array_index(idx, items.len(), expr.loc)?;
                        Ok(items[i].clone())
                    }
                    RuntimeValue::String(id) => {
                        let HeapObject::Str(s) = self.heap.get(id) else { unreachable!() };
                        let chars: Vec<char> = s.chars().collect();
                        let i = check_array_index(idx, chars.len(), expr.loc)?;
                        Ok(RuntimeValue::Char(chars[i]))
                    }
                    other => Err(not_a(other, "array or string", expr.loc).into()),
                }
            }
            ExprKind::Field(base, field) => {
                let base_v = unwrap_any(self.eval_expr(base)?);
                match base_v {
                    RuntimeValue::Struct(id) => {
                        let HeapObject::Struct { fields, .. } = self.heap.get(id) else { unreachable!() };
                        Ok(fields.get(field).cloned().unwrap_or(RuntimeValue::Undefined))
                    }
                    other => Err(not_a(other, "struct", expr.loc).into()),
                }
            }
            ExprKind::FunctionLit { params, ret: _, body } => {
                let def = FunctionDef {
                    name: StringId::from_index(0),
                    params: params.clone(),
                    ret: crate::ast::TypeRef::Any,
                    body: body.clone(),
                    namespace: Vec::new(),
                    loc: expr.loc,
                };
                let id = self.heap.allocate(HeapObject::AstClosure(Rc::new(def)));
                Ok(RuntimeValue::Function(id))
            }
            ExprKind::Ref(inner) => match &inner.kind {
                ExprKind::Identifier(name) | ExprKind::NsAccess(_, name) => {
                    Ok(self.scopes.resolve_var(*name).map(RuntimeValue::Ref).unwrap_or(RuntimeValue::Undefined))
                }
                _ => self.eval_expr(inner),
            },
            ExprKind::Unref(inner) => {
                let v = self.eval_expr(inner)?;
                Ok(match v {
                    RuntimeValue::Ref(r) => self.scopes.deref(r).map(|var| var.value.clone()).unwrap_or(RuntimeValue::Undefined),
                    other => other,
                })
            }
            ExprKind::TypeId(inner) => {
                let v = self.eval_expr(inner)?;
                Ok(RuntimeValue::Int(v.concrete_tag() as i64))
            }
            ExprKind::TypeOf(ty) => Ok(RuntimeValue::Int(typecheck::resolve_type_ref(ty).tag() as i64)),
            ExprKind::RefId(inner) => {
                let v = self.eval_expr(inner)?;
                Ok(RuntimeValue::Int(v.refid()))
            }
            ExprKind::IsAny(inner) => {
                let v = self.eval_expr(inner)?;
                Ok(RuntimeValue::Bool(matches!(v, RuntimeValue::Any(_))))
            }
            ExprKind::IsArray(inner) => {
                let v = unwrap_any(self.eval_expr(inner)?);
                Ok(RuntimeValue::Bool(matches!(v, RuntimeValue::Array(_))))
            }
            ExprKind::IsStruct(inner) => {
                let v = unwrap_any(self.eval_expr(inner)?);
                Ok(RuntimeValue::Bool(matches!(v, RuntimeValue::Struct(_))))
            }
        }
    }

    fn eval_struct_lit(&mut self, ty: StringId, fields: &[(StringId, Expr)], at: CodeLoc) -> EvalResult<RuntimeValue> {
        let def = self
            .program
            .find_struct(ty)
            .ok_or_else(|| RuntimeError::Internal { message: format!("{at}: unknown struct {}", self.program.resolve_name(ty)) })?;
        let mut ordered: Vec<Option<&Expr>> = vec![None; def.fields.len()];
        for (fname, fexpr) in fields {
            if let Some(pos) = def.fields.iter().position(|f| f.name == *fname) {
                ordered[pos] = Some(fexpr);
            }
        }
        let mut values = Vec::with_capacity(def.fields.len());
        for (i, slot) in ordered.into_iter().enumerate() {
            let v = match slot {
                Some(fexpr) => self.eval_expr(fexpr)?,
                None => match &def.fields[i].default {
                    Some(d) => self.eval_expr(d)?,
                    None => RuntimeValue::Undefined,
                },
            };
            values.push(v);
        }
        let names: Vec<StringId> = def.fields.iter().map(|f| f.name).collect();
        let fields: IndexMap<StringId, RuntimeValue> = names.into_iter().zip(values).collect();
        Ok(RuntimeValue::Struct(self.heap.allocate(HeapObject::Struct { ty, fields })))
    }

    fn assign_to(&mut self, target: &Expr, value: RuntimeValue) -> EvalResult<()> {
        match &target.kind {
            ExprKind::Identifier(name) | ExprKind::NsAccess(_, name) => {
                match self.scopes.resolve_var(*name) {
                    Some(r) => {
                        if let Some(var) = self.scopes.deref_mut(r) {
                            var.value = value;
                        }
                    }
                    None => {
                        self.scopes
                            .global_mut()
                            .declare_var(*name, false, value, target.loc)
                            .map_err(|e| Signal::Fault(RuntimeError::Internal { message: e.to_string() }))?;
                    }
                }
                Ok(())
            }
            ExprKind::Index(base, index) => {
                let base_v = unwrap_any(self.eval_expr(base)?);
                let idx = self.eval_expr(index)?.as_int().ok_or_else(|| int_expected(target.loc))?;
                match base_v {
                    RuntimeValue::Array(id) => {
                        let HeapObject::Array(items) = self.heap.get_mut(id) else { unreachable!() };
                        let i = check_array_index(idx, items.len(), target.loc)?;
                        items[i] = value;
                        Ok(())
                    }
                    RuntimeValue::String(id) => {
                        let c = value.as_char().ok_or_else(|| char_expected(target.loc))?;
                        let HeapObject::Str(s) = self.heap.get_mut(id) else { unreachable!() };
                        let mut chars: Vec<char> = s.chars().collect();
                        let i = check_array_index(idx, chars.len(), target.loc)?;
                        chars[i] = c;
                        *s = chars.into_iter().collect();
                        Ok(())
                    }
                    other => Err(not_a(other, "array or string", target.loc).into()),
                }
            }
            ExprKind::Field(base, field) => {
                let base_v = unwrap_any(self.eval_expr(base)?);
                match base_v {
                    RuntimeValue::Struct(id) => {
                        let HeapObject::Struct { fields, .. } = self.heap.get_mut(id) else { unreachable!() };
                        fields.insert(*field, value);
                        Ok(())
                    }
                    other => Err(not_a(other, "struct", target.loc).into()),
                }
            }
            _ => Err(RuntimeError::Internal { message: format!("{}: invalid assignment target", target.loc) }.into()),
        }
    }

    fn value_type(&self, v: &RuntimeValue) -> TypeDefinition {
        match v {
            RuntimeValue::Undefined => TypeDefinition::Any,
            RuntimeValue::Void => TypeDefinition::Void,
            RuntimeValue::Bool(_) => TypeDefinition::Bool,
            RuntimeValue::Int(_) => TypeDefinition::Int,
            RuntimeValue::Float(_) => TypeDefinition::Float,
            RuntimeValue::Char(_) => TypeDefinition::Char,
            RuntimeValue::String(_) => TypeDefinition::String,
            RuntimeValue::Array(id) => match self.heap.get(*id) {
                HeapObject::Array(items) => match items.first() {
                    Some(first) => TypeDefinition::Array(Box::new(self.value_type(first))),
                    None => TypeDefinition::Array(Box::new(TypeDefinition::Any)),
                },
                _ => TypeDefinition::Array(Box::new(TypeDefinition::Any)),
            },
            RuntimeValue::Struct(id) => match self.heap.get(*id) {
                HeapObject::Struct { ty, .. } => TypeDefinition::Struct(*ty),
                _ => TypeDefinition::Any,
            },
            RuntimeValue::Function(_) => TypeDefinition::Function,
            RuntimeValue::Any(inner) => self.value_type(inner),
            RuntimeValue::Ref(_) => TypeDefinition::Any,
        }
    }

    /// Tries static call resolution first (exactly what the compiler does),
    /// then falls back to evaluating the callee as an ordinary expression
    /// and invoking whatever function value it produces — the same
    /// dynamic-dispatch fallback `compile_call` uses for `CallValue`.
    fn eval_call(&mut self, callee: &Expr, args: &[Expr], at: CodeLoc) -> EvalResult<RuntimeValue> {
        let mut values = Vec::with_capacity(args.len());
        for a in args {
            values.push(self.eval_expr(a)?);
        }
        let arg_types: Vec<TypeDefinition> = values.iter().map(|v| self.value_type(v)).collect();
        let host = Rc::clone(&self.host);
        match typecheck::resolve_callee(self.program, &host, callee, &arg_types, at) {
            Ok(CallTarget::Function(fid)) => self.call_named(fid, values),
            Ok(CallTarget::Host(host_id)) => {
                let unwrapped: Vec<RuntimeValue> = values.into_iter().map(unwrap_any).collect();
                host.call(host_id, unwrapped, &mut self.heap, self.out.as_mut()).map_err(Signal::Fault)
            }
            Err(_) => {
                let callee_v = self.eval_expr(callee)?;
                self.call_value(callee_v, values, at)
            }
        }
    }

    fn call_named(&mut self, id: FunctionId, args: Vec<RuntimeValue>) -> EvalResult<RuntimeValue> {
        let program = self.program;
        let def = program.function(id);
        self.call_body(&def.params, &def.body, args)
    }

    fn call_value(&mut self, callee: RuntimeValue, args: Vec<RuntimeValue>, at: CodeLoc) -> EvalResult<RuntimeValue> {
        let callee = unwrap_any(callee);
        let RuntimeValue::Function(id) = callee else { return Err(not_a(callee, "function", at).into()) };
        match self.heap.get(id).clone() {
            HeapObject::AstClosure(def) => self.call_body(&def.params, &def.body, args),
            HeapObject::Closure { .. } => {
                Err(RuntimeError::Internal { message: format!("{at}: a bytecode closure value cannot be invoked by the tree-walking evaluator") }.into())
            }
            _ => Err(not_a(RuntimeValue::Function(id), "function", at).into()),
        }
    }

    fn call_body(&mut self, params: &[Param], body: &[Stmt], args: Vec<RuntimeValue>) -> EvalResult<RuntimeValue> {
        self.call_depth += 1;
        if self.call_depth > MAX_CALL_DEPTH {
            self.call_depth -= 1;
            return Err(RuntimeError::StackOverflow.into());
        }
        self.scopes.push();
        let result = (|| {
            let has_rest = params.last().is_some_and(|p| p.is_rest);
            let fixed = if has_rest { params.len().saturating_sub(1) } else { params.len() };
            for (i, param) in params.iter().enumerate() {
                if has_rest && i == fixed {
                    let rest_items = args.get(i..).map(|s| s.to_vec()).unwrap_or_default();
                    let id = self.heap.allocate(HeapObject::Array(rest_items));
                    self.declare(param.name, RuntimeValue::Array(id), param.loc)?;
                } else {
                    let v = args.get(i).cloned().unwrap_or(RuntimeValue::Undefined);
                    self.declare(param.name, v, param.loc)?;
                }
            }
            self.exec_block(body)
        })();
        self.finish_scope(&result);
        self.call_depth -= 1;
        match result? {
            Flow::Return(v) => Ok(v),
            _ => Ok(RuntimeValue::Void),
        }
    }
}

fn compound_to_binop(op: CompoundOp) -> BinOp {
    match op {
        CompoundOp::Add => BinOp::Add,
        CompoundOp::Sub => BinOp::Sub,
        CompoundOp::Mul => BinOp::Mul,
        CompoundOp::Div => BinOp::Div,
        CompoundOp::Mod => BinOp::Mod,
        CompoundOp::BitAnd => BinOp::BitAnd,
        CompoundOp::BitOr => BinOp::BitOr,
        CompoundOp::BitXor => BinOp::BitXor,
        CompoundOp::Shl => BinOp::Shl,
        CompoundOp::Shr => BinOp::Shr,
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

fn int_expected(at: CodeLoc) -> Signal {
    Signal::Fault(RuntimeError::Internal { message: format!("{at}: expected an int index") })
}

fn char_expected(at: CodeLoc) -> Signal {
    Signal::Fault(RuntimeError::Internal { message: format!("{at}: assigning into a string requires a char value") })
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::CollectStringPrint;
    use crate::resolver::{load_program, MemoryLoader};

    fn run_with_output(src: &'static str) -> String {
        let loader = MemoryLoader::new([("main", src)]);
        let program = load_program(&loader, "main").unwrap();
        let host = Rc::new(HostRegistry::with_std());
        let mut eval = Evaluator::with_output(&program, host, Box::new(CollectStringPrint::default()));
        eval.run().unwrap();
        "done".to_string()
    }

    /// `index` is the interning order of the identifier across the whole
    /// source (first occurrence wins a slot), matching how `bytecode::vm`'s
    /// own tests read back globals by `StringId::from_index`.
    fn global_int(src: &'static str, index: u16) -> i64 {
        let loader = MemoryLoader::new([("main", src)]);
        let program = load_program(&loader, "main").unwrap();
        let host = Rc::new(HostRegistry::with_std());
        let mut eval = Evaluator::with_output(&program, host, Box::new(CollectStringPrint::default()));
        eval.run().unwrap();
        let id = StringId::from_index(index);
        eval.scopes.resolve_var(id).and_then(|r| eval.scopes.deref(r)).and_then(|v| v.value.as_int()).unwrap()
    }

    #[test]
    fn arithmetic_and_global_assignment() {
        assert_eq!(global_int("let x = 1 + 2 * 3;", 0), 7);
    }

    #[test]
    fn while_loop_accumulates() {
        assert_eq!(global_int("let i = 0; let sum = 0; while (i < 5) { sum = sum + i; i = i + 1; }", 1), 10);
    }

    #[test]
    fn for_loop_continue_skips_the_step_expression() {
        // The loop manually re-bumps `i` before `continue` so the case under
        // test (continue skipping the for-loop's own `i = i + 1` step)
        // doesn't depend on an increment that never happens — it would loop
        // forever if `continue` here also ran the step.
        let src = "let count = 0; for (let i = 0; i < 5; i = i + 1) { if (i == 2) { i = i + 1; continue; } count = count + 1; }";
        assert_eq!(global_int(src, 0), 4);
    }

    #[test]
    fn function_call_returns_value() {
        assert_eq!(global_int("func add(a: int, b: int): int { return a + b; } let r = add(4, 5);", 3), 9);
    }

    #[test]
    fn try_catch_recovers_from_a_throw() {
        assert_eq!(global_int("let x = 0; try { throw 1; } catch (e) { x = 99; }", 0), 99);
    }

    #[test]
    fn calling_a_function_value_held_in_a_local_variable_uses_dynamic_dispatch() {
        let src = "let f = func(a: int): int { return a * 2; }; let r = f(21);";
        assert_eq!(global_int(src, 2), 42);
    }

    #[test]
    fn an_index_out_of_bounds_error_is_caught_by_try_catch() {
        let src = r#"let x = 0; try { let a = [1]; let b = a[5]; } catch (e) { x = 1; }"#;
        assert_eq!(global_int(src, 0), 1);
    }

    #[test]
    fn division_by_zero_is_caught_by_try_catch() {
        let src = "let i = 10; try { i = i / 0; } catch (e) { i = -1; }";
        assert_eq!(global_int(src, 0), -1);
    }

    #[test]
    fn an_uncaught_internal_fault_still_aborts_the_run() {
        let src = "func f(): int { return f(); } let r = f();";
        let loader = MemoryLoader::new([("main", src)]);
        let program = load_program(&loader, "main").unwrap();
        let host = Rc::new(HostRegistry::with_std());
        let mut eval = Evaluator::with_output(&program, host, Box::new(CollectStringPrint::default()));
        let err = eval.run().unwrap_err();
        assert!(matches!(err, RuntimeError::StackOverflow));
    }

    #[test]
    fn println_writes_through_the_host_registry() {
        run_with_output(r#"println("hi");"#);
    }

    #[test]
    fn string_index_assignment_replaces_a_byte_in_place() {
        let src = r#"let s = "hello"; s[0] = 'H'; exit(s == "Hello" ? 0 : 1);"#;
        let loader = MemoryLoader::new([("main", src)]);
        let program = load_program(&loader, "main").unwrap();
        let host = Rc::new(HostRegistry::with_std());
        let mut eval = Evaluator::with_output(&program, host, Box::new(CollectStringPrint::default()));
        match eval.run().unwrap() {
            EvalOutcome::Exited(code) => assert_eq!(code, 0),
            EvalOutcome::Completed => panic!("expected exit(0) after the string mutation round-trips"),
        }
    }

    #[test]
    fn exit_unwinds_every_enclosing_scope_and_reports_its_code() {
        let src = "func f(): int { for (let i = 0; i < 10; i = i + 1) { exit(7); } return 0; } let r = f();";
        let loader = MemoryLoader::new([("main", src)]);
        let program = load_program(&loader, "main").unwrap();
        let host = Rc::new(HostRegistry::with_std());
        let mut eval = Evaluator::with_output(&program, host, Box::new(CollectStringPrint::default()));
        match eval.run().unwrap() {
            EvalOutcome::Exited(code) => assert_eq!(code, 7),
            EvalOutcome::Completed => panic!("expected exit(7) to unwind the whole run"),
        }
    }

    #[test]
    fn exit_is_not_caught_by_try_catch() {
        let src = "let x = 0; try { exit(3); } catch (e) { x = 1; }";
        let loader = MemoryLoader::new([("main", src)]);
        let program = load_program(&loader, "main").unwrap();
        let host = Rc::new(HostRegistry::with_std());
        let mut eval = Evaluator::with_output(&program, host, Box::new(CollectStringPrint::default()));
        match eval.run().unwrap() {
            EvalOutcome::Exited(code) => assert_eq!(code, 3),
            EvalOutcome::Completed => panic!("expected exit(3) to skip the catch block"),
        }
    }
}
