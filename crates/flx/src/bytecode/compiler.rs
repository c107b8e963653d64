//! Compiles a loaded program's function bodies and top-level statements into
//! `Code` objects for the stack VM.
//!
//! Named function calls resolve their target overload once, at compile
//! time, via [`crate::typecheck::resolve_callee`] — the same resolver the
//! semantic analyzer runs to validate the program — and bake the winning
//! [`FunctionId`] directly into the `Call` instruction's operand, so the VM
//! never repeats overload resolution at run time. Calling a value held in a
//! variable (a function literal assigned and invoked later) goes through
//! `CallValue` instead, which looks the callee up dynamically off a
//! heap-allocated closure.
//!
//! Top-level `let`s compile to globals (`LoadGlobal`/`StoreGlobal`, keyed by
//! name) rather than locals, because function bodies need to see them too
//! and this crate has no separate capture pass for the script's own top
//! level. Locals declared inside a function body, or inside any nested
//! block of the top-level script, use slot-addressed `LoadLocal`/
//! `StoreLocal` within that function's own flat slot space; slots are never
//! reused across sibling blocks, trading a slightly larger frame for a
//! simpler compiler.
//!
//! Known simplifications, also recorded in the repository's design notes:
//! a compound assignment or increment/decrement targeting an indexed or
//! field expression recompiles its base/index subexpressions twice (once to
//! load, once to store), so a side-effecting index expression runs twice;
//! `new T[n][m]` only sizes its outermost dimension, leaving inner elements
//! at their tag's default value; a dynamic `CallValue` cannot pack a
//! trailing rest parameter, since the callee's signature isn't known until
//! run time; and a host module name (see `crate::host`) always wins over a
//! program-defined function or local variable of the same name, rather than
//! being shadowable.

use super::builder::CodeBuilder;
use super::code::Code;
use super::opcode::Opcode;
use crate::ast::{BinOp, CompoundOp, Expr, ExprKind, FunctionDef, IncDecOp, Param, Stmt, StmtKind, TypeRef};
use crate::error::SemanticError;
use crate::host::HostRegistry;
use crate::intern::StringId;
use crate::program::Program;
use crate::types::TypeDefinition;
use crate::typecheck::{self, StaticScope};
use crate::value::RuntimeValue;

pub struct CompiledProgram {
    pub main: Code,
    pub functions: Vec<Code>,
}

pub fn compile_program(program: &Program) -> Result<CompiledProgram, SemanticError> {
    compile_program_with_host(program, &HostRegistry::with_std())
}

/// Compiles with an explicit host registry, so a caller that registered
/// additional host modules gets `Opcode::CallHost` calls resolved against
/// them too rather than only the default `flx.std.io` set.
pub fn compile_program_with_host(program: &Program, host: &HostRegistry) -> Result<CompiledProgram, SemanticError> {
    let functions =
        program.functions.iter().map(|def| compile_function(program, host, def)).collect::<Result<Vec<_>, _>>()?;

    let unit = &program.units[program.main_unit];
    let mut fc = FunctionCompiler::new(program, host, true);
    for stmt in &unit.top_level {
        fc.compile_stmt(stmt)?;
    }
    fc.builder.emit(Opcode::Halt);
    let main = fc.finish(0);

    Ok(CompiledProgram { main, functions })
}

fn compile_function(program: &Program, host: &HostRegistry, def: &FunctionDef) -> Result<Code, SemanticError> {
    let mut fc = FunctionCompiler::new(program, host, false);
    for param in &def.params {
        fc.declare_param(param);
    }
    for stmt in &def.body {
        fc.compile_stmt(stmt)?;
    }
    // A function whose every path already returned never reaches here; one
    // that doesn't (only legal when it's declared `void`, per the
    // analyzer's return-completeness check) falls off the end returning
    // `void`.
    let idx = fc.builder.add_const(RuntimeValue::Void);
    fc.builder.emit_u16(Opcode::LoadConst, idx);
    fc.builder.emit(Opcode::Return);
    Ok(fc.finish(def.params.len() as u16))
}

struct LoopCtx {
    continue_target: usize,
    break_labels: Vec<super::builder::JumpLabel>,
}

/// Compiles one function body (or the top-level script) into a `CodeBuilder`.
struct FunctionCompiler<'a> {
    program: &'a Program,
    host: &'a HostRegistry,
    builder: CodeBuilder,
    globals_only: bool,
    locals: Vec<Vec<(StringId, u16)>>,
    next_slot: u16,
    static_scope: StaticScope,
    loops: Vec<LoopCtx>,
}

impl<'a> FunctionCompiler<'a> {
    fn new(program: &'a Program, host: &'a HostRegistry, globals_only: bool) -> Self {
        Self {
            program,
            host,
            builder: CodeBuilder::new(),
            globals_only,
            locals: vec![Vec::new()],
            next_slot: 0,
            static_scope: StaticScope::new(),
            loops: Vec::new(),
        }
    }

    fn finish(self, num_params: u16) -> Code {
        self.builder.build(self.next_slot, num_params)
    }

    fn declare_param(&mut self, param: &Param) {
        let slot = self.next_slot;
        self.next_slot += 1;
        self.locals.last_mut().unwrap().push((param.name, slot));
        self.builder.name_local(slot, param.name);
        self.static_scope.declare(param.name, typecheck::resolve_type_ref(&param.ty));
    }

    fn push_block(&mut self) {
        self.locals.push(Vec::new());
        self.static_scope.push();
    }

    fn pop_block(&mut self) {
        self.locals.pop();
        self.static_scope.pop();
    }

    fn find_local(&self, name: StringId) -> Option<u16> {
        self.locals.iter().rev().find_map(|block| block.iter().rev().find(|(n, _)| *n == name).map(|(_, slot)| *slot))
    }

    fn declare_local(&mut self, name: StringId, ty: TypeDefinition) -> u16 {
        let slot = self.next_slot;
        self.next_slot += 1;
        self.locals.last_mut().unwrap().push((name, slot));
        self.builder.name_local(slot, name);
        self.static_scope.declare(name, ty);
        slot
    }

    fn emit_load_const(&mut self, value: RuntimeValue) {
        let idx = self.builder.add_const(value);
        self.builder.emit_u16(Opcode::LoadConst, idx);
    }

    fn infer(&self, expr: &Expr) -> Result<TypeDefinition, SemanticError> {
        typecheck::infer(expr, &self.static_scope, self.program, self.host)
    }

    fn compile_stmt(&mut self, stmt: &Stmt) -> Result<(), SemanticError> {
        self.builder.set_location(stmt.loc);
        match &stmt.kind {
            StmtKind::Expr(e) => {
                self.compile_expr(e)?;
                self.builder.emit(Opcode::Pop);
            }
            StmtKind::VarDecl { name, ty, is_const: _, init } => {
                let declared_ty = match (ty, init) {
                    (Some(t), _) => typecheck::resolve_type_ref(t),
                    (None, Some(e)) => self.infer(e)?,
                    (None, None) => TypeDefinition::Any,
                };
                match init {
                    Some(e) => self.compile_expr(e)?,
                    None => self.emit_load_const(RuntimeValue::Undefined),
                }
                if self.globals_only && self.locals.len() == 1 {
                    self.static_scope.declare(*name, declared_ty);
                    self.builder.emit_u16(Opcode::StoreGlobal, name.index() as u16);
                } else {
                    let slot = self.declare_local(*name, declared_ty);
                    self.builder.emit_u16(Opcode::StoreLocal, slot);
                }
            }
            StmtKind::Block(body) => {
                self.push_block();
                for s in body {
                    self.compile_stmt(s)?;
                }
                self.pop_block();
            }
            StmtKind::If { cond, then_branch, else_branch } => {
                self.compile_expr(cond)?;
                let else_label = self.builder.emit_jump(Opcode::JumpIfFalse);
                self.compile_stmt(then_branch)?;
                if let Some(else_branch) = else_branch {
                    let end_label = self.builder.emit_jump(Opcode::Jump);
                    self.builder.patch_jump(else_label);
                    self.compile_stmt(else_branch)?;
                    self.builder.patch_jump(end_label);
                } else {
                    self.builder.patch_jump(else_label);
                }
            }
            StmtKind::While { cond, body } => {
                let cond_pos = self.builder.position();
                self.compile_expr(cond)?;
                let exit_label = self.builder.emit_jump(Opcode::JumpIfFalse);
                self.loops.push(LoopCtx { continue_target: cond_pos, break_labels: Vec::new() });
                self.compile_stmt(body)?;
                self.builder.emit_jump_to(Opcode::Jump, cond_pos);
                self.builder.patch_jump(exit_label);
                let ctx = self.loops.pop().unwrap();
                for label in ctx.break_labels {
                    self.builder.patch_jump(label);
                }
            }
            StmtKind::DoWhile { body, cond } => {
                let body_pos = self.builder.position();
                self.loops.push(LoopCtx { continue_target: body_pos, break_labels: Vec::new() });
                self.compile_stmt(body)?;
                self.compile_expr(cond)?;
                self.builder.emit_jump_to(Opcode::JumpIfTrue, body_pos);
                let ctx = self.loops.pop().unwrap();
                for label in ctx.break_labels {
                    self.builder.patch_jump(label);
                }
            }
            StmtKind::For { init, cond, step, body } => {
                self.push_block();
                if let Some(init) = init {
                    self.compile_stmt(init)?;
                }
                let cond_pos = self.builder.position();
                let exit_label = match cond {
                    Some(c) => {
                        self.compile_expr(c)?;
                        Some(self.builder.emit_jump(Opcode::JumpIfFalse))
                    }
                    None => None,
                };
                self.loops.push(LoopCtx { continue_target: cond_pos, break_labels: Vec::new() });
                self.compile_stmt(body)?;
                if let Some(step) = step {
                    self.compile_expr(step)?;
                    self.builder.emit(Opcode::Pop);
                }
                self.builder.emit_jump_to(Opcode::Jump, cond_pos);
                if let Some(label) = exit_label {
                    self.builder.patch_jump(label);
                }
                let ctx = self.loops.pop().unwrap();
                for label in ctx.break_labels {
                    self.builder.patch_jump(label);
                }
                self.pop_block();
            }
            StmtKind::Foreach { binding, binding_ty, iterable, body } => {
                self.push_block();
                let elem_ty = match self.infer(iterable)? {
                    TypeDefinition::Array(elem) => *elem,
                    _ => TypeDefinition::Any,
                };
                self.compile_expr(iterable)?;
                let arr_slot = self.declare_local(StringId::from_index(u16::MAX), elem_ty.clone());
                self.builder.emit_u16(Opcode::StoreLocal, arr_slot);
                self.emit_load_const(RuntimeValue::Int(0));
                let idx_slot = self.declare_local(StringId::from_index(u16::MAX - 1), TypeDefinition::Int);
                self.builder.emit_u16(Opcode::StoreLocal, idx_slot);

                let cond_pos = self.builder.position();
                self.builder.emit_u16(Opcode::LoadLocal, idx_slot);
                self.builder.emit_u16(Opcode::LoadLocal, arr_slot);
                self.builder.emit(Opcode::ArrayLen);
                self.builder.emit_u8(Opcode::BinaryOp, BinOp::Less as u8);
                let exit_label = self.builder.emit_jump(Opcode::JumpIfFalse);

                self.builder.emit_u16(Opcode::LoadLocal, arr_slot);
                self.builder.emit_u16(Opcode::LoadLocal, idx_slot);
                self.builder.emit(Opcode::LoadIndex);
                let binding_ty = binding_ty.as_ref().map(typecheck::resolve_type_ref).unwrap_or(elem_ty);
                let binding_slot = self.declare_local(*binding, binding_ty);
                self.builder.emit_u16(Opcode::StoreLocal, binding_slot);

                self.loops.push(LoopCtx { continue_target: cond_pos, break_labels: Vec::new() });
                self.compile_stmt(body)?;
                self.builder.emit_u16(Opcode::LoadLocal, idx_slot);
                self.emit_load_const(RuntimeValue::Int(1));
                self.builder.emit_u8(Opcode::BinaryOp, BinOp::Add as u8);
                self.builder.emit_u16(Opcode::StoreLocal, idx_slot);
                self.builder.emit_jump_to(Opcode::Jump, cond_pos);
                self.builder.patch_jump(exit_label);
                let ctx = self.loops.pop().unwrap();
                for label in ctx.break_labels {
                    self.builder.patch_jump(label);
                }
                self.pop_block();
            }
            StmtKind::Switch { subject, cases, default } => {
                self.compile_expr(subject)?;
                let mut end_labels = Vec::new();
                for case in cases {
                    self.builder.emit(Opcode::Dup);
                    self.compile_expr(&case.value)?;
                    self.builder.emit_u8(Opcode::BinaryOp, BinOp::Eq as u8);
                    let next_label = self.builder.emit_jump(Opcode::JumpIfFalse);
                    self.builder.emit(Opcode::Pop);
                    self.push_block();
                    for s in &case.body {
                        self.compile_stmt(s)?;
                    }
                    self.pop_block();
                    end_labels.push(self.builder.emit_jump(Opcode::Jump));
                    self.builder.patch_jump(next_label);
                }
                self.builder.emit(Opcode::Pop);
                if let Some(default) = default {
                    self.push_block();
                    for s in default {
                        self.compile_stmt(s)?;
                    }
                    self.pop_block();
                }
                for label in end_labels {
                    self.builder.patch_jump(label);
                }
            }
            StmtKind::Break => {
                let label = self.builder.emit_jump(Opcode::Jump);
                self.loops.last_mut().expect("break outside a loop").break_labels.push(label);
            }
            StmtKind::Continue => {
                let target = self.loops.last().expect("continue outside a loop").continue_target;
                self.builder.emit_jump_to(Opcode::Jump, target);
            }
            StmtKind::Return(value) => {
                match value {
                    Some(e) => self.compile_expr(e)?,
                    None => self.emit_load_const(RuntimeValue::Void),
                }
                self.builder.emit(Opcode::Return);
            }
            StmtKind::Exit(code) => {
                self.compile_expr(code)?;
                self.builder.emit(Opcode::Exit);
            }
            StmtKind::Try { body, catch_binding, catch_body } => {
                let start = self.builder.position();
                self.builder.emit(Opcode::PushTryBarrier);
                self.push_block();
                for s in body {
                    self.compile_stmt(s)?;
                }
                self.pop_block();
                self.builder.emit(Opcode::PopTryBarrier);
                let end = self.builder.position();
                let end_label = self.builder.emit_jump(Opcode::Jump);
                let handler = self.builder.position();
                self.push_block();
                if let Some(name) = catch_binding {
                    let slot = self.declare_local(*name, TypeDefinition::Any);
                    self.builder.emit_u16(Opcode::StoreLocal, slot);
                } else {
                    self.builder.emit(Opcode::Pop);
                }
                for s in catch_body {
                    self.compile_stmt(s)?;
                }
                self.pop_block();
                self.builder.patch_jump(end_label);
                self.builder.push_exception_handler(start as u32, end as u32, handler as u32, 0);
            }
            StmtKind::Throw(e) => {
                self.compile_expr(e)?;
                self.builder.emit(Opcode::Throw);
            }
            StmtKind::FunctionDecl(_) | StmtKind::StructDecl(_) => {}
        }
        Ok(())
    }

    fn compile_expr(&mut self, expr: &Expr) -> Result<(), SemanticError> {
        self.builder.set_location(expr.loc);
        match &expr.kind {
            ExprKind::IntLit(v) => self.emit_load_const(RuntimeValue::Int(*v)),
            ExprKind::FloatLit(v) => self.emit_load_const(RuntimeValue::Float(*v)),
            ExprKind::BoolLit(v) => self.emit_load_const(RuntimeValue::Bool(*v)),
            ExprKind::CharLit(v) => self.emit_load_const(RuntimeValue::Char(*v)),
            ExprKind::StringLit(s) => {
                let idx = self.builder.add_const_string(s.clone());
                self.builder.emit_u16(Opcode::LoadConst, idx);
            }
            ExprKind::NullLit => self.emit_load_const(RuntimeValue::Undefined),
            ExprKind::Identifier(name) => self.compile_load_name(*name),
            ExprKind::ArrayLit(items) => {
                for item in items {
                    self.compile_expr(item)?;
                }
                self.builder.emit_u16(Opcode::NewArray, items.len() as u16);
            }
            ExprKind::StructLit { ty, fields } => self.compile_struct_lit(*ty, fields, expr)?,
            ExprKind::New { ty, dims } => {
                match dims.first() {
                    Some(first) => self.compile_expr(first)?,
                    None => self.emit_load_const(RuntimeValue::Int(0)),
                }
                let tag = typecheck::resolve_type_ref(ty).tag();
                self.builder.emit_u8(Opcode::NewArrayDefault, tag as u8);
            }
            ExprKind::Unary(op, inner) => {
                self.compile_expr(inner)?;
                self.builder.emit_u8(Opcode::UnaryOp, *op as u8);
            }
            ExprKind::Binary(op, lhs, rhs) => {
                self.compile_expr(lhs)?;
                self.compile_expr(rhs)?;
                self.builder.emit_u8(Opcode::BinaryOp, *op as u8);
            }
            ExprKind::Ternary(cond, a, b) => {
                self.compile_expr(cond)?;
                let else_label = self.builder.emit_jump(Opcode::JumpIfFalse);
                self.compile_expr(a)?;
                let end_label = self.builder.emit_jump(Opcode::Jump);
                self.builder.patch_jump(else_label);
                self.compile_expr(b)?;
                self.builder.patch_jump(end_label);
            }
            ExprKind::Assign(target, value) => {
                self.compile_expr(value)?;
                self.builder.emit(Opcode::Dup);
                self.compile_store(target)?;
            }
            ExprKind::CompoundAssign(op, target, value) => {
                self.compile_expr(target)?;
                self.compile_expr(value)?;
                self.builder.emit_u8(Opcode::BinaryOp, compound_to_binop(*op) as u8);
                self.builder.emit(Opcode::Dup);
                self.compile_store(target)?;
            }
            ExprKind::IncDec(op, target, prefix) => {
                self.compile_expr(target)?;
                if !*prefix {
                    self.builder.emit(Opcode::Dup);
                }
                self.emit_load_const(RuntimeValue::Int(1));
                let binop = match op {
                    IncDecOp::Inc => BinOp::Add,
                    IncDecOp::Dec => BinOp::Sub,
                };
                self.builder.emit_u8(Opcode::BinaryOp, binop as u8);
                if *prefix {
                    self.builder.emit(Opcode::Dup);
                }
                self.compile_store(target)?;
            }
            ExprKind::Call { callee, args } => self.compile_call(callee, args, expr)?,
            ExprKind::Index(base, index) => {
                self.compile_expr(base)?;
                self.compile_expr(index)?;
                self.builder.emit(Opcode::LoadIndex);
            }
            ExprKind::Field(base, field) => {
                self.compile_expr(base)?;
                self.builder.emit_u16(Opcode::LoadField, field.index() as u16);
            }
            ExprKind::NsAccess(_, name) => self.compile_load_name(*name),
            ExprKind::FunctionLit { params, ret: _, body } => {
                let synthetic = FunctionDef {
                    name: StringId::from_index(0),
                    params: params.clone(),
                    ret: TypeRef::Any,
                    body: body.clone(),
                    namespace: Vec::new(),
                    loc: expr.loc,
                };
                let code = compile_function(self.program, self.host, &synthetic)?;
                let idx = self.builder.add_nested_code(code);
                self.builder.emit_u16(Opcode::MakeClosure, idx);
            }
            ExprKind::Ref(inner) => {
                self.compile_expr(inner)?;
                self.builder.emit(Opcode::Ref);
            }
            ExprKind::Unref(inner) => {
                self.compile_expr(inner)?;
                self.builder.emit(Opcode::Unref);
            }
            ExprKind::TypeId(inner) => {
                self.compile_expr(inner)?;
                self.builder.emit(Opcode::TypeId);
            }
            ExprKind::TypeOf(ty) => {
                let def = typecheck::resolve_type_ref(ty);
                self.emit_load_const(RuntimeValue::Int(def.tag() as i64));
            }
            ExprKind::RefId(inner) => {
                self.compile_expr(inner)?;
                self.builder.emit(Opcode::RefId);
            }
            ExprKind::IsAny(inner) => {
                self.compile_expr(inner)?;
                self.builder.emit(Opcode::IsAny);
            }
            ExprKind::IsArray(inner) => {
                self.compile_expr(inner)?;
                self.builder.emit(Opcode::IsArray);
            }
            ExprKind::IsStruct(inner) => {
                self.compile_expr(inner)?;
                self.builder.emit(Opcode::IsStruct);
            }
        }
        Ok(())
    }

    fn compile_struct_lit(&mut self, ty: StringId, fields: &[(StringId, Expr)], expr: &Expr) -> Result<(), SemanticError> {
        let def = self
            .program
            .find_struct(ty)
            .ok_or_else(|| SemanticError::UnknownType { name: self.program.resolve_name(ty).to_string(), at: expr.loc })?;
        let mut ordered: Vec<Option<&Expr>> = vec![None; def.fields.len()];
        for (fname, fexpr) in fields {
            let pos = def.fields.iter().position(|f| f.name == *fname).ok_or_else(|| SemanticError::UnknownField {
                ty: self.program.resolve_name(ty).to_string(),
                field: self.program.resolve_name(*fname).to_string(),
                at: expr.loc,
            })?;
            ordered[pos] = Some(fexpr);
        }
        for (i, slot) in ordered.into_iter().enumerate() {
            match slot {
                Some(fexpr) => self.compile_expr(fexpr)?,
                None => match &def.fields[i].default {
                    Some(d) => self.compile_expr(d)?,
                    None => self.emit_load_const(RuntimeValue::Undefined),
                },
            }
        }
        self.builder.emit_u16(Opcode::NewStruct, ty.index() as u16);
        Ok(())
    }

    fn compile_call(&mut self, callee: &Expr, args: &[Expr], expr: &Expr) -> Result<(), SemanticError> {
        let arg_types = args.iter().map(|a| self.infer(a)).collect::<Result<Vec<_>, _>>()?;
        match typecheck::resolve_callee(self.program, self.host, callee, &arg_types, expr.loc) {
            Ok(typecheck::CallTarget::Function(fid)) => {
                let def = self.program.function(fid);
                let has_rest = def.params.last().is_some_and(|p| p.is_rest);
                let fixed = if has_rest { def.params.len() - 1 } else { def.params.len() };
                let fixed = fixed.min(args.len());
                for arg in &args[..fixed] {
                    self.compile_expr(arg)?;
                }
                if has_rest {
                    for arg in &args[fixed..] {
                        self.compile_expr(arg)?;
                    }
                    self.builder.emit_u16(Opcode::NewArray, (args.len() - fixed) as u16);
                }
                self.builder.emit_u16(Opcode::Call, fid.index() as u16);
            }
            Ok(typecheck::CallTarget::Host(host_id)) => {
                for arg in args {
                    self.compile_expr(arg)?;
                }
                self.builder.emit_u16(Opcode::CallHost, host_id);
            }
            Err(_) => {
                self.compile_expr(callee)?;
                for arg in args {
                    self.compile_expr(arg)?;
                }
                self.builder.emit_u16(Opcode::CallValue, args.len() as u16);
            }
        }
        Ok(())
    }

    fn compile_load_name(&mut self, name: StringId) {
        match self.find_local(name) {
            Some(slot) => self.builder.emit_u16(Opcode::LoadLocal, slot),
            None => self.builder.emit_u16(Opcode::LoadGlobal, name.index() as u16),
        }
    }

    fn compile_store(&mut self, target: &Expr) -> Result<(), SemanticError> {
        match &target.kind {
            ExprKind::Identifier(name) | ExprKind::NsAccess(_, name) => match self.find_local(*name) {
                Some(slot) => self.builder.emit_u16(Opcode::StoreLocal, slot),
                None => self.builder.emit_u16(Opcode::StoreGlobal, name.index() as u16),
            },
            ExprKind::Index(base, index) => {
                self.compile_expr(base)?;
                self.compile_expr(index)?;
                self.builder.emit(Opcode::StoreIndex);
            }
            ExprKind::Field(base, field) => {
                self.compile_expr(base)?;
                self.builder.emit_u16(Opcode::StoreField, field.index() as u16);
            }
            _ => return Err(SemanticError::NotCallable { name: "<expression>".to_string(), at: target.loc }),
        }
        Ok(())
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{load_program, MemoryLoader};

    fn compile(src: &'static str) -> CompiledProgram {
        let loader = MemoryLoader::new([("main", src)]);
        let program = load_program(&loader, "main").unwrap();
        compile_program(&program).unwrap()
    }

    #[test]
    fn compiles_a_top_level_let_into_store_global() {
        let compiled = compile("let x = 1;");
        assert!(compiled.main.bytecode().contains(&Opcode::StoreGlobal.as_byte()));
    }

    #[test]
    fn compiles_an_if_statement_with_a_jump() {
        let compiled = compile("if (true) { let x = 1; }");
        assert!(compiled.main.bytecode().contains(&Opcode::JumpIfFalse.as_byte()));
    }

    #[test]
    fn compiles_a_while_loop_back_edge() {
        let compiled = compile("let i = 0; while (i < 10) { i = i + 1; }");
        assert!(compiled.main.bytecode().contains(&Opcode::Jump.as_byte()));
    }

    #[test]
    fn calling_a_declared_function_bakes_in_its_function_id() {
        let compiled = compile("func add(a: int, b: int): int { return a + b; } let r = add(1, 2);");
        assert!(compiled.main.bytecode().contains(&Opcode::Call.as_byte()));
        assert_eq!(compiled.functions.len(), 1);
    }

    #[test]
    fn calling_print_emits_call_host() {
        let compiled = compile(r#"println("hi");"#);
        assert!(compiled.main.bytecode().contains(&Opcode::CallHost.as_byte()));
    }
}
