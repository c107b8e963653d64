//! Static type inference and call-target resolution shared by the semantic
//! analyzer and both execution engines.
//!
//! Keeping this in one place means the analyzer's type-checking, the
//! compiler's overload resolution and the evaluator's overload resolution
//! can never disagree about which overload a call binds to — they all call
//! `resolve_call_by_name`.
//!
//! Function and structure names are resolved globally across every
//! namespace rather than scoped strictly to the caller's namespace plus its
//! `using` imports. A stricter resolver would thread the importing file's
//! `include`/`exclude` filter through every lookup; this crate treats names
//! as unique across a program instead, which is simpler and sufficient for
//! the programs this language is meant to run.

use crate::ast::{BinOp, Expr, ExprKind, TypeRef};
use crate::error::{CodeLoc, SemanticError};
use crate::function::{resolve_overload, Signature};
use crate::host::HostRegistry;
use crate::intern::{FunctionId, StringId};
use crate::program::Program;
use crate::types::{TypeDefinition, TypeTag};
use ahash::AHashMap;

/// What a call expression's callee resolved to: a program-defined function
/// overload, or a host module entry (see `crate::host`). Host functions
/// aren't overloaded, so resolving one only checks arity, not argument
/// types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallTarget {
    Function(FunctionId),
    Host(u16),
}

pub fn resolve_type_ref(ty: &TypeRef) -> TypeDefinition {
    match ty {
        TypeRef::Void => TypeDefinition::Void,
        TypeRef::Bool => TypeDefinition::Bool,
        TypeRef::Int => TypeDefinition::Int,
        TypeRef::Float => TypeDefinition::Float,
        TypeRef::Char => TypeDefinition::Char,
        TypeRef::String => TypeDefinition::String,
        TypeRef::Any => TypeDefinition::Any,
        TypeRef::Function => TypeDefinition::Function,
        TypeRef::Array(inner) => TypeDefinition::Array(Box::new(resolve_type_ref(inner))),
        TypeRef::Struct(name) => TypeDefinition::Struct(*name),
    }
}

/// Tracks the declared type of every variable visible at one point in a
/// function body, as a stack of lexical scopes (innermost last).
#[derive(Debug, Default)]
pub struct StaticScope {
    frames: Vec<AHashMap<StringId, TypeDefinition>>,
}

impl StaticScope {
    pub fn new() -> Self {
        Self { frames: vec![AHashMap::default()] }
    }

    pub fn push(&mut self) {
        self.frames.push(AHashMap::default());
    }

    pub fn pop(&mut self) {
        assert!(self.frames.len() > 1, "cannot pop the outermost static scope");
        self.frames.pop();
    }

    pub fn declare(&mut self, name: StringId, ty: TypeDefinition) {
        self.frames.last_mut().unwrap().insert(name, ty);
    }

    pub fn lookup(&self, name: StringId) -> Option<&TypeDefinition> {
        self.frames.iter().rev().find_map(|f| f.get(&name))
    }
}

fn binary_result_type(op: BinOp, l: &TypeDefinition, r: &TypeDefinition) -> TypeDefinition {
    use BinOp::*;
    match op {
        And | Or | Eq | NotEq | Less | LessEq | Greater | GreaterEq => TypeDefinition::Bool,
        Add if l.tag() == TypeTag::String || r.tag() == TypeTag::String => TypeDefinition::String,
        Add if l.tag() == TypeTag::Array => l.clone(),
        Add if r.tag() == TypeTag::Array => r.clone(),
        _ if l.tag() == TypeTag::Float || r.tag() == TypeTag::Float => TypeDefinition::Float,
        _ => TypeDefinition::Int,
    }
}

/// Resolves `name` against every overload registered under it anywhere in
/// the program, selecting the best match for `args` via the same three-pass
/// algorithm used everywhere else. Checks `host` first: a host module name
/// always wins over a program-defined function of the same name, since host
/// names form a separate, non-overloaded namespace.
pub fn resolve_call_by_name(
    program: &Program,
    host: &HostRegistry,
    name: StringId,
    name_str: &str,
    args: &[TypeDefinition],
    at: CodeLoc,
) -> Result<CallTarget, SemanticError> {
    if let Some(host_id) = host.resolve(name_str) {
        let sig = host.signature(host_id);
        if args.len() != sig.params.len() {
            return Err(SemanticError::NoMatchingOverload { name: name_str.to_string(), at });
        }
        return Ok(CallTarget::Host(host_id));
    }

    let candidates: Vec<FunctionId> =
        program.namespaces.values().flat_map(|ns| ns.functions.get(&name).cloned().unwrap_or_default()).collect();
    if candidates.is_empty() {
        return Err(SemanticError::UndefinedName { name: name_str.to_string(), at });
    }
    let sigs: Vec<(FunctionId, Signature)> = candidates
        .iter()
        .map(|&id| {
            let def = program.function(id);
            (id, Signature::from_params(&def.params, resolve_type_ref(&def.ret), |t| resolve_type_ref(t)))
        })
        .collect();
    resolve_overload(name_str, &sigs, args, at).map(CallTarget::Function)
}

fn callee_name(callee: &Expr) -> Option<StringId> {
    match &callee.kind {
        ExprKind::Identifier(name) => Some(*name),
        ExprKind::NsAccess(_, name) => Some(*name),
        _ => None,
    }
}

/// Resolves a call expression's callee to a concrete overload or host
/// function, given the already-inferred types of its arguments.
pub fn resolve_callee(
    program: &Program,
    host: &HostRegistry,
    callee: &Expr,
    args: &[TypeDefinition],
    at: CodeLoc,
) -> Result<CallTarget, SemanticError> {
    let name = callee_name(callee).ok_or_else(|| SemanticError::NotCallable { name: "<expression>".to_string(), at })?;
    resolve_call_by_name(program, host, name, program.resolve_name(name), args, at)
}

/// Infers the static type of `expr`, resolving identifier and call types
/// against `scope`/`program`/`host`. Used both by the analyzer (to check
/// assignability) and by the compiler/evaluator (to pick an overload).
pub fn infer(expr: &Expr, scope: &StaticScope, program: &Program, host: &HostRegistry) -> Result<TypeDefinition, SemanticError> {
    match &expr.kind {
        ExprKind::IntLit(_) => Ok(TypeDefinition::Int),
        ExprKind::FloatLit(_) => Ok(TypeDefinition::Float),
        ExprKind::BoolLit(_) => Ok(TypeDefinition::Bool),
        ExprKind::CharLit(_) => Ok(TypeDefinition::Char),
        ExprKind::StringLit(_) => Ok(TypeDefinition::String),
        ExprKind::NullLit => Ok(TypeDefinition::Any),
        ExprKind::Identifier(name) => scope
            .lookup(*name)
            .cloned()
            .ok_or_else(|| SemanticError::UndefinedName { name: program.resolve_name(*name).to_string(), at: expr.loc }),
        ExprKind::ArrayLit(items) => {
            let elem = match items.first() {
                Some(first) => infer(first, scope, program, host)?,
                None => TypeDefinition::Any,
            };
            Ok(TypeDefinition::Array(Box::new(elem)))
        }
        ExprKind::StructLit { ty, .. } => Ok(TypeDefinition::Struct(*ty)),
        ExprKind::New { ty, .. } => Ok(resolve_type_ref(ty)),
        ExprKind::Unary(_, inner) => infer(inner, scope, program, host),
        ExprKind::Binary(op, lhs, rhs) => {
            let l = infer(lhs, scope, program, host)?;
            let r = infer(rhs, scope, program, host)?;
            Ok(binary_result_type(*op, &l, &r))
        }
        ExprKind::Ternary(_, a, b) => infer(a, scope, program, host).or_else(|_| infer(b, scope, program, host)),
        ExprKind::Assign(target, _) => infer(target, scope, program, host),
        ExprKind::CompoundAssign(_, target, _) => infer(target, scope, program, host),
        ExprKind::IncDec(_, target, _) => infer(target, scope, program, host),
        ExprKind::Call { callee, args } => {
            let arg_types = args.iter().map(|a| infer(a, scope, program, host)).collect::<Result<Vec<_>, _>>()?;
            match resolve_callee(program, host, callee, &arg_types, expr.loc)? {
                CallTarget::Function(id) => Ok(resolve_type_ref(&program.function(id).ret)),
                CallTarget::Host(id) => Ok(host.signature(id).ret),
            }
        }
        ExprKind::Index(arr, _) => match infer(arr, scope, program, host)? {
            TypeDefinition::Array(elem) => Ok(*elem),
            _ => Ok(TypeDefinition::Any),
        },
        ExprKind::Field(base, field) => {
            let base_ty = infer(base, scope, program, host)?;
            let TypeDefinition::Struct(sname) = base_ty else { return Ok(TypeDefinition::Any) };
            let Some(def) = program.find_struct(sname) else { return Ok(TypeDefinition::Any) };
            match def.fields.iter().find(|f| f.name == *field) {
                Some(f) => Ok(resolve_type_ref(&f.ty)),
                None => Err(SemanticError::UnknownField {
                    ty: program.resolve_name(sname).to_string(),
                    field: program.resolve_name(*field).to_string(),
                    at: expr.loc,
                }),
            }
        }
        ExprKind::NsAccess(_, name) => scope
            .lookup(*name)
            .cloned()
            .ok_or_else(|| SemanticError::UndefinedName { name: program.resolve_name(*name).to_string(), at: expr.loc }),
        ExprKind::FunctionLit { .. } => Ok(TypeDefinition::Function),
        ExprKind::Ref(_) => Ok(TypeDefinition::Any),
        ExprKind::Unref(inner) => infer(inner, scope, program, host),
        ExprKind::TypeId(_) | ExprKind::TypeOf(_) | ExprKind::RefId(_) => Ok(TypeDefinition::Int),
        ExprKind::IsAny(_) | ExprKind::IsArray(_) | ExprKind::IsStruct(_) => Ok(TypeDefinition::Bool),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;
    use crate::error::CodeLoc;
    use crate::intern::{Interns, StringId};
    use ahash::AHashMap;

    fn empty_program() -> Program {
        Program {
            interns: Interns::new(vec!["x".to_string()]),
            functions: Vec::new(),
            structs: Vec::new(),
            units: Vec::new(),
            main_unit: 0,
            namespaces: AHashMap::default(),
        }
    }

    #[test]
    fn identifier_resolves_through_declared_scope() {
        let program = empty_program();
        let host = HostRegistry::with_std();
        let mut scope = StaticScope::new();
        let x = StringId::from_index(0);
        scope.declare(x, TypeDefinition::Int);
        let expr = Expr { kind: ExprKind::Identifier(x), loc: CodeLoc::default() };
        assert_eq!(infer(&expr, &scope, &program, &host).unwrap(), TypeDefinition::Int);
    }

    #[test]
    fn undeclared_identifier_is_undefined_name() {
        let program = empty_program();
        let host = HostRegistry::with_std();
        let scope = StaticScope::new();
        let x = StringId::from_index(0);
        let expr = Expr { kind: ExprKind::Identifier(x), loc: CodeLoc::default() };
        assert!(matches!(infer(&expr, &scope, &program, &host), Err(SemanticError::UndefinedName { .. })));
    }

    #[test]
    fn string_plus_anything_is_string() {
        let program = empty_program();
        let host = HostRegistry::with_std();
        let scope = StaticScope::new();
        let lhs = Expr { kind: ExprKind::StringLit("a".into()), loc: CodeLoc::default() };
        let rhs = Expr { kind: ExprKind::IntLit(1), loc: CodeLoc::default() };
        let expr = Expr { kind: ExprKind::Binary(BinOp::Add, Box::new(lhs), Box::new(rhs)), loc: CodeLoc::default() };
        assert_eq!(infer(&expr, &scope, &program, &host).unwrap(), TypeDefinition::String);
    }

    #[test]
    fn a_host_call_resolves_its_declared_return_type() {
        let mut program = empty_program();
        program.interns = Interns::new(vec!["read_line".to_string()]);
        let host = HostRegistry::with_std();
        let scope = StaticScope::new();
        let callee = Expr { kind: ExprKind::Identifier(StringId::from_index(0)), loc: CodeLoc::default() };
        let expr = Expr { kind: ExprKind::Call { callee: Box::new(callee), args: vec![] }, loc: CodeLoc::default() };
        assert_eq!(infer(&expr, &scope, &program, &host).unwrap(), TypeDefinition::String);
    }

    #[test]
    fn calling_a_host_function_with_the_wrong_arity_is_rejected() {
        let mut program = empty_program();
        program.interns = Interns::new(vec!["println".to_string()]);
        let host = HostRegistry::with_std();
        let callee = Expr { kind: ExprKind::Identifier(StringId::from_index(0)), loc: CodeLoc::default() };
        let err = resolve_callee(&program, &host, &callee, &[], CodeLoc::default());
        assert!(matches!(err, Err(SemanticError::NoMatchingOverload { .. })));
    }
}
