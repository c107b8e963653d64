//! Function signatures and the three-pass overload selection algorithm.
//!
//! Selection runs in three passes, most-specific first, exactly as laid
//! out by the design notes: (1) a candidate whose parameter types are an
//! exact match for every argument wins outright; (2) failing that, a
//! candidate reachable purely by numeric promotion (`int` -> `float`,
//! `bool` -> `int`/`float`) is used; (3) failing that, a candidate whose
//! unmatched parameters are typed `any` is used. More than one equally
//! good candidate surviving its pass is an `AmbiguousOverload` error;
//! zero candidates surviving all three passes is `NoMatchingOverload`.

use crate::ast::Param;
use crate::error::{CodeLoc, SemanticError};
use crate::intern::FunctionId;
use crate::types::{TypeDefinition, TypeTag};

#[derive(Debug, Clone)]
pub struct Signature {
    pub params: Vec<TypeDefinition>,
    pub has_rest: bool,
    pub ret: TypeDefinition,
}

impl Signature {
    pub fn from_params(params: &[Param], ret: TypeDefinition, resolve: impl Fn(&crate::ast::TypeRef) -> TypeDefinition) -> Self {
        Self {
            params: params.iter().map(|p| resolve(&p.ty)).collect(),
            has_rest: params.last().is_some_and(|p| p.is_rest),
            ret,
        }
    }

    fn accepts_arity(&self, argc: usize) -> bool {
        if self.has_rest {
            argc + 1 >= self.params.len()
        } else {
            argc == self.params.len()
        }
    }

    fn param_at(&self, index: usize) -> &TypeDefinition {
        if self.has_rest && index >= self.params.len() - 1 {
            self.params.last().unwrap()
        } else {
            &self.params[index]
        }
    }
}

fn is_exact(param: &TypeDefinition, arg: &TypeDefinition) -> bool {
    param.tag() == arg.tag()
        && match (param, arg) {
            (TypeDefinition::Struct(a), TypeDefinition::Struct(b)) => a == b,
            (TypeDefinition::Array(a), TypeDefinition::Array(b)) => is_exact(a, b),
            _ => true,
        }
}

fn is_numeric_promotion(param: &TypeDefinition, arg: &TypeDefinition) -> bool {
    matches!(
        (param.tag(), arg.tag()),
        (TypeTag::Float, TypeTag::Int) | (TypeTag::Float, TypeTag::Bool) | (TypeTag::Int, TypeTag::Bool)
    )
}

fn is_any_fallback(param: &TypeDefinition, _arg: &TypeDefinition) -> bool {
    param.tag() == TypeTag::Any
}

/// Selects the best-matching overload among `candidates` for the given
/// argument types. `name` and `at` are only used for error reporting.
pub fn resolve_overload(
    name: &str,
    candidates: &[(FunctionId, Signature)],
    args: &[TypeDefinition],
    at: CodeLoc,
) -> Result<FunctionId, SemanticError> {
    let arity_ok: Vec<_> = candidates.iter().filter(|(_, sig)| sig.accepts_arity(args.len())).collect();
    if arity_ok.is_empty() {
        return Err(SemanticError::NoMatchingOverload { name: name.to_string(), at });
    }

    for pass in [is_exact, is_numeric_promotion, is_any_fallback] as [fn(&TypeDefinition, &TypeDefinition) -> bool; 3] {
        let matches: Vec<_> = arity_ok
            .iter()
            .filter(|(_, sig)| args.iter().enumerate().all(|(i, arg)| pass(sig.param_at(i), arg) || sig.param_at(i).is_assignable_from(arg)))
            .collect();
        match matches.len() {
            0 => continue,
            1 => return Ok(matches[0].0),
            _ => return Err(SemanticError::AmbiguousOverload { name: name.to_string(), at }),
        }
    }
    Err(SemanticError::NoMatchingOverload { name: name.to_string(), at })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(params: Vec<TypeDefinition>) -> Signature {
        Signature { params, has_rest: false, ret: TypeDefinition::Void }
    }

    #[test]
    fn exact_match_wins_over_promotion() {
        let candidates = vec![
            (FunctionId::new(0), sig(vec![TypeDefinition::Float])),
            (FunctionId::new(1), sig(vec![TypeDefinition::Int])),
        ];
        let chosen = resolve_overload("f", &candidates, &[TypeDefinition::Int], CodeLoc::default()).unwrap();
        assert_eq!(chosen, FunctionId::new(1));
    }

    #[test]
    fn promotion_used_when_no_exact_match() {
        let candidates = vec![(FunctionId::new(0), sig(vec![TypeDefinition::Float]))];
        let chosen = resolve_overload("f", &candidates, &[TypeDefinition::Int], CodeLoc::default()).unwrap();
        assert_eq!(chosen, FunctionId::new(0));
    }

    #[test]
    fn no_candidates_matching_arity_is_an_error() {
        let candidates = vec![(FunctionId::new(0), sig(vec![TypeDefinition::Int]))];
        let err = resolve_overload("f", &candidates, &[], CodeLoc::default());
        assert!(matches!(err, Err(SemanticError::NoMatchingOverload { .. })));
    }
}
