//! The closed set of type tags every runtime value and static type carries.

use crate::intern::StringId;
use std::fmt;

/// The ten-member closed type-tag set. `Any` is a container tag: a value
/// tagged `Any` carries a *second*, concrete tag underneath it (see
/// `RuntimeValue::Any`) rather than being its own storage representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::FromRepr)]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum TypeTag {
    Undefined,
    Void,
    Bool,
    Int,
    Float,
    Char,
    String,
    Array,
    Struct,
    Any,
    Function,
}

impl TypeTag {
    pub fn is_numeric(self) -> bool {
        matches!(self, TypeTag::Int | TypeTag::Float | TypeTag::Bool)
    }
}

/// A fully resolved static type, as produced by the semantic analyzer from a
/// parsed `TypeRef`. Struct/array types carry enough information to check
/// field access and element type without re-walking the AST.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDefinition {
    Void,
    Bool,
    Int,
    Float,
    Char,
    String,
    Any,
    Array(Box<TypeDefinition>),
    Struct(StringId),
    Function,
}

impl TypeDefinition {
    pub fn tag(&self) -> TypeTag {
        match self {
            TypeDefinition::Void => TypeTag::Void,
            TypeDefinition::Bool => TypeTag::Bool,
            TypeDefinition::Int => TypeTag::Int,
            TypeDefinition::Float => TypeTag::Float,
            TypeDefinition::Char => TypeTag::Char,
            TypeDefinition::String => TypeTag::String,
            TypeDefinition::Any => TypeTag::Any,
            TypeDefinition::Array(_) => TypeTag::Array,
            TypeDefinition::Struct(_) => TypeTag::Struct,
            TypeDefinition::Function => TypeTag::Function,
        }
    }

    /// Assignability check used by declaration/assignment/call-argument
    /// contracts: `Any` accepts and is accepted by everything; arrays are
    /// covariant on element type; everything else is nominal equality.
    pub fn is_assignable_from(&self, other: &TypeDefinition) -> bool {
        match (self, other) {
            (TypeDefinition::Any, _) | (_, TypeDefinition::Any) => true,
            (TypeDefinition::Array(a), TypeDefinition::Array(b)) => a.is_assignable_from(b),
            (TypeDefinition::Struct(a), TypeDefinition::Struct(b)) => a == b,
            _ => self.tag() == other.tag(),
        }
    }
}

impl fmt::Display for TypeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDefinition::Array(elem) => write!(f, "{elem}[]"),
            TypeDefinition::Struct(_) => write!(f, "struct"),
            other => write!(f, "{}", other.tag()),
        }
    }
}
