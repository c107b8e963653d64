//! `Program`: every parsed file's declarations merged into one set of
//! arenas, ready for semantic analysis and execution by either engine.

use crate::ast::{FunctionDef, NsPath, SourceUnit, StructDef};
use crate::intern::{FunctionId, Interns, StringId, StructId};
use ahash::AHashMap;

/// The functions and structures a `using` declaration for one namespace
/// makes available to importers.
#[derive(Debug, Default, Clone)]
pub struct NamespaceSymbols {
    pub functions: AHashMap<StringId, Vec<FunctionId>>,
    pub structs: AHashMap<StringId, StructId>,
}

#[derive(Debug)]
pub struct Program {
    pub interns: Interns,
    pub functions: Vec<FunctionDef>,
    pub structs: Vec<StructDef>,
    pub units: Vec<SourceUnit>,
    /// Index into `units` for the program's entry file.
    pub main_unit: usize,
    pub namespaces: AHashMap<NsPath, NamespaceSymbols>,
}

impl Program {
    pub fn function(&self, id: FunctionId) -> &FunctionDef {
        &self.functions[id.index()]
    }

    pub fn structure(&self, id: StructId) -> &StructDef {
        &self.structs[id.index()]
    }

    pub fn resolve_name(&self, id: StringId) -> &str {
        self.interns.resolve(id)
    }

    /// Finds a structure definition by name, searching every namespace.
    /// Structure names are treated as globally unique for lookup purposes;
    /// a `using`'s `include`/`exclude` filtering happens earlier, at merge
    /// time, in `NamespaceSymbols`.
    pub fn find_struct(&self, name: StringId) -> Option<&StructDef> {
        self.structs.iter().find(|s| s.name == name)
    }
}
