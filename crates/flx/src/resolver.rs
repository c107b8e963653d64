//! Dependency resolver: walks only `using` statements, loading and parsing
//! each referenced file exactly once, then merges every file's declarations
//! into one `Program`.
//!
//! The loader is generic over `SourceLoader`, the collaborator boundary
//! between this crate and wherever source text actually lives (filesystem
//! for `flx-cli`, an in-memory map for tests).

use crate::ast::{FunctionDef, StmtKind, StructDef};
use crate::error::{FlxError, LoadError};
use crate::intern::{FunctionId, InternerBuilder, Interns, StructId};
use crate::parser::parse_source;
use crate::program::{NamespaceSymbols, Program};
use ahash::AHashSet;

/// Resolves a dotted `using` path (e.g. `math::geometry`) to its source
/// text. Returns `(display_name, source_text)`.
pub trait SourceLoader {
    fn load(&self, dotted_path: &str) -> Result<(String, String), LoadError>;
}

/// A `SourceLoader` backed by an in-memory table, for tests that shouldn't
/// touch the filesystem.
pub struct MemoryLoader {
    files: ahash::AHashMap<String, String>,
}

impl MemoryLoader {
    pub fn new(files: impl IntoIterator<Item = (&'static str, &'static str)>) -> Self {
        Self { files: files.into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect() }
    }
}

impl SourceLoader for MemoryLoader {
    fn load(&self, dotted_path: &str) -> Result<(String, String), LoadError> {
        self.files
            .get(dotted_path)
            .map(|src| (dotted_path.to_string(), src.clone()))
            .ok_or_else(|| LoadError::NotFound { path: dotted_path.to_string() })
    }
}

fn ns_path_string(interner: &InternerBuilder, path: &[crate::intern::StringId]) -> String {
    path.iter().map(|id| interner.get(*id)).collect::<Vec<_>>().join("::")
}

/// Parses `entry_path` and every file transitively reachable from its (and
/// its dependencies') `using` statements, merging them into one `Program`.
pub fn load_program(loader: &dyn SourceLoader, entry_path: &str) -> Result<Program, FlxError> {
    let mut interner = InternerBuilder::new();
    let mut visited: AHashSet<String> = AHashSet::default();
    let mut pending = vec![entry_path.to_string()];
    let mut visiting_stack: Vec<String> = Vec::new();

    let mut units = Vec::new();
    let mut functions: Vec<FunctionDef> = Vec::new();
    let mut structs: Vec<StructDef> = Vec::new();
    let mut namespaces: ahash::AHashMap<crate::ast::NsPath, NamespaceSymbols> = ahash::AHashMap::default();
    let mut main_unit = 0usize;

    while let Some(path) = pending.pop() {
        if visited.contains(&path) {
            continue;
        }
        if visiting_stack.contains(&path) {
            return Err(LoadError::Cycle { path }.into());
        }
        visiting_stack.push(path.clone());

        let (_, source) = loader.load(&path)?;
        let parsed = parse_source(&source, &mut interner)?;

        let fn_offset = functions.len();
        let struct_offset = structs.len();

        let remapped_unit = remap_unit(parsed.unit, fn_offset, struct_offset);

        for stmt in &remapped_unit.top_level {
            match stmt.kind {
                StmtKind::FunctionDecl(id) => {
                    let def = &parsed.functions[id.index() - fn_offset];
                    namespaces
                        .entry(def.namespace.clone())
                        .or_default()
                        .functions
                        .entry(def.name)
                        .or_default()
                        .push(id);
                }
                StmtKind::StructDecl(id) => {
                    let def = &parsed.structs[id.index() - struct_offset];
                    namespaces.entry(def.namespace.clone()).or_default().structs.insert(def.name, id);
                }
                _ => {}
            }
        }

        functions.extend(parsed.functions);
        structs.extend(parsed.structs);

        if path == entry_path {
            main_unit = units.len();
        }

        for using in &remapped_unit.usings {
            let dotted = ns_path_string(&interner, &using.path);
            if !visited.contains(&dotted) {
                pending.push(dotted);
            }
        }

        units.push(remapped_unit);
        visited.insert(path.clone());
        visiting_stack.pop();
    }

    Ok(Program {
        interns: Interns::new(interner.into_storage()),
        functions,
        structs,
        units,
        main_unit,
        namespaces,
    })
}

fn remap_unit(unit: crate::ast::SourceUnit, fn_offset: usize, struct_offset: usize) -> crate::ast::SourceUnit {
    crate::ast::SourceUnit {
        namespace: unit.namespace,
        usings: unit.usings,
        top_level: unit.top_level.into_iter().map(|s| remap_stmt(s, fn_offset, struct_offset)).collect(),
    }
}

fn remap_stmt(mut stmt: crate::ast::Stmt, fn_offset: usize, struct_offset: usize) -> crate::ast::Stmt {
    match &mut stmt.kind {
        StmtKind::FunctionDecl(id) => *id = FunctionId::new(id.index() + fn_offset),
        StmtKind::StructDecl(id) => *id = StructId::new(id.index() + struct_offset),
        _ => {}
    }
    stmt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_entry_file_with_no_dependencies() {
        let loader = MemoryLoader::new([("main", "let x = 1;")]);
        let program = load_program(&loader, "main").unwrap();
        assert_eq!(program.units.len(), 1);
    }

    #[test]
    fn follows_using_statements_transitively() {
        let loader = MemoryLoader::new([
            ("main", "using helpers; let x = 1;"),
            ("helpers", "func helper(): int { return 1; }"),
        ]);
        let program = load_program(&loader, "main").unwrap();
        assert_eq!(program.units.len(), 2);
        assert_eq!(program.functions.len(), 1);
    }

    #[test]
    fn detects_using_cycles() {
        let loader = MemoryLoader::new([("a", "using b;"), ("b", "using a;")]);
        let err = load_program(&loader, "a").unwrap_err();
        assert!(matches!(err, FlxError::Load(LoadError::Cycle { .. })));
    }

    #[test]
    fn missing_dependency_is_a_load_error() {
        let loader = MemoryLoader::new([("main", "using missing;")]);
        let err = load_program(&loader, "main").unwrap_err();
        assert!(matches!(err, FlxError::Load(LoadError::NotFound { .. })));
    }
}
