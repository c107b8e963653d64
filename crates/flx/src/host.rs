//! Host built-in modules: named callables that aren't declared anywhere in
//! program source, backed by native Rust instead of a function body.
//!
//! A `HostModule` is the same shape the teacher's builtin dispatch used —
//! one `call` entry point keyed by name instead of a struct-of-fields per
//! builtin — adapted here to register into a `HostRegistry` rather than a
//! single fixed enum, since this crate's host surface is meant to grow by
//! adding modules rather than by growing one match arm. Host functions are
//! not overloaded: a name resolves to at most one signature, unlike
//! program-defined functions (see `crate::function::resolve_overload`).
//!
//! Both execution engines and the semantic analyzer share one `HostRegistry`
//! instance so a host name always means the same thing regardless of which
//! engine runs the call.

use crate::error::RuntimeError;
use crate::heap::{Heap, HeapObject};
use crate::io::PrintWriter;
use crate::types::TypeDefinition;
use crate::value::RuntimeValue;
use ahash::AHashMap;

/// The declared shape of a host function, consulted by the analyzer the same
/// way it consults a program-defined function's parameter/return types.
pub struct HostSignature {
    pub params: Vec<TypeDefinition>,
    pub ret: TypeDefinition,
}

/// One host-backed module, grouping related native callables under a single
/// namespace (`"flx.std.io"`, for example).
pub trait HostModule {
    fn namespace(&self) -> &'static str;
    fn functions(&self) -> &'static [&'static str];
    fn signature(&self, name: &str) -> HostSignature;
    fn call(
        &self,
        name: &str,
        args: Vec<RuntimeValue>,
        heap: &mut Heap,
        out: &mut dyn PrintWriter,
    ) -> Result<RuntimeValue, RuntimeError>;
}

struct Entry {
    module: usize,
    name: &'static str,
}

/// Every host function registered for one program run, addressed by a dense
/// `u16` id so `Opcode::CallHost` can bake the id directly into its operand
/// the same way `Call` bakes in a `FunctionId`.
#[derive(Default)]
pub struct HostRegistry {
    modules: Vec<Box<dyn HostModule>>,
    entries: Vec<Entry>,
    by_name: AHashMap<&'static str, u16>,
}

impl HostRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry carrying this crate's one shipped module, `flx.std.io`.
    pub fn with_std() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(IoModule));
        registry
    }

    pub fn register(&mut self, module: Box<dyn HostModule>) {
        let module_idx = self.modules.len();
        for &name in module.functions() {
            let id = self.entries.len() as u16;
            self.entries.push(Entry { module: module_idx, name });
            self.by_name.insert(name, id);
        }
        self.modules.push(module);
    }

    /// Looks a bare call-site name up as a host function, by its short name
    /// (`"print"`), not its fully-qualified namespace path.
    pub fn resolve(&self, name: &str) -> Option<u16> {
        self.by_name.get(name).copied()
    }

    pub fn signature(&self, id: u16) -> HostSignature {
        let entry = &self.entries[id as usize];
        self.modules[entry.module].signature(entry.name)
    }

    pub fn call(
        &self,
        id: u16,
        args: Vec<RuntimeValue>,
        heap: &mut Heap,
        out: &mut dyn PrintWriter,
    ) -> Result<RuntimeValue, RuntimeError> {
        let entry = &self.entries[id as usize];
        self.modules[entry.module].call(entry.name, args, heap, out)
    }
}

/// `flx.std.io`: the one concrete host module this crate ships, covering the
/// console I/O a source program has no other way to reach.
pub struct IoModule;

impl HostModule for IoModule {
    fn namespace(&self) -> &'static str {
        "flx.std.io"
    }

    fn functions(&self) -> &'static [&'static str] {
        &["print", "println", "read_line"]
    }

    fn signature(&self, name: &str) -> HostSignature {
        match name {
            "print" | "println" => HostSignature { params: vec![TypeDefinition::Any], ret: TypeDefinition::Void },
            "read_line" => HostSignature { params: vec![], ret: TypeDefinition::String },
            other => unreachable!("unregistered flx.std.io function '{other}'"),
        }
    }

    fn call(
        &self,
        name: &str,
        mut args: Vec<RuntimeValue>,
        heap: &mut Heap,
        out: &mut dyn PrintWriter,
    ) -> Result<RuntimeValue, RuntimeError> {
        match name {
            "print" => {
                out.write_str(&display_value(&args.remove(0), heap));
                Ok(RuntimeValue::Void)
            }
            "println" => {
                out.write_str(&display_value(&args.remove(0), heap));
                out.write_str("\n");
                Ok(RuntimeValue::Void)
            }
            "read_line" => {
                let mut line = String::new();
                std::io::stdin()
                    .read_line(&mut line)
                    .map_err(|e| RuntimeError::Internal { message: format!("read_line: {e}") })?;
                if line.ends_with('\n') {
                    line.pop();
                    if line.ends_with('\r') {
                        line.pop();
                    }
                }
                Ok(RuntimeValue::String(heap.allocate(HeapObject::Str(line))))
            }
            other => unreachable!("unregistered flx.std.io function '{other}'"),
        }
    }
}

/// Renders a value for `print`/`println`, reading through the heap so a
/// string prints its content rather than `RuntimeValue`'s `<string#N>`
/// placeholder form (which exists for diagnostics, not program output).
fn display_value(value: &RuntimeValue, heap: &Heap) -> String {
    match value {
        RuntimeValue::Any(inner) => display_value(inner, heap),
        RuntimeValue::String(id) => match heap.get(*id) {
            HeapObject::Str(s) => s.clone(),
            _ => unreachable!("String HeapId did not reference a HeapObject::Str"),
        },
        RuntimeValue::Array(id) => match heap.get(*id) {
            HeapObject::Array(items) => {
                let rendered: Vec<String> = items.iter().map(|v| display_value(v, heap)).collect();
                format!("[{}]", rendered.join(", "))
            }
            _ => unreachable!("Array HeapId did not reference a HeapObject::Array"),
        },
        RuntimeValue::Struct(id) => match heap.get(*id) {
            HeapObject::Struct { fields, .. } => {
                let rendered: Vec<String> =
                    fields.iter().map(|(_, v)| display_value(v, heap)).collect();
                format!("{{{}}}", rendered.join(", "))
            }
            _ => unreachable!("Struct HeapId did not reference a HeapObject::Struct"),
        },
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print_writes_value_content_not_placeholder() {
        let mut heap = Heap::new();
        let id = heap.allocate(HeapObject::Str("hi".to_string()));
        let mut out = crate::io::CollectStringPrint::default();
        let registry = HostRegistry::with_std();
        let print_id = registry.resolve("print").unwrap();
        registry.call(print_id, vec![RuntimeValue::String(id)], &mut heap, &mut out).unwrap();
        assert_eq!(out.0, "hi");
    }

    #[test]
    fn println_appends_a_newline() {
        let mut heap = Heap::new();
        let mut out = crate::io::CollectStringPrint::default();
        let registry = HostRegistry::with_std();
        let println_id = registry.resolve("println").unwrap();
        registry.call(println_id, vec![RuntimeValue::Int(42)], &mut heap, &mut out).unwrap();
        assert_eq!(out.0, "42\n");
    }

    #[test]
    fn unknown_name_does_not_resolve() {
        let registry = HostRegistry::with_std();
        assert!(registry.resolve("not_a_builtin").is_none());
    }
}
