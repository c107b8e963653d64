//! Mark-sweep heap for array, string, struct and closure payloads.
//!
//! `RuntimeValue` only ever carries an index (`HeapId`) for these variants;
//! the backing storage lives here in a flat, reusable arena, mirroring the
//! "arena + index instead of shared ownership" approach used by both
//! execution engines. Collection is explicit: the evaluator/VM calls
//! `collect()` when a scope is popped (see `scope.rs`), never on every
//! allocation, matching the documented "GC runs at scope-pop boundaries"
//! resource model.
//!
//! This deliberately does **not** reference-count, unlike the teacher's
//! inc_ref/dec_ref heap: the design calls for a real mark-sweep collector,
//! so entries carry a `marked` flag instead of a refcount, and `collect()`
//! walks roots before reclaiming anything unmarked. See DESIGN.md for the
//! rationale.

use crate::ast::FunctionDef;
use crate::bytecode::code::Code;
use crate::intern::StringId;
use crate::value::RuntimeValue;
use ahash::AHashMap;
use indexmap::IndexMap;
use std::rc::Rc;

pub type HeapId = u32;

#[derive(Debug, Clone)]
pub enum HeapObject {
    Str(String),
    Array(Vec<RuntimeValue>),
    Struct { ty: StringId, fields: IndexMap<StringId, RuntimeValue> },
    /// A function value produced by the bytecode compiler: either a named
    /// top-level function (`code` shared from `CompiledProgram::functions`)
    /// or a function-literal closure (`code` cloned from its defining
    /// code's `nested` table). `captured` is always empty in this crate —
    /// function literals read free variables off the live global table
    /// rather than capturing an enclosing lexical environment, matching the
    /// "identifiers not found locally resolve to a global" rule used
    /// everywhere else.
    Closure { code: Rc<Code>, captured: AHashMap<StringId, RuntimeValue> },
    /// A function value produced by the tree-walking evaluator for a
    /// function-literal expression. Kept distinct from `Closure` rather than
    /// forcing the evaluator to compile bytecode it will never run: each
    /// engine only ever allocates the variant it knows how to invoke.
    AstClosure(Rc<FunctionDef>),
}

impl HeapObject {
    pub fn type_name(&self) -> &'static str {
        match self {
            HeapObject::Str(_) => "string",
            HeapObject::Array(_) => "array",
            HeapObject::Struct { .. } => "struct",
            HeapObject::Closure { .. } | HeapObject::AstClosure(_) => "function",
        }
    }

    /// Values directly reachable from this object, for the mark phase.
    fn children(&self) -> Vec<RuntimeValue> {
        match self {
            HeapObject::Str(_) => Vec::new(),
            HeapObject::Array(items) => items.clone(),
            HeapObject::Struct { fields, .. } => fields.values().cloned().collect(),
            HeapObject::Closure { captured, .. } => captured.values().cloned().collect(),
            HeapObject::AstClosure(_) => Vec::new(),
        }
    }
}

struct Entry {
    object: HeapObject,
    marked: bool,
}

/// A mark-sweep heap. Owns every array/string/struct/closure payload in a
/// running program; `RuntimeVariable`s that reference the heap are the
/// GC roots (see `scope.rs::Scope::iter_heap_ids`).
#[derive(Default)]
pub struct Heap {
    slots: Vec<Option<Entry>>,
    free: Vec<HeapId>,
    collections: u64,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, object: HeapObject) -> HeapId {
        if let Some(id) = self.free.pop() {
            self.slots[id as usize] = Some(Entry { object, marked: false });
            return id;
        }
        let id = self.slots.len() as u32;
        self.slots.push(Some(Entry { object, marked: false }));
        id
    }

    pub fn get(&self, id: HeapId) -> &HeapObject {
        &self.slots[id as usize].as_ref().expect("dangling HeapId: slot was collected").object
    }

    pub fn get_mut(&mut self, id: HeapId) -> &mut HeapObject {
        &mut self.slots[id as usize].as_mut().expect("dangling HeapId: slot was collected").object
    }

    /// Runs one mark-sweep cycle using `roots` as the set of values
    /// currently reachable from any live scope or VM stack slot.
    pub fn collect(&mut self, roots: impl IntoIterator<Item = RuntimeValue>) {
        self.collections += 1;
        let mut stack: Vec<HeapId> = Vec::new();
        for root in roots {
            if let Some(id) = root.heap_id() {
                stack.push(id);
            }
        }
        while let Some(id) = stack.pop() {
            let Some(entry) = self.slots[id as usize].as_mut() else { continue };
            if entry.marked {
                continue;
            }
            entry.marked = true;
            for child in entry.object.children() {
                if let Some(child_id) = child.heap_id() {
                    stack.push(child_id);
                }
            }
        }
        for (id, slot) in self.slots.iter_mut().enumerate() {
            match slot {
                Some(entry) if entry.marked => entry.marked = false,
                Some(_) => {
                    *slot = None;
                    self.free.push(id as u32);
                }
                None => {}
            }
        }
    }

    pub fn len_live(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn collections(&self) -> u64 {
        self.collections
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::RuntimeValue;

    #[test]
    fn unreachable_array_is_collected() {
        let mut heap = Heap::new();
        let id = heap.allocate(HeapObject::Array(vec![RuntimeValue::Int(1)]));
        assert_eq!(heap.len_live(), 1);
        heap.collect(std::iter::empty());
        assert_eq!(heap.len_live(), 0);
        let _ = id;
    }

    #[test]
    fn rooted_array_survives_collection() {
        let mut heap = Heap::new();
        let id = heap.allocate(HeapObject::Array(vec![RuntimeValue::Int(1)]));
        heap.collect([RuntimeValue::Array(id)]);
        assert_eq!(heap.len_live(), 1);
    }

    #[test]
    fn nested_struct_keeps_its_array_field_alive() {
        let mut heap = Heap::new();
        let arr_id = heap.allocate(HeapObject::Array(vec![RuntimeValue::Int(2)]));
        let mut fields = IndexMap::new();
        let name = StringId::from_index(0);
        fields.insert(name, RuntimeValue::Array(arr_id));
        let struct_id = heap.allocate(HeapObject::Struct { ty: name, fields });
        heap.collect([RuntimeValue::Struct(struct_id)]);
        assert_eq!(heap.len_live(), 2);
    }

    #[test]
    fn freed_slots_are_reused() {
        let mut heap = Heap::new();
        let id1 = heap.allocate(HeapObject::Array(vec![]));
        heap.collect(std::iter::empty());
        let id2 = heap.allocate(HeapObject::Array(vec![]));
        assert_eq!(id1, id2);
    }
}
