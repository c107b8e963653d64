//! String and definition interning.
//!
//! Identifiers, struct field names and namespace segments are interned once
//! during lexing/parsing and referred to by index (`StringId`) everywhere
//! else, so that scope lookups, switch-case dispatch and struct field access
//! compare integers rather than `&str`.
//!
//! The interner is built up during parsing (`InternerBuilder`), then frozen
//! into read-only storage (`Interns`) owned by the `Program` for the rest of
//! the run.

use ahash::AHashMap;

/// Index into the string interner's storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, serde::Serialize, serde::Deserialize)]
pub struct StringId(u32);

impl StringId {
    /// Reconstructs a `StringId` from a raw operand, as stored in bytecode.
    #[inline]
    pub fn from_index(index: u16) -> Self {
        Self(u32::from(index))
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Unique identifier for a parsed function definition (including overloads:
/// each overload of a name gets its own `FunctionId`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct FunctionId(u32);

impl FunctionId {
    pub fn new(index: usize) -> Self {
        Self(index.try_into().expect("too many function definitions"))
    }

    #[inline]
    pub fn from_index(index: u16) -> Self {
        Self(u32::from(index))
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Unique identifier for a parsed structure definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct StructId(u32);

impl StructId {
    pub fn new(index: usize) -> Self {
        Self(index.try_into().expect("too many structure definitions"))
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Builder used while lexing/parsing: deduplicates strings as they're seen.
#[derive(Debug, Default)]
pub struct InternerBuilder {
    lookup: AHashMap<String, StringId>,
    strings: Vec<String>,
}

impl InternerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, s: &str) -> StringId {
        if let Some(id) = self.lookup.get(s) {
            return *id;
        }
        let id = StringId(self.strings.len().try_into().expect("StringId overflow"));
        self.strings.push(s.to_owned());
        self.lookup.insert(s.to_owned(), id);
        id
    }

    pub fn get(&self, id: StringId) -> &str {
        &self.strings[id.index()]
    }

    pub fn into_storage(self) -> Vec<String> {
        self.strings
    }
}

/// Read-only interned-string storage, owned by a `Program` after parsing.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Interns {
    strings: Vec<String>,
}

impl Interns {
    pub fn new(strings: Vec<String>) -> Self {
        Self { strings }
    }

    /// # Panics
    /// Panics if `id` was not produced by the interner backing this storage.
    #[inline]
    pub fn resolve(&self, id: StringId) -> &str {
        &self.strings[id.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_same_text_returns_same_id() {
        let mut builder = InternerBuilder::new();
        let a = builder.intern("foo");
        let b = builder.intern("foo");
        let c = builder.intern("bar");
        assert_eq!(a, b);
        assert_ne!(a, c);
        let interns = Interns::new(builder.into_storage());
        assert_eq!(interns.resolve(a), "foo");
        assert_eq!(interns.resolve(c), "bar");
    }
}
