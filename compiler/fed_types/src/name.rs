//! Interned identifier.
//!
//! Binder names, reference names, struct field names and intrinsic names are
//! interned into a [`NameTable`]. A [`Name`] is only meaningful together with
//! the table that produced it; moving trees between arenas re-interns names
//! by their string content.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

/// Interned string identifier.
///
/// Compared and hashed by index, so equality is O(1).
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct Name(u32);

impl Name {
    /// Pre-interned empty string.
    pub const EMPTY: Name = Name(0);

    /// Get raw u32 value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Create from raw u32 value.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Name(raw)
    }

    #[inline]
    const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self.0)
    }
}

impl Default for Name {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// String table backing [`Name`].
///
/// Owned by a single [`TypePool`](crate::TypePool); cloning the pool clones
/// the table cheaply since the strings are reference counted.
#[derive(Clone)]
pub struct NameTable {
    map: FxHashMap<Arc<str>, Name>,
    strings: Vec<Arc<str>>,
}

impl NameTable {
    /// Create a table with the empty string pre-interned at index 0.
    pub fn new() -> Self {
        let empty: Arc<str> = Arc::from("");
        let mut map = FxHashMap::default();
        map.insert(Arc::clone(&empty), Name::EMPTY);
        Self {
            map,
            strings: vec![empty],
        }
    }

    /// Intern a string, returning its name.
    pub fn intern(&mut self, s: &str) -> Name {
        if let Some(&name) = self.map.get(s) {
            return name;
        }
        let name = Name(u32::try_from(self.strings.len()).unwrap_or(u32::MAX));
        let owned: Arc<str> = Arc::from(s);
        self.strings.push(Arc::clone(&owned));
        self.map.insert(owned, name);
        name
    }

    /// Look up an already interned string without interning it.
    pub fn get(&self, s: &str) -> Option<Name> {
        self.map.get(s).copied()
    }

    /// Resolve a name to its string.
    ///
    /// Names from another table resolve to the empty string.
    pub fn lookup(&self, name: Name) -> &str {
        self.strings.get(name.index()).map_or("", |s| s)
    }

    /// Number of interned strings, including the empty string.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Always false: the empty string is pre-interned.
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl Default for NameTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NameTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NameTable")
            .field("len", &self.strings.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_is_idempotent() {
        let mut table = NameTable::new();
        let a = table.intern("weights");
        let b = table.intern("weights");
        assert_eq!(a, b);
        assert_eq!(table.lookup(a), "weights");
    }

    #[test]
    fn empty_string_is_pre_interned() {
        let mut table = NameTable::new();
        assert_eq!(table.intern(""), Name::EMPTY);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn distinct_strings_get_distinct_names() {
        let mut table = NameTable::new();
        let a = table.intern("x");
        let b = table.intern("y");
        assert_ne!(a, b);
        assert_eq!(table.get("y"), Some(b));
        assert_eq!(table.get("z"), None);
    }
}
