//! Person-id interning for fast eligibility lookups.
//!
//! Interned ids are handed out densely in insertion order, so interning a
//! roster in rotation order makes the interned id equal the roster index.

use rustc_hash::FxHashMap;

/// Interned person id (dense, doubles as roster index).
pub type PersonIdx = usize;

#[derive(Debug, Clone, Default)]
pub struct PersonInterner {
    to_idx: FxHashMap<String, PersonIdx>,
    from_idx: Vec<String>,
}

impl PersonInterner {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            to_idx: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            from_idx: Vec::with_capacity(capacity),
        }
    }

    /// Intern an id. Returns `Err(existing)` if it was already present.
    pub fn insert_new(&mut self, id: &str) -> Result<PersonIdx, PersonIdx> {
        if let Some(&idx) = self.to_idx.get(id) {
            return Err(idx);
        }
        let idx = self.from_idx.len();
        self.from_idx.push(id.to_string());
        self.to_idx.insert(id.to_string(), idx);
        Ok(idx)
    }

    #[inline]
    pub fn get(&self, id: &str) -> Option<PersonIdx> {
        self.to_idx.get(id).copied()
    }

    #[inline]
    pub fn resolve(&self, idx: PersonIdx) -> Option<&str> {
        self.from_idx.get(idx).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.from_idx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.from_idx.is_empty()
    }
}
