//! Process-wide string interning.
//!
//! Every identifier read from a document (ids, sids, names, material symbols)
//! becomes a [`Name`]. Equal strings always intern to the same allocation, so
//! equality and hashing only look at the pointer.

use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;
use serde::{Serialize, Serializer};

static INTERNER: Lazy<Interner> = Lazy::new(Interner::new);

/// Owner of all interned strings.
///
/// Created lazily on first use and torn down entry by entry through
/// [`Interner::purge_unused`]. The empty string is always present.
pub struct Interner {
    strings: Mutex<HashSet<Arc<str>>>,
    empty: Arc<str>,
}

impl Interner {
    fn new() -> Self {
        let empty: Arc<str> = Arc::from("");
        let mut strings = HashSet::new();
        strings.insert(empty.clone());
        Self {
            strings: Mutex::new(strings),
            empty,
        }
    }

    /// The interner shared by the whole process.
    pub fn global() -> &'static Interner {
        &INTERNER
    }

    /// Intern `s`, returning the canonical handle for its contents.
    pub fn intern(&self, s: &str) -> Name {
        if s.is_empty() {
            return Name(self.empty.clone());
        }
        let mut strings = self.strings.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = strings.get(s) {
            return Name(existing.clone());
        }
        let arc: Arc<str> = Arc::from(s);
        strings.insert(arc.clone());
        Name(arc)
    }

    /// Number of distinct interned strings (including the empty string).
    pub fn len(&self) -> usize {
        self.strings.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every string no live [`Name`] refers to. Returns how many were
    /// released.
    ///
    /// A purged string can be interned again later; since no handle to the
    /// old allocation survives, pointer equality still implies equal content.
    pub fn purge_unused(&self) -> usize {
        let mut strings = self.strings.lock().unwrap_or_else(|e| e.into_inner());
        let before = strings.len();
        strings.retain(|s| Arc::strong_count(s) > 1 || s.is_empty());
        before - strings.len()
    }
}

/// An interned identifier with O(1) equality and hashing.
#[derive(Clone)]
pub struct Name(Arc<str>);

impl Name {
    /// Intern `s` in the global interner.
    pub fn new(s: &str) -> Self {
        Interner::global().intern(s)
    }

    /// The empty-string singleton.
    pub fn empty() -> Self {
        Name(Interner::global().empty.clone())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Name {}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as *const u8 as usize).hash(state);
    }
}

impl Deref for Name {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl Default for Name {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Name::new(s)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

impl Serialize for Name {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_strings_share_handle() {
        let a = Name::new("box-geometry");
        let b = Name::new(&String::from("box-geometry"));
        assert_eq!(a, b);
        assert!(Arc::ptr_eq(&a.0, &b.0));
        assert_ne!(a, Name::new("box-geometry2"));
    }

    #[test]
    fn test_empty_singleton() {
        assert_eq!(Name::new(""), Name::empty());
        assert!(Name::default().is_empty());
    }

    #[test]
    fn test_purge_keeps_live_names() {
        let live = Name::new("intern-test-live");
        {
            let _dead = Name::new("intern-test-dead");
        }
        Interner::global().purge_unused();

        assert_eq!(live, Name::new("intern-test-live"));
        assert_eq!(Name::empty().as_str(), "");
    }

    #[test]
    fn test_hash_matches_equality() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(Name::new("node-1"), 1);
        assert_eq!(map.get(&Name::new("node-1")), Some(&1));
        assert_eq!(map.get(&Name::new("node-2")), None);
    }
}
