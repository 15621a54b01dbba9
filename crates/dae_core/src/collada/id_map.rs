//! Typed arena handles and per-category `id → entity` storage.

use std::collections::HashMap;
use std::marker::PhantomData;

use serde::Serialize;

use crate::error::{ColladaError, ColladaResult};
use crate::intern::Name;

/// A typed index into one of the document's arenas.
pub trait EntityId: Copy {
    /// Category name used in error messages.
    const CATEGORY: &'static str;

    fn from_index(index: usize) -> Self;
    fn index(self) -> usize;
}

macro_rules! entity_id {
    ($name:ident, $category:literal) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        pub struct $name(pub usize);

        impl EntityId for $name {
            const CATEGORY: &'static str = $category;

            fn from_index(index: usize) -> Self {
                Self(index)
            }

            fn index(self) -> usize {
                self.0
            }
        }
    };
}

entity_id!(ImageId, "image");
entity_id!(EffectId, "effect");
entity_id!(MaterialId, "material");
entity_id!(CameraId, "camera");
entity_id!(LightId, "light");
entity_id!(GeometryId, "geometry");
entity_id!(SceneId, "visual_scene");
entity_id!(AnimationId, "animation");
entity_id!(SourceId, "source");
entity_id!(NodeId, "node");

/// Entities that carry a document-unique id.
pub trait Identified {
    fn id(&self) -> &Name;

    /// Human readable name, if the element had one.
    fn name(&self) -> Option<&Name> {
        None
    }
}

/// Ordered storage plus an id index for one entity category.
///
/// Insertion only happens on the loading thread, so no locking is needed
/// even though the entities themselves may come from parallel tasks.
#[derive(Debug)]
pub struct IdMap<K, T> {
    items: Vec<T>,
    by_id: HashMap<Name, usize>,
    _key: PhantomData<K>,
}

impl<K: EntityId, T: Identified> IdMap<K, T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            by_id: HashMap::new(),
            _key: PhantomData,
        }
    }

    /// Append `item`; ids must be unique within the category.
    pub fn insert(&mut self, item: T) -> ColladaResult<K> {
        let id = item.id().clone();
        if self.by_id.contains_key(&id) {
            return Err(ColladaError::DuplicateId {
                category: K::CATEGORY,
                id: id.to_string(),
            });
        }
        let index = self.items.len();
        self.items.push(item);
        self.by_id.insert(id, index);
        Ok(K::from_index(index))
    }

    pub fn get(&self, key: K) -> Option<&T> {
        self.items.get(key.index())
    }

    pub fn get_mut(&mut self, key: K) -> Option<&mut T> {
        self.items.get_mut(key.index())
    }

    /// Handle for an interned id.
    pub fn find(&self, id: &Name) -> Option<K> {
        self.by_id.get(id).map(|&i| K::from_index(i))
    }

    /// Handle for an id, failing with `UnresolvedReference`.
    pub fn resolve(&self, id: &Name) -> ColladaResult<K> {
        self.find(id).ok_or_else(|| ColladaError::UnresolvedReference {
            category: K::CATEGORY,
            id: id.to_string(),
        })
    }

    /// Linear scan by element name. Slow path: resolve once and keep the
    /// handle when a lookup repeats.
    pub fn find_by_name(&self, name: &str) -> Option<K> {
        self.items
            .iter()
            .position(|item| item.name().is_some_and(|n| n.as_str() == name))
            .map(K::from_index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    /// Entities paired with their handles, in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (K, &T)> {
        self.items
            .iter()
            .enumerate()
            .map(|(i, item)| (K::from_index(i), item))
    }
}

impl<K: EntityId, T: Identified> Default for IdMap<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: EntityId, T: Identified> std::ops::Index<K> for IdMap<K, T> {
    type Output = T;

    fn index(&self, key: K) -> &T {
        &self.items[key.index()]
    }
}

impl<K: EntityId, T: Identified> std::ops::IndexMut<K> for IdMap<K, T> {
    fn index_mut(&mut self, key: K) -> &mut T {
        &mut self.items[key.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Thing {
        id: Name,
        name: Option<Name>,
    }

    impl Identified for Thing {
        fn id(&self) -> &Name {
            &self.id
        }

        fn name(&self) -> Option<&Name> {
            self.name.as_ref()
        }
    }

    fn thing(id: &str, name: &str) -> Thing {
        Thing {
            id: Name::new(id),
            name: Some(Name::new(name)),
        }
    }

    #[test]
    fn test_insert_and_find() {
        let mut map: IdMap<CameraId, Thing> = IdMap::new();
        let a = map.insert(thing("cam-a", "Front")).unwrap();
        let b = map.insert(thing("cam-b", "Side")).unwrap();

        assert_eq!(a, CameraId(0));
        assert_eq!(b, CameraId(1));
        assert_eq!(map.find(&Name::new("cam-b")), Some(b));
        assert_eq!(map.find_by_name("Front"), Some(a));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut map: IdMap<LightId, Thing> = IdMap::new();
        map.insert(thing("sun", "Sun")).unwrap();
        let err = map.insert(thing("sun", "Other")).unwrap_err();

        assert!(matches!(
            err,
            ColladaError::DuplicateId { category: "light", .. }
        ));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_resolve_missing() {
        let map: IdMap<EffectId, Thing> = IdMap::new();
        assert!(matches!(
            map.resolve(&Name::new("nope")),
            Err(ColladaError::UnresolvedReference { category: "effect", .. })
        ));
    }
}
