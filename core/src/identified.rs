//! Ordered, keyed collections of child state.
//!
//! [`IdentifiedVec`] keeps insertion order like a `Vec` and supports
//! lookup by id like a map. Per-item reducers lifted with
//! [`for_each`](crate::composition::for_each) address elements through it.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::hash::Hash;

/// Ordered collection of elements addressed by id.
///
/// Equality is order-sensitive: two collections holding the same elements
/// in a different order are not equal.
///
/// # Examples
///
/// ```
/// use reducible_core::IdentifiedVec;
///
/// let mut memos = IdentifiedVec::new();
/// memos.insert("b", 2);
/// memos.insert_at(0, "a", 1);
///
/// assert_eq!(memos.ids().copied().collect::<Vec<_>>(), vec!["a", "b"]);
/// assert_eq!(memos.get(&"b"), Some(&2));
/// assert_eq!(memos.remove(&"a"), Some(1));
/// assert_eq!(memos.len(), 1);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound(
    serialize = "Id: Serialize + Hash + Eq, T: Serialize",
    deserialize = "Id: Deserialize<'de> + Hash + Eq, T: Deserialize<'de>"
))]
#[serde(transparent)]
pub struct IdentifiedVec<Id, T> {
    elements: IndexMap<Id, T>,
}

impl<Id, T> IdentifiedVec<Id, T> {
    /// Create an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self {
            elements: IndexMap::new(),
        }
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Ids in order.
    pub fn ids(&self) -> impl Iterator<Item = &Id> {
        self.elements.keys()
    }

    /// Elements in order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.elements.values()
    }

    /// `(id, element)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&Id, &T)> {
        self.elements.iter()
    }

    /// Mutable `(id, element)` pairs in order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&Id, &mut T)> {
        self.elements.iter_mut()
    }

    /// Remove every element.
    pub fn clear(&mut self) {
        self.elements.clear();
    }
}

impl<Id, T> IdentifiedVec<Id, T>
where
    Id: Hash + Eq,
{
    /// Append an element, or replace the element with the same id in place.
    ///
    /// Returns the replaced element, if any.
    pub fn insert(&mut self, id: Id, element: T) -> Option<T> {
        self.elements.insert(id, element)
    }

    /// Insert an element at `index`, shifting later elements.
    ///
    /// An element that already exists under `id` is moved to `index`.
    /// `index` is clamped to the collection length.
    pub fn insert_at(&mut self, index: usize, id: Id, element: T) -> Option<T> {
        let index = index.min(self.elements.len());
        let previous = self.elements.shift_remove(&id);
        let index = index.min(self.elements.len());
        self.elements.shift_insert(index, id, element);
        previous
    }

    /// Remove and return the element with `id`, preserving order.
    pub fn remove(&mut self, id: &Id) -> Option<T> {
        self.elements.shift_remove(id)
    }

    /// Borrow the element with `id`.
    pub fn get(&self, id: &Id) -> Option<&T> {
        self.elements.get(id)
    }

    /// Mutably borrow the element with `id`.
    pub fn get_mut(&mut self, id: &Id) -> Option<&mut T> {
        self.elements.get_mut(id)
    }

    /// Whether an element with `id` exists.
    pub fn contains(&self, id: &Id) -> bool {
        self.elements.contains_key(id)
    }

    /// Position of the element with `id`.
    pub fn index_of(&self, id: &Id) -> Option<usize> {
        self.elements.get_index_of(id)
    }
}

impl<Id, T> Default for IdentifiedVec<Id, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Id, T> PartialEq for IdentifiedVec<Id, T>
where
    Id: PartialEq,
    T: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.elements.len() == other.elements.len()
            && self
                .elements
                .iter()
                .zip(other.elements.iter())
                .all(|((id_a, a), (id_b, b))| id_a == id_b && a == b)
    }
}

impl<Id, T> Eq for IdentifiedVec<Id, T>
where
    Id: Eq,
    T: Eq,
{
}

impl<Id, T> FromIterator<(Id, T)> for IdentifiedVec<Id, T>
where
    Id: Hash + Eq,
{
    fn from_iter<I: IntoIterator<Item = (Id, T)>>(iter: I) -> Self {
        Self {
            elements: iter.into_iter().collect(),
        }
    }
}

impl<'a, Id, T> IntoIterator for &'a IdentifiedVec<Id, T> {
    type Item = (&'a Id, &'a T);
    type IntoIter = indexmap::map::Iter<'a, Id, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_order_sensitive() {
        let forward: IdentifiedVec<u8, &str> = [(1, "a"), (2, "b")].into_iter().collect();
        let backward: IdentifiedVec<u8, &str> = [(2, "b"), (1, "a")].into_iter().collect();
        assert_ne!(forward, backward);
        assert_eq!(forward, forward.clone());
    }

    #[test]
    fn insert_at_moves_existing_ids() {
        let mut items: IdentifiedVec<u8, char> = [(1, 'a'), (2, 'b'), (3, 'c')].into_iter().collect();
        let previous = items.insert_at(0, 3, 'z');
        assert_eq!(previous, Some('c'));
        assert_eq!(items.ids().copied().collect::<Vec<_>>(), vec![3, 1, 2]);
        assert_eq!(items.get(&3), Some(&'z'));

        items.insert_at(100, 4, 'd');
        assert_eq!(items.index_of(&4), Some(3));
    }

    #[test]
    fn remove_preserves_order() {
        let mut items: IdentifiedVec<u8, char> = [(1, 'a'), (2, 'b'), (3, 'c')].into_iter().collect();
        assert_eq!(items.remove(&2), Some('b'));
        assert_eq!(items.remove(&2), None);
        assert_eq!(items.values().copied().collect::<String>(), "ac");
        assert!(!items.contains(&2));
    }

    #[test]
    fn serde_round_trip_keeps_order() {
        let items: IdentifiedVec<String, u32> =
            [("z".to_string(), 1), ("a".to_string(), 2)].into_iter().collect();
        let json = serde_json::to_string(&items).unwrap_or_default();
        assert_eq!(json, r#"{"z":1,"a":2}"#);
        let back: Result<IdentifiedVec<String, u32>, _> = serde_json::from_str(&json);
        assert!(matches!(back, Ok(ref decoded) if *decoded == items));
    }
}
