use std::collections::BTreeMap;

/// Registration handle for a player or fader. Ids are never reused within a
/// universe, so a stale handle can't remove a newer registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle {
    pub universe: u16,
    pub id: u64,
}

/// Insertion-ordered storage keyed by monotonically increasing ids.
#[derive(Debug, Clone)]
pub struct Arena<T> {
    next_id: u64,
    items: BTreeMap<u64, T>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            items: BTreeMap::new(),
        }
    }
}

impl<T> Arena<T> {
    pub fn insert(&mut self, item: T) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.items.insert(id, item);
        id
    }

    pub fn remove(&mut self, id: u64) -> Option<T> {
        self.items.remove(&id)
    }

    pub fn get(&self, id: u64) -> Option<&T> {
        self.items.get(&id)
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut T> {
        self.items.get_mut(&id)
    }

    /// Items in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &T)> {
        self.items.iter().map(|(id, item)| (*id, item))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (u64, &mut T)> {
        self.items.iter_mut().map(|(id, item)| (*id, item))
    }

    pub fn retain(&mut self, mut keep: impl FnMut(u64, &T) -> bool) {
        self.items.retain(|id, item| keep(*id, item));
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_not_reused() {
        let mut arena = Arena::default();
        let a = arena.insert("a");
        let b = arena.insert("b");
        assert_eq!(arena.remove(b), Some("b"));
        let c = arena.insert("c");
        assert!(c > b && b > a);
        assert_eq!(arena.remove(b), None);
    }

    #[test]
    fn test_iteration_in_registration_order() {
        let mut arena = Arena::default();
        arena.insert(3);
        arena.insert(1);
        arena.insert(2);
        let order: Vec<i32> = arena.iter().map(|(_, v)| *v).collect();
        assert_eq!(order, vec![3, 1, 2]);
        arena.retain(|_, v| *v != 1);
        assert_eq!(arena.len(), 2);
    }
}
