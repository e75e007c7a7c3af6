//! Id-indexed component storage.
//!
//! Slots freed by deletion are reused, but every allocation receives a fresh
//! id, so an id never refers to two different components over the lifetime
//! of a graph.

use std::collections::HashMap;
use std::hash::Hash;

use crate::types::{EdgeId, FaceId, VertexId};

/// Integer id usable as an arena key
pub trait ArenaId: Copy + Eq + Hash + Ord + std::fmt::Debug {
    fn from_raw(raw: u32) -> Self;
    fn raw(self) -> u32;
}

impl ArenaId for VertexId {
    fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
    fn raw(self) -> u32 {
        self.0
    }
}

impl ArenaId for EdgeId {
    fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
    fn raw(self) -> u32 {
        self.0
    }
}

impl ArenaId for FaceId {
    fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
    fn raw(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ComponentArena<I: ArenaId, T> {
    slots: Vec<Option<(I, T)>>,
    index: HashMap<I, usize>,
    free: Vec<usize>,
    next_id: u32,
}

impl<I: ArenaId, T> Default for ComponentArena<I, T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            index: HashMap::new(),
            free: Vec::new(),
            next_id: 1,
        }
    }
}

impl<I: ArenaId, T> ComponentArena<I, T> {
    /// Allocate a fresh id and store the value built from it.
    pub(crate) fn allocate(&mut self, make: impl FnOnce(I) -> T) -> I {
        let id = I::from_raw(self.next_id);
        self.next_id += 1;
        let value = make(id);
        self.place(id, value);
        id
    }

    /// Store a value under a caller-provided id (archive reads).
    ///
    /// Fails if the id is already live or is the reserved id 0.
    pub(crate) fn insert_with_id(&mut self, id: I, value: T) -> bool {
        if id.raw() == 0 || self.index.contains_key(&id) {
            return false;
        }
        self.next_id = self.next_id.max(id.raw().saturating_add(1));
        self.place(id, value);
        true
    }

    fn place(&mut self, id: I, value: T) {
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some((id, value));
                slot
            }
            None => {
                self.slots.push(Some((id, value)));
                self.slots.len() - 1
            }
        };
        self.index.insert(id, slot);
    }

    pub(crate) fn remove(&mut self, id: I) -> Option<T> {
        let slot = self.index.remove(&id)?;
        let (_, value) = self.slots[slot].take()?;
        self.free.push(slot);
        Some(value)
    }

    pub(crate) fn get(&self, id: I) -> Option<&T> {
        let slot = *self.index.get(&id)?;
        self.slots[slot].as_ref().map(|(_, value)| value)
    }

    pub(crate) fn get_mut(&mut self, id: I) -> Option<&mut T> {
        let slot = *self.index.get(&id)?;
        self.slots[slot].as_mut().map(|(_, value)| value)
    }

    pub(crate) fn contains(&self, id: I) -> bool {
        self.index.contains_key(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.index.len()
    }

    /// Live values in slot order
    pub(crate) fn iter(&self) -> impl Iterator<Item = &T> {
        self.slots
            .iter()
            .filter_map(|slot| slot.as_ref().map(|(_, value)| value))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.slots
            .iter_mut()
            .filter_map(|slot| slot.as_mut().map(|(_, value)| value))
    }

    /// Live ids sorted ascending
    pub(crate) fn sorted_ids(&self) -> Vec<I> {
        let mut ids: Vec<I> = self.index.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// The id the next allocation will receive
    pub(crate) fn next_id(&self) -> u32 {
        self.next_id
    }
}
