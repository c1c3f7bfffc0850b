//! Generation-checked handle table
//!
//! Handles pack a slot index (low 16 bits, stored off by one so a handle is
//! never zero) and the slot's generation (high 16 bits). Removing an entry
//! bumps the generation, so stale handles fail the lookup instead of
//! aliasing whatever reuses the slot.

use std::num::NonZeroU32;

const INDEX_BITS: u32 = 16;
const INDEX_MASK: u32 = (1 << INDEX_BITS) - 1;

/// Largest number of entries a table can hold.
pub const MAX_ENTRIES: usize = INDEX_MASK as usize;

struct Slot<T> {
    generation: u16,
    value: Option<T>,
}

pub(crate) struct HandleTable<T> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
    capacity: usize,
    len: usize,
}

impl<T> HandleTable<T> {
    /// Table holding at most `capacity` live entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            capacity: capacity.min(MAX_ENTRIES),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Insert a value; `None` when the table is full.
    pub fn insert(&mut self, value: T) -> Option<NonZeroU32> {
        if self.len >= self.capacity {
            return None;
        }
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    value: None,
                });
                self.slots.len() - 1
            }
        };
        let slot = &mut self.slots[index];
        slot.value = Some(value);
        self.len += 1;
        Some(encode(index, slot.generation))
    }

    pub fn get(&self, handle: NonZeroU32) -> Option<&T> {
        let (index, generation) = decode(handle);
        self.slots
            .get(index)
            .filter(|slot| slot.generation == generation)
            .and_then(|slot| slot.value.as_ref())
    }

    pub fn get_mut(&mut self, handle: NonZeroU32) -> Option<&mut T> {
        let (index, generation) = decode(handle);
        self.slots
            .get_mut(index)
            .filter(|slot| slot.generation == generation)
            .and_then(|slot| slot.value.as_mut())
    }

    pub fn remove(&mut self, handle: NonZeroU32) -> Option<T> {
        let (index, generation) = decode(handle);
        let slot = self.slots.get_mut(index)?;
        if slot.generation != generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);
        self.len -= 1;
        Some(value)
    }

    /// Remove every entry for which `keep` returns false.
    pub fn retain(&mut self, mut keep: impl FnMut(NonZeroU32, &mut T) -> bool) {
        for index in 0..self.slots.len() {
            let generation = self.slots[index].generation;
            let Some(value) = self.slots[index].value.as_mut() else {
                continue;
            };
            if !keep(encode(index, generation), value) {
                let slot = &mut self.slots[index];
                slot.value = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index);
                self.len -= 1;
            }
        }
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (NonZeroU32, &mut T)> {
        self.slots.iter_mut().enumerate().filter_map(|(index, slot)| {
            let generation = slot.generation;
            slot.value
                .as_mut()
                .map(|value| (encode(index, generation), value))
        })
    }

    /// Drop every entry, invalidating all outstanding handles.
    pub fn clear(&mut self) {
        self.retain(|_, _| false);
    }
}

fn encode(index: usize, generation: u16) -> NonZeroU32 {
    NonZeroU32::MIN.saturating_add(index as u32) | ((generation as u32) << INDEX_BITS)
}

fn decode(handle: NonZeroU32) -> (usize, u16) {
    let raw = handle.get();
    let index = ((raw & INDEX_MASK) as usize).wrapping_sub(1);
    (index, (raw >> INDEX_BITS) as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_handles_miss_after_reuse() {
        let mut table = HandleTable::with_capacity(4);
        let first = table.insert("a").unwrap();
        assert_eq!(table.remove(first), Some("a"));

        let second = table.insert("b").unwrap();
        assert_ne!(first, second);
        assert!(table.get(first).is_none());
        assert_eq!(table.get(second), Some(&"b"));
    }

    #[test]
    fn capacity_is_enforced() {
        let mut table = HandleTable::with_capacity(2);
        assert!(table.insert(1).is_some());
        assert!(table.insert(2).is_some());
        assert!(table.insert(3).is_none());
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn retain_invalidates_removed_entries() {
        let mut table = HandleTable::with_capacity(8);
        let keep = table.insert(1).unwrap();
        let drop = table.insert(2).unwrap();
        table.retain(|_, value| *value == 1);

        assert!(table.get(keep).is_some());
        assert!(table.get(drop).is_none());

        table.clear();
        assert!(table.get(keep).is_none());
        assert_eq!(table.len(), 0);
    }
}
