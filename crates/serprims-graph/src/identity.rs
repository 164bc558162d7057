//! Identity-keyed open-addressing table.
//!
//! Keys are compared by allocation address, never by value. The table owns
//! a clone of every key it stores, so a referent cannot be freed (and its
//! address reused) while its entry is live.

use std::rc::Rc;
use std::sync::Arc;

/// Smallest table capacity.
pub const MIN_CAPACITY: usize = 16;

/// A key with a stable identity for as long as it is alive.
pub trait IdentityKey: Clone {
    fn identity(&self) -> usize;
}

impl<T: ?Sized> IdentityKey for Rc<T> {
    fn identity(&self) -> usize {
        Rc::as_ptr(self) as *const () as usize
    }
}

impl<T: ?Sized> IdentityKey for Arc<T> {
    fn identity(&self) -> usize {
        Arc::as_ptr(self) as *const () as usize
    }
}

/// Maps object identities to non-zero `i32` values.
///
/// Double hashing over a power-of-two slot array. The load factor never
/// exceeds one half; the table doubles before an insert would cross it.
/// Zero is the "absent" answer of [`find`](Self::find) and must not be
/// stored.
#[derive(Debug)]
pub struct IdentityTable<K> {
    slots: Vec<Option<(K, i32)>>,
    len: usize,
}

impl<K: IdentityKey> IdentityTable<K> {
    pub fn new() -> Self {
        Self::with_capacity(MIN_CAPACITY)
    }

    /// Create a table with at least `capacity` slots (rounded up to a power
    /// of two, never below [`MIN_CAPACITY`]).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_CAPACITY).next_power_of_two();
        Self {
            slots: empty_slots(capacity),
            len: 0,
        }
    }

    /// Value stored for `key`, or 0.
    pub fn find(&self, key: &K) -> i32 {
        match self.locate(key.identity()) {
            Ok(slot) => self.value_at(slot),
            Err(_) => 0,
        }
    }

    /// Store `value` for `key`, overwriting any previous value.
    pub fn insert(&mut self, key: K, value: i32) {
        debug_assert_ne!(value, 0, "zero is reserved for absent entries");
        let id = key.identity();
        match self.locate(id) {
            Ok(slot) => {
                if let Some(entry) = &mut self.slots[slot] {
                    entry.1 = value;
                }
            }
            Err(_) => {
                if (self.len + 1) * 2 > self.capacity() {
                    self.grow();
                }
                self.place(key, value);
                self.len += 1;
            }
        }
    }

    /// Return the existing value for `key`, or store `value` and return it.
    pub fn insert_if_absent(&mut self, key: K, value: i32) -> i32 {
        let existing = self.find(&key);
        if existing != 0 {
            return existing;
        }
        self.insert(key, value);
        value
    }

    /// Drop every entry, releasing the stored keys. Capacity is kept.
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.len = 0;
    }

    /// Live entries.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Slot count, always a power of two.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Live entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, i32)> + '_ {
        self.slots
            .iter()
            .filter_map(|slot| slot.as_ref().map(|(key, value)| (key, *value)))
    }

    fn mask(&self) -> usize {
        self.slots.len() - 1
    }

    fn value_at(&self, slot: usize) -> i32 {
        self.slots[slot].as_ref().map_or(0, |(_, value)| *value)
    }

    /// `Ok(slot)` holding `id`, or `Err(slot)` where it would go.
    fn locate(&self, id: usize) -> Result<usize, usize> {
        let mask = self.mask();
        let step = hash_step(id, mask);
        let mut slot = mix(id) & mask;
        loop {
            match &self.slots[slot] {
                None => return Err(slot),
                Some((key, _)) if key.identity() == id => return Ok(slot),
                Some(_) => slot = (slot + step) & mask,
            }
        }
    }

    fn place(&mut self, key: K, value: i32) {
        if let Err(slot) = self.locate(key.identity()) {
            self.slots[slot] = Some((key, value));
        }
    }

    fn grow(&mut self) {
        let capacity = self.capacity() * 2;
        let old = std::mem::replace(&mut self.slots, empty_slots(capacity));
        for (key, value) in old.into_iter().flatten() {
            self.place(key, value);
        }
        tracing::trace!(capacity, entries = self.len, "identity table grown");
    }
}

impl<K: IdentityKey> Default for IdentityTable<K> {
    fn default() -> Self {
        Self::new()
    }
}

fn empty_slots<K>(capacity: usize) -> Vec<Option<(K, i32)>> {
    std::iter::repeat_with(|| None).take(capacity).collect()
}

/// Primary hash: the 64-bit finalizer from MurmurHash3.
fn mix(id: usize) -> usize {
    let mut x = id as u64;
    x ^= x >> 33;
    x = x.wrapping_mul(0xff51_afd7_ed55_8ccd);
    x ^= x >> 33;
    x = x.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    x ^= x >> 33;
    x as usize
}

/// Secondary hash, independent of [`mix`].
fn mix2(id: usize) -> usize {
    let mut x = (id as u64).rotate_left(29) ^ 0x9e37_79b9_7f4a_7c15;
    x ^= x >> 30;
    x = x.wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^= x >> 31;
    x as usize
}

/// Odd step, so probing cycles through every slot of a power-of-two table.
fn hash_step(id: usize, mask: usize) -> usize {
    ((mix2(id) << 1) | 1) & mask
}
