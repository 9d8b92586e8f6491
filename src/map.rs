//! Insertion-ordered map: an ordered list of key-value pairs plus an
//! open-addressed hash index for O(1)-average lookup.
//!
//! The index stores 1-based positions into the kv-pair list (0 means
//! empty slot) and probes linearly on collision. Slot width is plain
//! `usize` here rather than width-dispatched 1/2/4/8-byte storage: that
//! packing was a memory-footprint optimization for the C layout, not an
//! observable behavior, so it's dropped in favor of a flat `Vec<usize>` —
//! the resize policy and probe sequence it implements are unchanged.

use std::sync::OnceLock;

use crate::compound::{Compound, CompoundData, CompoundPayload};
use crate::primitive;
use crate::registry::{self, TypeId};
use crate::status::{Status, StatusCode};
use crate::value::Value;

pub fn map_type() -> TypeId {
    static TYPE: OnceLock<TypeId> = OnceLock::new();
    *TYPE.get_or_init(|| registry::add_type("Map", Vec::new()))
}

const INITIAL_SLOTS: usize = 8;

pub(crate) struct MapData {
    pairs: Vec<(Value, Value)>,
    index: Vec<usize>,
}

impl MapData {
    fn new() -> Self {
        MapData {
            pairs: Vec::new(),
            index: vec![0; INITIAL_SLOTS],
        }
    }

    fn mask(&self) -> usize {
        self.index.len() - 1
    }

    /// Linear-probe to either the slot already holding `key`, or the first
    /// empty slot where it would go. Returns `(slot, probe_length)`.
    fn probe(&self, key: &Value) -> (usize, usize) {
        let mask = self.mask();
        let mut slot = (primitive::hash(key) as usize) & mask;
        let mut probes = 0;
        loop {
            let occupant = self.index[slot];
            if occupant == 0 {
                return (slot, probes);
            }
            if primitive::equal(&self.pairs[occupant - 1].0, key) {
                return (slot, probes);
            }
            slot = (slot + 1) & mask;
            probes += 1;
            if probes > self.index.len() {
                unreachable!("hash index probed more slots than it has; resize policy is broken");
            }
        }
    }

    fn needs_resize(&self, probe_len: usize) -> bool {
        let occupied = self.pairs.len();
        occupied * 4 >= self.index.len() * 3 || probe_len * 4 >= self.index.len()
    }

    fn resize(&mut self) {
        let new_len = self.index.len() * 2;
        self.index = vec![0; new_len];
        let mask = new_len - 1;
        for (i, (key, _)) in self.pairs.iter().enumerate() {
            let mut slot = (primitive::hash(key) as usize) & mask;
            while self.index[slot] != 0 {
                slot = (slot + 1) & mask;
            }
            self.index[slot] = i + 1;
        }
    }
}

impl CompoundPayload for MapData {
    fn clear_children(&mut self) {
        self.pairs.clear();
        self.index.iter_mut().for_each(|s| *s = 0);
    }
}

/// A handle to a shared, refcounted insertion-ordered map.
#[derive(Clone)]
pub struct Map(Compound);

impl Map {
    pub fn new() -> Self {
        Map(Compound::new(map_type(), Box::new(MapData::new())))
    }

    pub fn from_compound(c: Compound) -> Option<Self> {
        if c.type_id() == map_type() {
            Some(Map(c))
        } else {
            None
        }
    }

    pub fn as_value(&self) -> Value {
        Value::Compound(self.0.clone())
    }

    fn data(&self) -> &std::rc::Rc<CompoundData> {
        &self.0 .0
    }

    fn with_map<R>(&self, f: impl FnOnce(&MapData) -> R) -> R {
        let payload = self.data().payload.borrow();
        f(downcast(&payload))
    }

    fn with_map_mut<R>(&self, f: impl FnOnce(&mut MapData) -> R) -> R {
        let mut payload = self.data().payload.borrow_mut();
        f(downcast_mut(&mut payload))
    }

    pub fn len(&self) -> usize {
        self.with_map(|m| m.pairs.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &Value) -> Option<Value> {
        self.with_map(|m| {
            let (slot, _) = m.probe(key);
            let occupant = m.index[slot];
            if occupant == 0 {
                None
            } else {
                Some(m.pairs[occupant - 1].1.clone())
            }
        })
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.get(key).is_some()
    }

    /// Deep-copy the key, replace-or-append the value. Values are
    /// ref-cloned (a compound value's `Rc` is shared, not deep-copied).
    pub fn update(&self, key: Value, value: Value) {
        if let Value::Compound(child) = &value {
            crate::compound::adopt(&self.0, child);
        }
        let old = self.with_map_mut(|m| {
            let (slot, probe_len) = m.probe(&key);
            let occupant = m.index[slot];
            if occupant != 0 {
                let stored = &mut m.pairs[occupant - 1];
                return Some(std::mem::replace(&mut stored.1, value));
            }
            m.pairs.push((crate::value::clone_value(&key), value));
            m.index[slot] = m.pairs.len();
            if m.needs_resize(probe_len) {
                m.resize();
            }
            None
        });
        if let Some(Value::Compound(old_child)) = old {
            crate::compound::release_child(&self.0, old_child);
        }
    }

    /// Remove `key`'s slot and kv pair, then shift every index slot that
    /// pointed past the removed position down by one so insertion-order
    /// enumeration over the remaining pairs stays correct.
    pub fn del(&self, key: &Value) -> Result<Value, Status> {
        let removed = self.with_map_mut(|m| {
            let (slot, _) = m.probe(key);
            let occupant = m.index[slot];
            if occupant == 0 {
                return None;
            }
            let removed_pos = occupant - 1;
            let (_, value) = m.pairs.remove(removed_pos);
            m.index[slot] = 0;
            for s in m.index.iter_mut() {
                if *s > occupant {
                    *s -= 1;
                }
            }
            Some(value)
        });
        match removed {
            Some(value) => {
                if let Value::Compound(child) = &value {
                    crate::compound::release_child(&self.0, child.clone());
                }
                Ok(value)
            }
            None => Err(crate::status!(StatusCode::KeyNotFound)),
        }
    }

    /// `i`-th key/value pair in insertion order.
    pub fn map_item(&self, i: usize) -> Option<(Value, Value)> {
        self.with_map(|m| m.pairs.get(i).cloned())
    }

    pub fn iter_pairs(&self) -> Vec<(Value, Value)> {
        self.with_map(|m| m.pairs.clone())
    }
}

impl Default for Map {
    fn default() -> Self {
        Self::new()
    }
}

fn downcast(payload: &Box<dyn CompoundPayload>) -> &MapData {
    let ptr: *const dyn CompoundPayload = &**payload;
    unsafe { &*(ptr as *const MapData) }
}

fn downcast_mut(payload: &mut Box<dyn CompoundPayload>) -> &mut MapData {
    let ptr: *mut dyn CompoundPayload = &mut **payload;
    unsafe { &mut *(ptr as *mut MapData) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pwstring::PwString;

    fn key(s: &str) -> Value {
        Value::Str(PwString::from(s))
    }

    #[test]
    fn update_then_get_round_trips() {
        let m = Map::new();
        m.update(key("a"), Value::Signed(1));
        m.update(key("b"), Value::Signed(2));
        assert_eq!(m.get(&key("a")), Some(Value::Signed(1)));
        assert_eq!(m.get(&key("b")), Some(Value::Signed(2)));
        assert_eq!(m.get(&key("c")), None);
    }

    #[test]
    fn update_existing_key_replaces_value() {
        let m = Map::new();
        m.update(key("a"), Value::Signed(1));
        m.update(key("a"), Value::Signed(2));
        assert_eq!(m.len(), 1);
        assert_eq!(m.get(&key("a")), Some(Value::Signed(2)));
    }

    #[test]
    fn insertion_order_preserved_through_iteration() {
        let m = Map::new();
        m.update(key("z"), Value::Signed(1));
        m.update(key("a"), Value::Signed(2));
        m.update(key("m"), Value::Signed(3));
        let pairs = m.iter_pairs();
        let keys: Vec<String> = pairs
            .iter()
            .map(|(k, _)| primitive::to_display_string(k))
            .collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn delete_preserves_order_of_remaining_entries() {
        let m = Map::new();
        m.update(key("a"), Value::Signed(1));
        m.update(key("b"), Value::Signed(2));
        m.update(key("c"), Value::Signed(3));
        m.del(&key("b")).unwrap();
        let pairs = m.iter_pairs();
        let keys: Vec<String> = pairs
            .iter()
            .map(|(k, _)| primitive::to_display_string(k))
            .collect();
        assert_eq!(keys, vec!["a", "c"]);
        assert_eq!(m.get(&key("c")), Some(Value::Signed(3)));
    }

    #[test]
    fn delete_missing_key_is_an_error() {
        let m = Map::new();
        assert!(m.del(&key("nope")).is_err());
    }

    #[test]
    fn grows_past_initial_capacity() {
        let m = Map::new();
        for i in 0..100 {
            m.update(Value::Signed(i), Value::Signed(i * 2));
        }
        assert_eq!(m.len(), 100);
        for i in 0..100 {
            assert_eq!(m.get(&Value::Signed(i)), Some(Value::Signed(i * 2)));
        }
    }
}
