//! Ordered array container.
//!
//! Backed by a plain `Vec<Value>` rather than the hand-rolled
//! length/capacity/items-pointer block of a C array, since `Vec` already
//! gives the doubling-style growth the container wants. What still needs
//! explicit modeling is everything `Vec` doesn't do on its own: refusing
//! mutation while a line-reader iteration is active, and registering the
//! parent/child edge (`adopt`/`abandon`) whenever a compound value enters
//! or leaves the array's storage.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::OnceLock;

use crate::compound::{self, Compound, CompoundData, CompoundPayload};
use crate::registry::{self, TypeId};
use crate::status::{Status, StatusCode};
use crate::value::Value;

pub fn array_type() -> TypeId {
    static TYPE: OnceLock<TypeId> = OnceLock::new();
    *TYPE.get_or_init(|| registry::add_type("Array", Vec::new()))
}

pub(crate) struct ArrayData {
    items: Vec<Value>,
    itercount: Cell<u32>,
}

impl CompoundPayload for ArrayData {
    fn clear_children(&mut self) {
        self.items.clear();
    }
}

/// A handle to a shared, refcounted array. Cloning is cheap (`Rc::clone`
/// of the underlying block); all handles observe the same storage.
#[derive(Clone)]
pub struct Array(Compound);

impl Array {
    pub fn new() -> Self {
        let data = ArrayData {
            items: Vec::with_capacity(4),
            itercount: Cell::new(0),
        };
        Array(Compound::new(array_type(), Box::new(data)))
    }

    pub fn from_compound(c: Compound) -> Option<Self> {
        if c.type_id() == array_type() {
            Some(Array(c))
        } else {
            None
        }
    }

    pub fn as_value(&self) -> Value {
        Value::Compound(self.0.clone())
    }

    fn data(&self) -> &Rc<CompoundData> {
        &self.0 .0
    }

    fn with_items<R>(&self, f: impl FnOnce(&[Value]) -> R) -> R {
        let payload = self.data().payload.borrow();
        let array = downcast(&payload);
        f(&array.items)
    }

    fn with_items_mut<R>(&self, f: impl FnOnce(&mut Vec<Value>) -> R) -> R {
        let mut payload = self.data().payload.borrow_mut();
        let array = downcast_mut(&mut payload);
        f(&mut array.items)
    }

    pub fn len(&self) -> usize {
        self.with_items(|items| items.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn itercount(&self) -> u32 {
        let payload = self.data().payload.borrow();
        downcast(&payload).itercount.get()
    }

    fn check_mutable(&self) -> Result<(), Status> {
        if self.itercount() > 0 {
            Err(crate::status!(StatusCode::IterationInProgress)
                .with_description("array mutation refused while an iterator is active"))
        } else {
            Ok(())
        }
    }

    /// Begin a line-reader style iteration session; mutation is refused
    /// until every matching `end_iteration` call has run.
    pub fn begin_iteration(&self) {
        let payload = self.data().payload.borrow();
        let array = downcast(&payload);
        array.itercount.set(array.itercount.get() + 1);
    }

    pub fn end_iteration(&self) {
        let payload = self.data().payload.borrow();
        let array = downcast(&payload);
        array.itercount.set(array.itercount.get().saturating_sub(1));
    }

    /// Move `value` into the array, adopting it if it is a compound. There
    /// is no separate "reject a Status value" check: `Status` is a plain
    /// Rust error type, not a `Value` variant, so it is already impossible
    /// to store one here.
    pub fn push(&self, value: Value) -> Result<(), Status> {
        self.check_mutable()?;
        if let Value::Compound(child) = &value {
            compound::adopt(&self.0, child);
        }
        self.with_items_mut(|items| items.push(value));
        Ok(())
    }

    pub fn insert(&self, index: usize, value: Value) -> Result<(), Status> {
        self.check_mutable()?;
        if index > self.len() {
            return Err(crate::status!(StatusCode::IndexOutOfRange)
                .with_description("array insert index out of range"));
        }
        if let Value::Compound(child) = &value {
            compound::adopt(&self.0, child);
        }
        self.with_items_mut(|items| items.insert(index, value));
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.with_items(|items| items.get(index).cloned())
    }

    pub fn set(&self, index: usize, value: Value) -> Result<(), Status> {
        self.check_mutable()?;
        if index >= self.len() {
            return Err(crate::status!(StatusCode::IndexOutOfRange)
                .with_description("array set index out of range"));
        }
        if let Value::Compound(child) = &value {
            compound::adopt(&self.0, child);
        }
        let old = self.with_items_mut(|items| std::mem::replace(&mut items[index], value));
        if let Value::Compound(old_child) = old {
            compound::release_child(&self.0, old_child);
        }
        Ok(())
    }

    pub fn delete(&self, index: usize) -> Result<Value, Status> {
        self.check_mutable()?;
        if index >= self.len() {
            return Err(crate::status!(StatusCode::IndexOutOfRange)
                .with_description("array delete index out of range"));
        }
        let removed = self.with_items_mut(|items| items.remove(index));
        if let Value::Compound(child) = &removed {
            compound::release_child(&self.0, child.clone());
        }
        Ok(removed)
    }

    pub fn iter_values(&self) -> Vec<Value> {
        self.with_items(|items| items.to_vec())
    }

    /// Concatenate string items with `sep`; non-string items are silently
    /// skipped.
    pub fn join(&self, sep: &str) -> String {
        self.with_items(|items| {
            let mut out = String::new();
            let mut first = true;
            for item in items {
                let s = match item {
                    Value::Str(s) => s.as_str(),
                    Value::CharPtr(s) => s,
                    _ => continue,
                };
                if !first {
                    out.push_str(sep);
                }
                out.push_str(s);
                first = false;
            }
            out
        })
    }

    /// Strip the minimum common leading run of spaces/tabs shared by every
    /// non-empty string entry, in place, on every entry.
    pub fn dedent(&self) -> Result<(), Status> {
        self.check_mutable()?;
        let common = self.with_items(|items| {
            let mut common: Option<usize> = None;
            for item in items {
                let s = match item {
                    Value::Str(s) => s.as_str(),
                    _ => continue,
                };
                if s.is_empty() {
                    continue;
                }
                let prefix = s.chars().take_while(|c| *c == ' ' || *c == '\t').count();
                common = Some(match common {
                    Some(c) => c.min(prefix),
                    None => prefix,
                });
            }
            common.unwrap_or(0)
        });
        if common == 0 {
            return Ok(());
        }
        self.with_items_mut(|items| {
            for item in items.iter_mut() {
                if let Value::Str(s) = item {
                    if !s.is_empty() {
                        let remaining = s.char_count().saturating_sub(common);
                        *s = s.substr(common, remaining);
                    }
                }
            }
        });
        Ok(())
    }
}

impl Default for Array {
    fn default() -> Self {
        Self::new()
    }
}

fn downcast(payload: &Box<dyn CompoundPayload>) -> &ArrayData {
    let ptr: *const dyn CompoundPayload = &**payload;
    unsafe { &*(ptr as *const ArrayData) }
}

fn downcast_mut(payload: &mut Box<dyn CompoundPayload>) -> &mut ArrayData {
    let ptr: *mut dyn CompoundPayload = &mut **payload;
    unsafe { &mut *(ptr as *mut ArrayData) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pwstring::PwString;

    #[test]
    fn push_and_get_round_trip() {
        let a = Array::new();
        a.push(Value::Signed(1)).unwrap();
        a.push(Value::Signed(2)).unwrap();
        assert_eq!(a.len(), 2);
        assert_eq!(a.get(0), Some(Value::Signed(1)));
        assert_eq!(a.get(1), Some(Value::Signed(2)));
    }

    #[test]
    fn insert_and_delete_shift_indices() {
        let a = Array::new();
        a.push(Value::Signed(1)).unwrap();
        a.push(Value::Signed(3)).unwrap();
        a.insert(1, Value::Signed(2)).unwrap();
        assert_eq!(a.iter_values(), vec![Value::Signed(1), Value::Signed(2), Value::Signed(3)]);
        let removed = a.delete(0).unwrap();
        assert_eq!(removed, Value::Signed(1));
        assert_eq!(a.iter_values(), vec![Value::Signed(2), Value::Signed(3)]);
    }

    #[test]
    fn mutation_refused_during_iteration() {
        let a = Array::new();
        a.push(Value::Signed(1)).unwrap();
        a.begin_iteration();
        assert!(a.push(Value::Signed(2)).is_err());
        a.end_iteration();
        assert!(a.push(Value::Signed(2)).is_ok());
    }

    #[test]
    fn join_skips_non_string_items() {
        let a = Array::new();
        a.push(Value::Str(PwString::from("a"))).unwrap();
        a.push(Value::Signed(1)).unwrap();
        a.push(Value::Str(PwString::from("b"))).unwrap();
        assert_eq!(a.join(","), "a,b");
    }

    #[test]
    fn dedent_strips_common_prefix() {
        let a = Array::new();
        a.push(Value::Str(PwString::from("  foo"))).unwrap();
        a.push(Value::Str(PwString::from("    bar"))).unwrap();
        a.dedent().unwrap();
        assert_eq!(a.get(0), Some(Value::Str(PwString::from("foo"))));
        assert_eq!(a.get(1), Some(Value::Str(PwString::from("  bar"))));
    }

    #[test]
    fn nested_array_cycle_is_collected() {
        let outer = Array::new();
        let weak = Rc::downgrade(outer.data());
        outer.push(outer.as_value()).unwrap();
        assert_eq!(Rc::strong_count(outer.data()), 2);
        crate::compound::drop_external(outer.0);
        assert!(weak.upgrade().is_none());
    }
}
