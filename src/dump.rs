//! Generic dispatch over compound values: `to_string`/`dump`, with the
//! cycle-aware "dump chain" spec.md §4.3 describes for diagnosing
//! self-referential structures.
//!
//! The chain is an intrusive singly-linked list of `(value identity,
//! parent frame)` built on the call stack as `dump` recurses — each
//! nested call checks whether its value's identity already appears
//! further up the chain before descending, short-circuiting with an
//! "already dumped" marker instead of recursing forever.

use crate::array::Array;
use crate::map::Map;
use crate::primitive;
use crate::value::Value;

#[cfg(feature = "net")]
use crate::sockaddr::SockAddr;

/// One frame of the dump chain: the compound pointer currently being
/// dumped, and the frame that dumped it (`None` at the root call).
struct ChainFrame<'a> {
    ptr: *const (),
    prev: Option<&'a ChainFrame<'a>>,
}

impl<'a> ChainFrame<'a> {
    fn contains(&self, ptr: *const ()) -> bool {
        self.ptr == ptr || self.prev.is_some_and(|p| p.contains(ptr))
    }
}

/// Render `value` the way `to_string` would: primitives canonically,
/// compounds by their own textual form, with no cycle marker (a
/// top-level `to_string` caller is expected to use `dump` instead if it
/// suspects cyclic content).
pub fn to_string(value: &Value) -> String {
    dump(value)
}

/// Render `value`, descending into compound children and replacing any
/// value already on the current dump chain with an `<already dumped>`
/// marker rather than recursing into it again.
pub fn dump(value: &Value) -> String {
    dump_inner(value, None)
}

fn dump_inner(value: &Value, chain: Option<&ChainFrame>) -> String {
    let Value::Compound(c) = value else {
        return primitive::to_display_string(value);
    };

    let ptr = c.0.as_ref() as *const _ as *const ();
    if let Some(frame) = chain {
        if frame.contains(ptr) {
            return "<already dumped>".to_string();
        }
    }
    let frame = ChainFrame { ptr, prev: chain };

    if let Some(array) = Array::from_compound(c.clone()) {
        let items: Vec<String> = array
            .iter_values()
            .iter()
            .map(|v| dump_inner(v, Some(&frame)))
            .collect();
        return format!("[{}]", items.join(", "));
    }
    if let Some(map) = Map::from_compound(c.clone()) {
        let pairs: Vec<String> = map
            .iter_pairs()
            .iter()
            .map(|(k, v)| format!("{}: {}", dump_inner(k, Some(&frame)), dump_inner(v, Some(&frame))))
            .collect();
        return format!("{{{}}}", pairs.join(", "));
    }
    #[cfg(feature = "net")]
    if let Some(sockaddr) = SockAddr::from_compound(c.clone()) {
        return format!("{sockaddr:?}");
    }

    // Fallback for compound kinds with no nested Values (Status, Socket,
    // StringIO, …): render via the shared compound Debug impl.
    format!("{c:?}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pwstring::PwString;

    #[test]
    fn primitives_dump_canonically() {
        assert_eq!(dump(&Value::Signed(42)), "42");
        assert_eq!(dump(&Value::Str(PwString::from("hi"))), "hi");
    }

    #[test]
    fn nested_array_dumps_recursively() {
        let inner = Array::new();
        inner.push(Value::Signed(1)).unwrap();
        let outer = Array::new();
        outer.push(inner.as_value()).unwrap();
        outer.push(Value::Signed(2)).unwrap();
        assert_eq!(dump(&outer.as_value()), "[[1], 2]");
    }

    #[test]
    fn self_referential_array_short_circuits() {
        let array = Array::new();
        array.push(Value::Signed(1)).unwrap();
        array.push(array.as_value()).unwrap();
        let rendered = dump(&array.as_value());
        assert!(rendered.contains("<already dumped>"));
        // break the cycle so the test doesn't leak (the crate's cycle
        // collector only fires when the external refcount drops to zero;
        // a direct self-push keeps it above zero for this binding's life).
        array.delete(1).unwrap();
    }
}
