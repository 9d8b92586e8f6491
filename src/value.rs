//! The tagged runtime value.
//!
//! `Value` unifies primitives, immutable strings, and the family of
//! refcounted compound kinds (arrays, maps, status objects, string-IO
//! buffers, socket addresses) behind one type, the way the C original's
//! 16-byte tagged union does. Here the tag *is* the Rust enum
//! discriminant rather than a packed bitfield; each payload is as wide as
//! it needs to be instead of forced into a fixed 14 bytes.

use crate::compound::Compound;
use crate::pwstring::PwString;
use crate::registry::TypeId;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Signed(i64),
    Unsigned(u64),
    Float(f64),
    /// Nanoseconds since the Unix epoch.
    Timestamp(i64),
    /// Broken-down calendar time plus a UTC offset, in seconds.
    DateTime(DateTimeValue),
    /// Opaque, caller-owned pointer; equality is by address. `Null` is
    /// equal to a null `Ptr`/`CharPtr` (primitive.rs's cross-type rule).
    Ptr(usize),
    /// Caller-owned, statically-lived C-string-like payload.
    CharPtr(&'static str),
    Str(PwString),
    Compound(Compound),
}

/// Calendar time broken into fields, independent of any particular
/// locale/calendar library. Always UTC-normalized; `utc_offset_secs` is
/// carried for round-tripping a value that was parsed with an explicit
/// zone offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTimeValue {
    pub year: i32,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub nanosecond: u32,
    pub utc_offset_secs: i32,
}

impl Value {
    pub fn type_id(&self) -> TypeId {
        match self {
            Value::Compound(c) => c.type_id(),
            _ => crate::registry::NULL_TYPE,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null) || matches!(self, Value::Ptr(0))
    }

    pub fn as_compound(&self) -> Option<&Compound> {
        match self {
            Value::Compound(c) => Some(c),
            _ => None,
        }
    }
}

/// Drop a `Value`'s ownership correctly: compound variants must route
/// through cycle collection rather than relying solely on `Rc`'s own
/// `Drop`, since a cyclic structure's strong count never naturally
/// reaches zero. Acyclic structures behave identically either way — this
/// is always safe to call, not just for cycles.
pub fn drop_value(value: Value) {
    if let Value::Compound(c) = value {
        crate::compound::drop_external(c);
    }
}

/// Deep-ish clone: for compound values this is a cheap `Rc::clone` (the
/// shared block is untouched); for strings it's the string engine's own
/// copy-on-write clone.
pub fn clone_value(value: &Value) -> Value {
    value.clone()
}
