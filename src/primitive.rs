//! Operations over primitive `Value`s: equality, hashing, truthiness, and
//! string rendering. Compound values delegate their own `equal`/`hash` to
//! their concrete kind (array/map/etc.); this module only concerns itself
//! with the numeric/null/bool/pointer/string primitives.

use crate::hash::hash_bytes;
use crate::pwstring::PwString;
use crate::value::Value;

/// Cross-type equality rules:
/// - `Null` equals a null `Ptr`/`CharPtr("")`-style pointer (both "nothing").
/// - `Signed`/`Unsigned` compare numerically across the sign boundary
///   (`-1i64` as `Signed` is never equal to any `Unsigned`, but
///   `Signed(5)` equals `Unsigned(5)`).
/// - `Float` compares numerically against `Signed`/`Unsigned` by
///   converting the integer side (not the float side, to avoid precision
///   loss silently hiding real differences).
/// - `Bool` only ever equals another `Bool`.
pub fn equal(a: &Value, b: &Value) -> bool {
    use Value::*;
    match (a, b) {
        (Null, Null) => true,
        (Null, Ptr(0)) | (Ptr(0), Null) => true,
        (Bool(x), Bool(y)) => x == y,
        (Signed(x), Signed(y)) => x == y,
        (Unsigned(x), Unsigned(y)) => x == y,
        (Signed(x), Unsigned(y)) | (Unsigned(y), Signed(x)) => *x >= 0 && (*x as u64) == *y,
        (Float(x), Float(y)) => x == y,
        (Float(f), Signed(i)) | (Signed(i), Float(f)) => *f == *i as f64,
        (Float(f), Unsigned(u)) | (Unsigned(u), Float(f)) => *f == *u as f64,
        (Timestamp(x), Timestamp(y)) => x == y,
        (DateTime(x), DateTime(y)) => x == y,
        (Ptr(x), Ptr(y)) => x == y,
        (CharPtr(x), CharPtr(y)) => x == y,
        (Str(x), Str(y)) => x == y,
        (Compound(x), Compound(y)) => x == y,
        _ => false,
    }
}

/// Hash consistent with `equal`: numerically-equal values across the
/// Signed/Unsigned/Float boundary must hash identically, so integers
/// (signed or unsigned) and whole-valued floats all hash via their
/// canonical unsigned bit pattern.
pub fn hash(value: &Value) -> u64 {
    use Value::*;
    match value {
        Null | Ptr(0) => hash_bytes(b"null"),
        Bool(b) => hash_bytes(&[1, *b as u8]),
        Signed(i) if *i >= 0 => hash_bytes(&(*i as u64).to_le_bytes()),
        Signed(i) => hash_bytes(&i.to_le_bytes()),
        Unsigned(u) => hash_bytes(&u.to_le_bytes()),
        Float(f) if f.fract() == 0.0 && *f >= 0.0 && *f <= u64::MAX as f64 => {
            hash_bytes(&(*f as u64).to_le_bytes())
        }
        Float(f) => hash_bytes(&f.to_bits().to_le_bytes()),
        Timestamp(t) => hash_bytes(&t.to_le_bytes()),
        DateTime(dt) => hash_bytes(&format!("{dt:?}").into_bytes()),
        Ptr(p) => hash_bytes(&p.to_le_bytes()),
        CharPtr(s) => hash_bytes(s.as_bytes()),
        Str(s) => hash_bytes(s.as_str().as_bytes()),
        Compound(c) => hash_bytes(&(c.0.as_ref() as *const _ as usize).to_le_bytes()),
    }
}

/// Truthiness: `Null`/null pointers and zero-valued numerics are falsy;
/// empty strings are falsy; everything else (including any compound
/// value, even an empty array) is truthy.
pub fn is_true(value: &Value) -> bool {
    use Value::*;
    match value {
        Null => false,
        Ptr(0) => false,
        Bool(b) => *b,
        Signed(i) => *i != 0,
        Unsigned(u) => *u != 0,
        Float(f) => *f != 0.0,
        Str(s) => !s.is_empty(),
        CharPtr(s) => !s.is_empty(),
        _ => true,
    }
}

pub fn to_display_string(value: &Value) -> String {
    use Value::*;
    match value {
        Null => "null".to_string(),
        Bool(b) => b.to_string(),
        Signed(i) => i.to_string(),
        Unsigned(u) => u.to_string(),
        Float(f) => f.to_string(),
        Timestamp(t) => t.to_string(),
        DateTime(dt) => format!(
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:09}",
            dt.year, dt.month, dt.day, dt.hour, dt.minute, dt.second, dt.nanosecond
        ),
        Ptr(p) => format!("0x{p:x}"),
        CharPtr(s) => s.to_string(),
        Str(s) => s.as_str().to_string(),
        Compound(c) => format!("<compound type={:?}>", c.type_id()),
    }
}

pub fn create_str(s: impl Into<PwString>) -> Value {
    Value::Str(s.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::DateTimeValue;

    #[test]
    fn null_equals_null_pointer() {
        assert!(equal(&Value::Null, &Value::Ptr(0)));
        assert!(equal(&Value::Ptr(0), &Value::Null));
        assert!(!equal(&Value::Null, &Value::Ptr(1)));
    }

    #[test]
    fn signed_unsigned_cross_equality() {
        assert!(equal(&Value::Signed(5), &Value::Unsigned(5)));
        assert!(!equal(&Value::Signed(-1), &Value::Unsigned(u64::MAX)));
    }

    #[test]
    fn float_int_cross_equality_and_hash() {
        assert!(equal(&Value::Float(5.0), &Value::Signed(5)));
        assert_eq!(hash(&Value::Float(5.0)), hash(&Value::Signed(5)));
        assert_eq!(hash(&Value::Float(5.0)), hash(&Value::Unsigned(5)));
    }

    #[test]
    fn bool_never_equals_numeric() {
        assert!(!equal(&Value::Bool(true), &Value::Signed(1)));
    }

    #[test]
    fn truthiness_rules() {
        assert!(!is_true(&Value::Null));
        assert!(!is_true(&Value::Signed(0)));
        assert!(is_true(&Value::Signed(-1)));
        assert!(!is_true(&Value::Str(PwString::from(""))));
        assert!(is_true(&Value::Str(PwString::from("x"))));
    }

    #[test]
    fn datetime_equality_is_structural() {
        let a = DateTimeValue {
            year: 2026,
            month: 7,
            day: 31,
            hour: 0,
            minute: 0,
            second: 0,
            nanosecond: 0,
            utc_offset_secs: 0,
        };
        assert!(equal(&Value::DateTime(a), &Value::DateTime(a)));
    }
}
