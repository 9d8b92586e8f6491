//! CLI key=value parser (spec.md §6), modeled on the teacher's `args.rs`
//! argument-capture module — but returning a `Map` value instead of
//! pushing onto a concatenative stack, since this crate has no stack
//! machine to push onto.
//!
//! `argv[0]` becomes key `Unsigned(0)` (matching
//! `original_source/src/pw_args.c`'s `PwValue zero = PwUnsigned(0);
//! pw_map_update(result, &zero, &argv0)` — an integer key, not a string
//! one); each subsequent argument splits at its first `=` (missing `=`
//! means the value is `Null`; a duplicate key means the last occurrence
//! wins, matching `Map::update`'s replace semantics).

use crate::map::Map;
use crate::pwstring::PwString;
use crate::value::Value;

/// Parse `argv` into a `Map`: `argv[0]` under key `Unsigned(0)`, then each
/// `key=value` (or bare `key`) argument under its own string key.
pub fn parse_args(argv: &[String]) -> Map {
    let map = Map::new();
    let mut iter = argv.iter();
    if let Some(program) = iter.next() {
        map.update(Value::Unsigned(0), Value::Str(PwString::from(program.as_str())));
    }
    for arg in iter {
        match arg.split_once('=') {
            Some((key, value)) => {
                map.update(
                    Value::Str(PwString::from(key)),
                    Value::Str(PwString::from(value)),
                );
            }
            None => {
                map.update(Value::Str(PwString::from(arg.as_str())), Value::Null);
            }
        }
    }
    map
}
