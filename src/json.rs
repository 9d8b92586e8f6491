//! JSON rendering (spec.md §6): `to_json` over `Value`, generalizing the
//! teacher's `son.rs` recursive formatter (Seq Object Notation) from
//! Seq's prefix/postfix grammar to JSON's bracket grammar — same
//! structural approach (recursive `format_value` + indent bookkeeping),
//! different output syntax. Escaping matches
//! `original_source/src/pw_to_json.c::escape_string` exactly: only `"`,
//! `\`, and control characters (`< 32`) are escaped, with `\b \f \n \r \t`
//! special-cased and everything else as `\u00xx`.

use crate::array::Array;
use crate::map::Map;
use crate::primitive;
use crate::value::Value;

/// Render `value` as JSON. `indent == 0` produces compact single-line
/// output; `indent > 0` renders arrays/maps with more than one element
/// one entry per line, indented by `indent` spaces per level (spec.md
/// §6, scenario F).
pub fn to_json(value: &Value, indent: usize) -> String {
    let mut buf = String::new();
    format_value(value, indent, 0, &mut buf);
    buf
}

fn format_value(value: &Value, indent: usize, depth: usize, buf: &mut String) {
    match value {
        Value::Null | Value::Ptr(0) => buf.push_str("null"),
        Value::Bool(b) => buf.push_str(if *b { "true" } else { "false" }),
        Value::Compound(c) => {
            if let Some(array) = Array::from_compound(c.clone()) {
                format_array(&array, indent, depth, buf);
            } else if let Some(map) = Map::from_compound(c.clone()) {
                format_map(&map, indent, depth, buf);
            } else {
                format_string(&primitive::to_display_string(value), buf);
            }
        }
        Value::Str(_) | Value::CharPtr(_) => format_string(&primitive::to_display_string(value), buf),
        _ => buf.push_str(&primitive::to_display_string(value)),
    }
}

fn format_string(s: &str, buf: &mut String) {
    buf.push('"');
    for c in s.chars() {
        match c {
            '"' => buf.push_str("\\\""),
            '\\' => buf.push_str("\\\\"),
            '\u{8}' => buf.push_str("\\b"),
            '\u{c}' => buf.push_str("\\f"),
            '\n' => buf.push_str("\\n"),
            '\r' => buf.push_str("\\r"),
            '\t' => buf.push_str("\\t"),
            c if (c as u32) < 32 => buf.push_str(&format!("\\u{:04x}", c as u32)),
            c => buf.push(c),
        }
    }
    buf.push('"');
}

fn push_indent(buf: &mut String, depth: usize, indent: usize) {
    buf.push('\n');
    buf.extend(std::iter::repeat_n(' ', depth * indent));
}

fn format_array(array: &Array, indent: usize, depth: usize, buf: &mut String) {
    let items = array.iter_values();
    buf.push('[');
    if items.is_empty() {
        buf.push(']');
        return;
    }
    let multiline = indent > 0 && items.len() > 1;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            buf.push(',');
        }
        if multiline {
            push_indent(buf, depth + 1, indent);
        }
        format_value(item, indent, depth + if multiline { 1 } else { 0 }, buf);
    }
    if multiline {
        push_indent(buf, depth, indent);
    }
    buf.push(']');
}

fn format_map(map: &Map, indent: usize, depth: usize, buf: &mut String) {
    let pairs = map.iter_pairs();
    buf.push('{');
    if pairs.is_empty() {
        buf.push('}');
        return;
    }
    let multiline = indent > 0 && pairs.len() > 1;
    for (i, (key, value)) in pairs.iter().enumerate() {
        if i > 0 {
            buf.push(',');
        }
        if multiline {
            push_indent(buf, depth + 1, indent);
        }
        format_string(&primitive::to_display_string(key), buf);
        buf.push(':');
        if indent > 0 {
            buf.push(' ');
        }
        format_value(value, indent, depth + if multiline { 1 } else { 0 }, buf);
    }
    if multiline {
        push_indent(buf, depth, indent);
    }
    buf.push('}');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pwstring::PwString;

    #[test]
    fn primitives_render_canonically() {
        assert_eq!(to_json(&Value::Null, 0), "null");
        assert_eq!(to_json(&Value::Bool(true), 0), "true");
        assert_eq!(to_json(&Value::Signed(42), 0), "42");
    }

    #[test]
    fn string_escapes_quotes_backslash_and_controls() {
        let s = Value::Str(PwString::from("a\"b\\c\nd"));
        assert_eq!(to_json(&s, 0), "\"a\\\"b\\\\c\\nd\"");
    }

    #[test]
    fn mixed_structure_round_trip_matches_scenario_f() {
        let outer = Array::new();
        outer.push(Value::Str(PwString::from("this"))).unwrap();
        outer.push(Value::Str(PwString::from("is"))).unwrap();
        outer.push(Value::Str(PwString::from("a"))).unwrap();

        let inner_list = Array::new();
        inner_list.push(Value::Str(PwString::from("one"))).unwrap();
        inner_list.push(Value::Str(PwString::from("two"))).unwrap();

        let deepest = Array::new();
        deepest.push(Value::Signed(1)).unwrap();
        deepest.push(Value::Signed(2)).unwrap();
        let four_map = Map::new();
        four_map.update(Value::Str(PwString::from("four")), Value::Str(PwString::from("five\nsix\n")));
        deepest.push(four_map.as_value()).unwrap();

        let three_map = Map::new();
        three_map.update(Value::Str(PwString::from("three")), deepest.as_value());
        inner_list.push(three_map.as_value()).unwrap();

        let number_map = Map::new();
        number_map.update(Value::Str(PwString::from("number")), Value::Signed(1));
        number_map.update(Value::Str(PwString::from("list")), inner_list.as_value());
        outer.push(number_map.as_value()).unwrap();
        outer.push(Value::Str(PwString::from("daz good"))).unwrap();

        let expected = "[\"this\",\"is\",\"a\",{\"number\":1,\"list\":[\"one\",\"two\",{\"three\":[1,2,{\"four\":\"five\\nsix\\n\"}]}]},\"daz good\"]";
        assert_eq!(to_json(&outer.as_value(), 0), expected);
    }
}
