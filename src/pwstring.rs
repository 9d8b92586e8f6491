//! Variable-width, copy-on-write immutable string engine.
//!
//! Three storage modes, chosen automatically by size and origin:
//!
//! - **Embedded**: up to 12 bytes held inline, no allocation at all.
//! - **Allocated**: a refcounted, copy-on-write heap buffer — cloning is
//!   `Rc::clone` until a mutating operation needs its own copy, at which
//!   point it forks (`Rc::make_mut`-style).
//! - **Static**: a caller-owned `&'static str` with no refcounting and no
//!   copy, for string literals and other process-lifetime data.
//!
//! Unlike the teacher's `SeqString`, there's no arena: this crate has no
//! per-strand allocator to bulk-free from, so "fast temporary" is just
//! "embedded" (genuinely free) or "allocated" (one `Rc`).

use std::fmt;
use std::rc::Rc;

const EMBED_CAPACITY: usize = 12;

#[derive(Clone)]
enum Storage {
    Embedded { buf: [u8; EMBED_CAPACITY], len: u8 },
    Allocated(Rc<String>),
    Static(&'static str),
}

#[derive(Clone)]
pub struct PwString(Storage);

impl PwString {
    pub fn new() -> Self {
        PwString(Storage::Embedded {
            buf: [0; EMBED_CAPACITY],
            len: 0,
        })
    }

    pub fn from_static(s: &'static str) -> Self {
        PwString(Storage::Static(s))
    }

    pub fn as_str(&self) -> &str {
        match &self.0 {
            Storage::Embedded { buf, len } => {
                std::str::from_utf8(&buf[..*len as usize]).expect("embedded storage is valid utf8")
            }
            Storage::Allocated(rc) => rc.as_str(),
            Storage::Static(s) => s,
        }
    }

    pub fn len(&self) -> usize {
        self.as_str().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn char_count(&self) -> usize {
        self.as_str().chars().count()
    }

    /// Number of bytes a code unit needs to represent every character
    /// currently in the string: 1 for pure ASCII, up to 4 for full Unicode.
    /// Mirrors the source engine's width-promotion tiers (1/2/3/4), given
    /// here as an observable property rather than a distinct in-memory
    /// representation — Rust's `String` is already UTF-8 packed, so there
    /// is no separate storage win from tracking a narrower width.
    pub fn code_unit_width(&self) -> u8 {
        self.as_str()
            .chars()
            .map(|c| match c as u32 {
                0..=0x7F => 1,
                0x80..=0x7FF => 2,
                0x800..=0xFFFF => 3,
                _ => 4,
            })
            .max()
            .unwrap_or(1)
    }

    fn from_string(s: String) -> Self {
        if s.len() <= EMBED_CAPACITY {
            let mut buf = [0u8; EMBED_CAPACITY];
            buf[..s.len()].copy_from_slice(s.as_bytes());
            PwString(Storage::Embedded {
                buf,
                len: s.len() as u8,
            })
        } else {
            PwString(Storage::Allocated(Rc::new(s)))
        }
    }

    /// Mutable access for in-place ops (`append`, `erase`, …): forks an
    /// `Allocated` buffer shared with other clones (copy-on-write), and
    /// promotes `Embedded`/`Static` storage to a private `String` as soon
    /// as the content would no longer fit inline.
    fn to_owned_string(&mut self) -> String {
        match &self.0 {
            Storage::Embedded { buf, len } => {
                std::str::from_utf8(&buf[..*len as usize]).unwrap().to_string()
            }
            Storage::Static(s) => s.to_string(),
            Storage::Allocated(rc) => (**rc).clone(),
        }
    }

    pub fn append(&mut self, other: &str) {
        let mut owned = self.to_owned_string();
        owned.push_str(other);
        *self = PwString::from_string(owned);
    }

    pub fn truncate(&mut self, new_char_len: usize) {
        let mut owned = self.to_owned_string();
        if let Some((byte_idx, _)) = owned.char_indices().nth(new_char_len) {
            owned.truncate(byte_idx);
        }
        *self = PwString::from_string(owned);
    }

    pub fn erase(&mut self, start_char: usize, count: usize) {
        let owned = self.to_owned_string();
        let chars: Vec<char> = owned.chars().collect();
        let end = (start_char + count).min(chars.len());
        let start = start_char.min(chars.len());
        let mut result = String::with_capacity(owned.len());
        result.extend(&chars[..start]);
        result.extend(&chars[end..]);
        *self = PwString::from_string(result);
    }

    pub fn substr(&self, start_char: usize, count: usize) -> PwString {
        let chars: Vec<char> = self.as_str().chars().collect();
        let end = (start_char + count).min(chars.len());
        let start = start_char.min(chars.len());
        PwString::from_string(chars[start..end].iter().collect())
    }

    pub fn char_at(&self, index: usize) -> Option<char> {
        self.as_str().chars().nth(index)
    }

    pub fn ltrim(&self) -> PwString {
        PwString::from_string(self.as_str().trim_start_matches(is_ascii_space).to_string())
    }

    pub fn rtrim(&self) -> PwString {
        PwString::from_string(self.as_str().trim_end_matches(is_ascii_space).to_string())
    }

    pub fn trim(&self) -> PwString {
        PwString::from_string(
            self.as_str()
                .trim_matches(is_ascii_space)
                .to_string(),
        )
    }

    pub fn lower(&self) -> PwString {
        PwString::from_string(self.as_str().chars().map(ascii_fallback_lower).collect())
    }

    pub fn upper(&self) -> PwString {
        PwString::from_string(self.as_str().chars().map(ascii_fallback_upper).collect())
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        self.as_str().starts_with(prefix)
    }

    pub fn ends_with(&self, suffix: &str) -> bool {
        self.as_str().ends_with(suffix)
    }

    /// Full-substring search (the source engine's `strstr`, not its
    /// partial-match `strstr_z` sibling — resolved as an Open Question in
    /// DESIGN.md). Returns the starting character index.
    pub fn find(&self, needle: &str) -> Option<usize> {
        let hay = self.as_str();
        let byte_idx = hay.find(needle)?;
        Some(hay[..byte_idx].chars().count())
    }

    /// Split on `sep`, producing at most `max_splits` pieces (`0` means
    /// unlimited), with the final piece holding whatever remains.
    pub fn split_chr(&self, sep: char, max_splits: usize) -> Vec<PwString> {
        let s = self.as_str();
        let pieces: Box<dyn Iterator<Item = &str>> = if max_splits == 0 {
            Box::new(s.split(sep))
        } else {
            Box::new(s.splitn(max_splits + 1, sep))
        };
        pieces.map(|p| PwString::from_string(p.to_string())).collect()
    }

    pub fn rsplit_chr(&self, sep: char, max_splits: usize) -> Vec<PwString> {
        let s = self.as_str();
        let pieces: Box<dyn Iterator<Item = &str>> = if max_splits == 0 {
            Box::new(s.rsplit(sep))
        } else {
            Box::new(s.rsplitn(max_splits + 1, sep))
        };
        pieces.map(|p| PwString::from_string(p.to_string())).collect()
    }

    /// Append decoded code points from `buf`, stopping before any trailing
    /// incomplete UTF-8 sequence. Returns the number of bytes consumed; the
    /// caller retains `buf[consumed..]` and prepends it to the next chunk
    /// (spec.md §4.7's "one byte at a time" streaming property). A genuinely
    /// invalid byte (not merely a truncated sequence) is skipped rather than
    /// stalling the stream, matching `read_line_inplace`'s holdover handling.
    pub fn append_utf8(&mut self, buf: &[u8]) -> usize {
        let mut pos = 0;
        while pos < buf.len() {
            match std::str::from_utf8(&buf[pos..]) {
                Ok(s) => {
                    self.append(s);
                    return buf.len();
                }
                Err(e) => {
                    let valid_len = e.valid_up_to();
                    if valid_len > 0 {
                        let valid = std::str::from_utf8(&buf[pos..pos + valid_len]).unwrap();
                        self.append(valid);
                        pos += valid_len;
                    }
                    match e.error_len() {
                        Some(bad_len) => pos += bad_len,
                        None => return pos,
                    }
                }
            }
        }
        pos
    }

    /// Concatenate `parts` in a single allocation: one pass to size the
    /// buffer, one pass to copy, mirroring the source engine's
    /// single-allocation `strcat`.
    pub fn strcat(parts: &[&PwString]) -> PwString {
        let total: usize = parts.iter().map(|p| p.len()).sum();
        let mut out = String::with_capacity(total);
        for part in parts {
            out.push_str(part.as_str());
        }
        PwString::from_string(out)
    }
}

/// Code points above the Latin-1 range always pass through untouched
/// (the fallback the source engine takes when no full Unicode
/// case/space-property table is linked in — this crate never links one).
fn is_ascii_space(c: char) -> bool {
    (c as u32) <= 0xFF && (c as u8 as char).is_ascii_whitespace()
}

fn ascii_fallback_lower(c: char) -> char {
    if (c as u32) <= 0xFF {
        c.to_ascii_lowercase()
    } else {
        c
    }
}

fn ascii_fallback_upper(c: char) -> char {
    if (c as u32) <= 0xFF {
        c.to_ascii_uppercase()
    } else {
        c
    }
}

impl Default for PwString {
    fn default() -> Self {
        PwString::new()
    }
}

impl From<&str> for PwString {
    fn from(s: &str) -> Self {
        PwString::from_string(s.to_string())
    }
}

impl From<String> for PwString {
    fn from(s: String) -> Self {
        PwString::from_string(s)
    }
}

impl PartialEq for PwString {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}
impl Eq for PwString {}

impl std::hash::Hash for PwString {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl fmt::Debug for PwString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PwString({:?})", self.as_str())
    }
}

impl fmt::Display for PwString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_for_short_strings() {
        let s = PwString::from("hello");
        assert!(matches!(s.0, Storage::Embedded { .. }));
        assert_eq!(s.as_str(), "hello");
    }

    #[test]
    fn allocated_for_long_strings() {
        let s = PwString::from("this string is definitely longer than twelve bytes");
        assert!(matches!(s.0, Storage::Allocated(_)));
    }

    #[test]
    fn static_strings_never_allocate() {
        let s = PwString::from_static("literal");
        assert!(matches!(s.0, Storage::Static(_)));
        assert_eq!(s.as_str(), "literal");
    }

    #[test]
    fn clone_of_allocated_shares_until_mutated() {
        let s = PwString::from("this string is definitely longer than twelve bytes");
        let mut clone = s.clone();
        clone.append("!");
        assert_ne!(s.as_str(), clone.as_str());
        assert_eq!(s.as_str(), "this string is definitely longer than twelve bytes");
    }

    #[test]
    fn append_promotes_width_correctly() {
        let mut s = PwString::from("");
        assert_eq!(s.code_unit_width(), 1);
        s.append("héllo");
        assert_eq!(s.code_unit_width(), 2);
        s.append("🦀");
        assert_eq!(s.code_unit_width(), 4);
    }

    #[test]
    fn substr_and_erase_operate_on_chars_not_bytes() {
        let s = PwString::from("héllo wörld");
        assert_eq!(s.substr(0, 5).as_str(), "héllo");
        let mut s2 = s.clone();
        s2.erase(1, 1); // remove 'é'
        assert_eq!(s2.as_str(), "hllo wörld");
    }

    #[test]
    fn trim_and_case_fold_use_ascii_fallback_above_255() {
        let s = PwString::from("  HELLO \u{1F600}  ");
        assert_eq!(s.trim().as_str(), "HELLO \u{1F600}");
        assert_eq!(s.lower().as_str(), "  hello \u{1F600}  ");
    }

    #[test]
    fn find_is_full_substring_match() {
        let s = PwString::from("the quick brown fox");
        assert_eq!(s.find("quick"), Some(4));
        assert_eq!(s.find("slow"), None);
    }

    #[test]
    fn split_chr_round_trips() {
        let s = PwString::from("a,b,,c");
        let parts: Vec<String> = s.split_chr(',', 0).iter().map(|p| p.as_str().to_string()).collect();
        assert_eq!(parts, vec!["a", "b", "", "c"]);
    }

    #[test]
    fn split_chr_respects_max_splits() {
        let s = PwString::from("a,b,c,d");
        let parts: Vec<String> = s.split_chr(',', 2).iter().map(|p| p.as_str().to_string()).collect();
        assert_eq!(parts, vec!["a", "b", "c,d"]);
    }

    #[test]
    fn rsplit_chr_respects_max_splits() {
        let s = PwString::from("a,b,c,d");
        let parts: Vec<String> = s.rsplit_chr(',', 2).iter().map(|p| p.as_str().to_string()).collect();
        assert_eq!(parts, vec!["d", "c", "a,b"]);
    }

    #[test]
    fn append_utf8_holds_back_incomplete_sequence() {
        let mut s = PwString::from("");
        let bytes = "é".as_bytes(); // 2-byte sequence
        let consumed = s.append_utf8(&bytes[..1]);
        assert_eq!(consumed, 0);
        assert_eq!(s.as_str(), "");
        let consumed2 = s.append_utf8(bytes);
        assert_eq!(consumed2, 2);
        assert_eq!(s.as_str(), "é");
    }

    #[test]
    fn append_utf8_skips_invalid_byte_and_keeps_decoding() {
        let mut s = PwString::from("");
        let bytes = [b'A', 0xFF, b'B'];
        let consumed = s.append_utf8(&bytes);
        assert_eq!(consumed, 3);
        assert_eq!(s.as_str(), "AB");
    }

    #[test]
    fn append_utf8_byte_at_a_time_matches_one_shot() {
        let full = "hello héllo 🦀 world";
        let bytes = full.as_bytes();

        let mut one_shot = PwString::from("");
        one_shot.append_utf8(bytes);

        let mut streamed = PwString::from("");
        let mut pending: Vec<u8> = Vec::new();
        for &b in bytes {
            pending.push(b);
            let consumed = streamed.append_utf8(&pending);
            pending.drain(..consumed);
        }
        assert!(pending.is_empty());
        assert_eq!(streamed.as_str(), one_shot.as_str());
        assert_eq!(streamed.as_str(), full);
    }

    #[test]
    fn strcat_concatenates_all_parts() {
        let a = PwString::from("foo");
        let b = PwString::from("bar");
        let c = PwString::from("baz");
        let joined = PwString::strcat(&[&a, &b, &c]);
        assert_eq!(joined.as_str(), "foobarbaz");
    }
}
