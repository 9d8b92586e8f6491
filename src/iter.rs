//! Byte and line iteration protocols.
//!
//! `Reader`/`Writer` are the byte-oriented collaborators every streaming
//! source implements; `LineReader` layers a line-oriented state machine on
//! top (used by `StringIO`, the array-of-strings adapter, and
//! `BufferedFile`). All three container kinds in this module implement
//! `LineReader` directly rather than through a shared byte stream, since
//! each already holds its data in a form line boundaries are cheap to find
//! in (a `Vec<Value>`, an immutable string, or the file's own buffers).

use crate::array::Array;
use crate::pwstring::PwString;
use crate::status::{Status, StatusCode};
use crate::value::Value;

pub trait Reader {
    /// Reads into `buf`, returning the number of bytes transferred. `Ok(0)`
    /// means end of stream.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Status>;
}

pub trait Writer {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Status>;
}

pub trait LineReader {
    /// Reset iterator state and begin the iteration session. Calling this
    /// again restarts the session from the top.
    fn start(&mut self);

    /// Truncate `line` and refill it with the next line, including the
    /// trailing `\n` if present. Returns `Err(Eof)` past the last line.
    fn read_line_inplace(&mut self, line: &mut PwString) -> Result<(), Status>;

    fn read_line(&mut self) -> Result<PwString, Status> {
        let mut line = PwString::from("");
        self.read_line_inplace(&mut line)?;
        Ok(line)
    }

    /// Store `line` for replay by the next `read_line*` call. Returns
    /// `false` if a pushback is already pending.
    fn unread_line(&mut self, line: PwString) -> bool;

    /// 1-based line counter; `unread_line` decrements it.
    fn get_line_number(&self) -> u64;

    /// Release line-reader resources and invalidate any pending pushback.
    fn stop(&mut self);
}

/// Line reader over an immutable backing string: the iterator and the
/// iterable are the same value, scanning forward for `\n`.
pub struct StringIo {
    text: PwString,
    pos: usize,
    line_number: u64,
    pushback: Option<PwString>,
}

impl StringIo {
    pub fn new(text: PwString) -> Self {
        StringIo {
            text,
            pos: 0,
            line_number: 0,
            pushback: None,
        }
    }
}

impl LineReader for StringIo {
    fn start(&mut self) {
        self.pos = 0;
        self.line_number = 0;
        self.pushback = None;
    }

    fn read_line_inplace(&mut self, line: &mut PwString) -> Result<(), Status> {
        *line = PwString::from("");
        if let Some(pushed) = self.pushback.take() {
            *line = pushed;
            self.line_number += 1;
            return Ok(());
        }
        let bytes = self.text.as_str();
        if self.pos >= bytes.len() {
            return Err(crate::status!(StatusCode::Eof));
        }
        let rest = &bytes[self.pos..];
        let (consumed, content) = match rest.find('\n') {
            Some(idx) => (idx + 1, &rest[..idx + 1]),
            None => (rest.len(), rest),
        };
        *line = PwString::from(content);
        self.pos += consumed;
        self.line_number += 1;
        Ok(())
    }

    fn unread_line(&mut self, line: PwString) -> bool {
        if self.pushback.is_some() {
            return false;
        }
        self.pushback = Some(line);
        self.line_number = self.line_number.saturating_sub(1);
        true
    }

    fn get_line_number(&self) -> u64 {
        self.line_number
    }

    fn stop(&mut self) {
        self.pushback = None;
    }
}

/// Line reader over an `Array`, enumerating string items in order and
/// skipping any non-string entries. Holds the array's iteration counter
/// open for the session's duration so concurrent mutation is refused.
pub struct ArrayLines {
    array: Array,
    index: usize,
    line_number: u64,
    pushback: Option<PwString>,
    active: bool,
}

impl ArrayLines {
    pub fn new(array: Array) -> Self {
        ArrayLines {
            array,
            index: 0,
            line_number: 0,
            pushback: None,
            active: false,
        }
    }
}

impl LineReader for ArrayLines {
    fn start(&mut self) {
        if self.active {
            self.array.end_iteration();
        }
        self.array.begin_iteration();
        self.active = true;
        self.index = 0;
        self.line_number = 0;
        self.pushback = None;
    }

    fn read_line_inplace(&mut self, line: &mut PwString) -> Result<(), Status> {
        *line = PwString::from("");
        if let Some(pushed) = self.pushback.take() {
            *line = pushed;
            self.line_number += 1;
            return Ok(());
        }
        loop {
            match self.array.get(self.index) {
                None => return Err(crate::status!(StatusCode::Eof)),
                Some(Value::Str(s)) => {
                    self.index += 1;
                    *line = s;
                    self.line_number += 1;
                    return Ok(());
                }
                Some(_) => {
                    self.index += 1;
                    continue;
                }
            }
        }
    }

    fn unread_line(&mut self, line: PwString) -> bool {
        if self.pushback.is_some() {
            return false;
        }
        self.pushback = Some(line);
        self.line_number = self.line_number.saturating_sub(1);
        true
    }

    fn get_line_number(&self) -> u64 {
        self.line_number
    }

    fn stop(&mut self) {
        self.pushback = None;
        if self.active {
            self.array.end_iteration();
            self.active = false;
        }
    }
}

impl Drop for ArrayLines {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_io_splits_on_newline_inclusive() {
        let mut r = StringIo::new(PwString::from("a\nbb\nccc"));
        r.start();
        assert_eq!(r.read_line().unwrap().as_str(), "a\n");
        assert_eq!(r.read_line().unwrap().as_str(), "bb\n");
        assert_eq!(r.read_line().unwrap().as_str(), "ccc");
        assert!(r.read_line().is_err());
        assert_eq!(r.get_line_number(), 3);
    }

    #[test]
    fn string_io_unread_line_replays_once() {
        let mut r = StringIo::new(PwString::from("a\nb\n"));
        r.start();
        let first = r.read_line().unwrap();
        assert!(r.unread_line(first.clone()));
        assert!(!r.unread_line(PwString::from("x")));
        let replayed = r.read_line().unwrap();
        assert_eq!(replayed.as_str(), first.as_str());
    }

    #[test]
    fn array_lines_skips_non_string_entries() {
        let a = Array::new();
        a.push(Value::Str(PwString::from("one"))).unwrap();
        a.push(Value::Signed(42)).unwrap();
        a.push(Value::Str(PwString::from("two"))).unwrap();
        let mut r = ArrayLines::new(a.clone());
        r.start();
        assert_eq!(r.read_line().unwrap().as_str(), "one");
        assert_eq!(r.read_line().unwrap().as_str(), "two");
        assert!(r.read_line().is_err());
        // Mutation is refused while the line-reader session holds the
        // array's iteration counter open.
        assert!(a.push(Value::Signed(1)).is_err());
        r.stop();
        assert!(a.push(Value::Signed(1)).is_ok());
    }
}
