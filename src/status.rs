//! Status/error taxonomy and the current-task status slot.
//!
//! Every fallible operation in this crate returns `Result<T, Status>`. A
//! thread-local slot is kept alongside it, purely for diagnostics
//! (`print_status` on the last failure without threading a `Result`
//! everywhere).

use std::cell::RefCell;
use std::fmt;

/// 16-bit status code identifiers. Zero (`Success`) is the only code that
/// may never carry a description or errno.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum StatusCode {
    Success,
    VaEnd,
    Error,
    ErrorErrno,
    Oom,
    NotImplemented,
    IncompatibleType,
    Eof,
    Timeout,
    StringTooLong,
    DataSizeTooBig,
    IndexOutOfRange,
    IterationInProgress,
    BadNumber,
    BadDatetime,
    BadTimestamp,
    NumericOverflow,
    IncompleteUtf8,
    ExtractFromEmptyArray,
    KeyNotFound,
    FileAlreadyOpened,
    FdAlreadySet,
    CantSetFilename,
    FileClosed,
    NotRegularFile,
    UnbufferedFile,
    Write,
    UnreadFailed,
    BadAddressFamily,
    BadIpAddress,
    BadPort,
    HostAddressExpected,
    AddressFamilyMismatch,
    SocketNameTooLong,
    MissingNetmask,
    BadNetmask,
    PortUnspecified,
    /// Additional codes registered at runtime; once assigned, a code's
    /// name is stable for the life of the process.
    Custom(u16, &'static str),
}

impl StatusCode {
    /// Stable textual name, as used by `print_status`.
    pub fn name(&self) -> &str {
        match self {
            StatusCode::Success => "SUCCESS",
            StatusCode::VaEnd => "VA_END",
            StatusCode::Error => "ERROR",
            StatusCode::ErrorErrno => "ERROR_ERRNO",
            StatusCode::Oom => "OOM",
            StatusCode::NotImplemented => "NOT_IMPLEMENTED",
            StatusCode::IncompatibleType => "INCOMPATIBLE_TYPE",
            StatusCode::Eof => "EOF",
            StatusCode::Timeout => "TIMEOUT",
            StatusCode::StringTooLong => "STRING_TOO_LONG",
            StatusCode::DataSizeTooBig => "DATA_SIZE_TOO_BIG",
            StatusCode::IndexOutOfRange => "INDEX_OUT_OF_RANGE",
            StatusCode::IterationInProgress => "ITERATION_IN_PROGRESS",
            StatusCode::BadNumber => "BAD_NUMBER",
            StatusCode::BadDatetime => "BAD_DATETIME",
            StatusCode::BadTimestamp => "BAD_TIMESTAMP",
            StatusCode::NumericOverflow => "NUMERIC_OVERFLOW",
            StatusCode::IncompleteUtf8 => "INCOMPLETE_UTF8",
            StatusCode::ExtractFromEmptyArray => "EXTRACT_FROM_EMPTY_ARRAY",
            StatusCode::KeyNotFound => "KEY_NOT_FOUND",
            StatusCode::FileAlreadyOpened => "FILE_ALREADY_OPENED",
            StatusCode::FdAlreadySet => "FD_ALREADY_SET",
            StatusCode::CantSetFilename => "CANT_SET_FILENAME",
            StatusCode::FileClosed => "FILE_CLOSED",
            StatusCode::NotRegularFile => "NOT_REGULAR_FILE",
            StatusCode::UnbufferedFile => "UNBUFFERED_FILE",
            StatusCode::Write => "WRITE",
            StatusCode::UnreadFailed => "UNREAD_FAILED",
            StatusCode::BadAddressFamily => "BAD_ADDRESS_FAMILY",
            StatusCode::BadIpAddress => "BAD_IP_ADDRESS",
            StatusCode::BadPort => "BAD_PORT",
            StatusCode::HostAddressExpected => "HOST_ADDRESS_EXPECTED",
            StatusCode::AddressFamilyMismatch => "ADDRESS_FAMILY_MISMATCH",
            StatusCode::SocketNameTooLong => "SOCKET_NAME_TOO_LONG",
            StatusCode::MissingNetmask => "MISSING_NETMASK",
            StatusCode::BadNetmask => "BAD_NETMASK",
            StatusCode::PortUnspecified => "PORT_UNSPECIFIED",
            StatusCode::Custom(_, name) => name,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StatusCode::Success)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A structured status/error value.
///
/// Success is the all-defaults value so equality-to-success is a cheap
/// comparison; it owns no extended payload, so dropping it is free.
#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    pub code: StatusCode,
    pub errno: i32,
    pub file: &'static str,
    pub line: u32,
    pub description: Option<String>,
}

impl Status {
    pub const SUCCESS: Status = Status {
        code: StatusCode::Success,
        errno: 0,
        file: "",
        line: 0,
        description: None,
    };

    pub fn new(code: StatusCode, file: &'static str, line: u32) -> Self {
        Status {
            code,
            errno: 0,
            file,
            line,
            description: None,
        }
    }

    pub fn with_errno(code: StatusCode, errno: i32, file: &'static str, line: u32) -> Self {
        Status {
            code,
            errno,
            file,
            line,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.code.is_success()
    }

    /// `deepcopy` of a Status: a no-op for a successful status, which is
    /// immutable, so cloning it is simply returning the canonical value.
    pub fn deepcopy(&self) -> Status {
        if self.is_success() {
            Status::SUCCESS
        } else {
            self.clone()
        }
    }

    /// Renders `status_name; file:line[; errno N: msg][; description]`.
    pub fn print_status(&self) -> String {
        let mut out = format!("{}; {}:{}", self.code, self.file, self.line);
        if self.errno != 0 {
            out.push_str(&format!(
                "; errno {}: {}",
                self.errno,
                std::io::Error::from_raw_os_error(self.errno)
            ));
        }
        if let Some(desc) = &self.description {
            out.push_str("; ");
            out.push_str(desc);
        }
        out
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.print_status())
    }
}

impl std::error::Error for Status {}

/// Construct a `Status` tagged with the call site, mirroring the source
/// library's file/line-carrying error macros.
#[macro_export]
macro_rules! status {
    ($code:expr) => {
        $crate::status::Status::new($code, file!(), line!())
    };
    ($code:expr, errno = $errno:expr) => {
        $crate::status::Status::with_errno($code, $errno, file!(), line!())
    };
}

thread_local! {
    /// Current-task status slot: single-writer, cleared by the caller or
    /// implicitly on success. One per cooperative task — modeled here as
    /// one per OS thread.
    static CURRENT_STATUS: RefCell<Status> = const { RefCell::new(Status::SUCCESS) };
}

/// Overwrite the current-task status slot.
pub fn set_current_status(status: Status) {
    CURRENT_STATUS.with(|s| *s.borrow_mut() = status);
}

/// Read the current-task status slot without clearing it.
pub fn current_status() -> Status {
    CURRENT_STATUS.with(|s| s.borrow().clone())
}

/// Clear the current-task status slot back to `Success`.
pub fn clear_current_status() {
    CURRENT_STATUS.with(|s| *s.borrow_mut() = Status::SUCCESS);
}

/// Run `f`; on `Err`, stash the status in the current-task slot (and clear
/// it on `Ok`), then return the original `Result` to the caller.
pub fn track<T>(result: Result<T, Status>) -> Result<T, Status> {
    match &result {
        Ok(_) => clear_current_status(),
        Err(status) => set_current_status(status.clone()),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_is_default_and_cheap_eq() {
        assert_eq!(Status::SUCCESS, Status::SUCCESS);
        assert!(Status::SUCCESS.is_success());
    }

    #[test]
    fn deepcopy_of_success_is_noop() {
        let s = Status::SUCCESS.deepcopy();
        assert!(s.is_success());
    }

    #[test]
    fn deepcopy_of_failure_clones_description() {
        let s = status!(StatusCode::KeyNotFound).with_description("missing 'x'");
        let copy = s.deepcopy();
        assert_eq!(copy, s);
    }

    #[test]
    fn print_status_format() {
        let s = Status::new(StatusCode::Eof, "foo.rs", 42);
        assert_eq!(s.print_status(), "EOF; foo.rs:42");
    }

    #[test]
    fn current_status_slot_single_writer() {
        clear_current_status();
        set_current_status(status!(StatusCode::BadNumber));
        assert_eq!(current_status().code, StatusCode::BadNumber);
        set_current_status(status!(StatusCode::Eof));
        assert_eq!(current_status().code, StatusCode::Eof);
        clear_current_status();
        assert!(current_status().is_success());
    }

    #[test]
    fn track_clears_slot_on_success() {
        set_current_status(status!(StatusCode::Oom));
        let _: Result<(), Status> = track(Ok(()));
        assert!(current_status().is_success());
    }

    #[test]
    fn custom_code_is_stable() {
        let c = StatusCode::Custom(1000, "PLUGIN_ERROR");
        assert_eq!(c.name(), "PLUGIN_ERROR");
    }
}
