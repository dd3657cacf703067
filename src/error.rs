use std::{fmt, result};

/// All errors returned by this crate.
#[derive(Clone, Eq, PartialEq)]
pub enum Error {
    /// An invariant was violated; this indicates a bug rather than bad input.
    Fatal(String),
    /// Failure from an underlying `std::io` operation.
    IOError(String),
    /// Caller supplied an argument that cannot be honoured.
    InvalidInput(String),
    /// A file on disk does not match the naming or layout this crate expects.
    InvalidFile(String),
    /// Numeric or string conversion failed.
    FailConvert(String),
    /// CBOR encode/decode failed.
    FailCbor(String),
    /// A CBOR buffer did not contain enough bytes to decode the next value.
    DecodeFail(String),
    /// Lookup for a key found nothing within the queried range/snapshot.
    KeyNotFound(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        match self {
            Error::Fatal(s) => write!(f, "Fatal: {}", s),
            Error::IOError(s) => write!(f, "IOError: {}", s),
            Error::InvalidInput(s) => write!(f, "InvalidInput: {}", s),
            Error::InvalidFile(s) => write!(f, "InvalidFile: {}", s),
            Error::FailConvert(s) => write!(f, "FailConvert: {}", s),
            Error::FailCbor(s) => write!(f, "FailCbor: {}", s),
            Error::DecodeFail(s) => write!(f, "DecodeFail: {}", s),
            Error::KeyNotFound(s) => write!(f, "KeyNotFound: {}", s),
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        write!(f, "{}", self)
    }
}

impl std::error::Error for Error {}

/// Build an [Error], or wrap a failing [Result][result::Result] into one, while
/// capturing the call-site for diagnostics.
///
/// Two forms:
///
/// ```ignore
/// err_at!(IOError, fd.read(&mut buf))?;
/// err_at!(InvalidInput, msg: "range start {:?} after end {:?}", start, end)?;
/// ```
#[macro_export]
macro_rules! err_at {
    ($v:ident, msg: $($arg:expr),+) => {{
        let prefix = format!("{}:{}", file!(), line!());
        Err::<(), $crate::Error>($crate::Error::$v(format!("{} {}", prefix, format!($($arg),+))))
    }};
    ($v:ident, $e:expr) => {{
        match $e {
            Ok(val) => Ok(val),
            Err(err) => {
                let prefix = format!("{}:{}", file!(), line!());
                Err($crate::Error::$v(format!("{} {}", prefix, err)))
            }
        }
    }};
    ($v:ident, $e:expr, $($arg:expr),+) => {{
        match $e {
            Ok(val) => Ok(val),
            Err(err) => {
                let prefix = format!("{}:{}", file!(), line!());
                Err($crate::Error::$v(format!("{} {} {}", prefix, format!($($arg),+), err)))
            }
        }
    }};
}

/// Crate-wide result alias.
pub type Result<T> = result::Result<T, Error>;

#[cfg(test)]
mod error_test {
    use super::*;

    #[test]
    fn test_display() {
        let err = Error::InvalidInput("bad range".to_string());
        assert_eq!(format!("{}", err), "InvalidInput: bad range");
    }

    #[test]
    fn test_err_at_wraps_result() {
        fn fail() -> std::io::Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "boom"))
        }
        let res: Result<()> = err_at!(IOError, fail());
        assert!(matches!(res, Err(Error::IOError(_))));
    }

    #[test]
    fn test_err_at_msg_form() {
        let res: Result<()> = err_at!(Fatal, msg: "unexpected {}", 42);
        match res {
            Err(Error::Fatal(s)) => assert!(s.contains("unexpected 42")),
            _ => panic!("expected Fatal"),
        }
    }
}
