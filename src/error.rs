// ABOUTME: Error types for document decoding, encoding and pool management.
// ABOUTME: Every variant belongs to one ErrorKind; all of them abort the current decode.

use std::fmt;

/// The result type for docwire operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classes of failure. None of them is retried internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The decoder or its buffer was set up incorrectly.
    Configuration,
    /// The byte stream cannot be trusted past this point.
    Corruption,
    /// The stream uses a type or variant this decoder does not handle.
    UnsupportedFormat,
    /// A bounded buffer or limit would have been exceeded.
    Capacity,
    /// A document container could not be created.
    Construction,
}

/// Errors that can occur while decoding or encoding documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A buffer with a byte order other than little-endian was supplied.
    WrongByteOrder,

    /// `reset_with` was called on a decoder that owns its buffer.
    PrivateDecoderRebind,

    /// A reference needed a database context but the decoder has none.
    MissingDatabase,

    /// The declared document length does not match the bytes consumed.
    LengthMismatch { declared: i32, consumed: usize },

    /// A length prefix is negative or too small to be valid.
    InvalidLength(i32),

    /// A read would go past the buffer limit.
    Truncated,

    /// Invalid UTF-8 byte sequence in a name or string.
    InvalidUtf8,

    /// A length-prefixed string is not followed by its zero byte.
    MissingTerminator,

    /// An array element name is not a decimal index.
    InvalidArrayIndex(String),

    /// Unknown or unsupported type tag.
    UnsupportedType(u8),

    /// Binary payload with a subtype other than the generic one.
    UnsupportedBinarySubtype(u8),

    /// Executable code values are recognised but not decoded.
    UnsupportedCode,

    /// Regular expression flag with no mapping.
    UnsupportedRegexFlag(char),

    /// Regular expression pattern that does not compile.
    InvalidRegex(String),

    /// A key cannot be written to the wire (it contains a NUL byte).
    InvalidKey(String),

    /// A field name does not fit in the name buffer.
    NameTooLong { capacity: usize },

    /// A string value exceeds the configured maximum.
    StringTooLong { length: usize, capacity: usize },

    /// Loaded bytes exceed the decoder's buffer capacity.
    BufferOverflow { length: usize, capacity: usize },

    /// Embedded documents nest deeper than allowed.
    MaxDepthExceeded,

    /// The document factory failed to create a root document.
    Construction(String),
}

impl Error {
    /// Returns the class this error belongs to.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::WrongByteOrder | Error::PrivateDecoderRebind | Error::MissingDatabase => {
                ErrorKind::Configuration
            }
            Error::LengthMismatch { .. }
            | Error::InvalidLength(_)
            | Error::Truncated
            | Error::InvalidUtf8
            | Error::MissingTerminator
            | Error::InvalidArrayIndex(_) => ErrorKind::Corruption,
            Error::UnsupportedType(_)
            | Error::UnsupportedBinarySubtype(_)
            | Error::UnsupportedCode
            | Error::UnsupportedRegexFlag(_)
            | Error::InvalidRegex(_)
            | Error::InvalidKey(_) => ErrorKind::UnsupportedFormat,
            Error::NameTooLong { .. }
            | Error::StringTooLong { .. }
            | Error::BufferOverflow { .. }
            | Error::MaxDepthExceeded => ErrorKind::Capacity,
            Error::Construction(_) => ErrorKind::Construction,
        }
    }

    /// Returns a stable snake_case name for the error, for logs and matching.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Error::WrongByteOrder => "wrong_byte_order",
            Error::PrivateDecoderRebind => "private_decoder_rebind",
            Error::MissingDatabase => "missing_database",
            Error::LengthMismatch { .. } => "length_mismatch",
            Error::InvalidLength(_) => "invalid_length",
            Error::Truncated => "truncated",
            Error::InvalidUtf8 => "invalid_utf8",
            Error::MissingTerminator => "missing_terminator",
            Error::InvalidArrayIndex(_) => "invalid_array_index",
            Error::UnsupportedType(_) => "unsupported_type",
            Error::UnsupportedBinarySubtype(_) => "unsupported_binary_subtype",
            Error::UnsupportedCode => "unsupported_code",
            Error::UnsupportedRegexFlag(_) => "unsupported_regex_flag",
            Error::InvalidRegex(_) => "invalid_regex",
            Error::InvalidKey(_) => "invalid_key",
            Error::NameTooLong { .. } => "name_too_long",
            Error::StringTooLong { .. } => "string_too_long",
            Error::BufferOverflow { .. } => "buffer_overflow",
            Error::MaxDepthExceeded => "max_depth_exceeded",
            Error::Construction(_) => "construction",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::WrongByteOrder => write!(f, "buffer byte order must be little-endian"),
            Error::PrivateDecoderRebind => write!(f, "can't rebind a private decoder"),
            Error::MissingDatabase => write!(f, "reference requires a database context"),
            Error::LengthMismatch { declared, consumed } => {
                write!(f, "lengths don't match: consumed {consumed} != declared {declared}")
            }
            Error::InvalidLength(len) => write!(f, "invalid length prefix: {len}"),
            Error::Truncated => write!(f, "unexpected end of buffer"),
            Error::InvalidUtf8 => write!(f, "invalid UTF-8 sequence"),
            Error::MissingTerminator => write!(f, "string is not zero terminated"),
            Error::InvalidArrayIndex(name) => write!(f, "invalid array index: {name:?}"),
            Error::UnsupportedType(tag) => write!(f, "can't handle type: 0x{tag:02x}"),
            Error::UnsupportedBinarySubtype(sub) => {
                write!(f, "can't handle binary subtype: 0x{sub:02x}")
            }
            Error::UnsupportedCode => write!(f, "can't handle code values"),
            Error::UnsupportedRegexFlag(flag) => write!(f, "unrecognized regex flag: {flag:?}"),
            Error::InvalidRegex(msg) => write!(f, "invalid regex: {msg}"),
            Error::InvalidKey(key) => write!(f, "invalid key: {key:?}"),
            Error::NameTooLong { capacity } => {
                write!(f, "field name exceeds name buffer capacity of {capacity} bytes")
            }
            Error::StringTooLong { length, capacity } => {
                write!(f, "string of {length} bytes exceeds limit of {capacity} bytes")
            }
            Error::BufferOverflow { length, capacity } => {
                write!(f, "{length} bytes exceed buffer capacity of {capacity} bytes")
            }
            Error::MaxDepthExceeded => write!(f, "maximum document depth exceeded"),
            Error::Construction(msg) => write!(f, "can't instantiate document: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::str::Utf8Error> for Error {
    fn from(_: std::str::Utf8Error) -> Self {
        Error::InvalidUtf8
    }
}
