// ABOUTME: Wire type tags, resource limits and the scalar value types of the document format.
// ABOUTME: Tag values match the classic BSON catalogue byte for byte.

use crate::error::{Error, Result};
use std::fmt;

/// Type tags for document fields.
pub mod type_code {
    /// End of object: terminates every document.
    pub const EOO: u8 = 0x00;
    pub const DOUBLE: u8 = 0x01;
    pub const STRING: u8 = 0x02;
    pub const OBJECT: u8 = 0x03;
    pub const ARRAY: u8 = 0x04;
    pub const BINARY: u8 = 0x05;
    pub const UNDEFINED: u8 = 0x06;
    pub const OID: u8 = 0x07;
    pub const BOOLEAN: u8 = 0x08;
    pub const DATE: u8 = 0x09;
    pub const NULL: u8 = 0x0a;
    pub const REGEX: u8 = 0x0b;
    pub const REF: u8 = 0x0c;
    pub const CODE: u8 = 0x0d;
    pub const SYMBOL: u8 = 0x0e;
    pub const CODE_W_SCOPE: u8 = 0x0f;
    pub const INT32: u8 = 0x10;
    pub const TIMESTAMP: u8 = 0x11;
    pub const INT64: u8 = 0x12;
    pub const MAX_KEY: u8 = 0x7f;
    pub const MIN_KEY: u8 = 0xff;
}

/// Binary payload subtypes.
pub mod binary_subtype {
    pub const GENERAL: u8 = 0x00;
    pub const FUNCTION: u8 = 0x01;
    /// Generic binary: carries an inner length before the bytes.
    pub const BINARY: u8 = 0x02;
    pub const UUID: u8 = 0x03;
    pub const MD5: u8 = 0x05;
    pub const USER_DEFINED: u8 = 0x80;
}

/// Default resource limits.
pub mod limits {
    /// Largest document the server will send.
    pub const MAX_OBJECT_SIZE: usize = 4 * 1024 * 1024;

    /// Capacity of a pooled decoder's private buffer.
    pub const BUFFER_CAPACITY: usize = MAX_OBJECT_SIZE + 1024 * 1024;

    /// Capacity of the field name buffer, and the longest accepted string.
    pub const MAX_STRING: usize = 512 * 1024;

    /// Maximum embedded document nesting depth.
    pub const MAX_DEPTH: usize = 256;

    /// Fixed per-decoder bookkeeping counted against the pool budget.
    pub const DECODER_OVERHEAD: usize = 1024;

    /// Number of decoder buffers that fit in 50 MB.
    pub const BUFS_PER_50M: usize = (50 * 1024 * 1024) / BUFFER_CAPACITY;

    /// Default byte budget for idle decoders in a pool.
    pub const POOL_MEMORY: usize =
        6 * BUFS_PER_50M * (BUFFER_CAPACITY + 2 * MAX_STRING + DECODER_OVERHEAD);
}

/// A 12-byte document identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    /// Identifier reserved for references that name a whole collection.
    pub const COLLECTION_REF: ObjectId = ObjectId([0xff; 12]);

    #[inline]
    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// Combine the 8-byte and 4-byte halves as they appear on the wire.
    #[must_use]
    pub fn from_parts(low: u64, high: u32) -> Self {
        let mut bytes = [0u8; 12];
        bytes[..8].copy_from_slice(&low.to_le_bytes());
        bytes[8..].copy_from_slice(&high.to_le_bytes());
        Self(bytes)
    }

    #[inline]
    pub const fn bytes(&self) -> [u8; 12] {
        self.0
    }

    /// Check if this is the collection reference sentinel.
    #[inline]
    pub fn is_collection_ref(&self) -> bool {
        *self == Self::COLLECTION_REF
    }

    /// Lowercase hexadecimal rendering.
    #[must_use]
    pub fn to_hex(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({self})")
    }
}

/// Milliseconds since the Unix epoch, UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct UtcDateTime(i64);

impl UtcDateTime {
    #[inline]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    #[inline]
    pub const fn timestamp_millis(&self) -> i64 {
        self.0
    }

    /// Convert to a `SystemTime`. Dates before the epoch are supported.
    #[must_use]
    pub fn to_system_time(&self) -> std::time::SystemTime {
        let offset = std::time::Duration::from_millis(self.0.unsigned_abs());
        if self.0 >= 0 {
            std::time::UNIX_EPOCH + offset
        } else {
            std::time::UNIX_EPOCH - offset
        }
    }
}

/// A compiled regular expression together with its wire form.
///
/// Equality compares the pattern source and flags, not the compiled program.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    flags: String,
    compiled: regex::Regex,
}

impl Pattern {
    /// Compile `source` with single-letter `flags`.
    ///
    /// Recognised flags: `i` (case-insensitive), `m` (multi-line),
    /// `s` (dot matches newline), `x` (ignore whitespace), `u` (unicode),
    /// `t` (literal) and `d` (unix lines, the default here).
    pub fn new(source: &str, flags: &str) -> Result<Self> {
        let mut literal = false;
        let mut builder_flags = PatternFlags::default();
        for flag in flags.chars() {
            match flag {
                'i' => builder_flags.case_insensitive = true,
                'm' => builder_flags.multi_line = true,
                's' => builder_flags.dot_all = true,
                'x' => builder_flags.ignore_whitespace = true,
                'u' | 'd' => {}
                't' => literal = true,
                other => return Err(Error::UnsupportedRegexFlag(other)),
            }
        }

        let effective = if literal {
            regex::escape(source)
        } else {
            source.to_owned()
        };
        let compiled = regex::RegexBuilder::new(&effective)
            .case_insensitive(builder_flags.case_insensitive)
            .multi_line(builder_flags.multi_line)
            .dot_matches_new_line(builder_flags.dot_all)
            .ignore_whitespace(builder_flags.ignore_whitespace)
            .build()
            .map_err(|e| Error::InvalidRegex(e.to_string()))?;

        Ok(Self {
            source: source.to_owned(),
            flags: flags.to_owned(),
            compiled,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn flags(&self) -> &str {
        &self.flags
    }

    pub fn regex(&self) -> &regex::Regex {
        &self.compiled
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.compiled.is_match(haystack)
    }
}

#[derive(Default)]
struct PatternFlags {
    case_insensitive: bool,
    multi_line: bool,
    dot_all: bool,
    ignore_whitespace: bool,
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.flags == other.flags
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pattern(/{}/{})", self.source, self.flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_id_parts() {
        let oid = ObjectId::from_parts(0x0807_0605_0403_0201, 0x0c0b_0a09);
        assert_eq!(oid.bytes(), [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
        assert_eq!(oid.to_hex(), "0102030405060708090a0b0c");
        assert!(!oid.is_collection_ref());

        let sentinel = ObjectId::from_parts(u64::MAX, u32::MAX);
        assert!(sentinel.is_collection_ref());
    }

    #[test]
    fn test_pattern_flags() {
        let p = Pattern::new("^abc", "i").unwrap();
        assert!(p.is_match("ABCdef"));

        let p = Pattern::new("a.b", "s").unwrap();
        assert!(p.is_match("a\nb"));

        let p = Pattern::new("a.b", "t").unwrap();
        assert!(p.is_match("xa.bx"));
        assert!(!p.is_match("axb"));
    }

    #[test]
    fn test_pattern_rejects_unknown_flag() {
        assert_eq!(Pattern::new("a", "c").unwrap_err(), Error::UnsupportedRegexFlag('c'));
        assert!(matches!(Pattern::new("(", ""), Err(Error::InvalidRegex(_))));
    }

    #[test]
    fn test_date_before_epoch() {
        let d = UtcDateTime::from_millis(-1500);
        let expected = std::time::UNIX_EPOCH - std::time::Duration::from_millis(1500);
        assert_eq!(d.to_system_time(), expected);
    }
}
