// ABOUTME: Fixed-capacity byte buffer with position/limit cursor and the field name scratch buffer.
// ABOUTME: Every read is bounds checked against the limit; nothing reads past it.

#![allow(clippy::cast_possible_truncation)]

use crate::error::{Error, Result};

/// Validate and convert bytes to a UTF-8 string.
/// Uses simdutf8 for SIMD-accelerated validation when the feature is enabled.
#[cfg(feature = "simd-utf8")]
#[inline]
pub(crate) fn validate_utf8(bytes: &[u8]) -> Result<&str> {
    simdutf8::basic::from_utf8(bytes).map_err(|_| Error::InvalidUtf8)
}

#[cfg(not(feature = "simd-utf8"))]
#[inline]
pub(crate) fn validate_utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|_| Error::InvalidUtf8)
}

/// Byte order of multi-byte values in a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    LittleEndian,
    BigEndian,
}

/// The only byte order the wire format uses.
pub const WIRE_ORDER: ByteOrder = ByteOrder::LittleEndian;

/// A byte buffer with a read position and a limit.
///
/// `position <= limit <= capacity` always holds. Reads advance the position
/// and fail with [`Error::Truncated`] rather than cross the limit.
#[derive(Debug, Clone)]
pub struct ByteBuffer {
    data: Vec<u8>,
    position: usize,
    limit: usize,
    order: ByteOrder,
}

impl ByteBuffer {
    /// Allocate a zeroed buffer of `capacity` bytes, limit at capacity.
    #[must_use]
    pub fn allocate(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity],
            position: 0,
            limit: capacity,
            order: WIRE_ORDER,
        }
    }

    /// Wrap existing bytes; the limit is their length.
    #[must_use]
    pub fn wrap(data: Vec<u8>) -> Self {
        let limit = data.len();
        Self {
            data,
            position: 0,
            limit,
            order: WIRE_ORDER,
        }
    }

    #[must_use]
    pub fn with_order(mut self, order: ByteOrder) -> Self {
        self.order = order;
        self
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    pub fn set_order(&mut self, order: ByteOrder) {
        self.order = order;
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Bytes between the position and the limit.
    pub fn remaining(&self) -> usize {
        self.limit - self.position
    }

    pub fn has_remaining(&self) -> bool {
        self.position < self.limit
    }

    /// Move the position. Values past the limit are clamped to it.
    pub fn set_position(&mut self, position: usize) {
        self.position = position.min(self.limit);
    }

    /// Move the limit. Values past the capacity are clamped to it.
    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit.min(self.data.len());
        if self.position > self.limit {
            self.position = self.limit;
        }
    }

    /// Position to zero, limit to capacity.
    pub fn clear(&mut self) {
        self.position = 0;
        self.limit = self.data.len();
    }

    /// Limit to the current position, position to zero.
    pub fn flip(&mut self) {
        self.limit = self.position;
        self.position = 0;
    }

    /// The whole backing storage, for transports that write into it directly.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Bytes between position and limit.
    pub fn unread(&self) -> &[u8] {
        &self.data[self.position..self.limit]
    }

    /// Copy `bytes` to the start of the buffer and make them the readable window.
    pub fn load(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() > self.data.len() {
            return Err(Error::BufferOverflow {
                length: bytes.len(),
                capacity: self.data.len(),
            });
        }
        self.data[..bytes.len()].copy_from_slice(bytes);
        self.position = 0;
        self.limit = bytes.len();
        Ok(())
    }

    /// Consume the buffer, returning its storage.
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    /// Read exactly n bytes.
    #[inline]
    pub fn read_bytes(&mut self, n: usize) -> Result<&[u8]> {
        if n > self.remaining() {
            return Err(Error::Truncated);
        }
        let start = self.position;
        self.position += n;
        Ok(&self.data[start..self.position])
    }

    #[inline]
    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut buf = [0u8; N];
        buf.copy_from_slice(bytes);
        Ok(buf)
    }

    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        if self.position >= self.limit {
            return Err(Error::Truncated);
        }
        let byte = self.data[self.position];
        self.position += 1;
        Ok(byte)
    }

    #[inline]
    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    #[inline]
    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    #[inline]
    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    #[inline]
    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    #[inline]
    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.read_array()?))
    }
}

/// Scratch storage for null-terminated names.
///
/// The capacity is fixed at construction and bounds the longest name that
/// can be read; the check happens before any byte is copied.
#[derive(Debug, Clone)]
pub struct NameBuffer {
    bytes: Box<[u8]>,
}

impl NameBuffer {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: vec![0; capacity].into_boxed_slice(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Read a null-terminated string from `buf`, consuming the terminator.
    pub fn read_cstr(&mut self, buf: &mut ByteBuffer) -> Result<&str> {
        let capacity = self.bytes.len();
        let unread = buf.unread();
        // Search one past capacity so a full-length name still finds its terminator.
        let window = &unread[..unread.len().min(capacity + 1)];
        let Some(len) = memchr::memchr(0, window) else {
            return Err(if window.len() > capacity {
                Error::NameTooLong { capacity }
            } else {
                Error::Truncated
            });
        };

        self.bytes[..len].copy_from_slice(&window[..len]);
        buf.set_position(buf.position() + len + 1);
        validate_utf8(&self.bytes[..len])
    }
}
