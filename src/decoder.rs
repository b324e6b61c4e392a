// ABOUTME: Recursive, type-tagged document decoder working over a ByteBuffer cursor.
// ABOUTME: Decodes length-prefixed documents field by field and verifies every declared length.

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use crate::buffer::{validate_utf8, ByteBuffer, NameBuffer, WIRE_ORDER};
use crate::context::{Database, DocumentFactory, GenericFactory};
use crate::document::{Array, Container, Document};
use crate::error::{Error, Result};
use crate::types::{binary_subtype, limits, type_code, ObjectId, Pattern, UtcDateTime};
use crate::value::{DbRef, Value};
use std::sync::Arc;
use tracing::{trace, warn};

/// Smallest valid document: length prefix plus terminator.
const MIN_DOCUMENT_LENGTH: i32 = 5;

/// Configuration options for the decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Capacity of a private decoder's buffer
    pub buffer_capacity: usize,
    /// Capacity of the field name buffer
    pub max_name_length: usize,
    /// Maximum string value length in bytes
    pub max_string_length: usize,
    /// Maximum embedded document nesting depth
    pub max_depth: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: limits::BUFFER_CAPACITY,
            max_name_length: limits::MAX_STRING,
            max_string_length: limits::MAX_STRING,
            max_depth: limits::MAX_DEPTH,
        }
    }
}

impl DecoderConfig {
    /// Memory a private decoder with this configuration holds on to.
    #[must_use]
    pub fn instance_cost(&self) -> usize {
        self.buffer_capacity + 2 * self.max_name_length + limits::DECODER_OVERHEAD
    }
}

/// A document decoder bound to one buffer at a time.
///
/// A *private* decoder owns a buffer it allocated itself and is only ever
/// rewound or reloaded; pools hand these out. A *shared* decoder wraps a
/// caller-supplied buffer and may be rebound with [`Decoder::reset_with`].
pub struct Decoder {
    buf: ByteBuffer,
    names: NameBuffer,
    config: DecoderConfig,
    private: bool,
    database: Option<Arc<dyn Database>>,
}

impl Decoder {
    /// Create a shared decoder over `buffer`.
    pub fn new(buffer: ByteBuffer) -> Result<Self> {
        Self::with_config(buffer, DecoderConfig::default())
    }

    /// Create a shared decoder with custom configuration.
    pub fn with_config(buffer: ByteBuffer, config: DecoderConfig) -> Result<Self> {
        if buffer.order() != WIRE_ORDER {
            return Err(Error::WrongByteOrder);
        }
        Ok(Self {
            buf: buffer,
            names: NameBuffer::new(config.max_name_length),
            config,
            private: false,
            database: None,
        })
    }

    /// Create a decoder that owns a buffer of `config.buffer_capacity` bytes.
    pub(crate) fn new_private(config: DecoderConfig) -> Self {
        let mut decoder = Self {
            buf: ByteBuffer::allocate(config.buffer_capacity),
            names: NameBuffer::new(config.max_name_length),
            config,
            private: true,
            database: None,
        };
        decoder.reset();
        decoder
    }

    /// Whether this decoder owns its buffer.
    pub fn is_private(&self) -> bool {
        self.private
    }

    /// Get the decoder configuration.
    #[must_use]
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Bind a new buffer to a shared decoder.
    pub fn reset_with(&mut self, buffer: ByteBuffer) -> Result<()> {
        if self.private {
            return Err(Error::PrivateDecoderRebind);
        }
        if buffer.order() != WIRE_ORDER {
            return Err(Error::WrongByteOrder);
        }
        trace!(limit = buffer.limit(), "rebinding decoder buffer");
        self.buf = buffer;
        Ok(())
    }

    /// Rewind: position 0, limit at capacity, wire byte order.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.buf.set_order(WIRE_ORDER);
    }

    /// Copy `bytes` into the buffer and make them the input to decode.
    pub fn load(&mut self, bytes: &[u8]) -> Result<()> {
        self.buf.set_order(WIRE_ORDER);
        self.buf.load(bytes)
    }

    /// Raw storage for a transport to read into; follow with [`Decoder::done_reading`].
    pub fn buffer_mut(&mut self) -> &mut [u8] {
        self.buf.as_mut_slice()
    }

    /// Mark the first `len` bytes of the buffer as the input to decode.
    pub fn done_reading(&mut self, len: usize) {
        self.buf.set_limit(self.buf.capacity());
        self.buf.set_position(len);
        self.buf.flip();
    }

    pub fn set_database(&mut self, database: Option<Arc<dyn Database>>) {
        self.database = database;
    }

    pub fn database(&self) -> Option<&Arc<dyn Database>> {
        self.database.as_ref()
    }

    /// Get the current position in the buffer.
    #[must_use]
    pub fn position(&self) -> usize {
        self.buf.position()
    }

    /// Bytes left before the limit.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    /// Whether any input is left.
    #[must_use]
    pub fn more(&self) -> bool {
        self.buf.has_remaining()
    }

    /// Read a raw little-endian i32, e.g. from a reply header ahead of the documents.
    pub fn read_i32(&mut self) -> Result<i32> {
        self.buf.read_i32()
    }

    /// Read a raw little-endian i64.
    pub fn read_i64(&mut self) -> Result<i64> {
        self.buf.read_i64()
    }

    /// Decode the next document into a generic [`Document`].
    ///
    /// Returns `Ok(None)` once the input is exhausted.
    pub fn decode_document(&mut self) -> Result<Option<Document>> {
        self.decode_document_with(&GenericFactory)
    }

    /// Decode the next document, creating the outermost container with `factory`.
    pub fn decode_document_with<F: DocumentFactory>(
        &mut self,
        factory: &F,
    ) -> Result<Option<F::Root>> {
        if !self.buf.has_remaining() {
            return Ok(None);
        }

        let start = self.buf.position();
        let declared = self.read_document_length()?;
        let mut root = factory.create_root()?;
        self.decode_fields(&mut root, factory, 0)?;
        self.check_length(start, declared)?;
        Ok(Some(root))
    }

    /// Decode one field into `into`.
    ///
    /// Returns 1 when the byte read was the terminator (nothing is stored),
    /// otherwise the number of bytes the field occupied.
    pub fn decode_field(&mut self, into: &mut dyn Container) -> Result<usize> {
        self.decode_field_at(into, &GenericFactory, 0)
    }

    fn decode_fields<F: DocumentFactory>(
        &mut self,
        into: &mut dyn Container,
        factory: &F,
        depth: usize,
    ) -> Result<()> {
        while self.decode_field_at(into, factory, depth)? > 1 {}
        Ok(())
    }

    fn decode_field_at<F: DocumentFactory>(
        &mut self,
        into: &mut dyn Container,
        factory: &F,
        depth: usize,
    ) -> Result<usize> {
        let start = self.buf.position();
        let tag = self.buf.read_u8()?;
        if tag == type_code::EOO {
            return Ok(1);
        }

        let name = self.names.read_cstr(&mut self.buf)?.to_owned();

        let value = match tag {
            type_code::NULL => Value::Null,
            type_code::BOOLEAN => Value::Bool(self.buf.read_u8()? != 0),
            type_code::DOUBLE => Value::Double(self.buf.read_f64()?),
            type_code::INT32 => Value::Int32(self.buf.read_i32()?),
            type_code::STRING | type_code::SYMBOL => Value::String(self.read_string()?),
            type_code::OID => Value::ObjectId(self.read_object_id()?),
            type_code::REF => self.read_reference(&name)?,
            type_code::DATE => Value::Date(UtcDateTime::from_millis(self.buf.read_i64()?)),
            type_code::REGEX => {
                let source = self.names.read_cstr(&mut self.buf)?.to_owned();
                let flags = self.names.read_cstr(&mut self.buf)?;
                Value::Regex(Pattern::new(&source, flags)?)
            }
            type_code::BINARY => Value::Binary(self.parse_binary()?),
            type_code::CODE => return Err(Error::UnsupportedCode),
            type_code::OBJECT | type_code::ARRAY => {
                let is_array = tag == type_code::ARRAY;
                self.decode_embedded(into, &name, is_array, factory, depth)?;
                return Ok(self.buf.position() - start);
            }
            other => return Err(Error::UnsupportedType(other)),
        };

        into.put(&name, value)?;
        Ok(self.buf.position() - start)
    }

    /// Decode an embedded document or array stored under `name`.
    ///
    /// An embedded document whose name already holds a document or array is
    /// decoded into that value in place. Arrays always start fresh, and new
    /// nested containers are always the generic ones.
    fn decode_embedded<F: DocumentFactory>(
        &mut self,
        into: &mut dyn Container,
        name: &str,
        is_array: bool,
        factory: &F,
        depth: usize,
    ) -> Result<()> {
        if depth >= self.config.max_depth {
            return Err(Error::MaxDepthExceeded);
        }

        let start = self.buf.position();
        let declared = self.read_document_length()?;

        if !is_array {
            if let Some(existing) = into.get_mut(name).and_then(Value::as_container_mut) {
                self.decode_fields(existing, factory, depth + 1)?;
                return self.check_length(start, declared);
            }
        }

        let created = if is_array {
            let mut array = Array::new();
            self.decode_fields(&mut array, factory, depth + 1)?;
            Value::Array(array)
        } else {
            let mut doc = Document::new();
            self.decode_fields(&mut doc, factory, depth + 1)?;
            Value::Document(doc)
        };
        self.check_length(start, declared)?;
        into.put(name, created)
    }

    fn read_document_length(&mut self) -> Result<i32> {
        let declared = self.buf.read_i32()?;
        if declared < MIN_DOCUMENT_LENGTH {
            return Err(Error::InvalidLength(declared));
        }
        Ok(declared)
    }

    fn check_length(&self, start: usize, declared: i32) -> Result<()> {
        let consumed = self.buf.position() - start;
        if consumed != declared as usize {
            warn!(declared, consumed, start, "document length mismatch, aborting decode");
            return Err(Error::LengthMismatch { declared, consumed });
        }
        Ok(())
    }

    /// Read a length-prefixed, zero-terminated UTF-8 string.
    fn read_string(&mut self) -> Result<String> {
        let len = self.buf.read_i32()?;
        if len < 1 {
            return Err(Error::InvalidLength(len));
        }
        let size = (len - 1) as usize;
        if size > self.config.max_string_length {
            return Err(Error::StringTooLong {
                length: size,
                capacity: self.config.max_string_length,
            });
        }

        let bytes = self.buf.read_bytes(len as usize)?;
        let (text, terminator) = bytes.split_at(size);
        if terminator[0] != 0 {
            return Err(Error::MissingTerminator);
        }
        Ok(validate_utf8(text)?.to_owned())
    }

    fn read_object_id(&mut self) -> Result<ObjectId> {
        let low = self.buf.read_u64()?;
        let high = self.buf.read_u32()?;
        Ok(ObjectId::from_parts(low, high))
    }

    fn read_reference(&mut self, name: &str) -> Result<Value> {
        // The namespace is also zero terminated, so its length prefix is not needed.
        let _namespace_len = self.buf.read_i32()?;
        let namespace = self.names.read_cstr(&mut self.buf)?.to_owned();
        let id = self.read_object_id()?;

        if id.is_collection_ref() {
            let database = self.database.as_ref().ok_or(Error::MissingDatabase)?;
            return Ok(Value::Collection(database.collection_from_full(&namespace)?));
        }
        Ok(Value::Reference(DbRef::new(
            name,
            namespace,
            id,
            self.database.clone(),
        )))
    }

    /// Read a binary payload. Only the generic binary subtype is handled.
    pub fn parse_binary(&mut self) -> Result<Vec<u8>> {
        let total = self.buf.read_i32()?;
        let subtype = self.buf.read_u8()?;

        match subtype {
            binary_subtype::BINARY => {
                let len = self.buf.read_i32()?;
                let size = usize::try_from(len).map_err(|_| Error::InvalidLength(len))?;
                // The outer length counts the inner length prefix too.
                if i64::from(total) != i64::from(len) + 4 {
                    return Err(Error::InvalidLength(total));
                }
                trace!(size, "got binary");
                Ok(self.buf.read_bytes(size)?.to_vec())
            }
            other => Err(Error::UnsupportedBinarySubtype(other)),
        }
    }
}

impl std::fmt::Debug for Decoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoder")
            .field("position", &self.buf.position())
            .field("limit", &self.buf.limit())
            .field("capacity", &self.buf.capacity())
            .field("private", &self.private)
            .field("database", &self.database.as_ref().map(|db| db.name().to_owned()))
            .finish()
    }
}
