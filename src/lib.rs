// ABOUTME: Pooled decoder for length-prefixed, self-describing BSON-style documents.
// ABOUTME: Turns wire bytes into ordered in-memory document trees, reusing decoder buffers.

//! # docwire
//!
//! Decodes a binary, length-prefixed, type-tagged document format (the
//! classic BSON wire layout) into [`Document`] trees.
//!
//! ## Quick Start
//!
//! ```rust
//! use docwire::{decode_all, doc, encode_document};
//!
//! let mut bytes = encode_document(&doc! { "key1": "val1" }).unwrap();
//! bytes.extend(encode_document(&doc! { "key2": "val2" }).unwrap());
//!
//! let docs = decode_all(&bytes).unwrap();
//! assert_eq!(docs.len(), 2);
//! assert_eq!(docs[1].get_str("key2"), Some("val2"));
//! ```
//!
//! ## Pooled decoding
//!
//! Decoders own large buffers, so a client keeps them in a [`DecoderPool`]
//! and checks one out per response:
//!
//! ```rust
//! use docwire::{doc, encode_document, DecoderPool, PoolConfig};
//!
//! let pool = DecoderPool::new("responses", PoolConfig::default());
//! let bytes = encode_document(&doc! { "ok": true }).unwrap();
//!
//! let mut decoder = pool.acquire(None);
//! decoder.load(&bytes).unwrap();
//! while let Some(d) = decoder.decode_document().unwrap() {
//!     assert_eq!(d.get("ok").and_then(|v| v.as_bool()), Some(true));
//! }
//! // Dropping the guard returns the decoder to the pool.
//! ```
//!
//! ## Resource Limits
//!
//! Defaults live in [`types::limits`]:
//! - Decoder buffer: 5 MB
//! - Field names and strings: 512 KB
//! - Embedded document depth: 256

pub mod buffer;
pub mod context;
pub mod decoder;
pub mod document;
pub mod encoder;
pub mod error;
pub mod pool;
pub mod types;
pub mod value;

// Re-export commonly used items at the crate root
pub use buffer::{ByteBuffer, ByteOrder, NameBuffer};
pub use context::{CollectionHandle, Database, DocumentFactory, FnFactory, GenericFactory};
pub use decoder::{Decoder, DecoderConfig};
pub use document::{Array, Container, Document};
pub use encoder::Encoder;
pub use error::{Error, ErrorKind, Result};
pub use pool::{DecoderPool, PoolConfig, PoolStats, PooledDecoder};
pub use types::{binary_subtype, limits, type_code, ObjectId, Pattern, UtcDateTime};
pub use value::{DbRef, Value};

// The doc! and value! macros are automatically exported at crate root via #[macro_export]

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// Decode the first document in `data`.
///
/// Returns `Ok(None)` for empty input.
///
/// # Example
///
/// ```rust
/// use docwire::decode_document;
///
/// let bytes = [5, 0, 0, 0, 0]; // {}
/// let doc = decode_document(&bytes).unwrap().unwrap();
/// assert!(doc.is_empty());
/// ```
pub fn decode_document(data: &[u8]) -> Result<Option<Document>> {
    let mut decoder = Decoder::new(ByteBuffer::wrap(data.to_vec()))?;
    decoder.decode_document()
}

/// Decode every document in `data`, in order.
///
/// Inputs that fit a pooled decoder's buffer are decoded with a decoder from
/// [`DecoderPool::global`]; larger inputs get a one-off decoder.
pub fn decode_all(data: &[u8]) -> Result<Vec<Document>> {
    let pool = DecoderPool::global();
    if data.len() <= pool.config().decoder.buffer_capacity {
        let mut decoder = pool.acquire(None);
        decoder.load(data)?;
        drain(&mut decoder)
    } else {
        let mut decoder = Decoder::new(ByteBuffer::wrap(data.to_vec()))?;
        drain(&mut decoder)
    }
}

fn drain(decoder: &mut Decoder) -> Result<Vec<Document>> {
    let mut docs = Vec::new();
    while let Some(doc) = decoder.decode_document()? {
        docs.push(doc);
    }
    Ok(docs)
}

/// Encode a document to wire bytes.
///
/// # Example
///
/// ```rust
/// use docwire::{encode_document, Document};
///
/// let bytes = encode_document(&Document::new()).unwrap();
/// assert_eq!(bytes, vec![5, 0, 0, 0, 0]);
/// ```
pub fn encode_document(doc: &Document) -> Result<Vec<u8>> {
    let mut encoder = Encoder::new();
    encoder.write_document(doc)?;
    Ok(encoder.into_inner())
}

// Implement Serialize for Value
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Double(f) => serializer.serialize_f64(*f),
            Value::Int32(n) => serializer.serialize_i32(*n),
            Value::String(s) => serializer.serialize_str(s),
            Value::ObjectId(oid) => serializer.serialize_str(&oid.to_hex()),
            Value::Reference(r) => {
                let mut m = serializer.serialize_map(Some(2))?;
                m.serialize_entry("$ref", r.namespace())?;
                m.serialize_entry("$id", &r.id().to_hex())?;
                m.end()
            }
            Value::Collection(c) => serializer.serialize_str(&c.full_name()),
            Value::Date(d) => serializer.serialize_i64(d.timestamp_millis()),
            Value::Regex(p) => serializer.collect_str(&format_args!("/{}/{}", p.source(), p.flags())),
            Value::Binary(bytes) => serializer.serialize_bytes(bytes),
            Value::Document(d) => d.serialize(serializer),
            Value::Array(a) => a.serialize(serializer),
        }
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut m = serializer.serialize_map(Some(self.len()))?;
        for (key, val) in self.iter() {
            m.serialize_entry(key, val)?;
        }
        m.end()
    }
}

impl Serialize for Array {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for item in self.iter() {
            seq.serialize_element(item)?;
        }
        seq.end()
    }
}
