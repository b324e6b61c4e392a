// ABOUTME: Document encoder producing the length-prefixed wire format the decoder reads.
// ABOUTME: Lengths are back-patched once each document or array body has been written.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]

use crate::document::{Array, Document};
use crate::error::{Error, Result};
use crate::types::{binary_subtype, type_code, ObjectId};
use crate::value::Value;

/// A document encoder that appends to an in-memory buffer.
#[derive(Debug, Default)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    /// Create a new, empty encoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume the encoder and return the encoded bytes.
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    /// Get the bytes written so far.
    pub fn get_ref(&self) -> &[u8] {
        &self.buf
    }

    /// Append one complete document.
    pub fn write_document(&mut self, doc: &Document) -> Result<()> {
        let start = self.begin_length();
        for (name, value) in doc.iter() {
            self.write_field(name, value)?;
        }
        self.end_length(start);
        Ok(())
    }

    fn write_array(&mut self, array: &Array) -> Result<()> {
        let start = self.begin_length();
        for (i, value) in array.iter().enumerate() {
            self.write_field(&i.to_string(), value)?;
        }
        self.end_length(start);
        Ok(())
    }

    /// Reserve a length prefix, returning its offset.
    #[inline]
    fn begin_length(&mut self) -> usize {
        let start = self.buf.len();
        self.buf.extend_from_slice(&[0; 4]);
        start
    }

    /// Write the terminator and patch the length prefix at `start`.
    #[inline]
    fn end_length(&mut self, start: usize) {
        self.buf.push(type_code::EOO);
        let len = (self.buf.len() - start) as i32;
        self.buf[start..start + 4].copy_from_slice(&len.to_le_bytes());
    }

    fn write_field(&mut self, name: &str, value: &Value) -> Result<()> {
        match value {
            Value::Null => self.write_header(type_code::NULL, name)?,
            Value::Bool(b) => {
                self.write_header(type_code::BOOLEAN, name)?;
                self.buf.push(u8::from(*b));
            }
            Value::Double(f) => {
                self.write_header(type_code::DOUBLE, name)?;
                self.buf.extend_from_slice(&f.to_le_bytes());
            }
            Value::Int32(n) => {
                self.write_header(type_code::INT32, name)?;
                self.buf.extend_from_slice(&n.to_le_bytes());
            }
            Value::String(s) => {
                self.write_header(type_code::STRING, name)?;
                self.write_string(s);
            }
            Value::ObjectId(oid) => {
                self.write_header(type_code::OID, name)?;
                self.buf.extend_from_slice(&oid.bytes());
            }
            Value::Reference(r) => {
                self.write_header(type_code::REF, name)?;
                self.write_reference(r.namespace(), r.id())?;
            }
            Value::Collection(c) => {
                self.write_header(type_code::REF, name)?;
                self.write_reference(&c.full_name(), ObjectId::COLLECTION_REF)?;
            }
            Value::Date(d) => {
                self.write_header(type_code::DATE, name)?;
                self.buf.extend_from_slice(&d.timestamp_millis().to_le_bytes());
            }
            Value::Regex(p) => {
                self.write_header(type_code::REGEX, name)?;
                self.write_cstr(p.source())?;
                self.write_cstr(p.flags())?;
            }
            Value::Binary(bytes) => {
                self.write_header(type_code::BINARY, name)?;
                self.buf.extend_from_slice(&((bytes.len() + 4) as i32).to_le_bytes());
                self.buf.push(binary_subtype::BINARY);
                self.buf.extend_from_slice(&(bytes.len() as i32).to_le_bytes());
                self.buf.extend_from_slice(bytes);
            }
            Value::Document(d) => {
                self.write_header(type_code::OBJECT, name)?;
                self.write_document(d)?;
            }
            Value::Array(a) => {
                self.write_header(type_code::ARRAY, name)?;
                self.write_array(a)?;
            }
        }
        Ok(())
    }

    #[inline]
    fn write_header(&mut self, tag: u8, name: &str) -> Result<()> {
        self.buf.push(tag);
        self.write_cstr(name)
    }

    fn write_cstr(&mut self, s: &str) -> Result<()> {
        if s.as_bytes().contains(&0) {
            return Err(Error::InvalidKey(s.to_owned()));
        }
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(0);
        Ok(())
    }

    fn write_string(&mut self, s: &str) {
        self.buf.extend_from_slice(&((s.len() + 1) as i32).to_le_bytes());
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(0);
    }

    fn write_reference(&mut self, namespace: &str, id: ObjectId) -> Result<()> {
        self.buf.extend_from_slice(&((namespace.len() + 1) as i32).to_le_bytes());
        self.write_cstr(namespace)?;
        self.buf.extend_from_slice(&id.bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn test_encode_empty_document() {
        let mut enc = Encoder::new();
        enc.write_document(&Document::new()).unwrap();
        assert_eq!(enc.into_inner(), vec![5, 0, 0, 0, 0]);
    }

    #[test]
    fn test_encode_string_field() {
        let mut enc = Encoder::new();
        enc.write_document(&doc! { "a": "b" }).unwrap();
        assert_eq!(
            enc.into_inner(),
            vec![
                14, 0, 0, 0, // total length
                type_code::STRING, b'a', 0, // tag + name
                2, 0, 0, 0, b'b', 0, // string
                0, // terminator
            ]
        );
    }

    #[test]
    fn test_encode_array_uses_index_names() {
        let mut enc = Encoder::new();
        enc.write_document(&doc! { "t": [true] }).unwrap();
        let bytes = enc.into_inner();
        // outer(4) + tag + "t\0" + inner(4) + tag + "0\0" + bool + eoo + eoo
        assert_eq!(bytes.len(), 4 + 3 + 4 + 3 + 1 + 1 + 1);
        assert_eq!(&bytes[11..14], &[type_code::BOOLEAN, b'0', 0]);
    }

    #[test]
    fn test_nul_in_key_rejected() {
        let mut d = Document::new();
        d.insert("a\0b", 1);
        let mut enc = Encoder::new();
        assert_eq!(enc.write_document(&d), Err(Error::InvalidKey("a\0b".into())));
    }
}
