// ABOUTME: End-to-end decoding scenarios over hand-built and encoder-built wire bytes.
// ABOUTME: Covers document sequences, arrays, underruns, references and the merge policy.

use docwire::{
    doc, encode_document, type_code, Array, ByteBuffer, CollectionHandle, Database, Decoder,
    DecoderPool, Document, Error, ErrorKind, FnFactory, ObjectId, PoolConfig, Result, Value,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Wrap a field list in a length prefix and terminator.
fn document(body: &[u8]) -> Vec<u8> {
    let mut out = ((body.len() + 5) as i32).to_le_bytes().to_vec();
    out.extend_from_slice(body);
    out.push(0);
    out
}

fn field(tag: u8, name: &str, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    out.extend_from_slice(name.as_bytes());
    out.push(0);
    out.extend_from_slice(payload);
    out
}

fn string_payload(s: &str) -> Vec<u8> {
    let mut out = ((s.len() + 1) as i32).to_le_bytes().to_vec();
    out.extend_from_slice(s.as_bytes());
    out.push(0);
    out
}

fn decoder_over(bytes: Vec<u8>) -> Decoder {
    Decoder::new(ByteBuffer::wrap(bytes)).unwrap()
}

/// In-memory database keyed by namespace.
#[derive(Default)]
struct MemoryDb {
    collections: HashMap<String, Vec<(ObjectId, Document)>>,
}

impl MemoryDb {
    fn with(namespace: &str, id: ObjectId, doc: Document) -> Self {
        let mut db = Self::default();
        db.collections
            .entry(namespace.to_string())
            .or_default()
            .push((id, doc));
        db
    }
}

impl Database for MemoryDb {
    fn name(&self) -> &str {
        "memory"
    }

    fn collection_from_full(&self, namespace: &str) -> Result<CollectionHandle> {
        Ok(CollectionHandle::parse_full(namespace))
    }

    fn find_by_id(&self, namespace: &str, id: &ObjectId) -> Result<Option<Document>> {
        Ok(self.collections.get(namespace).and_then(|docs| {
            docs.iter()
                .find(|(candidate, _)| candidate == id)
                .map(|(_, doc)| doc.clone())
        }))
    }
}

#[test]
fn test_sequential_documents_then_end_of_input() {
    let mut bytes = encode_document(&doc! { "key1": "val1" }).unwrap();
    bytes.extend(encode_document(&doc! { "key2": "val2" }).unwrap());

    let mut dec = decoder_over(bytes);
    let first = dec.decode_document().unwrap().unwrap();
    let second = dec.decode_document().unwrap().unwrap();

    assert_eq!(first.len(), 1);
    assert_eq!(first.get_str("key1"), Some("val1"));
    assert_eq!(second.len(), 1);
    assert_eq!(second.get_str("key2"), Some("val2"));
    assert_eq!(dec.decode_document().unwrap(), None);
    assert!(!dec.more());
}

#[test]
fn test_buffer_at_limit_is_end_of_input() {
    let mut dec = decoder_over(Vec::new());
    assert_eq!(dec.decode_document(), Ok(None));

    let mut dec = decoder_over(vec![5, 0, 0, 0, 0]);
    assert!(dec.decode_document().unwrap().is_some());
    assert_eq!(dec.decode_document(), Ok(None));
}

#[test]
fn test_array_elements_in_index_order() {
    let mut items = field(type_code::STRING, "0", &string_payload("a"));
    items.extend(field(type_code::STRING, "1", &string_payload("b")));
    let bytes = document(&field(type_code::ARRAY, "tags", &document(&items)));

    let doc = decoder_over(bytes).decode_document().unwrap().unwrap();
    let tags = doc.get_array("tags").unwrap();
    assert_eq!(tags, &Array::from(vec![Value::from("a"), Value::from("b")]));
    assert_eq!(tags.get(0).and_then(Value::as_str), Some("a"));
    assert_eq!(tags.get(1).and_then(Value::as_str), Some("b"));

    // The encoder names elements the same way.
    let expected = document(&field(type_code::ARRAY, "tags", &document(&items)));
    assert_eq!(encode_document(&doc).unwrap(), expected);
}

#[test]
fn test_string_underrun_is_corruption() {
    let mut bytes = document(&field(type_code::STRING, "s", &string_payload("hello")));
    // Leave only L-2 bytes of the 6-byte string body before the limit.
    let body_start = 4 + 3 + 4;
    bytes.truncate(body_start + 4);

    let err = decoder_over(bytes).decode_document().unwrap_err();
    assert_eq!(err, Error::Truncated);
    assert_eq!(err.kind(), ErrorKind::Corruption);
}

#[test]
fn test_decode_field_reports_bytes_consumed() {
    let mut bytes = field(type_code::INT32, "n", &7i32.to_le_bytes());
    bytes.push(type_code::EOO);

    let mut dec = decoder_over(bytes);
    let mut into = Document::new();
    assert_eq!(dec.decode_field(&mut into).unwrap(), 7);
    assert_eq!(dec.decode_field(&mut into).unwrap(), 1);
    assert_eq!(into, doc! { "n": 7 });
}

#[test]
fn test_collection_sentinel_resolves_to_handle() {
    let doc = doc! { "coll": (CollectionHandle::new("shop", "orders")) };
    let bytes = encode_document(&doc).unwrap();

    let mut dec = decoder_over(bytes.clone());
    dec.set_database(Some(Arc::new(MemoryDb::default())));
    let decoded = dec.decode_document().unwrap().unwrap();
    assert_eq!(decoded, doc);

    let err = decoder_over(bytes).decode_document().unwrap_err();
    assert_eq!(err, Error::MissingDatabase);
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn test_reference_is_deferred_until_fetched() {
    let id = ObjectId::from_bytes([7; 12]);
    let mut ns = Vec::new();
    ns.extend_from_slice(&string_payload("shop.users"));
    ns.extend_from_slice(&id.bytes());
    let bytes = document(&field(type_code::REF, "owner", &ns));

    let db = Arc::new(MemoryDb::with("shop.users", id, doc! { "name": "ada" }));
    let mut dec = decoder_over(bytes);
    dec.set_database(Some(db));
    let decoded = dec.decode_document().unwrap().unwrap();

    let Some(Value::Reference(r)) = decoded.get("owner") else {
        panic!("expected a reference, got {:?}", decoded.get("owner"));
    };
    assert_eq!(r.field(), "owner");
    assert_eq!(r.namespace(), "shop.users");
    assert_eq!(r.id(), id);
    assert_eq!(r.fetch().unwrap(), Some(doc! { "name": "ada" }));
}

#[test]
fn test_existing_container_is_augmented() {
    let bytes = encode_document(&doc! { "meta": { "b": 2 } }).unwrap();
    let factory = FnFactory::new(|| Ok(doc! { "meta": { "a": 1 } }));

    let decoded = decoder_over(bytes).decode_document_with(&factory).unwrap().unwrap();
    assert_eq!(decoded, doc! { "meta": { "a": 1, "b": 2 } });
}

#[test]
fn test_existing_scalar_is_replaced() {
    let bytes = encode_document(&doc! { "meta": { "b": 2 } }).unwrap();
    let factory = FnFactory::new(|| Ok(doc! { "meta": 5 }));

    let decoded = decoder_over(bytes).decode_document_with(&factory).unwrap().unwrap();
    assert_eq!(decoded, doc! { "meta": { "b": 2 } });
}

#[test]
fn test_pooled_transport_read() {
    let pool = DecoderPool::new("transport", PoolConfig::default());
    let bytes = encode_document(&doc! { "ok": true, "n": 3 }).unwrap();

    let mut dec = pool.acquire(None);
    dec.buffer_mut()[..bytes.len()].copy_from_slice(&bytes);
    dec.done_reading(bytes.len());

    assert_eq!(dec.remaining(), bytes.len());
    assert_eq!(dec.decode_document().unwrap(), Some(doc! { "ok": true, "n": 3 }));
    assert_eq!(dec.decode_document().unwrap(), None);
}

#[test]
fn test_unsupported_type_aborts_decode() {
    let bytes = document(&field(0x12, "big", &1i64.to_le_bytes()));
    let err = decoder_over(bytes).decode_document().unwrap_err();
    assert_eq!(err, Error::UnsupportedType(0x12));
    assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
}
