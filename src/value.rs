// ABOUTME: Tagged-union value type holding one case per wire type.
// ABOUTME: Deferred database references are values carrying their resolution context.

use crate::context::{CollectionHandle, Database};
use crate::document::{Array, Container, Document};
use crate::error::{Error, Result};
use crate::types::{ObjectId, Pattern, UtcDateTime};
use std::fmt;
use std::sync::Arc;

/// A decoded field value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Explicit null
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// 64-bit floating point number
    Double(f64),
    /// Signed 32-bit integer
    Int32(i32),
    /// UTF-8 string (string and symbol tags)
    String(String),
    /// 12-byte identifier
    ObjectId(ObjectId),
    /// Reference to a document, resolved on demand with [`DbRef::fetch`]
    Reference(DbRef),
    /// Reference that named a whole collection, resolved while decoding
    Collection(CollectionHandle),
    /// Milliseconds since the epoch
    Date(UtcDateTime),
    /// Compiled regular expression
    Regex(Pattern),
    /// Generic binary payload
    Binary(Vec<u8>),
    /// Embedded document
    Document(Document),
    /// Embedded array
    Array(Array),
}

impl Value {
    /// Returns true if this value is null.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int32(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric value as f64, for doubles and integers.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(f) => Some(*f),
            Value::Int32(n) => Some(f64::from(*n)),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object_id(&self) -> Option<&ObjectId> {
        match self {
            Value::ObjectId(oid) => Some(oid),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            Value::Binary(b) => Some(b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(d) => Some(d),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// The value as a field sink, if it is a document or an array.
    pub fn as_container_mut(&mut self) -> Option<&mut dyn Container> {
        match self {
            Value::Document(d) => Some(d),
            Value::Array(a) => Some(a),
            _ => None,
        }
    }
}

/// A reference to a document in another collection.
///
/// Decoding never resolves it; call [`DbRef::fetch`] when the target is needed.
/// Equality ignores the database handle.
#[derive(Clone)]
pub struct DbRef {
    field: String,
    namespace: String,
    id: ObjectId,
    database: Option<Arc<dyn Database>>,
}

impl DbRef {
    #[must_use]
    pub fn new(
        field: impl Into<String>,
        namespace: impl Into<String>,
        id: ObjectId,
        database: Option<Arc<dyn Database>>,
    ) -> Self {
        Self {
            field: field.into(),
            namespace: namespace.into(),
            id,
            database,
        }
    }

    /// Name of the field this reference was decoded from.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Full namespace of the referenced collection.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn database(&self) -> Option<&Arc<dyn Database>> {
        self.database.as_ref()
    }

    /// Look the referenced document up through the database context.
    pub fn fetch(&self) -> Result<Option<Document>> {
        let database = self.database.as_ref().ok_or(Error::MissingDatabase)?;
        database.find_by_id(&self.namespace, &self.id)
    }
}

impl PartialEq for DbRef {
    fn eq(&self, other: &Self) -> bool {
        self.field == other.field && self.namespace == other.namespace && self.id == other.id
    }
}

impl fmt::Debug for DbRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbRef")
            .field("field", &self.field)
            .field("namespace", &self.namespace)
            .field("id", &self.id)
            .field("database", &self.database.as_ref().map(|db| db.name().to_owned()))
            .finish()
    }
}

// Convenient From implementations
impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int32(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Double(n)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<ObjectId> for Value {
    fn from(oid: ObjectId) -> Self {
        Value::ObjectId(oid)
    }
}

impl From<UtcDateTime> for Value {
    fn from(d: UtcDateTime) -> Self {
        Value::Date(d)
    }
}

impl From<Pattern> for Value {
    fn from(p: Pattern) -> Self {
        Value::Regex(p)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Binary(b)
    }
}

impl From<Document> for Value {
    fn from(d: Document) -> Self {
        Value::Document(d)
    }
}

impl From<Array> for Value {
    fn from(a: Array) -> Self {
        Value::Array(a)
    }
}

impl From<DbRef> for Value {
    fn from(r: DbRef) -> Self {
        Value::Reference(r)
    }
}

impl From<CollectionHandle> for Value {
    fn from(c: CollectionHandle) -> Self {
        Value::Collection(c)
    }
}

/// Macro for building documents.
///
/// ```rust
/// use docwire::doc;
///
/// let d = doc! {
///     "name": "test",
///     "count": 3,
///     "tags": ["a", "b"],
///     "nested": { "flag": true }
/// };
/// assert_eq!(d.get_str("name"), Some("test"));
/// ```
#[macro_export]
macro_rules! doc {
    ({ $($key:tt : $value:tt),* $(,)? }) => {
        $crate::doc! { $($key : $value),* }
    };
    ($($key:tt : $value:tt),* $(,)?) => {
        {
            #[allow(unused_mut)]
            let mut d = $crate::Document::new();
            $(
                d.insert($key, $crate::value!($value));
            )*
            d
        }
    };
}

/// Macro for building a single [`Value`], used by [`doc!`].
#[macro_export]
macro_rules! value {
    (null) => {
        $crate::Value::Null
    };
    ([ $($elem:tt),* $(,)? ]) => {
        $crate::Value::Array(
            <$crate::Array as ::std::iter::FromIterator<$crate::Value>>::from_iter(
                vec![ $( $crate::value!($elem) ),* ]
            )
        )
    };
    ({ $($key:tt : $value:tt),* $(,)? }) => {
        $crate::Value::Document($crate::doc! { $($key : $value),* })
    };
    ($other:expr) => {
        $crate::Value::from($other)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn test_value_accessors() {
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Int32(42).as_i32(), Some(42));
        assert_eq!(Value::Int32(2).as_f64(), Some(2.0));
        assert_eq!(Value::String("hello".into()).as_str(), Some("hello"));
        assert!(Value::Null.is_null());
    }

    #[test]
    fn test_doc_macro() {
        let d = doc! {
            "name": "test",
            "tags": ["a", "b"],
            "nested": { "flag": true },
            "nothing": null
        };
        assert_eq!(d.len(), 4);
        assert_eq!(d.get_array("tags").map(Array::len), Some(2));
        assert_eq!(
            d.get_document("nested").and_then(|n| n.get("flag")),
            Some(&Value::Bool(true))
        );
        assert!(d.get("nothing").is_some_and(Value::is_null));
    }

    #[test]
    fn test_dbref_without_database() {
        let r = DbRef::new("owner", "db.users", ObjectId::from_bytes([1; 12]), None);
        assert_eq!(r.fetch(), Err(Error::MissingDatabase));
        assert_eq!(r.namespace(), "db.users");
    }
}
