// ABOUTME: Ordered document and array containers that decoded fields are stored into.
// ABOUTME: Both implement Container, the sink interface the decoder writes through.

use crate::error::{Error, Result};
use crate::value::Value;

/// Something the decoder can store named fields into.
pub trait Container {
    /// Store `value` under `name`, replacing any previous value.
    fn put(&mut self, name: &str, value: Value) -> Result<()>;

    /// Mutable access to the value currently stored under `name`.
    fn get_mut(&mut self, name: &str) -> Option<&mut Value>;
}

/// A mapping from field name to value that preserves insertion order.
///
/// Replacing an existing field keeps it in its original position.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    fields: Vec<(String, Value)>,
}

impl Document {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|(k, _)| k == name)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields
            .iter_mut()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    /// Insert a field, returning the value it replaced.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let name = name.into();
        let value = value.into();
        match self.index_of(&name) {
            Some(i) => Some(std::mem::replace(&mut self.fields[i].1, value)),
            None => {
                self.fields.push((name, value));
                None
            }
        }
    }

    /// Remove a field, shifting later fields down.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let i = self.index_of(name)?;
        Some(self.fields.remove(i).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_document(&self, name: &str) -> Option<&Document> {
        self.get(name).and_then(Value::as_document)
    }

    pub fn get_array(&self, name: &str) -> Option<&Array> {
        self.get(name).and_then(Value::as_array)
    }
}

impl Container for Document {
    fn put(&mut self, name: &str, value: Value) -> Result<()> {
        match self.get_mut(name) {
            Some(slot) => *slot = value,
            None => self.fields.push((name.to_owned(), value)),
        }
        Ok(())
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        Document::get_mut(self, name)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Document {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut doc = Document::new();
        for (k, v) in iter {
            doc.insert(k, v);
        }
        doc
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

/// An ordered list of values. On the wire, elements are named "0", "1", ...
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Array {
    items: Vec<Value>,
}

impl Array {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.items.get(index)
    }

    pub fn push(&mut self, value: impl Into<Value>) {
        self.items.push(value.into());
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.items
    }

    fn parse_index(name: &str) -> Result<usize> {
        if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidArrayIndex(name.to_owned()));
        }
        name.parse::<usize>()
            .map_err(|_| Error::InvalidArrayIndex(name.to_owned()))
    }
}

impl Container for Array {
    /// Store at the decimal index `name`.
    ///
    /// Arrays are dense on the wire: an index may replace an existing element
    /// or append one, but never skip ahead.
    fn put(&mut self, name: &str, value: Value) -> Result<()> {
        let index = Self::parse_index(name)?;
        match index.cmp(&self.items.len()) {
            std::cmp::Ordering::Less => self.items[index] = value,
            std::cmp::Ordering::Equal => self.items.push(value),
            std::cmp::Ordering::Greater => {
                return Err(Error::InvalidArrayIndex(name.to_owned()));
            }
        }
        Ok(())
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        let index = Self::parse_index(name).ok()?;
        self.items.get_mut(index)
    }
}

impl From<Vec<Value>> for Array {
    fn from(items: Vec<Value>) -> Self {
        Self { items }
    }
}

impl<T: Into<Value>> FromIterator<T> for Array {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl IntoIterator for Array {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
