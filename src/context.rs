// ABOUTME: Interfaces to the database/collection layer: reference resolution and document factories.
// ABOUTME: The decoder depends only on these traits, never on concrete collection types.

use crate::document::{Container, Document};
use crate::error::{Error, Result};
use crate::types::ObjectId;

/// Database context used to resolve references found in documents.
pub trait Database: Send + Sync {
    /// Database name, for diagnostics.
    fn name(&self) -> &str;

    /// Resolve a full `database.collection` namespace to a collection handle.
    fn collection_from_full(&self, namespace: &str) -> Result<CollectionHandle>;

    /// Fetch the document with `id` from the collection named by `namespace`.
    fn find_by_id(&self, namespace: &str, id: &ObjectId) -> Result<Option<Document>>;
}

/// A resolved collection, identified by database and collection name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionHandle {
    database: String,
    name: String,
}

impl CollectionHandle {
    #[must_use]
    pub fn new(database: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            name: name.into(),
        }
    }

    /// Split `database.collection` at the first dot.
    ///
    /// A namespace without a dot names a collection in an unnamed database.
    #[must_use]
    pub fn parse_full(namespace: &str) -> Self {
        match namespace.split_once('.') {
            Some((db, coll)) => Self::new(db, coll),
            None => Self::new("", namespace),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The `database.collection` form used on the wire.
    #[must_use]
    pub fn full_name(&self) -> String {
        if self.database.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.database, self.name)
        }
    }
}

/// Decides what container type the outermost decoded document becomes.
///
/// A collection supplies its own factory to produce its document type.
/// Embedded documents and arrays are always decoded into [`Document`] and
/// [`Array`](crate::Array).
pub trait DocumentFactory {
    type Root: Container;

    /// Create the outermost document. Failures surface as [`Error::Construction`].
    fn create_root(&self) -> Result<Self::Root>;
}

/// Produces plain [`Document`]s for every level.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericFactory;

impl DocumentFactory for GenericFactory {
    type Root = Document;

    fn create_root(&self) -> Result<Document> {
        Ok(Document::new())
    }
}

/// Wraps a closure that builds root documents, e.g. pre-seeded ones.
pub struct FnFactory<F> {
    build: F,
}

impl<F> FnFactory<F>
where
    F: Fn() -> std::result::Result<Document, String>,
{
    pub fn new(build: F) -> Self {
        Self { build }
    }
}

impl<F> DocumentFactory for FnFactory<F>
where
    F: Fn() -> std::result::Result<Document, String>,
{
    type Root = Document;

    fn create_root(&self) -> Result<Document> {
        (self.build)().map_err(Error::Construction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_namespace() {
        let c = CollectionHandle::parse_full("shop.orders.archive");
        assert_eq!(c.database(), "shop");
        assert_eq!(c.name(), "orders.archive");
        assert_eq!(c.full_name(), "shop.orders.archive");

        let c = CollectionHandle::parse_full("bare");
        assert_eq!(c.database(), "");
        assert_eq!(c.full_name(), "bare");
    }

    #[test]
    fn test_generic_factory_root() {
        assert_eq!(GenericFactory.create_root().unwrap(), Document::new());
    }

    #[test]
    fn test_fn_factory_failure() {
        let f = FnFactory::new(|| Err("no default constructor".to_string()));
        assert_eq!(
            f.create_root(),
            Err(Error::Construction("no default constructor".into()))
        );
    }
}
