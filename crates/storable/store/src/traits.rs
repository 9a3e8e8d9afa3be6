use crate::model::{Document, Query};
use crate::StoreResult;
use async_trait::async_trait;
use component_types::FieldMask;

/// Persistence contract for storable components.
///
/// `collection` is the component type name. Implementations must return
/// `find` results in a stable order.
#[async_trait]
pub trait StoreDriver: Send + Sync {
    /// Read one document, projected to `fields` when given.
    async fn get(
        &self,
        collection: &str,
        id: &str,
        fields: Option<&FieldMask>,
    ) -> StoreResult<Option<Document>>;

    async fn find(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>>;

    /// Insert or update. Only the fields named by `fields` are written; a
    /// masked field absent from `document` is removed from the stored copy.
    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        fields: &FieldMask,
        document: Document,
    ) -> StoreResult<()>;

    /// Delete by id. Returns whether a document existed.
    async fn remove(&self, collection: &str, id: &str) -> StoreResult<bool>;
}
