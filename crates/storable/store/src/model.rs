use component_types::{wire, FieldMask};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A stored document: attribute name to JSON value, identifier under `"id"`.
pub type Document = Map<String, Value>;

/// Flat query contract: equality filter, skip, limit and projection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Every entry must equal the document's value for the same key
    pub filter: Document,
    pub skip: usize,
    pub limit: Option<usize>,
    /// Fields to return; the identifier is always returned
    pub fields: Option<FieldMask>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter.insert(field.into(), value.into());
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn fields(mut self, fields: FieldMask) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.filter
            .iter()
            .all(|(field, expected)| document.get(field) == Some(expected))
    }
}

/// Keep only the identifier and the fields of `mask`
pub fn project(document: &Document, mask: &FieldMask) -> Document {
    document
        .iter()
        .filter(|(field, _)| field.as_str() == wire::IDENTIFIER || mask.contains(field))
        .map(|(field, value)| (field.clone(), value.clone()))
        .collect()
}

/// Operation counters of a driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub gets: u64,
    pub finds: u64,
    pub upserts: u64,
    pub removes: u64,
}
