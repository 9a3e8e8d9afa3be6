//! In-memory reference implementation of [`StoreDriver`].
//!
//! Deterministic and test-friendly: each collection is a `BTreeMap` keyed by
//! id, so `find` returns documents in id order.

use crate::model::{project, Document, Query, StoreStats};
use crate::traits::StoreDriver;
use crate::{StoreError, StoreResult};
use async_trait::async_trait;
use component_types::{wire, FieldMask};
use dashmap::DashMap;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// In-memory store driver.
#[derive(Default)]
pub struct MemoryStore {
    collections: DashMap<String, BTreeMap<String, Document>>,
    gets: AtomicU64,
    finds: AtomicU64,
    upserts: AtomicU64,
    removes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document directly, bypassing the counters
    pub fn insert(&self, collection: &str, document: Document) -> StoreResult<()> {
        let id = document
            .get(wire::IDENTIFIER)
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::InvalidInput("document has no string `id`".to_string()))?
            .to_string();
        self.collections
            .entry(collection.to_string())
            .or_default()
            .insert(id, document);
        Ok(())
    }

    /// Stored copy of a document, unprojected
    pub fn document(&self, collection: &str, id: &str) -> Option<Document> {
        self.collections
            .get(collection)
            .and_then(|documents| documents.get(id).cloned())
    }

    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .get(collection)
            .map(|documents| documents.len())
            .unwrap_or(0)
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            gets: self.gets.load(Ordering::Relaxed),
            finds: self.finds.load(Ordering::Relaxed),
            upserts: self.upserts.load(Ordering::Relaxed),
            removes: self.removes.load(Ordering::Relaxed),
        }
    }

    pub fn clear(&self) {
        self.collections.clear();
    }
}

#[async_trait]
impl StoreDriver for MemoryStore {
    async fn get(
        &self,
        collection: &str,
        id: &str,
        fields: Option<&FieldMask>,
    ) -> StoreResult<Option<Document>> {
        self.gets.fetch_add(1, Ordering::Relaxed);
        let document = self
            .collections
            .get(collection)
            .and_then(|documents| documents.get(id).cloned());
        debug!(collection, id, found = document.is_some(), "memory store get");
        Ok(document.map(|document| match fields {
            Some(mask) => project(&document, mask),
            None => document,
        }))
    }

    async fn find(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>> {
        self.finds.fetch_add(1, Ordering::Relaxed);
        let Some(documents) = self.collections.get(collection) else {
            return Ok(Vec::new());
        };
        let matches = documents
            .values()
            .filter(|document| query.matches(document))
            .skip(query.skip)
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|document| match &query.fields {
                Some(mask) => project(document, mask),
                None => document.clone(),
            })
            .collect::<Vec<_>>();
        debug!(collection, results = matches.len(), "memory store find");
        Ok(matches)
    }

    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        fields: &FieldMask,
        document: Document,
    ) -> StoreResult<()> {
        if id.is_empty() {
            return Err(StoreError::InvalidInput(
                "cannot upsert a document without an id".to_string(),
            ));
        }
        self.upserts.fetch_add(1, Ordering::Relaxed);

        let mut documents = self.collections.entry(collection.to_string()).or_default();
        let stored = documents.entry(id.to_string()).or_default();
        stored.insert(wire::IDENTIFIER.to_string(), Value::String(id.to_string()));
        for field in fields.iter().filter(|field| *field != wire::IDENTIFIER) {
            match document.get(field) {
                Some(value) => {
                    stored.insert(field.to_string(), value.clone());
                }
                None => {
                    stored.remove(field);
                }
            }
        }
        debug!(collection, id, fields = fields.len(), "memory store upsert");
        Ok(())
    }

    async fn remove(&self, collection: &str, id: &str) -> StoreResult<bool> {
        self.removes.fetch_add(1, Ordering::Relaxed);
        let removed = self
            .collections
            .get_mut(collection)
            .map(|mut documents| documents.remove(id).is_some())
            .unwrap_or(false);
        debug!(collection, id, removed, "memory store remove");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        let movies = [
            ("m3", "Tenet", 2020),
            ("m1", "Inception", 2010),
            ("m2", "Memento", 2000),
        ];
        for (id, title, year) in movies {
            let movie = json!({"id": id, "title": title, "year": year, "genre": "thriller"});
            store.insert("Movie", document(movie)).unwrap();
        }
        store
    }

    #[tokio::test]
    async fn get_projects_fields() {
        let store = seeded();
        let mask = FieldMask::new().with("title");
        let found = store.get("Movie", "m1", Some(&mask)).await.unwrap().unwrap();
        assert_eq!(Value::Object(found), json!({"id": "m1", "title": "Inception"}));
        assert!(store.get("Movie", "nope", None).await.unwrap().is_none());
        assert!(store.get("Actor", "m1", None).await.unwrap().is_none());
        assert_eq!(store.stats().gets, 3);
    }

    #[tokio::test]
    async fn find_filters_in_id_order() {
        let store = seeded();
        let all = store
            .find("Movie", &Query::new().filter("genre", "thriller"))
            .await
            .unwrap();
        let ids: Vec<&str> = all.iter().map(|d| d["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["m1", "m2", "m3"]);

        let page = store
            .find("Movie", &Query::new().skip(1).limit(1).fields(FieldMask::new()))
            .await
            .unwrap();
        assert_eq!(page, vec![document(json!({"id": "m2"}))]);

        let none = store
            .find("Movie", &Query::new().filter("year", 1999))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn upsert_writes_only_masked_fields() {
        let store = seeded();
        let mask = FieldMask::new().with("title").with("genre");
        store
            .upsert("Movie", "m1", &mask, document(json!({"title": "Inception (2010)", "year": 1})))
            .await
            .unwrap();
        assert_eq!(
            Value::Object(store.document("Movie", "m1").unwrap()),
            json!({"id": "m1", "title": "Inception (2010)", "year": 2010})
        );

        store
            .upsert(
                "Movie",
                "m9",
                &FieldMask::new().with("title"),
                document(json!({"title": "New"})),
            )
            .await
            .unwrap();
        assert_eq!(store.count("Movie"), 4);
        assert!(store.upsert("Movie", "", &mask, Document::new()).await.is_err());
    }

    #[tokio::test]
    async fn remove_reports_existence() {
        let store = seeded();
        assert!(store.remove("Movie", "m1").await.unwrap());
        assert!(!store.remove("Movie", "m1").await.unwrap());
        assert_eq!(store.count("Movie"), 2);
        assert_eq!(
            store.stats(),
            StoreStats {
                removes: 2,
                ..StoreStats::default()
            }
        );
    }
}
