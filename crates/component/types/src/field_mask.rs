//! Field masks: sets of attribute names
//!
//! On the wire a mask is an object mapping each attribute name to `true`
//! (`{"title": true, "year": true}`). Entries mapped to `false` are dropped
//! when deserializing.

use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Set of attribute names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMask {
    fields: BTreeSet<String>,
}

impl FieldMask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>) -> Self {
        self.insert(field);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>) -> bool {
        self.fields.insert(field.into())
    }

    pub fn remove(&mut self, field: &str) -> bool {
        self.fields.remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains(field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Names in lexical order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }

    pub fn union(&self, other: &FieldMask) -> FieldMask {
        Self {
            fields: self.fields.union(&other.fields).cloned().collect(),
        }
    }

    pub fn intersection(&self, other: &FieldMask) -> FieldMask {
        Self {
            fields: self.fields.intersection(&other.fields).cloned().collect(),
        }
    }

    /// Names in `self` that are not in `other`
    pub fn difference(&self, other: &FieldMask) -> FieldMask {
        Self {
            fields: self.fields.difference(&other.fields).cloned().collect(),
        }
    }

    pub fn is_subset(&self, other: &FieldMask) -> bool {
        self.fields.is_subset(&other.fields)
    }
}

impl<S: Into<String>> FromIterator<S> for FieldMask {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl<S: Into<String>> Extend<S> for FieldMask {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        self.fields.extend(iter.into_iter().map(Into::into));
    }
}

impl Serialize for FieldMask {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for field in &self.fields {
            map.serialize_entry(field, &true)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FieldMask {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, bool>::deserialize(deserializer)?;
        Ok(raw
            .into_iter()
            .filter_map(|(name, included)| included.then_some(name))
            .collect())
    }
}
