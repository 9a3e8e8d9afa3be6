//! Store driver contract for storable components.
//!
//! The storable layer talks to persistence only through [`StoreDriver`]:
//! - `get` one document by id
//! - `find` documents with a flat equality filter, skip and limit
//! - `upsert` the fields named by a mask
//! - `remove` a document by id
//!
//! Documents are plain JSON objects keyed by attribute name, with the
//! identifier stored under `"id"`. [`MemoryStore`] is a deterministic
//! in-process driver used by tests and examples.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

mod error;
pub mod memory;
mod model;
mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use model::{project, Document, Query, StoreStats};
pub use traits::StoreDriver;
