//! Storable Runtime
//!
//! Persistence for components: layers with identity maps, partial loads
//! through field activation, CRUD against a [`StoreDriver`], and lifecycle
//! hooks.
//!
//! # Architecture
//!
//! - [`Layer`] is an identity scope over a store. Within a layer each
//!   `(component type, id)` resolves to exactly one live [`Component`];
//!   [`Layer::fork`] opens a fresh scope over the same store.
//! - [`IdentityMap`] holds those instances and serializes concurrent loads
//!   of one identity with async per-key locks.
//! - [`StorableHooks`] run around saves, deletes and loads, for the
//!   component and every embedded component it holds.
//! - [`StorableConfig`] carries the layer tunables, loadable from TOML.
//!
//! # Key Invariants
//!
//! 1. A component type is storable when it declares an `id` attribute and
//!    is not embedded.
//! 2. Loads are monotonic: a field already active on the layer's instance is
//!    never overwritten by a later load.
//! 3. Saving a new component writes its set storable fields; saving an
//!    existing one writes only its active storable fields.
//! 4. Deleting evicts the instance and leaves it new with no active fields.
//!
//! # Example
//!
//! ```rust
//! use component_runtime::{AttributeSpec, ComponentRegistry, ComponentType};
//! use storable_runtime::{GetOptions, Layer};
//! use storable_store::MemoryStore;
//! use std::sync::Arc;
//!
//! # tokio_test_block(async {
//! let registry = ComponentRegistry::new();
//! registry
//!     .register(
//!         ComponentType::builder("Movie")
//!             .attribute(AttributeSpec::new("id", "string"))
//!             .attribute(AttributeSpec::new("title", "string"))
//!             .build()
//!             .unwrap(),
//!     )
//!     .unwrap();
//!
//! let layer = Layer::new(Arc::new(MemoryStore::new()), registry);
//! let movie = layer.create("Movie").unwrap();
//! movie.set("title", "Inception").unwrap();
//! layer.save(&movie).await.unwrap();
//!
//! let id = movie.id().unwrap().unwrap();
//! let loaded = layer.get("Movie", &id, GetOptions::new()).await.unwrap();
//! assert!(loaded.ptr_eq(&movie));
//! # });
//! # fn tokio_test_block(future: impl std::future::Future<Output = ()>) {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(future)
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod config;
mod errors;
mod hooks;
mod identity_map;
mod layer;

pub use config::StorableConfig;
pub use errors::{StorableError, StorableResult};
pub use hooks::{HookEvent, StorableHooks};
pub use identity_map::{IdentityKey, IdentityMap, KeyGuard};
pub use layer::{DeleteOptions, FindOptions, GetOptions, Layer, LayerFactory};

pub use component_runtime::Component;
pub use storable_store::StoreDriver;
