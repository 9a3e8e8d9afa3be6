//! Component Runtime
//!
//! Reactive, type-checked attributes for structured entities ("components").
//!
//! # Architecture
//!
//! - [`ComponentType`] is the schema: instance and class attribute templates
//!   plus methods, built once with [`ComponentType::builder`] and registered
//!   by name in a [`ComponentRegistry`].
//! - [`Component`] is a live instance. It materializes one [`Attribute`] per
//!   template and is the aggregation point for change notifications.
//! - [`Attribute`] holds a [`Value`], checks it against its [`ValueType`] on
//!   every write, evaluates defaults lazily, and runs [`Validator`]s on demand.
//! - [`ArrayValue`] is observable and copy-on-write, so in-place mutations
//!   notify the holding attribute and forks share storage until written.
//!
//! # Key Invariants
//!
//! 1. Assigning a structurally equal value is a no-op (no notification, no
//!    provenance change) unless forced.
//! 2. Type mismatches fail at assignment time; business-rule validators only
//!    run when asked.
//! 3. Only embedded components notify their holder; referenced components
//!    never cross-notify.
//! 4. A fork never observes writes made to its base after it materialized an
//!    attribute, and the base never observes the fork's writes.
//!
//! # Example
//!
//! ```rust
//! use component_runtime::{AttributeSpec, ComponentType, Validator, Value};
//!
//! let movie_type = ComponentType::builder("Movie")
//!     .attribute(AttributeSpec::new("title", "string").validator(Validator::not_empty()))
//!     .attribute(AttributeSpec::new("tags", "string[]").default(Vec::<Value>::new()))
//!     .build()
//!     .unwrap();
//!
//! let movie = movie_type.instantiate();
//! movie.set("title", "Inception").unwrap();
//! assert!(movie.set("title", 42).is_err());
//! assert!(movie.is_valid());
//! ```

#![deny(unsafe_code)]

mod accessor;
mod activation;
mod attribute;
mod component;
mod component_type;
mod errors;
mod introspection;
mod observer;
pub mod serialization;
mod spec;
mod validator;
mod value;
mod value_type;

pub use accessor::{DefaultValue, FnAccessor, GetterFn, SetterFn, ValueAccessor};
pub use attribute::{Attribute, GetValueOptions, SetValueOptions};
pub use component::Component;
pub use component_type::{ComponentRegistry, ComponentType, ComponentTypeBuilder};
pub use errors::{ComponentError, ComponentResult};
pub use observer::{Observer, ObserverId};
pub use serialization::{
    deserialize, deserialize_into, serialize, ComponentFactory, DefaultComponentFactory,
    DeserializeOptions, PropertyFilter, SerializeOptions,
};
pub use spec::{AttributeSpec, AttributeTemplate, ItemsSpec, MethodSpec};
pub use validator::{ValidationFailure, Validator, ValidatorFn, ValidatorRegistry};
pub use value::{ArrayValue, Value};
pub use value_type::{ValueKind, ValueType};
