//! Component Domain Types
//!
//! This crate defines the plain data shared by the component runtime and the
//! storable layer. Nothing here holds live values or observers.
//!
//! # Key Concepts
//!
//! - **TypeExpr**: the parsed form of a textual value type such as
//!   `"string[]"` or `"Comment?"`. Parsed once at registration time.
//! - **FieldMask**: a set of attribute names, serialized as `{name: true}`.
//!   Used both for partial loads and for the active-field tracker.
//! - **ValueSource**: provenance tag recorded with each attribute write.
//! - **Exposure**: which operations an attribute or method exposes to
//!   introspection.
//! - **Descriptors**: the JSON-compatible schema exchange format.

#![deny(unsafe_code)]

mod descriptor;
mod exposure;
mod field_mask;
mod source;
mod type_expr;
pub mod wire;

pub use descriptor::*;
pub use exposure::*;
pub use field_mask::*;
pub use source::*;
pub use type_expr::*;
