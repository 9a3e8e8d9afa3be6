//! Marker keys of the serialized component wire format
//!
//! ```text
//! {"__component": "Movie", "__new": true, "title": "Inception"}
//! {"__Component": "Movie", "limit": 10}
//! {"__undefined": true}
//! {"__date": "2010-07-16T00:00:00Z"}
//! ```

/// Instance marker, value is the component type name
pub const COMPONENT: &str = "__component";

/// Class (type-level) marker, value is the component type name
pub const COMPONENT_TYPE: &str = "__Component";

/// Present and `true` for instances not yet saved
pub const NEW: &str = "__new";

/// Explicit undefined value, distinct from an omitted field
pub const UNDEFINED: &str = "__undefined";

/// RFC 3339 timestamp
pub const DATE: &str = "__date";

/// Identifier attribute name used for references and storage keys
pub const IDENTIFIER: &str = "id";

/// True for keys reserved by the wire format
pub fn is_marker(key: &str) -> bool {
    matches!(key, COMPONENT | COMPONENT_TYPE | NEW | UNDEFINED | DATE)
}
