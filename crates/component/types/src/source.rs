//! Value provenance

use serde::{Deserialize, Serialize};
use std::fmt;

/// Provenance tag recorded with every attribute write.
///
/// `0` is a local write; the storable layer tags values merged from the
/// store with [`ValueSource::STORE`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValueSource(pub u8);

impl ValueSource {
    pub const LOCAL: ValueSource = ValueSource(0);
    pub const STORE: ValueSource = ValueSource(1);
    pub const REMOTE: ValueSource = ValueSource(2);

    pub fn is_local(&self) -> bool {
        *self == Self::LOCAL
    }
}

impl fmt::Display for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::LOCAL => write!(f, "local"),
            Self::STORE => write!(f, "store"),
            Self::REMOTE => write!(f, "remote"),
            ValueSource(other) => write!(f, "source({})", other),
        }
    }
}
