//! Property exposure

use serde::{Deserialize, Serialize};

/// Operations a property exposes to introspection and remote callers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Exposure {
    #[serde(default, skip_serializing_if = "is_false")]
    pub get: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub set: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub call: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Exposure {
    pub fn read_only() -> Self {
        Self {
            get: true,
            ..Self::default()
        }
    }

    pub fn read_write() -> Self {
        Self {
            get: true,
            set: true,
            ..Self::default()
        }
    }

    pub fn callable() -> Self {
        Self {
            call: true,
            ..Self::default()
        }
    }

    pub fn is_gettable(&self) -> bool {
        self.get
    }

    pub fn is_settable(&self) -> bool {
        self.set
    }

    pub fn is_callable(&self) -> bool {
        self.call
    }
}
