//! Error types for the component runtime

use crate::validator::ValidationFailure;
use component_types::TypeExprError;

/// Errors that can occur in component operations
#[derive(Debug, thiserror::Error)]
pub enum ComponentError {
    /// Invalid schema declaration (getter/setter/default/value combinations,
    /// malformed value types, duplicate names)
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(
        "cannot assign a value of type `{received}` to the attribute `{attribute}` \
         that has type `{expected}`"
    )]
    TypeMismatch {
        attribute: String,
        expected: String,
        received: String,
    },

    #[error("cannot get the value of an unset attribute (attribute: `{attribute}`)")]
    UnsetValue { attribute: String },

    #[error("cannot run the validators of an unset attribute (attribute: `{attribute}`)")]
    RunOnUnset { attribute: String },

    #[error("cannot change the value of a controlled attribute (attribute: `{attribute}`)")]
    ControlledAttribute { attribute: String },

    #[error("{}", describe_failures("attribute", .attribute, .failures))]
    Validation {
        attribute: String,
        failures: Vec<ValidationFailure>,
    },

    #[error("{}", describe_failures("component", .component, .failures))]
    ComponentValidation {
        component: String,
        failures: Vec<ValidationFailure>,
    },

    #[error("unknown component: {0}")]
    UnknownComponent(String),

    #[error("attribute `{attribute}` not found in component `{component}`")]
    UnknownAttribute { component: String, attribute: String },

    /// The owner of an attribute was dropped while the attribute was still in use
    #[error("attribute `{0}` is detached from its owner")]
    DetachedAttribute(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for component operations
pub type ComponentResult<T> = Result<T, ComponentError>;

impl From<TypeExprError> for ComponentError {
    fn from(err: TypeExprError) -> Self {
        ComponentError::Configuration(err.to_string())
    }
}

fn describe_failures(subject: &str, name: &str, failures: &[ValidationFailure]) -> String {
    let mut message = format!(
        "The following error(s) occurred while validating the {} '{}':",
        subject, name
    );
    for failure in failures {
        message.push_str("\n  ");
        message.push_str(&failure.to_string());
    }
    message
}
