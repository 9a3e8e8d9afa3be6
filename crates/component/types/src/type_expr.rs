//! Textual value type expressions
//!
//! Grammar (right to left): a trailing `?` marks the type optional, a trailing
//! `[]` makes it an array of whatever precedes it. So `"number?[]?"` is an
//! optional array of optional numbers.

use std::fmt;
use std::str::FromStr;

/// Errors produced while parsing a value type expression
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeExprError {
    #[error("value type expression is empty")]
    Empty,

    #[error("invalid value type expression: '{0}'")]
    Invalid(String),
}

/// Scalar value kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Boolean,
    Number,
    String,
    Object,
    Date,
}

impl ScalarKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarKind::Boolean => "boolean",
            ScalarKind::Number => "number",
            ScalarKind::String => "string",
            ScalarKind::Object => "object",
            ScalarKind::Date => "Date",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "boolean" => Some(ScalarKind::Boolean),
            "number" => Some(ScalarKind::Number),
            "string" => Some(ScalarKind::String),
            "object" => Some(ScalarKind::Object),
            "Date" => Some(ScalarKind::Date),
            _ => None,
        }
    }
}

/// Shape of one level of a value type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Any,
    Scalar(ScalarKind),
    /// Reference to a component type by name
    Component(String),
    Array(Box<TypeExpr>),
}

/// Parsed value type. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeExpr {
    pub kind: TypeKind,
    pub optional: bool,
}

impl TypeExpr {
    pub fn new(kind: TypeKind) -> Self {
        Self {
            kind,
            optional: false,
        }
    }

    pub fn scalar(kind: ScalarKind) -> Self {
        Self::new(TypeKind::Scalar(kind))
    }

    pub fn component(name: impl Into<String>) -> Self {
        Self::new(TypeKind::Component(name.into()))
    }

    pub fn array_of(item: TypeExpr) -> Self {
        Self::new(TypeKind::Array(Box::new(item)))
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn parse(text: &str) -> Result<Self, TypeExprError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TypeExprError::Empty);
        }
        parse_expr(text).ok_or_else(|| TypeExprError::Invalid(text.to_string()))
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, TypeKind::Array(_))
    }

    /// Item type when this is an array
    pub fn item(&self) -> Option<&TypeExpr> {
        match &self.kind {
            TypeKind::Array(item) => Some(item),
            _ => None,
        }
    }

    /// Component type names referenced anywhere in this expression
    pub fn component_names(&self) -> Vec<&str> {
        match &self.kind {
            TypeKind::Component(name) => vec![name.as_str()],
            TypeKind::Array(item) => item.component_names(),
            _ => Vec::new(),
        }
    }
}

fn parse_expr(text: &str) -> Option<TypeExpr> {
    let (body, optional) = match text.strip_suffix('?') {
        Some(rest) => (rest, true),
        None => (text, false),
    };

    let kind = if let Some(item) = body.strip_suffix("[]") {
        if item.is_empty() {
            return None;
        }
        TypeKind::Array(Box::new(parse_expr(item)?))
    } else if body == "any" {
        TypeKind::Any
    } else if let Some(scalar) = ScalarKind::from_name(body) {
        TypeKind::Scalar(scalar)
    } else if is_component_name(body) {
        TypeKind::Component(body.to_string())
    } else {
        return None;
    };

    Some(TypeExpr { kind, optional })
}

/// Component names start with an uppercase ASCII letter followed by
/// alphanumerics or underscores.
pub fn is_component_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_uppercase() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

impl FromStr for TypeExpr {
    type Err = TypeExprError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TypeKind::Any => write!(f, "any")?,
            TypeKind::Scalar(kind) => write!(f, "{}", kind.as_str())?,
            TypeKind::Component(name) => write!(f, "{}", name)?,
            TypeKind::Array(item) => write!(f, "{}[]", item)?,
        }
        if self.optional {
            write!(f, "?")?;
        }
        Ok(())
    }
}
