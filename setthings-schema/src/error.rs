//! Error taxonomy shared by the schema engine.

use std::fmt::{self, Display, Formatter};

use thiserror::Error;

/// Result alias used throughout the schema engine.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by schema compilation, value conversion and field selection.
#[derive(Debug, Error)]
pub enum Error {
    /// The schema could not be compiled.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A stored or declared-default value could not be converted.
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// A field selector or path does not denote a leaf property of the schema.
    #[error("invalid setting expression `{path}`: {reason}")]
    InvalidSettingExpression {
        /// The dotted path that was supplied.
        path: String,
        /// Human-readable reason for rejection.
        reason: String,
    },
}

impl Error {
    /// Creates an [`Error::InvalidSettingExpression`].
    #[must_use]
    pub fn invalid_expression(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSettingExpression {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while compiling a schema type into its mapping functions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// The type handed to the compiler is not the type it was asked to compile.
    #[error("type mismatch: `{expected}` != `{actual}`")]
    TypeMismatch {
        /// The generic schema type requested by the caller.
        expected: &'static str,
        /// The type actually being compiled or found in the cache.
        actual: &'static str,
    },

    /// Two leaf properties resolved to the same dotted key.
    #[error("duplicate setting key `{key}` in schema `{schema}`")]
    DuplicateKey {
        /// The colliding key.
        key: String,
        /// Type name of the schema root.
        schema: &'static str,
    },
}

/// Where a value that failed conversion came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueOrigin {
    /// The value was read from the flat map.
    Stored,
    /// The value is the property's declared default.
    Default,
}

impl Display for ValueOrigin {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Stored => "stored",
            Self::Default => "default",
        };
        f.write_str(label)
    }
}

/// Raw failure produced by a [`SettingValue`](crate::SettingValue) parser.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("cannot parse {value:?} as `{type_name}`: {reason}")]
pub struct ValueError {
    /// The text that failed to parse.
    pub value: String,
    /// Target type name.
    pub type_name: &'static str,
    /// Parser message.
    pub reason: String,
}

impl ValueError {
    /// Creates a parse failure for the target type `V`.
    #[must_use]
    pub fn new<V: ?Sized>(value: &str, reason: impl Display) -> Self {
        Self {
            value: value.to_owned(),
            type_name: std::any::type_name::<V>(),
            reason: reason.to_string(),
        }
    }
}

/// A value bound to a settings key could not be converted to its declared type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{origin} value for `{key}` is invalid: {source}")]
pub struct ConversionError {
    /// Dotted key of the offending property.
    pub key: String,
    /// Where the value came from.
    pub origin: ValueOrigin,
    /// Underlying parse failure.
    #[source]
    pub source: ValueError,
}

impl ConversionError {
    /// Attaches key and origin information to a raw parse failure.
    #[must_use]
    pub fn new(key: impl Into<String>, origin: ValueOrigin, source: ValueError) -> Self {
        Self {
            key: key.into(),
            origin,
            source,
        }
    }

    /// Returns the raw text that failed to parse.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.source.value
    }

    /// Returns the declared type of the property.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.source.type_name
    }
}
