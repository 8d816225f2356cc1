//! Schema-mapping engine for flat key/value settings.
//!
//! Schema types describe themselves through [`Settings`]; the compiler turns
//! that description into a [`CompiledSchema`] that reads a [`FlatMap`] into a
//! typed instance and flattens an instance back into dotted keys.

#![warn(missing_docs, clippy::pedantic)]

mod compile;
mod error;
mod key;
mod schema;
mod value;

/// Compiled mapping functions and their process-wide cache.
pub use compile::{
    CompiledSchema, FlatMap, LeafInfo, SchemaCache, compile_reader, compile_writer, compiled,
};
/// Error taxonomy and result alias.
pub use error::{ConversionError, Error, Result, SchemaError, ValueError, ValueOrigin};
/// Dotted key derivation and typed field selectors.
pub use key::{FieldPath, KEY_SEPARATOR, Selector, resolve_key};
/// Schema description types.
pub use schema::{Leaf, Node, Property, PropertyKind, ReadFn, SchemaType, Settings, WriteFn};
/// Scalar value conversion.
pub use value::SettingValue;
