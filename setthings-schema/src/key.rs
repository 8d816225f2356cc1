//! Dotted key derivation.
//!
//! Two resolvers live here. [`resolve_key`] is used while walking a schema
//! node-first; [`FieldPath`] and [`Selector`] accumulate the same segments
//! from a typed accessor chain. Both must agree for every leaf.

use std::fmt::{self, Debug, Display, Formatter};
use std::marker::PhantomData;

/// Separator between the segments of a dotted key.
pub const KEY_SEPARATOR: char = '.';

/// Derives the flat storage key of a property.
///
/// `segment` is the property's effective name (its rename if one is declared,
/// otherwise its identifier) and `parent` the resolved path of the enclosing
/// node property, if any.
#[must_use]
pub fn resolve_key(segment: &str, parent: Option<&str>) -> String {
    match parent {
        Some(prefix) if !prefix.is_empty() => {
            let mut key = String::with_capacity(prefix.len() + 1 + segment.len());
            key.push_str(prefix);
            key.push(KEY_SEPARATOR);
            key.push_str(segment);
            key
        }
        _ => segment.to_owned(),
    }
}

/// Resolved segments from the schema root to a node or leaf.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<&'static str>,
}

impl FieldPath {
    /// Path of the schema root.
    #[must_use]
    pub const fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Returns a new path one segment deeper.
    #[must_use]
    pub fn join(&self, segment: &'static str) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend_from_slice(&self.segments);
        segments.push(segment);
        Self { segments }
    }

    /// Returns the resolved segments, root first.
    #[must_use]
    pub fn segments(&self) -> &[&'static str] {
        &self.segments
    }

    /// Returns `true` for the root path.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Folds the segments into a dotted key with [`resolve_key`].
    #[must_use]
    pub fn key(&self) -> String {
        self.segments
            .iter()
            .fold(String::new(), |prefix, segment| {
                resolve_key(segment, Some(&prefix))
            })
    }
}

impl Debug for FieldPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FieldPath").field(&self.key()).finish()
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Typed token denoting one leaf property of the schema rooted at `R`, whose
/// value type is `V`.
///
/// Selectors are produced by the accessor types generated by
/// `#[derive(Settings)]`, so only direct field-access chains can be expressed.
pub struct Selector<R, V> {
    path: FieldPath,
    _marker: PhantomData<fn(&R) -> V>,
}

impl<R, V> Selector<R, V> {
    /// Wraps a resolved path.
    #[doc(hidden)]
    #[must_use]
    pub fn new(path: FieldPath) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    /// Returns the resolved path.
    #[must_use]
    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    /// Returns the dotted key of the selected property.
    #[must_use]
    pub fn key(&self) -> String {
        self.path.key()
    }
}

impl<R, V> Clone for Selector<R, V> {
    fn clone(&self) -> Self {
        Self::new(self.path.clone())
    }
}

impl<R, V> Debug for Selector<R, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selector")
            .field("key", &self.key())
            .field("value", &std::any::type_name::<V>())
            .finish()
    }
}
