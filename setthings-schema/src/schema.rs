//! Schema description consumed by the compiler.
//!
//! A schema type lists its properties through [`Settings::properties`]. The
//! derive macro in `setthings-macros` writes that list; it can also be written
//! by hand as a parallel metadata table next to the type.

use std::any::TypeId;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use crate::error::ValueError;
use crate::key::FieldPath;
use crate::value::SettingValue;

/// Parses text into the leaf it is bound to, writing through the root value.
pub type ReadFn<T> = Arc<dyn Fn(&mut T, &str) -> Result<(), ValueError> + Send + Sync>;

/// Formats the leaf it is bound to, reading through the root value.
pub type WriteFn<T> = Arc<dyn Fn(&T) -> String + Send + Sync>;

/// A configuration node type.
///
/// `Default` stands in for the default constructor: readers start from
/// `Self::default()` and nested nodes are always instantiated.
pub trait Settings: Default + Send + Sync + 'static {
    /// Accessor type producing [`Selector`](crate::Selector)s for the fields of
    /// this node, for a schema rooted at `R`.
    type Fields<R: 'static>;

    /// Declared properties, in declaration order.
    fn properties() -> Vec<Property<Self>>;

    /// Builds the accessor for this node positioned at `path`.
    fn fields_at<R: 'static>(path: FieldPath) -> Self::Fields<R>;

    /// Builds the accessor for this type used as the schema root.
    #[must_use]
    fn fields() -> Self::Fields<Self> {
        Self::fields_at(FieldPath::root())
    }
}

/// Identity of a schema type, used by the compiler's self-check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchemaType {
    id: TypeId,
    name: &'static str,
}

impl SchemaType {
    /// Returns the identity of `T`.
    #[must_use]
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Returns the `TypeId` of the type.
    #[must_use]
    pub const fn id(self) -> TypeId {
        self.id
    }

    /// Returns the fully-qualified type name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.name
    }
}

/// One declared property of a node type `T`.
pub struct Property<T> {
    ident: &'static str,
    rename: Option<&'static str>,
    kind: PropertyKind<T>,
}

/// Whether a property is converted directly or expanded recursively.
pub enum PropertyKind<T> {
    /// Scalar property converted through [`SettingValue`].
    Leaf(Leaf<T>),
    /// Nested configuration node; children are already bound to `T`.
    Node(Node<T>),
}

/// Conversion bindings of a leaf property.
pub struct Leaf<T> {
    default: Option<&'static str>,
    value_type: &'static str,
    value_type_id: TypeId,
    read: ReadFn<T>,
    write: WriteFn<T>,
}

/// Children of a nested node property.
pub struct Node<T> {
    schema: &'static str,
    children: Vec<Property<T>>,
}

impl<T: 'static> Property<T> {
    /// Declares a leaf property of type `V`.
    ///
    /// `ident` is the property identifier, `rename` an explicit name override
    /// and `default` the declared default in invariant string form.
    #[must_use]
    pub fn leaf<V: SettingValue>(
        ident: &'static str,
        rename: Option<&'static str>,
        default: Option<&'static str>,
        get: fn(&T) -> &V,
        get_mut: fn(&mut T) -> &mut V,
    ) -> Self {
        let read: ReadFn<T> =
            Arc::new(move |target: &mut T, text: &str| -> Result<(), ValueError> {
                *get_mut(target) = V::from_setting(text)?;
                Ok(())
            });
        let write: WriteFn<T> = Arc::new(move |source: &T| get(source).to_setting());

        Self {
            ident,
            rename,
            kind: PropertyKind::Leaf(Leaf {
                default,
                value_type: std::any::type_name::<V>(),
                value_type_id: TypeId::of::<V>(),
                read,
                write,
            }),
        }
    }

    /// Declares a nested node property of type `C`.
    #[must_use]
    pub fn node<C: Settings>(
        ident: &'static str,
        rename: Option<&'static str>,
        get: fn(&T) -> &C,
        get_mut: fn(&mut T) -> &mut C,
    ) -> Self {
        let children = C::properties()
            .into_iter()
            .map(|child| child.lift(get, get_mut))
            .collect();

        Self {
            ident,
            rename,
            kind: PropertyKind::Node(Node {
                schema: std::any::type_name::<C>(),
                children,
            }),
        }
    }

    /// Rebinds this property from its own node `T` to an enclosing node `P`.
    fn lift<P: 'static>(self, get: fn(&P) -> &T, get_mut: fn(&mut P) -> &mut T) -> Property<P> {
        let kind = match self.kind {
            PropertyKind::Leaf(leaf) => {
                let Leaf {
                    default,
                    value_type,
                    value_type_id,
                    read,
                    write,
                } = leaf;
                let read: ReadFn<P> =
                    Arc::new(move |parent: &mut P, text: &str| read(get_mut(parent), text));
                let write: WriteFn<P> = Arc::new(move |parent: &P| write(get(parent)));
                PropertyKind::Leaf(Leaf {
                    default,
                    value_type,
                    value_type_id,
                    read,
                    write,
                })
            }
            PropertyKind::Node(node) => PropertyKind::Node(Node {
                schema: node.schema,
                children: node
                    .children
                    .into_iter()
                    .map(|child| child.lift(get, get_mut))
                    .collect(),
            }),
        };

        Property {
            ident: self.ident,
            rename: self.rename,
            kind,
        }
    }
}

impl<T> Property<T> {
    /// Returns the property identifier.
    #[must_use]
    pub fn ident(&self) -> &'static str {
        self.ident
    }

    /// Returns the explicit name override, if declared.
    #[must_use]
    pub fn rename(&self) -> Option<&'static str> {
        self.rename
    }

    /// Returns the name used as this property's key segment.
    #[must_use]
    pub fn segment(&self) -> &'static str {
        self.rename.unwrap_or(self.ident)
    }

    /// Returns the property kind.
    #[must_use]
    pub fn kind(&self) -> &PropertyKind<T> {
        &self.kind
    }

    pub(crate) fn into_kind(self) -> PropertyKind<T> {
        self.kind
    }
}

impl<T> Leaf<T> {
    /// Returns the declared default, if any.
    #[must_use]
    pub fn default_value(&self) -> Option<&'static str> {
        self.default
    }

    /// Returns the name of the value type.
    #[must_use]
    pub fn value_type(&self) -> &'static str {
        self.value_type
    }

    pub(crate) fn value_type_id(&self) -> TypeId {
        self.value_type_id
    }

    pub(crate) fn into_bindings(self) -> (ReadFn<T>, WriteFn<T>) {
        (self.read, self.write)
    }
}

impl<T> Node<T> {
    /// Returns the type name of the nested node.
    #[must_use]
    pub fn schema(&self) -> &'static str {
        self.schema
    }

    /// Returns the nested properties.
    #[must_use]
    pub fn children(&self) -> &[Property<T>] {
        &self.children
    }

    pub(crate) fn into_children(self) -> Vec<Property<T>> {
        self.children
    }
}

impl<T> Debug for Property<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("Property");
        out.field("ident", &self.ident).field("rename", &self.rename);
        match &self.kind {
            PropertyKind::Leaf(leaf) => out
                .field("value_type", &leaf.value_type)
                .field("default", &leaf.default),
            PropertyKind::Node(node) => out
                .field("schema", &node.schema)
                .field("children", &node.children),
        };
        out.finish()
    }
}
