//! Compiles a schema type into reusable flat-map mapping functions.

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Debug, Formatter};
use std::sync::{Arc, OnceLock, RwLock};

use tracing::debug;

use crate::error::{ConversionError, Error, Result, SchemaError, ValueOrigin};
use crate::key::resolve_key;
use crate::schema::{Property, PropertyKind, ReadFn, SchemaType, Settings, WriteFn};
use crate::value::SettingValue;

/// The flat, single-level representation exchanged with a store.
pub type FlatMap = BTreeMap<String, String>;

/// Public description of one compiled leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafInfo<'a> {
    /// Dotted storage key.
    pub key: &'a str,
    /// Declared default in invariant string form.
    pub default: Option<&'static str>,
    /// Name of the value type.
    pub value_type: &'static str,
}

struct LeafBinding<T> {
    key: String,
    default: Option<&'static str>,
    value_type: &'static str,
    value_type_id: TypeId,
    read: ReadFn<T>,
    write: WriteFn<T>,
}

/// Reader and writer for one schema type, flattened to its leaves.
///
/// Holds no mutable state, so a single instance serves concurrent callers.
pub struct CompiledSchema<T> {
    schema: SchemaType,
    leaves: Vec<LeafBinding<T>>,
    index: HashMap<String, usize>,
    nodes: Vec<String>,
}

impl<T: Settings> CompiledSchema<T> {
    /// Compiles `T`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::DuplicateKey`] when two leaves resolve to the same
    /// key.
    pub fn compile() -> std::result::Result<Self, SchemaError> {
        Self::compile_for(SchemaType::of::<T>())
    }

    /// Compiles `T`, checking that it is the type identified by `requested`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::TypeMismatch`] when `requested` is not `T`, and
    /// [`SchemaError::DuplicateKey`] when two leaves resolve to the same key.
    pub fn compile_for(requested: SchemaType) -> std::result::Result<Self, SchemaError> {
        let schema = SchemaType::of::<T>();
        if requested != schema {
            return Err(SchemaError::TypeMismatch {
                expected: requested.name(),
                actual: schema.name(),
            });
        }

        let mut compiled = Self {
            schema,
            leaves: Vec::new(),
            index: HashMap::new(),
            nodes: Vec::new(),
        };
        compiled.flatten(T::properties(), None)?;

        debug!(
            schema = schema.name(),
            leaves = compiled.leaves.len(),
            nodes = compiled.nodes.len(),
            "compiled settings schema"
        );
        Ok(compiled)
    }

    fn flatten(
        &mut self,
        properties: Vec<Property<T>>,
        prefix: Option<&str>,
    ) -> std::result::Result<(), SchemaError> {
        for property in properties {
            let key = resolve_key(property.segment(), prefix);
            match property.into_kind() {
                PropertyKind::Leaf(leaf) => {
                    if self.index.contains_key(&key) || self.nodes.contains(&key) {
                        return Err(SchemaError::DuplicateKey {
                            key,
                            schema: self.schema.name(),
                        });
                    }
                    let default = leaf.default_value();
                    let value_type = leaf.value_type();
                    let value_type_id = leaf.value_type_id();
                    let (read, write) = leaf.into_bindings();
                    self.index.insert(key.clone(), self.leaves.len());
                    self.leaves.push(LeafBinding {
                        key,
                        default,
                        value_type,
                        value_type_id,
                        read,
                        write,
                    });
                }
                PropertyKind::Node(node) => {
                    if self.index.contains_key(&key) {
                        return Err(SchemaError::DuplicateKey {
                            key,
                            schema: self.schema.name(),
                        });
                    }
                    self.nodes.push(key.clone());
                    self.flatten(node.into_children(), Some(&key))?;
                }
            }
        }
        Ok(())
    }
}

impl<T: Settings> CompiledSchema<T> {
    /// Builds a fully populated instance from a flat map.
    ///
    /// Absent keys fall back to the declared default, or leave the field at
    /// its zero value when there is none. An empty stored value for a leaf
    /// without a declared default also reads as the zero value.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError`] when a stored value or a declared default
    /// cannot be parsed as the property's type.
    pub fn read(&self, raw: &FlatMap) -> std::result::Result<T, ConversionError> {
        let mut settings = T::default();
        for leaf in &self.leaves {
            let (text, origin) = match (raw.get(&leaf.key), leaf.default) {
                (Some(stored), None) if stored.is_empty() => continue,
                (Some(stored), _) => (stored.as_str(), ValueOrigin::Stored),
                (None, Some(default)) => (default, ValueOrigin::Default),
                (None, None) => continue,
            };
            (leaf.read)(&mut settings, text)
                .map_err(|err| ConversionError::new(leaf.key.clone(), origin, err))?;
        }
        Ok(settings)
    }

    /// Flattens every leaf of `settings` into `out`, overwriting existing keys.
    pub fn write(&self, out: &mut FlatMap, settings: &T) {
        for leaf in &self.leaves {
            out.insert(leaf.key.clone(), (leaf.write)(settings));
        }
    }

    /// Flattens `settings` into a new map.
    #[must_use]
    pub fn to_flat_map(&self, settings: &T) -> FlatMap {
        let mut out = FlatMap::new();
        self.write(&mut out, settings);
        out
    }

    /// Validates that `key` denotes a leaf holding values of type `V` and
    /// returns its invariant representation of `value`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSettingExpression`] when `key` is unknown,
    /// denotes a nested node or holds a different value type.
    pub fn format_value<V: SettingValue>(&self, key: &str, value: &V) -> Result<String> {
        let leaf = self.binding(key)?;
        if leaf.value_type_id != TypeId::of::<V>() {
            return Err(Error::invalid_expression(
                key,
                format!(
                    "property holds `{}`, not `{}`",
                    leaf.value_type,
                    std::any::type_name::<V>()
                ),
            ));
        }
        Ok(value.to_setting())
    }

    /// Returns the declared default of the leaf at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSettingExpression`] when `key` is unknown or
    /// denotes a nested node.
    pub fn default_of(&self, key: &str) -> Result<Option<&'static str>> {
        self.binding(key).map(|leaf| leaf.default)
    }

    fn binding(&self, key: &str) -> Result<&LeafBinding<T>> {
        if let Some(&position) = self.index.get(key) {
            return Ok(&self.leaves[position]);
        }
        let reason = if self.nodes.iter().any(|node| node == key) {
            "path denotes a nested settings node, not a property"
        } else {
            "no such property in the schema"
        };
        Err(Error::invalid_expression(key, reason))
    }
}

impl<T> CompiledSchema<T> {
    /// Returns the identity of the compiled type.
    #[must_use]
    pub fn schema(&self) -> SchemaType {
        self.schema
    }

    /// Returns the leaf at `key`, if any.
    #[must_use]
    pub fn leaf(&self, key: &str) -> Option<LeafInfo<'_>> {
        self.index
            .get(key)
            .map(|&position| Self::info(&self.leaves[position]))
    }

    /// Lists the compiled leaves in declaration order.
    pub fn leaves(&self) -> impl Iterator<Item = LeafInfo<'_>> {
        self.leaves.iter().map(Self::info)
    }

    /// Lists the dotted paths of nested nodes in declaration order.
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(String::as_str)
    }

    fn info(leaf: &LeafBinding<T>) -> LeafInfo<'_> {
        LeafInfo {
            key: &leaf.key,
            default: leaf.default,
            value_type: leaf.value_type,
        }
    }
}

impl<T> Debug for CompiledSchema<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let keys: Vec<_> = self.leaves.iter().map(|leaf| leaf.key.as_str()).collect();
        f.debug_struct("CompiledSchema")
            .field("schema", &self.schema.name())
            .field("leaves", &keys)
            .field("nodes", &self.nodes)
            .finish()
    }
}

struct CacheEntry {
    name: &'static str,
    schema: Arc<dyn Any + Send + Sync>,
}

/// Memoizes compiled schemas by type identity.
#[derive(Default)]
pub struct SchemaCache {
    entries: RwLock<HashMap<TypeId, CacheEntry>>,
}

impl Debug for SchemaCache {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self
            .entries
            .read()
            .map(|entries| entries.values().map(|entry| entry.name).collect())
            .unwrap_or_default();
        f.debug_struct("SchemaCache").field("compiled", &names).finish()
    }
}

impl SchemaCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the compiled schema of `T`, compiling it on first use.
    ///
    /// Compilation runs at most once per type: concurrent first callers are
    /// serialized by the cache lock and later callers share the same `Arc`.
    ///
    /// # Errors
    ///
    /// Propagates compilation errors; failures are not cached.
    ///
    /// # Panics
    ///
    /// Panics if the internal cache lock is poisoned.
    pub fn get_or_compile<T: Settings>(
        &self,
    ) -> std::result::Result<Arc<CompiledSchema<T>>, SchemaError> {
        let id = TypeId::of::<T>();
        {
            let entries = self.entries.read().expect("schema cache poisoned");
            if let Some(entry) = entries.get(&id) {
                return Self::downcast::<T>(entry);
            }
        }

        let mut entries = self.entries.write().expect("schema cache poisoned");
        if let Some(entry) = entries.get(&id) {
            return Self::downcast::<T>(entry);
        }

        let compiled = Arc::new(CompiledSchema::<T>::compile()?);
        entries.insert(
            id,
            CacheEntry {
                name: std::any::type_name::<T>(),
                schema: Arc::clone(&compiled) as Arc<dyn Any + Send + Sync>,
            },
        );
        Ok(compiled)
    }

    /// Returns the number of compiled schemas held.
    ///
    /// # Panics
    ///
    /// Panics if the internal cache lock is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().expect("schema cache poisoned").len()
    }

    /// Returns `true` when nothing has been compiled yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn downcast<T: Settings>(
        entry: &CacheEntry,
    ) -> std::result::Result<Arc<CompiledSchema<T>>, SchemaError> {
        Arc::clone(&entry.schema)
            .downcast::<CompiledSchema<T>>()
            .map_err(|_| SchemaError::TypeMismatch {
                expected: std::any::type_name::<T>(),
                actual: entry.name,
            })
    }
}

/// Returns the process-wide compiled schema of `T`.
///
/// # Errors
///
/// Propagates compilation errors from [`SchemaCache::get_or_compile`].
pub fn compiled<T: Settings>() -> std::result::Result<Arc<CompiledSchema<T>>, SchemaError> {
    static CACHE: OnceLock<SchemaCache> = OnceLock::new();
    CACHE.get_or_init(SchemaCache::new).get_or_compile::<T>()
}

/// Returns a reader building `T` from a flat map, backed by the cached schema.
///
/// # Errors
///
/// Propagates compilation errors.
pub fn compile_reader<T: Settings>()
-> std::result::Result<impl Fn(&FlatMap) -> std::result::Result<T, ConversionError>, SchemaError> {
    let schema = compiled::<T>()?;
    Ok(move |raw: &FlatMap| schema.read(raw))
}

/// Returns a writer flattening `T` into a flat map, backed by the cached schema.
///
/// # Errors
///
/// Propagates compilation errors.
pub fn compile_writer<T: Settings>()
-> std::result::Result<impl Fn(&mut FlatMap, &T), SchemaError> {
    let schema = compiled::<T>()?;
    Ok(move |out: &mut FlatMap, settings: &T| schema.write(out, settings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::FieldPath;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Proxy {
        host: String,
        port: u16,
    }

    impl Settings for Proxy {
        type Fields<R: 'static> = FieldPath;

        fn properties() -> Vec<Property<Self>> {
            vec![
                Property::<Self>::leaf::<String>("Host", None, None, |s| &s.host, |s| &mut s.host),
                Property::<Self>::leaf::<u16>(
                    "Port",
                    None,
                    Some("3128"),
                    |s| &s.port,
                    |s| &mut s.port,
                ),
            ]
        }

        fn fields_at<R: 'static>(path: FieldPath) -> Self::Fields<R> {
            path
        }
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Network {
        enabled: bool,
        proxy: Proxy,
    }

    impl Settings for Network {
        type Fields<R: 'static> = FieldPath;

        fn properties() -> Vec<Property<Self>> {
            vec![
                Property::<Self>::leaf::<bool>(
                    "Enabled",
                    None,
                    None,
                    |s| &s.enabled,
                    |s| &mut s.enabled,
                ),
                Property::<Self>::node::<Proxy>(
                    "Proxy",
                    Some("Upstream"),
                    |s| &s.proxy,
                    |s| &mut s.proxy,
                ),
            ]
        }

        fn fields_at<R: 'static>(path: FieldPath) -> Self::Fields<R> {
            path
        }
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Root {
        name: String,
        network: Network,
    }

    impl Settings for Root {
        type Fields<R: 'static> = FieldPath;

        fn properties() -> Vec<Property<Self>> {
            vec![
                Property::<Self>::leaf::<String>(
                    "Name",
                    None,
                    Some("app"),
                    |s| &s.name,
                    |s| &mut s.name,
                ),
                Property::<Self>::node::<Network>(
                    "Network",
                    None,
                    |s| &s.network,
                    |s| &mut s.network,
                ),
            ]
        }

        fn fields_at<R: 'static>(path: FieldPath) -> Self::Fields<R> {
            path
        }
    }

    #[derive(Debug, Default)]
    struct Clashing {
        a: bool,
        b: bool,
    }

    impl Settings for Clashing {
        type Fields<R: 'static> = FieldPath;

        fn properties() -> Vec<Property<Self>> {
            vec![
                Property::<Self>::leaf::<bool>("a", Some("Same"), None, |s| &s.a, |s| &mut s.a),
                Property::<Self>::leaf::<bool>("b", Some("Same"), None, |s| &s.b, |s| &mut s.b),
            ]
        }

        fn fields_at<R: 'static>(path: FieldPath) -> Self::Fields<R> {
            path
        }
    }

    #[derive(Debug, Default)]
    struct BrokenDefault {
        port: u16,
    }

    impl Settings for BrokenDefault {
        type Fields<R: 'static> = FieldPath;

        fn properties() -> Vec<Property<Self>> {
            vec![Property::<Self>::leaf::<u16>(
                "Port",
                None,
                Some("nope"),
                |s| &s.port,
                |s| &mut s.port,
            )]
        }

        fn fields_at<R: 'static>(path: FieldPath) -> Self::Fields<R> {
            path
        }
    }

    fn raw(pairs: &[(&str, &str)]) -> FlatMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn keys_follow_nested_paths_and_renames() {
        let schema = CompiledSchema::<Root>::compile().unwrap();
        let keys: Vec<_> = schema.leaves().map(|leaf| leaf.key).collect();
        assert_eq!(
            keys,
            [
                "Name",
                "Network.Enabled",
                "Network.Upstream.Host",
                "Network.Upstream.Port"
            ]
        );
        let nodes: Vec<_> = schema.nodes().collect();
        assert_eq!(nodes, ["Network", "Network.Upstream"]);
    }

    #[test]
    fn empty_map_yields_defaults_and_zero_values() {
        let schema = CompiledSchema::<Root>::compile().unwrap();
        let settings = schema.read(&FlatMap::new()).unwrap();
        assert_eq!(settings.name, "app");
        assert!(!settings.network.enabled);
        assert_eq!(settings.network.proxy.host, "");
        assert_eq!(settings.network.proxy.port, 3128);
    }

    #[test]
    fn stored_values_override_defaults() {
        let schema = CompiledSchema::<Root>::compile().unwrap();
        let settings = schema
            .read(&raw(&[
                ("Name", "svc"),
                ("Network.Enabled", "true"),
                ("Network.Upstream.Port", "8080"),
                ("Unrelated.Key", "ignored"),
            ]))
            .unwrap();
        assert_eq!(settings.name, "svc");
        assert!(settings.network.enabled);
        assert_eq!(settings.network.proxy.port, 8080);
    }

    #[test]
    fn empty_marker_reads_as_zero_without_default() {
        let schema = CompiledSchema::<Root>::compile().unwrap();
        let settings = schema
            .read(&raw(&[("Network.Enabled", ""), ("Name", "")]))
            .unwrap();
        assert!(!settings.network.enabled);
        // A property with a default keeps an explicitly stored empty string.
        assert_eq!(settings.name, "");

        let err = schema
            .read(&raw(&[("Network.Upstream.Port", "")]))
            .expect_err("empty is not a port");
        assert_eq!(err.key, "Network.Upstream.Port");
    }

    #[test]
    fn malformed_value_is_a_conversion_error() {
        let schema = CompiledSchema::<Root>::compile().unwrap();
        let err = schema
            .read(&raw(&[("Network.Enabled", "notabool")]))
            .expect_err("should fail");
        assert_eq!(err.key, "Network.Enabled");
        assert_eq!(err.origin, ValueOrigin::Stored);
        assert_eq!(err.value(), "notabool");
        assert_eq!(err.type_name(), "bool");
    }

    #[test]
    fn write_then_read_round_trips() {
        let schema = CompiledSchema::<Root>::compile().unwrap();
        let original = Root {
            name: "svc".into(),
            network: Network {
                enabled: true,
                proxy: Proxy {
                    host: "proxy.local".into(),
                    port: 9090,
                },
            },
        };
        let flat = schema.to_flat_map(&original);
        assert_eq!(flat.get("Network.Upstream.Host").map(String::as_str), Some("proxy.local"));
        assert_eq!(schema.read(&flat).unwrap(), original);
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let err = CompiledSchema::<Clashing>::compile().expect_err("keys collide");
        assert!(matches!(err, SchemaError::DuplicateKey { key, .. } if key == "Same"));
    }

    #[test]
    fn mismatched_type_is_rejected() {
        let err = CompiledSchema::<Root>::compile_for(SchemaType::of::<Network>())
            .expect_err("wrong type");
        assert!(matches!(err, SchemaError::TypeMismatch { .. }));
    }

    #[test]
    fn format_value_validates_path_and_type() {
        let schema = CompiledSchema::<Root>::compile().unwrap();
        assert_eq!(schema.format_value("Network.Enabled", &true).unwrap(), "true");
        assert!(matches!(
            schema.format_value("Network.Enabled", &1_u8),
            Err(Error::InvalidSettingExpression { .. })
        ));
        assert!(matches!(
            schema.format_value("Network", &true),
            Err(Error::InvalidSettingExpression { .. })
        ));
        assert!(matches!(
            schema.default_of("Network.Missing"),
            Err(Error::InvalidSettingExpression { .. })
        ));
        assert_eq!(schema.default_of("Network.Upstream.Port").unwrap(), Some("3128"));
    }

    #[test]
    fn cache_compiles_once_per_type() {
        let cache = SchemaCache::new();
        assert!(cache.is_empty());
        let first = cache.get_or_compile::<Root>().unwrap();
        let second = cache.get_or_compile::<Root>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        cache.get_or_compile::<Network>().unwrap();
        assert_eq!(cache.len(), 2);
        assert!(cache.get_or_compile::<Clashing>().is_err());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn concurrent_first_use_shares_one_schema() {
        let cache = Arc::new(SchemaCache::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.get_or_compile::<Proxy>().unwrap())
            })
            .collect();
        let schemas: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(schemas.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn reader_and_writer_closures_use_global_cache() {
        let reader = compile_reader::<Proxy>().unwrap();
        let writer = compile_writer::<Proxy>().unwrap();
        let mut flat = FlatMap::new();
        writer(
            &mut flat,
            &Proxy {
                host: "h".into(),
                port: 1,
            },
        );
        assert_eq!(reader(&flat).unwrap().port, 1);
        assert!(Arc::ptr_eq(&compiled::<Proxy>().unwrap(), &compiled::<Proxy>().unwrap()));
    }

    #[test]
    fn malformed_default_fails_on_first_read() {
        let schema = CompiledSchema::<BrokenDefault>::compile().unwrap();
        let err = schema.read(&FlatMap::new()).expect_err("default is not a u16");
        assert_eq!(err.key, "Port");
        assert_eq!(err.origin, ValueOrigin::Default);
        assert_eq!(err.value(), "nope");

        let settings = schema.read(&raw(&[("Port", "8080")])).unwrap();
        assert_eq!(settings.port, 8080);
    }
}
