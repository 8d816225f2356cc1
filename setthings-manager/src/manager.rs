//! Façade binding a schema type to a store and an optional notifier.

use std::fmt::{self, Debug, Formatter};
use std::marker::PhantomData;
use std::sync::Arc;

use setthings_schema::{CompiledSchema, FlatMap, Settings, compiled};
use setthings_store::{ChangeNotifier, SettingsStore};
use tracing::debug;

use crate::ManagerResult;
use crate::transaction::UpdateTransaction;

/// Returns the notification channel used for the schema type `T`.
#[must_use]
pub fn channel_name<T: 'static>() -> String {
    format!("SETTINGS-{}-UPDATED", std::any::type_name::<T>())
}

/// Builder for [`SettingsManager`] instances.
pub struct SettingsManagerBuilder<T> {
    store: Arc<dyn SettingsStore>,
    notifier: Option<Arc<dyn ChangeNotifier>>,
    _schema: PhantomData<fn() -> T>,
}

impl<T: Settings> SettingsManagerBuilder<T> {
    /// Starts a builder over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self {
            store,
            notifier: None,
            _schema: PhantomData,
        }
    }

    /// Installs a notifier; every successful write then publishes a change
    /// signal on the manager's channel.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn ChangeNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Builds the manager, compiling the schema of `T` on first use.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Settings`](crate::ManagerError::Settings) when
    /// the schema cannot be compiled.
    pub fn build(self) -> ManagerResult<SettingsManager<T>> {
        let schema = compiled::<T>()?;
        let channel = channel_name::<T>();
        debug!(
            schema = schema.schema().name(),
            channel = %channel,
            notifier = self.notifier.is_some(),
            "settings manager ready"
        );
        Ok(SettingsManager {
            schema,
            store: self.store,
            notifier: self.notifier,
            channel,
        })
    }
}

/// Loads and updates settings of type `T` held in a flat key/value store.
pub struct SettingsManager<T> {
    schema: Arc<CompiledSchema<T>>,
    store: Arc<dyn SettingsStore>,
    notifier: Option<Arc<dyn ChangeNotifier>>,
    channel: String,
}

impl<T: Settings> SettingsManager<T> {
    /// Creates a manager over `store` without change notification.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Settings`](crate::ManagerError::Settings) when
    /// the schema cannot be compiled.
    pub fn new(store: Arc<dyn SettingsStore>) -> ManagerResult<Self> {
        Self::builder(store).build()
    }

    /// Creates a builder for a manager over `store`.
    #[must_use]
    pub fn builder(store: Arc<dyn SettingsStore>) -> SettingsManagerBuilder<T> {
        SettingsManagerBuilder::new(store)
    }

    /// Reads the whole namespace and builds a settings instance.
    ///
    /// # Errors
    ///
    /// Returns a store error when the read fails, or a conversion error when a
    /// stored value or declared default cannot be parsed.
    pub fn load(&self) -> ManagerResult<T> {
        let raw = self.store.read_all()?;
        self.materialize(&raw)
    }

    /// Asynchronous equivalent of [`load`](Self::load).
    ///
    /// # Errors
    ///
    /// See [`load`](Self::load).
    pub async fn load_async(&self) -> ManagerResult<T> {
        let raw = self.store.read_all_async().await?;
        self.materialize(&raw)
    }

    /// Starts a transaction staging updates against this manager's store.
    #[must_use]
    pub fn begin_update(&self) -> UpdateTransaction<'_, T> {
        UpdateTransaction::new(self)
    }

    /// Replaces the whole namespace with the flattened form of `settings`.
    ///
    /// # Errors
    ///
    /// Returns a store error when the write fails, or a notifier error when
    /// the change signal cannot be published.
    pub fn save(&self, settings: &T) -> ManagerResult<()> {
        let flat = self.schema.to_flat_map(settings);
        self.write(&flat, false)
    }

    /// Asynchronous equivalent of [`save`](Self::save).
    ///
    /// # Errors
    ///
    /// See [`save`](Self::save).
    pub async fn save_async(&self, settings: &T) -> ManagerResult<()> {
        let flat = self.schema.to_flat_map(settings);
        self.write_async(&flat, false).await
    }

    pub(crate) fn write(&self, updates: &FlatMap, merge: bool) -> ManagerResult<()> {
        self.store.write_all(updates, merge)?;
        self.written(updates, merge)
    }

    pub(crate) async fn write_async(&self, updates: &FlatMap, merge: bool) -> ManagerResult<()> {
        self.store.write_all_async(updates, merge).await?;
        self.written(updates, merge)
    }

    fn materialize(&self, raw: &FlatMap) -> ManagerResult<T> {
        let settings = self.schema.read(raw)?;
        debug!(
            schema = self.schema.schema().name(),
            stored = raw.len(),
            "loaded settings"
        );
        Ok(settings)
    }

    fn written(&self, updates: &FlatMap, merge: bool) -> ManagerResult<()> {
        debug!(
            schema = self.schema.schema().name(),
            keys = updates.len(),
            merge,
            "wrote settings"
        );
        if let Some(notifier) = &self.notifier {
            notifier.publish(&self.channel)?;
        }
        Ok(())
    }
}

impl<T> SettingsManager<T> {
    /// Returns the compiled schema shared by every manager of `T`.
    #[must_use]
    pub fn schema(&self) -> &Arc<CompiledSchema<T>> {
        &self.schema
    }

    /// Returns the backing store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn SettingsStore> {
        &self.store
    }

    /// Returns the configured notifier, if any.
    #[must_use]
    pub fn notifier(&self) -> Option<&Arc<dyn ChangeNotifier>> {
        self.notifier.as_ref()
    }

    /// Returns the name of the channel change signals are published on.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }
}

impl<T> Debug for SettingsManager<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsManager")
            .field("schema", &self.schema.schema().name())
            .field("channel", &self.channel)
            .field("notifier", &self.notifier.is_some())
            .finish_non_exhaustive()
    }
}
