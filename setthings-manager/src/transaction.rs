//! Staged partial updates committed as one merge write.

use setthings_schema::{FlatMap, Selector, SettingValue, Settings};
use tracing::{debug, trace};

use crate::ManagerResult;
use crate::manager::SettingsManager;

/// Accumulates key updates and writes them in a single merge.
///
/// Consuming `commit` makes a transaction single-use. Dropping it without
/// committing discards every staged update.
#[derive(Debug)]
#[must_use = "staged updates are discarded unless the transaction is committed"]
pub struct UpdateTransaction<'a, T> {
    manager: &'a SettingsManager<T>,
    pending: FlatMap,
}

impl<'a, T: Settings> UpdateTransaction<'a, T> {
    pub(crate) fn new(manager: &'a SettingsManager<T>) -> Self {
        Self {
            manager,
            pending: FlatMap::new(),
        }
    }

    /// Stages `value` for the property picked by `select`.
    ///
    /// ```ignore
    /// tx.set(|f| f.network().careers_host(), "localhost")?;
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an invalid setting expression error when the selected path is
    /// not a leaf of the schema. Nothing is staged on error.
    pub fn set<V, F>(&mut self, select: F, value: impl Into<V>) -> ManagerResult<&mut Self>
    where
        V: SettingValue,
        F: FnOnce(&T::Fields<T>) -> Selector<T, V>,
    {
        let key = select(&T::fields()).key();
        let text = self.manager.schema().format_value(&key, &value.into())?;
        self.stage(key, text);
        Ok(self)
    }

    /// Stages `value` for the property at the dotted `path`.
    ///
    /// # Errors
    ///
    /// Returns an invalid setting expression error when `path` is unknown,
    /// denotes a nested node, or holds a type other than `V`. Nothing is
    /// staged on error.
    pub fn set_path<V: SettingValue>(&mut self, path: &str, value: V) -> ManagerResult<&mut Self> {
        let text = self.manager.schema().format_value(path, &value)?;
        self.stage(path.to_owned(), text);
        Ok(self)
    }

    /// Stages the declared default of the property picked by `select`, or an
    /// empty value that reads back as the zero value when there is none.
    ///
    /// # Errors
    ///
    /// See [`set`](Self::set).
    pub fn reset<V, F>(&mut self, select: F) -> ManagerResult<&mut Self>
    where
        V: SettingValue,
        F: FnOnce(&T::Fields<T>) -> Selector<T, V>,
    {
        let key = select(&T::fields()).key();
        self.stage_default(key)
    }

    /// String-path variant of [`reset`](Self::reset).
    ///
    /// # Errors
    ///
    /// Returns an invalid setting expression error when `path` is unknown or
    /// denotes a nested node.
    pub fn reset_path(&mut self, path: &str) -> ManagerResult<&mut Self> {
        self.stage_default(path.to_owned())
    }

    /// Returns the staged updates.
    #[must_use]
    pub fn pending(&self) -> &FlatMap {
        &self.pending
    }

    /// Returns `true` when nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Writes every staged update in one merge. An empty transaction performs
    /// no write.
    ///
    /// # Errors
    ///
    /// Propagates store and notifier failures.
    pub fn commit(self) -> ManagerResult<()> {
        if self.pending.is_empty() {
            debug!(schema = self.schema_name(), "empty transaction, nothing to commit");
            return Ok(());
        }
        self.manager.write(&self.pending, true)
    }

    /// Asynchronous equivalent of [`commit`](Self::commit).
    ///
    /// # Errors
    ///
    /// Propagates store and notifier failures.
    pub async fn commit_async(self) -> ManagerResult<()> {
        if self.pending.is_empty() {
            debug!(schema = self.schema_name(), "empty transaction, nothing to commit");
            return Ok(());
        }
        self.manager.write_async(&self.pending, true).await
    }

    fn stage_default(&mut self, key: String) -> ManagerResult<&mut Self> {
        let default = self.manager.schema().default_of(&key)?;
        self.stage(key, default.unwrap_or_default().to_owned());
        Ok(self)
    }

    fn stage(&mut self, key: String, text: String) {
        trace!(key = %key, value = %text, "staged setting");
        if let Some(previous) = self.pending.insert(key.clone(), text) {
            debug!(
                key = %key,
                previous = %previous,
                "replaced a value staged earlier in the transaction"
            );
        }
    }

    fn schema_name(&self) -> &'static str {
        self.manager.schema().schema().name()
    }
}
