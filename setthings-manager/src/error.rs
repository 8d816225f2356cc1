//! Errors surfaced by the settings manager.

use setthings_schema::{ConversionError, SchemaError};
use setthings_store::{NotifyError, StoreError};
use thiserror::Error;

/// Result alias for manager operations.
pub type ManagerResult<T> = Result<T, ManagerError>;

/// Errors produced while loading, updating or watching settings.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// Schema compilation, value conversion or field selection failed.
    #[error(transparent)]
    Settings(#[from] setthings_schema::Error),

    /// The store rejected a read or write.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The notifier rejected a publish or subscribe.
    #[error(transparent)]
    Notify(#[from] NotifyError),

    /// Watching requires a manager built with a notifier.
    #[error("settings manager has no change notifier configured")]
    MissingNotifier,

    /// The provided configuration was invalid.
    #[error("invalid manager configuration: {0}")]
    InvalidConfig(&'static str),
}

impl From<SchemaError> for ManagerError {
    fn from(err: SchemaError) -> Self {
        Self::Settings(err.into())
    }
}

impl From<ConversionError> for ManagerError {
    fn from(err: ConversionError) -> Self {
        Self::Settings(err.into())
    }
}

impl ManagerError {
    /// Returns `true` when the error stems from an invalid field selector or
    /// path.
    #[must_use]
    pub fn is_invalid_expression(&self) -> bool {
        matches!(
            self,
            Self::Settings(setthings_schema::Error::InvalidSettingExpression { .. })
        )
    }
}
