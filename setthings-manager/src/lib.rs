//! Settings manager façade.
//!
//! [`SettingsManager`] binds a schema type to a [`SettingsStore`]: it loads
//! fully populated instances, stages partial updates through
//! [`UpdateTransaction`] and replaces the namespace with [`save`]. When a
//! [`ChangeNotifier`] is configured, every successful write publishes a change
//! signal that a [`SettingsWatcher`] turns into reloaded settings.
//!
//! [`save`]: SettingsManager::save
//! [`SettingsStore`]: setthings_store::SettingsStore
//! [`ChangeNotifier`]: setthings_store::ChangeNotifier

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod manager;
mod transaction;
mod watch;

#[cfg(test)]
mod fixtures;

pub use error::{ManagerError, ManagerResult};
pub use manager::{SettingsManager, SettingsManagerBuilder, channel_name};
pub use transaction::UpdateTransaction;
pub use watch::{SettingsEvent, SettingsWatcher, WatchConfig};
