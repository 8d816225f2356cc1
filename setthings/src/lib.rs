//! Typed, hierarchical settings over flat key/value stores.
//!
//! Declare a settings type with `#[derive(Settings)]`, hand a store to a
//! [`SettingsManager`](manager::SettingsManager) and load or update it:
//!
//! ```ignore
//! use setthings::Settings;
//!
//! #[derive(Debug, Default, Settings)]
//! #[settings(rename_all = "PascalCase")]
//! struct Network {
//!     #[setting(default = "careers.stackoverflow.com")]
//!     careers_host: String,
//! }
//! ```
//!
//! The component crates sit behind feature flags so a store implementation
//! can depend on `store` alone.

#![warn(missing_docs, clippy::pedantic)]

/// Schema engine: description, key derivation, conversion and compilation.
pub use setthings_schema as schema;

pub use setthings_schema::{FlatMap, SettingValue, Settings, setting_value_from_str};

/// Derives [`Settings`] (enabled by `derive` feature).
#[cfg(feature = "derive")]
pub use setthings_macros::Settings;

/// Store and notification contracts with reference backends (enabled by
/// `store` feature).
#[cfg(feature = "store")]
pub use setthings_store as store;

/// Settings manager, transactions and watcher (enabled by `manager` feature).
#[cfg(feature = "manager")]
pub use setthings_manager as manager;
