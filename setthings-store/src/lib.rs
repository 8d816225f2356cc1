//! Storage and change notification for setthings.
//!
//! A [`SettingsStore`] persists the flat key/value map of one configuration
//! namespace. A [`ChangeNotifier`] lets writers tell other observers that the
//! namespace changed. Reference implementations for both are included:
//! [`MemoryStore`], [`FileStore`] and [`LocalNotifier`].

#![warn(missing_docs, clippy::pedantic)]

mod error;
pub mod file;
pub mod memory;
pub mod notify;
pub mod store;

pub use error::{NotifyError, NotifyResult, StoreError, StoreResult};
pub use file::{FileStore, FileStoreConfig};
pub use memory::MemoryStore;
pub use notify::{ChangeNotifier, ChangeSignal, LocalNotifier, NotifierConfig};
pub use setthings_schema::FlatMap;
pub use store::{SettingsStore, apply_write};
