//! Store contract consumed by the settings manager.

use async_trait::async_trait;
use setthings_schema::FlatMap;

use crate::StoreResult;

/// Backend holding the flat key/value map of one configuration namespace.
///
/// Implementations offer a blocking path and a suspend-capable path; both must
/// observe the same data. Timeouts and cancellation of a round trip are the
/// implementation's concern.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Returns a full snapshot of the flat map.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    fn read_all(&self) -> StoreResult<FlatMap>;

    /// Asynchronous equivalent of [`read_all`](Self::read_all).
    async fn read_all_async(&self) -> StoreResult<FlatMap>;

    /// Writes `updates`.
    ///
    /// With `merge = false` the namespace is replaced by `updates`; with
    /// `merge = true` only the keys present in `updates` are touched.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    fn write_all(&self, updates: &FlatMap, merge: bool) -> StoreResult<()>;

    /// Asynchronous equivalent of [`write_all`](Self::write_all).
    async fn write_all_async(&self, updates: &FlatMap, merge: bool) -> StoreResult<()>;
}

/// Applies a write to an in-memory copy of a namespace.
pub fn apply_write(target: &mut FlatMap, updates: &FlatMap, merge: bool) {
    if !merge {
        target.clear();
    }
    target.extend(
        updates
            .iter()
            .map(|(key, value)| (key.clone(), value.clone())),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> FlatMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn merge_touches_only_given_keys() {
        let mut target = map(&[("A", "0"), ("B", "2")]);
        apply_write(&mut target, &map(&[("A", "1")]), true);
        assert_eq!(target, map(&[("A", "1"), ("B", "2")]));
    }

    #[test]
    fn replace_drops_missing_keys() {
        let mut target = map(&[("A", "0"), ("B", "2")]);
        apply_write(&mut target, &map(&[("A", "1")]), false);
        assert_eq!(target, map(&[("A", "1")]));
    }
}
