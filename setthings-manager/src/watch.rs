//! Background reload of settings when a change signal arrives.

use std::num::NonZeroUsize;
use std::sync::Arc;

use setthings_schema::Settings;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::manager::SettingsManager;
use crate::{ManagerError, ManagerResult};

/// Configuration for [`SettingsWatcher`].
#[derive(Debug, Clone, Copy)]
pub struct WatchConfig {
    event_capacity: NonZeroUsize,
}

impl WatchConfig {
    /// Creates a configuration buffering up to `event_capacity` events per
    /// observer.
    #[must_use]
    pub const fn new(event_capacity: NonZeroUsize) -> Self {
        Self { event_capacity }
    }

    /// Returns the per-observer event buffer size.
    #[must_use]
    pub const fn event_capacity(self) -> NonZeroUsize {
        self.event_capacity
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::InvalidConfig`] when the capacity exceeds what a
    /// broadcast channel can hold.
    pub fn validate(self) -> ManagerResult<()> {
        if self.event_capacity.get() > usize::MAX >> 1 {
            return Err(ManagerError::InvalidConfig(
                "event capacity exceeds the broadcast limit",
            ));
        }
        Ok(())
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self::new(NonZeroUsize::new(16).expect("non-zero"))
    }
}

/// Outcome of a reload triggered by a change signal.
#[derive(Debug)]
pub enum SettingsEvent<T> {
    /// Settings were reloaded.
    Updated(Arc<T>),
    /// Reloading failed; the previous settings remain current.
    ReloadFailed(Arc<ManagerError>),
}

impl<T> Clone for SettingsEvent<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Updated(settings) => Self::Updated(Arc::clone(settings)),
            Self::ReloadFailed(err) => Self::ReloadFailed(Arc::clone(err)),
        }
    }
}

/// Reloads settings whenever the manager's channel signals a change.
///
/// The watcher subscribes on construction. Dropping it, or calling
/// [`shutdown`](Self::shutdown), stops the background task and unsubscribes.
#[derive(Debug)]
pub struct SettingsWatcher<T> {
    events: broadcast::Sender<SettingsEvent<T>>,
    task: JoinHandle<()>,
}

impl<T: Settings> SettingsWatcher<T> {
    /// Subscribes to the manager's channel and spawns the reload task on the
    /// current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::MissingNotifier`] when the manager has no
    /// notifier, [`ManagerError::InvalidConfig`] for an invalid configuration
    /// and propagates subscription failures.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn spawn(manager: Arc<SettingsManager<T>>, config: WatchConfig) -> ManagerResult<Self> {
        config.validate()?;
        let notifier = manager.notifier().ok_or(ManagerError::MissingNotifier)?;
        let mut signals = notifier.subscribe(manager.channel())?;

        let (events, _) = broadcast::channel(config.event_capacity().get());
        let publisher = events.clone();
        debug!(channel = manager.channel(), "watching settings");

        let task = tokio::spawn(async move {
            loop {
                match signals.recv().await {
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(
                            channel = manager.channel(),
                            skipped, "coalescing missed change signals"
                        );
                    }
                    Err(RecvError::Closed) => break,
                }

                let event = match manager.load_async().await {
                    Ok(settings) => SettingsEvent::Updated(Arc::new(settings)),
                    Err(err) => {
                        warn!(channel = manager.channel(), error = %err, "settings reload failed");
                        SettingsEvent::ReloadFailed(Arc::new(err))
                    }
                };
                // Nobody observing is fine; the next signal reloads again.
                let _ = publisher.send(event);
            }
            debug!(channel = manager.channel(), "change channel closed");
        });

        Ok(Self { events, task })
    }
}

impl<T> SettingsWatcher<T> {
    /// Returns a receiver for the events published after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SettingsEvent<T>> {
        self.events.subscribe()
    }

    /// Returns `true` while the reload task is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stops watching.
    pub fn shutdown(self) {
        drop(self);
    }
}

impl<T> Drop for SettingsWatcher<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use setthings_store::{ChangeNotifier, LocalNotifier, MemoryStore, SettingsStore};
    use tokio::time::timeout;

    use super::*;
    use crate::fixtures::{Service, map};

    struct Harness {
        store: Arc<MemoryStore>,
        notifier: Arc<LocalNotifier>,
        manager: Arc<SettingsManager<Service>>,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(LocalNotifier::new());
        let manager = SettingsManager::<Service>::builder(store.clone())
            .with_notifier(notifier.clone())
            .build()
            .unwrap();
        Harness {
            store,
            notifier,
            manager: Arc::new(manager),
        }
    }

    async fn next_event(
        events: &mut broadcast::Receiver<SettingsEvent<Service>>,
    ) -> SettingsEvent<Service> {
        timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("event within timeout")
            .expect("watcher running")
    }

    #[tokio::test]
    async fn commit_triggers_reload() {
        let harness = harness();
        let watcher =
            SettingsWatcher::spawn(harness.manager.clone(), WatchConfig::default()).unwrap();
        let mut events = watcher.subscribe();

        let mut tx = harness.manager.begin_update();
        tx.set(|f| f.name(), "billing").unwrap();
        tx.commit_async().await.unwrap();

        let SettingsEvent::Updated(settings) = next_event(&mut events).await else {
            panic!("expected a reload");
        };
        assert_eq!(settings.name, "billing");
        assert!(watcher.is_running());
    }

    #[tokio::test]
    async fn reload_failure_is_reported() {
        let harness = harness();
        let watcher =
            SettingsWatcher::spawn(harness.manager.clone(), WatchConfig::default()).unwrap();
        let mut events = watcher.subscribe();

        harness
            .store
            .write_all(&map(&[("Network.Port", "99999")]), true)
            .unwrap();
        harness.notifier.publish(harness.manager.channel()).unwrap();

        let SettingsEvent::ReloadFailed(err) = next_event(&mut events).await else {
            panic!("expected a failed reload");
        };
        assert!(matches!(
            err.as_ref(),
            ManagerError::Settings(setthings_schema::Error::Conversion(_))
        ));
    }

    #[tokio::test]
    async fn requires_a_notifier() {
        let manager = SettingsManager::<Service>::new(Arc::new(MemoryStore::new())).unwrap();
        let err = SettingsWatcher::spawn(Arc::new(manager), WatchConfig::default())
            .expect_err("no notifier");
        assert!(matches!(err, ManagerError::MissingNotifier));
    }

    #[tokio::test]
    async fn shutdown_stops_delivery() {
        let harness = harness();
        let watcher =
            SettingsWatcher::spawn(harness.manager.clone(), WatchConfig::default()).unwrap();
        let mut events = watcher.subscribe();
        watcher.shutdown();

        harness.notifier.publish(harness.manager.channel()).unwrap();

        let outcome = timeout(Duration::from_secs(5), events.recv()).await;
        assert!(matches!(outcome, Ok(Err(RecvError::Closed))));
    }
}
