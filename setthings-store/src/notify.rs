//! Change notification between writers and observers of a namespace.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::RwLock;

use tokio::sync::broadcast;
use tracing::trace;

use crate::{NotifyError, NotifyResult};

/// Payload-free signal meaning "the namespace changed, reload it".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeSignal;

/// Publish/subscribe transport for change signals.
pub trait ChangeNotifier: Send + Sync {
    /// Publishes a signal on `channel`. Having no subscribers is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::InvalidChannel`] for an empty channel name, or a
    /// backend error from the transport.
    fn publish(&self, channel: &str) -> NotifyResult<()>;

    /// Subscribes to `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::InvalidChannel`] for an empty channel name, or a
    /// backend error from the transport.
    fn subscribe(&self, channel: &str) -> NotifyResult<broadcast::Receiver<ChangeSignal>>;
}

/// Configuration for [`LocalNotifier`].
#[derive(Debug, Clone, Copy)]
pub struct NotifierConfig {
    channel_capacity: NonZeroUsize,
}

impl NotifierConfig {
    /// Creates a configuration with the given per-channel buffer size.
    #[must_use]
    pub const fn new(channel_capacity: NonZeroUsize) -> Self {
        Self { channel_capacity }
    }

    /// Returns the per-channel buffer size.
    #[must_use]
    pub const fn channel_capacity(self) -> NonZeroUsize {
        self.channel_capacity
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::InvalidConfig`] when the capacity exceeds what a
    /// broadcast channel can hold.
    pub fn validate(self) -> NotifyResult<()> {
        if self.channel_capacity.get() > usize::MAX >> 1 {
            return Err(NotifyError::InvalidConfig(
                "channel capacity exceeds the broadcast limit",
            ));
        }
        Ok(())
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            channel_capacity: NonZeroUsize::new(16).expect("non-zero"),
        }
    }
}

/// In-process notifier with one broadcast channel per name.
#[derive(Debug)]
pub struct LocalNotifier {
    config: NotifierConfig,
    channels: RwLock<HashMap<String, broadcast::Sender<ChangeSignal>>>,
}

impl LocalNotifier {
    /// Creates a notifier with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: NotifierConfig::default(),
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a notifier with a custom configuration.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::InvalidConfig`] when the configuration is invalid.
    pub fn with_config(config: NotifierConfig) -> NotifyResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            channels: RwLock::new(HashMap::new()),
        })
    }

    /// Returns the active configuration.
    #[must_use]
    pub const fn config(&self) -> NotifierConfig {
        self.config
    }

    fn sender(&self, channel: &str) -> NotifyResult<broadcast::Sender<ChangeSignal>> {
        if channel.is_empty() {
            return Err(NotifyError::InvalidChannel);
        }

        {
            let channels = self
                .channels
                .read()
                .map_err(|_| NotifyError::backend("notifier registry poisoned"))?;
            if let Some(sender) = channels.get(channel) {
                return Ok(sender.clone());
            }
        }

        let mut channels = self
            .channels
            .write()
            .map_err(|_| NotifyError::backend("notifier registry poisoned"))?;
        let capacity = self.config.channel_capacity().get();
        Ok(channels
            .entry(channel.to_owned())
            .or_insert_with(|| broadcast::channel(capacity).0)
            .clone())
    }
}

impl Default for LocalNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeNotifier for LocalNotifier {
    fn publish(&self, channel: &str) -> NotifyResult<()> {
        let sender = self.sender(channel)?;
        // `send` only fails when nobody is subscribed.
        let receivers = sender.send(ChangeSignal).unwrap_or(0);
        trace!(channel, receivers, "published change signal");
        Ok(())
    }

    fn subscribe(&self, channel: &str) -> NotifyResult<broadcast::Receiver<ChangeSignal>> {
        let receiver = self.sender(channel)?.subscribe();
        trace!(channel, "subscribed to change signals");
        Ok(receiver)
    }
}
