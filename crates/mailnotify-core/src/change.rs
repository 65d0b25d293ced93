//! Change signals published by the store.
//!
//! Every write through a repository publishes a [`ChangeEvent`] on a
//! broadcast feed. Consumers subscribe through [`ChangeSource`], which is
//! what the refresh coordinator watches.

use std::future::Future;

use tokio::sync::broadcast;
use tracing::trace;

use crate::Result;
use crate::account::AccountId;

/// Default capacity of the broadcast feed.
///
/// Slow receivers that fall behind see `Lagged` and treat it as a change.
pub const FEED_CAPACITY: usize = 256;

/// Something changed in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent {
    /// Mailbox or message data owned by an account changed.
    Account(AccountId),
    /// Accounts were added or removed.
    AccountsChanged,
}

/// Broadcast sender shared by all repositories of one database.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    /// Create a feed with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(FEED_CAPACITY)
    }

    /// Create a feed holding up to `capacity` undelivered events per receiver.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        let receivers = self.tx.send(event).unwrap_or(0);
        trace!(?event, receivers, "Published change");
    }

    /// Subscribe to future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// A source of change signals the coordinator can watch.
pub trait ChangeSource: Send + Sync + 'static {
    /// Subscribe to change events.
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;

    /// List the accounts currently known to the source.
    fn account_ids(&self) -> impl Future<Output = Result<Vec<AccountId>>> + Send;
}
