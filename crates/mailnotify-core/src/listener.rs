//! Callbacks for sync engines.
//!
//! A sync engine reports progress through [`MessagingListener`]. Every method
//! has a no-op default, so listeners only implement what they care about.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::account::AccountId;
use crate::mailbox::MailboxId;

/// Receives sync progress for accounts and mailboxes.
///
/// Methods may be called from any thread and must return quickly.
pub trait MessagingListener: Send + Sync {
    /// A mailbox sync started.
    fn sync_started(&self, _account_id: AccountId, _mailbox_id: MailboxId) {}

    /// A mailbox sync finished with `total` messages, `new` of them new.
    fn sync_finished(&self, _account_id: AccountId, _mailbox_id: MailboxId, _total: u32, _new: u32) {}

    /// A mailbox sync failed.
    fn sync_failed(&self, _account_id: AccountId, _mailbox_id: MailboxId, _reason: &str) {}

    /// Queued outgoing messages of an account were sent.
    fn send_pending_finished(&self, _account_id: AccountId) {}
}

/// Fans sync callbacks out to every registered listener.
///
/// This is the hook point for sync engines: an engine reports to one
/// group, and consumers such as a [`RefreshCoordinator`] register with it.
///
/// [`RefreshCoordinator`]: crate::RefreshCoordinator
#[derive(Default)]
pub struct ListenerGroup {
    listeners: RwLock<Vec<Arc<dyn MessagingListener>>>,
}

impl ListenerGroup {
    /// Create an empty group.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. Adding the same listener twice is a no-op.
    pub fn add(&self, listener: Arc<dyn MessagingListener>) {
        let mut listeners = self.listeners.write();
        if !listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            listeners.push(listener);
        }
    }

    /// Unregister a listener.
    pub fn remove(&self, listener: &Arc<dyn MessagingListener>) {
        self.listeners.write().retain(|l| !Arc::ptr_eq(l, listener));
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// Whether no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Snapshot so callbacks run without the lock held.
    fn snapshot(&self) -> Vec<Arc<dyn MessagingListener>> {
        self.listeners.read().clone()
    }
}

impl std::fmt::Debug for ListenerGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerGroup")
            .field("listeners", &self.len())
            .finish()
    }
}

impl MessagingListener for ListenerGroup {
    fn sync_started(&self, account_id: AccountId, mailbox_id: MailboxId) {
        for l in self.snapshot() {
            l.sync_started(account_id, mailbox_id);
        }
    }

    fn sync_finished(&self, account_id: AccountId, mailbox_id: MailboxId, total: u32, new: u32) {
        for l in self.snapshot() {
            l.sync_finished(account_id, mailbox_id, total, new);
        }
    }

    fn sync_failed(&self, account_id: AccountId, mailbox_id: MailboxId, reason: &str) {
        for l in self.snapshot() {
            l.sync_failed(account_id, mailbox_id, reason);
        }
    }

    fn send_pending_finished(&self, account_id: AccountId) {
        for l in self.snapshot() {
            l.send_pending_finished(account_id);
        }
    }
}
