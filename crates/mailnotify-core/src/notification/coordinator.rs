//! Debounced refresh coordinator.
//!
//! Change signals arrive from many places: the store's change feed, sync
//! listeners, or a direct [`RefreshCoordinator::on_signal`] call. Refreshing
//! is comparatively expensive, so signals are coalesced:
//!
//! 1. The first signal opens a debounce window, schedules a one-shot timer,
//!    and triggers an immediate refresh for itself.
//! 2. Signals arriving while the window is open are only recorded.
//! 3. When the timer fires, everything recorded (the first signal included)
//!    is refreshed once: a single global refresh if any signal was
//!    [`RefreshTarget::All`], otherwise one refresh per account.
//!
//! All refresh, watch, and unwatch work runs on one dedicated [`Worker`]
//! thread, so none of it ever runs concurrently with the rest.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use super::refresher::Refresher;
use super::worker::Worker;
use crate::{Error, Result};
use crate::account::AccountId;
use crate::change::{ChangeEvent, ChangeSource};
use crate::listener::MessagingListener;
use crate::mailbox::MailboxId;

/// Default debounce window.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(15);

/// Name of the refresh worker thread.
const WORKER_NAME: &str = "mailnotify-refresh";

/// What a change signal refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshTarget {
    /// Every account.
    All,
    /// One account.
    Account(AccountId),
}

impl std::fmt::Display for RefreshTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => f.write_str("all accounts"),
            Self::Account(id) => write!(f, "account {id}"),
        }
    }
}

/// Coordinator settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// How long signals are merged after the first one.
    pub debounce: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

/// Signals recorded during the current debounce window.
#[derive(Debug, Default)]
struct PendingState {
    /// A window is open and its timer is outstanding.
    coalescing: bool,
    /// Sticky: a global refresh supersedes per-account ones.
    refresh_all: bool,
    /// Accounts to refresh when the window closes.
    accounts: BTreeSet<AccountId>,
}

impl PendingState {
    fn record(&mut self, target: RefreshTarget) {
        match target {
            RefreshTarget::All => self.refresh_all = true,
            RefreshTarget::Account(id) => {
                self.accounts.insert(id);
            }
        }
    }

    /// Open the window. Returns false if it was already open.
    fn open(&mut self) -> bool {
        !std::mem::replace(&mut self.coalescing, true)
    }
}

/// Change subscriptions, touched only from the worker.
#[derive(Debug, Default)]
struct Subscriptions {
    accounts: HashMap<AccountId, JoinHandle<()>>,
    topology: Option<JoinHandle<()>>,
}

impl Subscriptions {
    fn clear(&mut self) {
        for (_, task) in self.accounts.drain() {
            task.abort();
        }
        if let Some(task) = self.topology.take() {
            task.abort();
        }
    }
}

struct Inner<S, R> {
    config: CoordinatorConfig,
    pending: Mutex<PendingState>,
    subscriptions: Mutex<Subscriptions>,
    worker: Worker,
    source: Arc<S>,
    refresher: Arc<R>,
}

/// Debounced, multi-source refresh coordinator.
///
/// Cloning yields another handle to the same coordinator.
pub struct RefreshCoordinator<S, R> {
    inner: Arc<Inner<S, R>>,
}

impl<S, R> Clone for RefreshCoordinator<S, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: ChangeSource, R: Refresher> RefreshCoordinator<S, R> {
    /// Start a coordinator and its worker thread.
    ///
    /// Nothing is watched until [`watch`](Self::watch) is called.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a zero debounce window, or an error if
    /// the worker thread cannot be started.
    pub fn start(source: Arc<S>, refresher: Arc<R>, config: CoordinatorConfig) -> Result<Self> {
        if config.debounce.is_zero() {
            return Err(Error::Config("debounce window must be longer than zero".to_string()));
        }

        let worker = Worker::spawn(WORKER_NAME)?;
        info!("Refresh coordinator started (debounce: {:?})", config.debounce);

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                pending: Mutex::new(PendingState::default()),
                subscriptions: Mutex::new(Subscriptions::default()),
                worker,
                source,
                refresher,
            }),
        })
    }

    /// The refresher this coordinator drives.
    #[must_use]
    pub fn refresher(&self) -> &Arc<R> {
        &self.inner.refresher
    }

    /// Report that something changed for `target`.
    ///
    /// Safe to call from any thread. Never blocks beyond a short lock and
    /// never runs refresh work on the caller's thread.
    pub fn on_signal(&self, target: RefreshTarget) {
        Inner::signal(&self.inner, target);
    }

    /// Start watching `target` for change signals.
    ///
    /// [`RefreshTarget::All`] watches every known account and follows
    /// accounts added or removed later. Runs on the worker.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker has stopped.
    pub fn watch(&self, target: RefreshTarget) -> Result<()> {
        let weak = Arc::downgrade(&self.inner);
        self.inner.worker.submit(async move {
            if let Some(inner) = weak.upgrade() {
                inner.watch_now(target).await;
            }
        })
    }

    /// Stop watching `target`.
    ///
    /// [`RefreshTarget::All`] removes every subscription. A refresh already
    /// pending for the account still happens when the window closes.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker has stopped.
    pub fn unwatch(&self, target: RefreshTarget) -> Result<()> {
        let weak = Arc::downgrade(&self.inner);
        self.inner.worker.submit(async move {
            if let Some(inner) = weak.upgrade() {
                inner.unwatch_now(target);
            }
        })
    }

    /// Accounts currently watched.
    #[must_use]
    pub fn watched(&self) -> Vec<AccountId> {
        let mut ids: Vec<AccountId> = self
            .inner
            .subscriptions
            .lock()
            .accounts
            .keys()
            .copied()
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Whether a debounce window is currently open.
    #[must_use]
    pub fn is_coalescing(&self) -> bool {
        self.inner.pending.lock().coalescing
    }

    /// Wait until all work queued on the worker so far has run.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker has stopped.
    pub async fn wait_idle(&self) -> Result<()> {
        self.inner.worker.wait_idle().await
    }

    /// Remove every subscription and stop the worker.
    ///
    /// A debounce window still open is dropped without refreshing.
    pub async fn shutdown(&self) {
        if self.unwatch(RefreshTarget::All).is_ok() {
            debug!("Queued subscription teardown");
        }
        self.inner.worker.shutdown().await;
        info!("Refresh coordinator stopped");
    }
}

impl<S: ChangeSource, R: Refresher> Inner<S, R> {
    fn signal(this: &Arc<Self>, target: RefreshTarget) {
        let opened = {
            let mut pending = this.pending.lock();
            pending.record(target);
            pending.open()
        };

        if !opened {
            trace!("Coalesced signal for {target}");
            return;
        }

        debug!("Signal for {target} opened a refresh window");

        // The immediate refresh is queued ahead of the window timer so it
        // always runs first, whatever the window length.
        let weak = Arc::downgrade(this);
        let immediate = this.worker.submit(async move {
            if let Some(inner) = weak.upgrade() {
                inner.run_refresh(target).await;
            }
        });
        if let Err(e) = immediate {
            warn!("Cannot refresh {target}: {e}");
            *this.pending.lock() = PendingState::default();
            return;
        }

        let weak = Arc::downgrade(this);
        let scheduled = this.worker.submit_after(this.config.debounce, async move {
            if let Some(inner) = weak.upgrade() {
                inner.close_window().await;
            }
        });
        if let Err(e) = scheduled {
            warn!("Cannot schedule refresh for {target}: {e}");
            *this.pending.lock() = PendingState::default();
        }
    }

    /// Timer callback: take everything recorded and refresh it once.
    async fn close_window(&self) {
        let batch = std::mem::take(&mut *self.pending.lock());

        if batch.refresh_all {
            debug!("Refresh window closed, refreshing all accounts");
            self.run_refresh(RefreshTarget::All).await;
            return;
        }

        debug!(
            "Refresh window closed, refreshing {} account(s)",
            batch.accounts.len()
        );
        for id in batch.accounts {
            self.run_refresh(RefreshTarget::Account(id)).await;
        }
    }

    /// Run one refresh, logging failures instead of propagating them.
    async fn run_refresh(&self, target: RefreshTarget) {
        let refresher = Arc::clone(&self.refresher);
        let task = tokio::spawn(async move {
            match target {
                RefreshTarget::All => refresher.refresh_all().await,
                RefreshTarget::Account(id) => refresher.refresh(id).await,
            }
        });

        match task.await {
            Ok(Ok(())) => trace!("Refreshed {target}"),
            Ok(Err(e)) => warn!("Failed to refresh {target}: {e}"),
            Err(e) => error!("Refresh of {target} aborted: {e}"),
        }
    }

    async fn watch_now(self: Arc<Self>, target: RefreshTarget) {
        match target {
            RefreshTarget::Account(id) => self.watch_account(id),
            RefreshTarget::All => {
                self.reconcile().await;
                self.watch_topology();
            }
        }
    }

    fn unwatch_now(&self, target: RefreshTarget) {
        let mut subscriptions = self.subscriptions.lock();
        match target {
            RefreshTarget::Account(id) => {
                if let Some(task) = subscriptions.accounts.remove(&id) {
                    task.abort();
                    debug!("Stopped watching account {id}");
                }
            }
            RefreshTarget::All => {
                subscriptions.clear();
                debug!("Stopped watching all accounts");
            }
        }
    }

    /// Subscribe to changes of one account. Must run on the worker.
    fn watch_account(self: &Arc<Self>, id: AccountId) {
        let mut subscriptions = self.subscriptions.lock();
        if subscriptions.accounts.contains_key(&id) {
            return;
        }

        let mut rx = self.source.subscribe();
        let weak: Weak<Self> = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ChangeEvent::Account(changed)) if changed == id => {}
                    Ok(_) => continue,
                    Err(RecvError::Lagged(missed)) => {
                        debug!("Watcher for account {id} missed {missed} change(s)");
                    }
                    Err(RecvError::Closed) => break,
                }
                let Some(inner) = weak.upgrade() else { break };
                Self::signal(&inner, RefreshTarget::Account(id));
            }
        });

        subscriptions.accounts.insert(id, task);
        debug!("Watching account {id}");
    }

    /// Follow accounts being added or removed. Must run on the worker.
    fn watch_topology(self: &Arc<Self>) {
        let mut subscriptions = self.subscriptions.lock();
        if subscriptions.topology.is_some() {
            return;
        }

        let mut rx = self.source.subscribe();
        let weak: Weak<Self> = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ChangeEvent::AccountsChanged) | Err(RecvError::Lagged(_)) => {}
                    Ok(ChangeEvent::Account(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
                let Some(inner) = weak.upgrade() else { break };

                // Membership changes go through the worker like any other watch.
                let job_inner = Arc::downgrade(&inner);
                let submitted = inner.worker.submit(async move {
                    if let Some(inner) = job_inner.upgrade() {
                        inner.reconcile().await;
                        Self::signal(&inner, RefreshTarget::All);
                    }
                });
                if submitted.is_err() {
                    break;
                }
            }
        });

        subscriptions.topology = Some(task);
    }

    /// Watch accounts that appeared and unwatch accounts that disappeared.
    async fn reconcile(self: &Arc<Self>) {
        let ids = match self.source.account_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Failed to list accounts: {e}");
                return;
            }
        };

        let removed: Vec<AccountId> = self
            .subscriptions
            .lock()
            .accounts
            .keys()
            .filter(|id| !ids.contains(id))
            .copied()
            .collect();
        for id in removed {
            self.unwatch_now(RefreshTarget::Account(id));
        }

        for id in ids {
            self.watch_account(id);
        }
    }
}

impl<S: ChangeSource, R: Refresher> MessagingListener for RefreshCoordinator<S, R> {
    fn sync_finished(&self, account_id: AccountId, _mailbox_id: MailboxId, _total: u32, new: u32) {
        if new > 0 {
            self.on_signal(RefreshTarget::Account(account_id));
        }
    }

    fn sync_failed(&self, account_id: AccountId, mailbox_id: MailboxId, reason: &str) {
        debug!("Sync of mailbox {mailbox_id} in account {account_id} failed: {reason}");
    }

    fn send_pending_finished(&self, account_id: AccountId) {
        self.on_signal(RefreshTarget::Account(account_id));
    }
}
