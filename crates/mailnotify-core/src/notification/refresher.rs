//! Turning inbox state into notifications.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::presenter::{NewMailNotification, Presenter};
use crate::Result;
use crate::account::{AccountId, AccountRepository};
use crate::mailbox::MailboxRepository;

/// Default minimum time between two alerting notifications for one account.
pub const DEFAULT_MIN_ALERT_INTERVAL: Duration = Duration::from_secs(60);

/// The work performed when the coordinator refreshes.
///
/// Calls are made from the refresh worker, never concurrently.
pub trait Refresher: Send + Sync + 'static {
    /// Recompute and present the state of one account.
    fn refresh(&self, account_id: AccountId) -> impl Future<Output = Result<()>> + Send;

    /// Recompute and present the state of every account.
    fn refresh_all(&self) -> impl Future<Output = Result<()>> + Send;
}

/// What is currently on screen for one account.
#[derive(Debug, Clone, Copy)]
struct Shown {
    new_messages: u32,
    alerted_at: Instant,
}

#[derive(Debug, Default)]
struct RefresherState {
    suspended: Option<AccountId>,
    shown: HashMap<AccountId, Shown>,
}

/// [`Refresher`] that reads inbox summaries from the store and drives a [`Presenter`].
pub struct NotificationRefresher<P> {
    accounts: AccountRepository,
    mailboxes: MailboxRepository,
    presenter: P,
    min_alert_interval: Duration,
    state: Mutex<RefresherState>,
}

impl<P: Presenter> NotificationRefresher<P> {
    /// Create a refresher over the given repositories.
    #[must_use]
    pub fn new(accounts: AccountRepository, mailboxes: MailboxRepository, presenter: P) -> Self {
        Self {
            accounts,
            mailboxes,
            presenter,
            min_alert_interval: DEFAULT_MIN_ALERT_INTERVAL,
            state: Mutex::new(RefresherState::default()),
        }
    }

    /// Set the minimum time between two alerting notifications for one account.
    #[must_use]
    pub fn with_min_alert_interval(mut self, interval: Duration) -> Self {
        self.min_alert_interval = interval;
        self
    }

    /// The presenter notifications go to.
    #[must_use]
    pub const fn presenter(&self) -> &P {
        &self.presenter
    }

    /// Stop notifying for `account_id`, e.g. while the user is looking at it.
    ///
    /// Any notification already shown for it is removed. Only one account
    /// is suspended at a time.
    ///
    /// # Errors
    ///
    /// Returns an error if the presenter fails to remove the notification.
    pub fn suspend(&self, account_id: AccountId) -> Result<()> {
        self.state.lock().suspended = Some(account_id);
        self.cancel(account_id)
    }

    /// Resume notifying for the suspended account.
    ///
    /// Nothing is shown until the next refresh.
    pub fn resume(&self) {
        self.state.lock().suspended = None;
    }

    /// Whether a notification is currently shown for `account_id`.
    #[must_use]
    pub fn is_shown(&self, account_id: AccountId) -> bool {
        self.state.lock().shown.contains_key(&account_id)
    }

    fn is_suspended(&self, account_id: AccountId) -> bool {
        self.state.lock().suspended == Some(account_id)
    }

    /// Decide whether showing `new_messages` should alert, and remember it as shown.
    ///
    /// Alerts only when the count grew and the last alert is old enough.
    fn record_shown(&self, account_id: AccountId, new_messages: u32) -> bool {
        let now = Instant::now();
        let mut state = self.state.lock();

        let alert = state.shown.get(&account_id).is_none_or(|prev| {
            new_messages > prev.new_messages
                && now.duration_since(prev.alerted_at) >= self.min_alert_interval
        });

        let alerted_at = match state.shown.get(&account_id) {
            Some(prev) if !alert => prev.alerted_at,
            _ => now,
        };
        state.shown.insert(
            account_id,
            Shown {
                new_messages,
                alerted_at,
            },
        );
        alert
    }

    async fn refresh_account(&self, account_id: AccountId) -> Result<()> {
        if self.is_suspended(account_id) {
            debug!("Account {account_id} is suspended, not notifying");
            return self.cancel(account_id);
        }

        let Some(summary) = self.mailboxes.inbox_summary(account_id).await? else {
            debug!("Account {account_id} no longer exists");
            return self.cancel(account_id);
        };

        if !summary.account.notify_new_mail || summary.new_messages == 0 {
            return self.cancel(account_id);
        }

        let previous = self.state.lock().shown.get(&account_id).copied();
        let alert = self.record_shown(account_id, summary.new_messages);
        let notification = NewMailNotification::from_summary(account_id, &summary, alert);
        debug!(
            "Showing {} new message(s) for account {account_id} (alert: {alert})",
            summary.new_messages
        );

        if let Err(e) = self.presenter.show(&notification) {
            // A failed update leaves the previous notification on screen.
            let mut state = self.state.lock();
            match previous {
                Some(previous) => state.shown.insert(account_id, previous),
                None => state.shown.remove(&account_id),
            };
            return Err(e);
        }
        Ok(())
    }

    fn cancel(&self, account_id: AccountId) -> Result<()> {
        let was_shown = self.state.lock().shown.remove(&account_id).is_some();
        if was_shown {
            debug!("Cancelling notification for account {account_id}");
            self.presenter.cancel(account_id)?;
        }
        Ok(())
    }
}

impl<P: Presenter> Refresher for NotificationRefresher<P> {
    async fn refresh(&self, account_id: AccountId) -> Result<()> {
        self.refresh_account(account_id).await
    }

    async fn refresh_all(&self) -> Result<()> {
        let ids = self.accounts.ids().await?;

        for &id in &ids {
            if let Err(e) = self.refresh_account(id).await {
                warn!("Failed to refresh notifications for account {id}: {e}");
            }
        }

        let stale: Vec<AccountId> = self
            .state
            .lock()
            .shown
            .keys()
            .filter(|id| !ids.contains(id))
            .copied()
            .collect();
        for id in stale {
            if let Err(e) = self.cancel(id) {
                warn!("Failed to cancel notification for removed account {id}: {e}");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::mailbox::{Mailbox, MailboxId, NewMessage};
    use crate::{Account, Database, Error};

    /// Presenter that records calls.
    #[derive(Debug, Default)]
    struct RecordingPresenter {
        shown: Mutex<Vec<NewMailNotification>>,
        cancelled: Mutex<Vec<AccountId>>,
        fail: Mutex<bool>,
    }

    impl Presenter for RecordingPresenter {
        fn show(&self, notification: &NewMailNotification) -> Result<()> {
            if *self.fail.lock() {
                return Err(Error::Notification("display unavailable".to_string()));
            }
            self.shown.lock().push(notification.clone());
            Ok(())
        }

        fn cancel(&self, account_id: AccountId) -> Result<()> {
            self.cancelled.lock().push(account_id);
            Ok(())
        }
    }

    async fn setup() -> (Database, NotificationRefresher<RecordingPresenter>) {
        let db = Database::in_memory().await.unwrap();
        let refresher =
            NotificationRefresher::new(db.accounts(), db.mailboxes(), RecordingPresenter::default());
        (db, refresher)
    }

    async fn add_account(db: &Database, email: &str) -> (AccountId, MailboxId) {
        let mut account = Account::with_email(email);
        db.accounts().save(&mut account).await.unwrap();
        let id = account.id.unwrap();
        let mut inbox = Mailbox::new(id, "INBOX");
        db.mailboxes().save(&mut inbox).await.unwrap();
        (id, inbox.id.unwrap())
    }

    async fn deliver(db: &Database, inbox: MailboxId, uid: u32) {
        let message = NewMessage {
            uid,
            from: "Alice".to_string(),
            subject: format!("Message {uid}"),
            received_at: Utc::now(),
        };
        db.mailboxes().add_message(inbox, &message).await.unwrap();
    }

    #[tokio::test]
    async fn missing_account_is_a_no_op() {
        let (_db, refresher) = setup().await;

        refresher.refresh(AccountId::new(99)).await.unwrap();

        assert!(refresher.presenter().shown.lock().is_empty());
        assert!(refresher.presenter().cancelled.lock().is_empty());
    }

    #[tokio::test]
    async fn empty_inbox_shows_nothing() {
        let (db, refresher) = setup().await;
        let (id, _) = add_account(&db, "empty@example.com").await;

        refresher.refresh(id).await.unwrap();

        assert!(refresher.presenter().shown.lock().is_empty());
    }

    #[tokio::test]
    async fn new_mail_is_shown_then_cancelled_when_seen() {
        let (db, refresher) = setup().await;
        let (id, inbox) = add_account(&db, "new@example.com").await;

        deliver(&db, inbox, 1).await;
        refresher.refresh(id).await.unwrap();
        {
            let shown = refresher.presenter().shown.lock();
            assert_eq!(shown.len(), 1);
            assert_eq!(shown[0].title, "Alice");
            assert!(shown[0].alert);
        }
        assert!(refresher.is_shown(id));

        db.mailboxes().mark_inbox_seen(id).await.unwrap();
        refresher.refresh(id).await.unwrap();

        assert_eq!(*refresher.presenter().cancelled.lock(), vec![id]);
        assert!(!refresher.is_shown(id));
    }

    #[tokio::test]
    async fn repeated_refresh_updates_silently() {
        let (db, refresher) = setup().await;
        let (id, inbox) = add_account(&db, "quiet@example.com").await;

        deliver(&db, inbox, 1).await;
        refresher.refresh(id).await.unwrap();
        refresher.refresh(id).await.unwrap();

        let shown = refresher.presenter().shown.lock();
        assert_eq!(shown.len(), 2);
        assert!(shown[0].alert);
        assert!(!shown[1].alert);
    }

    #[tokio::test]
    async fn more_mail_alerts_after_interval() {
        let (db, refresher) = setup().await;
        let refresher = refresher.with_min_alert_interval(Duration::ZERO);
        let (id, inbox) = add_account(&db, "busy@example.com").await;

        deliver(&db, inbox, 1).await;
        refresher.refresh(id).await.unwrap();
        deliver(&db, inbox, 2).await;
        refresher.refresh(id).await.unwrap();

        let shown = refresher.presenter().shown.lock();
        assert_eq!(shown[1].new_messages, 2);
        assert!(shown[1].alert);
    }

    #[tokio::test]
    async fn more_mail_within_interval_is_silent() {
        let (db, refresher) = setup().await;
        let (id, inbox) = add_account(&db, "burst@example.com").await;

        deliver(&db, inbox, 1).await;
        refresher.refresh(id).await.unwrap();
        deliver(&db, inbox, 2).await;
        refresher.refresh(id).await.unwrap();

        let shown = refresher.presenter().shown.lock();
        assert_eq!(shown[1].new_messages, 2);
        assert!(!shown[1].alert);
    }

    #[tokio::test]
    async fn disabled_account_is_not_notified() {
        let (db, refresher) = setup().await;
        let (id, inbox) = add_account(&db, "off@example.com").await;
        db.accounts().set_notify_new_mail(id, false).await.unwrap();

        deliver(&db, inbox, 1).await;
        refresher.refresh(id).await.unwrap();

        assert!(refresher.presenter().shown.lock().is_empty());
    }

    #[tokio::test]
    async fn suspended_account_is_cancelled_and_skipped() {
        let (db, refresher) = setup().await;
        let (id, inbox) = add_account(&db, "open@example.com").await;

        deliver(&db, inbox, 1).await;
        refresher.refresh(id).await.unwrap();
        refresher.suspend(id).unwrap();
        assert_eq!(*refresher.presenter().cancelled.lock(), vec![id]);

        deliver(&db, inbox, 2).await;
        refresher.refresh(id).await.unwrap();
        assert_eq!(refresher.presenter().shown.lock().len(), 1);

        refresher.resume();
        refresher.refresh(id).await.unwrap();
        assert_eq!(refresher.presenter().shown.lock().len(), 2);
    }

    #[tokio::test]
    async fn refresh_all_cancels_removed_accounts() {
        let (db, refresher) = setup().await;
        let (kept, kept_inbox) = add_account(&db, "kept@example.com").await;
        let (removed, removed_inbox) = add_account(&db, "removed@example.com").await;

        deliver(&db, kept_inbox, 1).await;
        deliver(&db, removed_inbox, 1).await;
        refresher.refresh_all().await.unwrap();
        assert_eq!(refresher.presenter().shown.lock().len(), 2);

        db.accounts().delete(removed).await.unwrap();
        refresher.refresh_all().await.unwrap();

        assert_eq!(*refresher.presenter().cancelled.lock(), vec![removed]);
        assert!(refresher.is_shown(kept));
    }

    #[tokio::test]
    async fn presenter_failure_is_reported_and_not_remembered() {
        let (db, refresher) = setup().await;
        let (id, inbox) = add_account(&db, "fail@example.com").await;
        *refresher.presenter().fail.lock() = true;

        deliver(&db, inbox, 1).await;
        assert!(matches!(
            refresher.refresh(id).await,
            Err(Error::Notification(_))
        ));
        assert!(!refresher.is_shown(id));
    }

    #[tokio::test]
    async fn failed_update_keeps_notification_cancellable() {
        let (db, refresher) = setup().await;
        let (id, inbox) = add_account(&db, "flaky@example.com").await;

        deliver(&db, inbox, 1).await;
        refresher.refresh(id).await.unwrap();

        *refresher.presenter().fail.lock() = true;
        deliver(&db, inbox, 2).await;
        assert!(refresher.refresh(id).await.is_err());
        assert!(refresher.is_shown(id));
        *refresher.presenter().fail.lock() = false;

        db.mailboxes().mark_inbox_seen(id).await.unwrap();
        refresher.refresh(id).await.unwrap();

        assert_eq!(*refresher.presenter().cancelled.lock(), vec![id]);
        assert!(!refresher.is_shown(id));
    }

    #[tokio::test]
    async fn failed_update_still_alerts_on_retry() {
        let (db, refresher) = setup().await;
        let refresher = refresher.with_min_alert_interval(Duration::ZERO);
        let (id, inbox) = add_account(&db, "retry@example.com").await;

        deliver(&db, inbox, 1).await;
        refresher.refresh(id).await.unwrap();

        *refresher.presenter().fail.lock() = true;
        deliver(&db, inbox, 2).await;
        assert!(refresher.refresh(id).await.is_err());
        *refresher.presenter().fail.lock() = false;

        refresher.refresh(id).await.unwrap();
        let shown = refresher.presenter().shown.lock();
        assert_eq!(shown.len(), 2);
        assert_eq!(shown[1].new_messages, 2);
        assert!(shown[1].alert);
    }
}
