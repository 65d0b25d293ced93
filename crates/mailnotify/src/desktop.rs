//! Desktop notifications through the freedesktop notification service.

use std::collections::HashMap;

use mailnotify_core::{AccountId, Error, NewMailNotification, Presenter, Result};
use notify_rust::{Hint, Notification, NotificationHandle, Timeout, Urgency};
use parking_lot::Mutex;
use tracing::{debug, info};

const APP_NAME: &str = "MailNotify";
const ICON: &str = "mail-message-new";
const SOUND: &str = "message-new-email";
const CATEGORY: &str = "email.arrived";

/// Shows one desktop notification per account.
///
/// An account's notification is updated in place while it is on screen and
/// closed when the account has nothing new.
#[derive(Default)]
pub struct DesktopPresenter {
    handles: Mutex<HashMap<AccountId, NotificationHandle>>,
}

impl DesktopPresenter {
    /// Create a presenter with nothing on screen.
    pub fn new() -> Self {
        Self::default()
    }
}

fn fill(notification: &mut Notification, content: &NewMailNotification) {
    notification
        .appname(APP_NAME)
        .summary(&content.title)
        .body(&content.body)
        .icon(ICON)
        .hint(Hint::Category(CATEGORY.to_string()))
        .hint(Hint::SuppressSound(!content.alert))
        .timeout(Timeout::Never);

    if content.alert {
        notification.sound_name(SOUND).urgency(Urgency::Normal);
    } else {
        notification.urgency(Urgency::Low);
    }
}

impl Presenter for DesktopPresenter {
    fn show(&self, content: &NewMailNotification) -> Result<()> {
        let mut handles = self.handles.lock();

        if let Some(handle) = handles.get_mut(&content.account_id) {
            fill(handle, content);
            handle.update();
            debug!("Updated notification for account {}", content.account_id);
            return Ok(());
        }

        let mut notification = Notification::new();
        fill(&mut notification, content);
        let handle = notification
            .show()
            .map_err(|e| Error::Notification(e.to_string()))?;
        handles.insert(content.account_id, handle);

        info!(
            "Notified {} new message(s) for account {}",
            content.new_messages, content.account_id
        );
        Ok(())
    }

    fn cancel(&self, account_id: AccountId) -> Result<()> {
        if let Some(handle) = self.handles.lock().remove(&account_id) {
            handle.close();
            debug!("Closed notification for account {account_id}");
        }
        Ok(())
    }
}

impl std::fmt::Debug for DesktopPresenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DesktopPresenter")
            .field("shown", &self.handles.lock().len())
            .finish()
    }
}
