//! Seam between the refresher and the OS notification API.

use crate::account::AccountId;
use crate::mailbox::InboxSummary;
use crate::util::ellipsize;
use crate::Result;

/// Longest subject shown in a notification body.
const MAX_SUBJECT_CHARS: usize = 80;

/// A new-mail notification for one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMailNotification {
    /// Account the notification belongs to. One notification per account.
    pub account_id: AccountId,
    /// Notification title.
    pub title: String,
    /// Notification body.
    pub body: String,
    /// Unread messages the user has not seen yet.
    pub new_messages: u32,
    /// Unread messages in the inbox.
    pub unread: u32,
    /// Whether to play sound or otherwise alert, rather than update silently.
    pub alert: bool,
}

impl NewMailNotification {
    /// Build the notification for an inbox summary.
    ///
    /// A single new message shows its sender and subject; several show a
    /// count and the account name.
    #[must_use]
    pub fn from_summary(account_id: AccountId, summary: &InboxSummary, alert: bool) -> Self {
        let account_name = summary.account.display_name();

        let (title, body) = match (&summary.latest, summary.new_messages) {
            (Some(latest), 1) => {
                let subject = if latest.subject.is_empty() {
                    "(no subject)"
                } else {
                    latest.subject.as_str()
                };
                (
                    latest.from.clone(),
                    ellipsize(subject, MAX_SUBJECT_CHARS).into_owned(),
                )
            }
            (_, n) => (format!("{n} new messages"), account_name.to_string()),
        };

        Self {
            account_id,
            title,
            body,
            new_messages: summary.new_messages,
            unread: summary.unread,
            alert,
        }
    }
}

/// Shows and removes new-mail notifications.
///
/// Implementations are called from the refresh worker only, one call at a time.
pub trait Presenter: Send + Sync + 'static {
    /// Show or replace the notification for `notification.account_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the notification could not be shown.
    fn show(&self, notification: &NewMailNotification) -> Result<()>;

    /// Remove the notification for an account, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the notification could not be removed.
    fn cancel(&self, account_id: AccountId) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Account;
    use crate::mailbox::MessagePreview;

    fn summary(new_messages: u32, latest: Option<MessagePreview>) -> InboxSummary {
        InboxSummary {
            account: Account {
                name: "Work".to_string(),
                email: "me@work.example".to_string(),
                ..Default::default()
            },
            unread: new_messages + 2,
            new_messages,
            latest,
        }
    }

    #[test]
    fn single_message_shows_sender_and_subject() {
        let latest = MessagePreview {
            from: "Alice".to_string(),
            subject: "Lunch?".to_string(),
        };
        let n = NewMailNotification::from_summary(AccountId::new(1), &summary(1, Some(latest)), true);

        assert_eq!(n.title, "Alice");
        assert_eq!(n.body, "Lunch?");
        assert_eq!(n.unread, 3);
        assert!(n.alert);
    }

    #[test]
    fn empty_subject_has_placeholder() {
        let latest = MessagePreview {
            from: "Bob".to_string(),
            subject: String::new(),
        };
        let n = NewMailNotification::from_summary(AccountId::new(1), &summary(1, Some(latest)), false);
        assert_eq!(n.body, "(no subject)");
    }

    #[test]
    fn several_messages_show_count() {
        let latest = MessagePreview {
            from: "Alice".to_string(),
            subject: "Lunch?".to_string(),
        };
        let n = NewMailNotification::from_summary(AccountId::new(1), &summary(4, Some(latest)), false);

        assert_eq!(n.title, "4 new messages");
        assert_eq!(n.body, "Work");
        assert!(!n.alert);
    }

    #[test]
    fn long_subject_is_shortened() {
        let latest = MessagePreview {
            from: "Alice".to_string(),
            subject: "x".repeat(200),
        };
        let n = NewMailNotification::from_summary(AccountId::new(1), &summary(1, Some(latest)), true);
        assert_eq!(n.body.chars().count(), MAX_SUBJECT_CHARS);
    }
}
