//! Mailbox and message model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::account::{Account, AccountId};

/// Unique identifier for a mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MailboxId(pub i64);

impl std::fmt::Display for MailboxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role of a mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MailboxKind {
    /// Inbox folder. Only inbox mail raises notifications.
    Inbox,
    /// Sent mail folder.
    Sent,
    /// Drafts folder.
    Drafts,
    /// Trash folder.
    Trash,
    /// Spam/junk folder.
    Spam,
    /// Archive folder.
    Archive,
    /// Regular folder.
    #[default]
    Regular,
}

impl MailboxKind {
    /// Detect mailbox kind from its name.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower == "inbox" {
            Self::Inbox
        } else if lower.contains("sent") {
            Self::Sent
        } else if lower.contains("draft") {
            Self::Drafts
        } else if lower.contains("trash") || lower.contains("deleted") {
            Self::Trash
        } else if lower.contains("spam") || lower.contains("junk") {
            Self::Spam
        } else if lower.contains("archive") {
            Self::Archive
        } else {
            Self::Regular
        }
    }

    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Inbox => "inbox",
            Self::Sent => "sent",
            Self::Drafts => "drafts",
            Self::Trash => "trash",
            Self::Spam => "spam",
            Self::Archive => "archive",
            Self::Regular => "regular",
        }
    }

    pub(crate) fn parse(s: &str) -> Self {
        match s {
            "inbox" => Self::Inbox,
            "sent" => Self::Sent,
            "drafts" => Self::Drafts,
            "trash" => Self::Trash,
            "spam" => Self::Spam,
            "archive" => Self::Archive,
            _ => Self::Regular,
        }
    }
}

/// A mailbox belonging to an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    /// Unique identifier (None for unsaved mailboxes).
    pub id: Option<MailboxId>,
    /// Owning account.
    pub account_id: AccountId,
    /// Mailbox name (full path).
    pub name: String,
    /// Mailbox role.
    pub kind: MailboxKind,
    /// Highest UID the user has already seen. Newer unread mail is "new".
    pub last_seen_uid: u32,
}

impl Mailbox {
    /// Create an unsaved mailbox, detecting its kind from the name.
    #[must_use]
    pub fn new(account_id: AccountId, name: &str) -> Self {
        Self {
            id: None,
            account_id,
            name: name.to_string(),
            kind: MailboxKind::from_name(name),
            last_seen_uid: 0,
        }
    }
}

/// A message arriving in a mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    /// Message UID within the mailbox.
    pub uid: u32,
    /// Sender as displayed.
    pub from: String,
    /// Subject line.
    pub subject: String,
    /// When the message was received.
    pub received_at: DateTime<Utc>,
}

/// Sender and subject of the most recent new message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePreview {
    /// Sender as displayed.
    pub from: String,
    /// Subject line.
    pub subject: String,
}

/// Current inbox state of one account, used to build a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboxSummary {
    /// The account.
    pub account: Account,
    /// Unread messages in the inbox.
    pub unread: u32,
    /// Unread messages the user has not seen yet.
    pub new_messages: u32,
    /// Most recent new message, if any.
    pub latest: Option<MessagePreview>,
}
