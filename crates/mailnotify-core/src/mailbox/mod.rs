//! Mailbox and message storage.
//!
//! Tracks per-mailbox unread state and the last UID the user has seen,
//! which together decide how many messages count as "new" for
//! notification purposes.

mod model;
mod repository;

pub use model::{InboxSummary, Mailbox, MailboxId, MailboxKind, MessagePreview, NewMessage};
pub use repository::MailboxRepository;
