//! # mailnotify-core
//!
//! Core logic for the `MailNotify` new-mail notifier.
//!
//! This crate provides:
//! - Account and mailbox storage (`SQLite`) with a change feed
//! - **Refresh Coordinator** - debounced, multi-source notification refresh
//! - Notification refresher and the presenter seam for OS notifications
//! - Messaging listener callbacks for sync engines
//! - Optional vendor policy capability
//! - Text, date, and file helpers

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod account;
pub mod change;
mod db;
mod error;
pub mod listener;
pub mod mailbox;
pub mod notification;
pub mod policy;
pub mod util;

pub use account::{Account, AccountId, AccountRepository};
pub use change::{ChangeEvent, ChangeFeed, ChangeSource};
pub use db::Database;
pub use error::{Error, Result};
pub use listener::{ListenerGroup, MessagingListener};
pub use mailbox::{InboxSummary, Mailbox, MailboxId, MailboxKind, MailboxRepository, MessagePreview, NewMessage};
pub use notification::{
    CoordinatorConfig, NewMailNotification, NotificationRefresher, Presenter, RefreshCoordinator,
    RefreshTarget, Refresher, Worker,
};
pub use policy::{NoVendorPolicy, ProviderSettings, ProviderTable, VendorPolicy};
