//! Mailbox and message storage repository.

use sqlx::Row;
use sqlx::sqlite::SqlitePool;
use tracing::debug;

use super::model::{InboxSummary, Mailbox, MailboxId, MailboxKind, MessagePreview, NewMessage};
use crate::account::{AccountId, AccountRepository};
use crate::change::{ChangeEvent, ChangeFeed};
use crate::{Error, Result};

/// Repository for mailboxes and their messages.
///
/// Obtained from [`crate::Database::mailboxes`]. Every write publishes
/// [`ChangeEvent::Account`] for the owning account.
#[derive(Debug, Clone)]
pub struct MailboxRepository {
    pool: SqlitePool,
    changes: ChangeFeed,
    accounts: AccountRepository,
}

impl MailboxRepository {
    pub(crate) fn new(pool: SqlitePool, changes: ChangeFeed) -> Self {
        let accounts = AccountRepository::new(pool.clone(), changes.clone());
        Self {
            pool,
            changes,
            accounts,
        }
    }

    /// Save a mailbox (insert or update).
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn save(&self, mailbox: &mut Mailbox) -> Result<()> {
        if let Some(id) = mailbox.id {
            sqlx::query(
                r"
                UPDATE mailboxes SET name = ?, kind = ?, last_seen_uid = ?
                WHERE id = ?
                ",
            )
            .bind(&mailbox.name)
            .bind(mailbox.kind.as_str())
            .bind(mailbox.last_seen_uid)
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        } else {
            let result = sqlx::query(
                r"
                INSERT INTO mailboxes (account_id, name, kind, last_seen_uid)
                VALUES (?, ?, ?, ?)
                ",
            )
            .bind(mailbox.account_id.0)
            .bind(&mailbox.name)
            .bind(mailbox.kind.as_str())
            .bind(mailbox.last_seen_uid)
            .execute(&self.pool)
            .await?;

            mailbox.id = Some(MailboxId(result.last_insert_rowid()));
        }

        self.changes.publish(ChangeEvent::Account(mailbox.account_id));
        Ok(())
    }

    /// Get all mailboxes of an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_for_account(&self, account_id: AccountId) -> Result<Vec<Mailbox>> {
        let rows = sqlx::query(
            r"
            SELECT id, account_id, name, kind, last_seen_uid
            FROM mailboxes
            WHERE account_id = ?
            ORDER BY name ASC
            ",
        )
        .bind(account_id.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_mailbox).collect())
    }

    /// Get the inbox of an account, if it has one.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn inbox(&self, account_id: AccountId) -> Result<Option<Mailbox>> {
        let row = sqlx::query(
            r"
            SELECT id, account_id, name, kind, last_seen_uid
            FROM mailboxes
            WHERE account_id = ? AND kind = ?
            ORDER BY id ASC
            LIMIT 1
            ",
        )
        .bind(account_id.0)
        .bind(MailboxKind::Inbox.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_mailbox))
    }

    /// Store a message in a mailbox. Re-adding a known UID updates it.
    ///
    /// # Errors
    ///
    /// Returns an error if the mailbox doesn't exist or the query fails.
    pub async fn add_message(&self, mailbox_id: MailboxId, message: &NewMessage) -> Result<()> {
        let account_id = self.owner_of(mailbox_id).await?;

        sqlx::query(
            r"
            INSERT INTO messages (mailbox_id, uid, from_address, subject, is_read, received_at)
            VALUES (?, ?, ?, ?, 0, ?)
            ON CONFLICT(mailbox_id, uid) DO UPDATE SET
                from_address = excluded.from_address,
                subject = excluded.subject,
                received_at = excluded.received_at
            ",
        )
        .bind(mailbox_id.0)
        .bind(message.uid)
        .bind(&message.from)
        .bind(&message.subject)
        .bind(message.received_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!("Stored message {} in mailbox {mailbox_id}", message.uid);
        self.changes.publish(ChangeEvent::Account(account_id));
        Ok(())
    }

    /// Mark a message as read.
    ///
    /// # Errors
    ///
    /// Returns an error if the mailbox doesn't exist or the query fails.
    pub async fn mark_read(&self, mailbox_id: MailboxId, uid: u32) -> Result<()> {
        let account_id = self.owner_of(mailbox_id).await?;

        sqlx::query("UPDATE messages SET is_read = 1 WHERE mailbox_id = ? AND uid = ?")
            .bind(mailbox_id.0)
            .bind(uid)
            .execute(&self.pool)
            .await?;

        self.changes.publish(ChangeEvent::Account(account_id));
        Ok(())
    }

    /// Record that the user has seen everything currently in the account's inbox.
    ///
    /// Unread messages stay unread but no longer count as new.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn mark_inbox_seen(&self, account_id: AccountId) -> Result<()> {
        let Some(inbox) = self.inbox(account_id).await? else {
            return Ok(());
        };
        let Some(inbox_id) = inbox.id else {
            return Ok(());
        };

        sqlx::query(
            r"
            UPDATE mailboxes
            SET last_seen_uid = MAX(last_seen_uid, COALESCE((SELECT MAX(uid) FROM messages WHERE mailbox_id = ?), 0))
            WHERE id = ?
            ",
        )
        .bind(inbox_id.0)
        .bind(inbox_id.0)
        .execute(&self.pool)
        .await?;

        self.changes.publish(ChangeEvent::Account(account_id));
        Ok(())
    }

    /// Summarize the account's inbox for notification purposes.
    ///
    /// Returns `None` if the account doesn't exist. An account without an
    /// inbox yields a summary with zero counts.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn inbox_summary(&self, account_id: AccountId) -> Result<Option<InboxSummary>> {
        let Some(account) = self.accounts.get(account_id).await? else {
            return Ok(None);
        };

        let Some(Mailbox {
            id: Some(inbox_id),
            last_seen_uid,
            ..
        }) = self.inbox(account_id).await?
        else {
            return Ok(Some(InboxSummary {
                account,
                unread: 0,
                new_messages: 0,
                latest: None,
            }));
        };

        let counts = sqlx::query(
            r"
            SELECT
                COUNT(*) AS unread,
                COALESCE(SUM(CASE WHEN uid > ? THEN 1 ELSE 0 END), 0) AS new_messages
            FROM messages
            WHERE mailbox_id = ? AND is_read = 0
            ",
        )
        .bind(last_seen_uid)
        .bind(inbox_id.0)
        .fetch_one(&self.pool)
        .await?;

        let latest = sqlx::query(
            r"
            SELECT from_address, subject
            FROM messages
            WHERE mailbox_id = ? AND is_read = 0 AND uid > ?
            ORDER BY uid DESC
            LIMIT 1
            ",
        )
        .bind(inbox_id.0)
        .bind(last_seen_uid)
        .fetch_optional(&self.pool)
        .await?
        .map(|row| MessagePreview {
            from: row.get("from_address"),
            subject: row.get("subject"),
        });

        Ok(Some(InboxSummary {
            account,
            unread: count(counts.get("unread")),
            new_messages: count(counts.get("new_messages")),
            latest,
        }))
    }

    /// Look up the account owning a mailbox.
    async fn owner_of(&self, mailbox_id: MailboxId) -> Result<AccountId> {
        let row = sqlx::query("SELECT account_id FROM mailboxes WHERE id = ?")
            .bind(mailbox_id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| AccountId::new(row.get("account_id")))
            .ok_or_else(|| Error::MailboxNotFound(mailbox_id.to_string()))
    }
}

fn row_to_mailbox(row: &sqlx::sqlite::SqliteRow) -> Mailbox {
    Mailbox {
        id: Some(MailboxId(row.get("id"))),
        account_id: AccountId::new(row.get("account_id")),
        name: row.get("name"),
        kind: MailboxKind::parse(row.get("kind")),
        last_seen_uid: row.get::<u32, _>("last_seen_uid"),
    }
}

fn count(value: i64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
