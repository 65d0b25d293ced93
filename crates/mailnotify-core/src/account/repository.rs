//! Account storage repository.

use sqlx::Row;
use sqlx::sqlite::SqlitePool;
use tracing::debug;

use super::model::{Account, AccountId};
use crate::Result;
use crate::change::{ChangeEvent, ChangeFeed};

/// Repository for account storage and retrieval.
///
/// Obtained from [`crate::Database::accounts`].
#[derive(Debug, Clone)]
pub struct AccountRepository {
    pool: SqlitePool,
    changes: ChangeFeed,
}

impl AccountRepository {
    pub(crate) const fn new(pool: SqlitePool, changes: ChangeFeed) -> Self {
        Self { pool, changes }
    }

    /// Get all accounts.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(&self) -> Result<Vec<Account>> {
        let rows = sqlx::query(
            r"
            SELECT id, name, email, imap_host, notify_new_mail, is_default
            FROM accounts
            ORDER BY is_default DESC, name ASC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_account).collect())
    }

    /// Get the IDs of all accounts.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn ids(&self) -> Result<Vec<AccountId>> {
        let rows = sqlx::query("SELECT id FROM accounts ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| AccountId::new(row.get("id")))
            .collect())
    }

    /// Get account by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get(&self, id: AccountId) -> Result<Option<Account>> {
        let row = sqlx::query(
            r"
            SELECT id, name, email, imap_host, notify_new_mail, is_default
            FROM accounts
            WHERE id = ?
            ",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_account))
    }

    /// Get the default account.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get_default(&self) -> Result<Option<Account>> {
        let row = sqlx::query(
            r"
            SELECT id, name, email, imap_host, notify_new_mail, is_default
            FROM accounts
            WHERE is_default = 1
            LIMIT 1
            ",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_account))
    }

    /// Save an account (insert or update).
    ///
    /// Inserting publishes [`ChangeEvent::AccountsChanged`]; updating
    /// publishes [`ChangeEvent::Account`].
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn save(&self, account: &mut Account) -> Result<()> {
        let event = if let Some(id) = account.id {
            sqlx::query(
                r"
                UPDATE accounts SET
                    name = ?, email = ?, imap_host = ?,
                    notify_new_mail = ?, is_default = ?,
                    updated_at = CURRENT_TIMESTAMP
                WHERE id = ?
                ",
            )
            .bind(&account.name)
            .bind(&account.email)
            .bind(&account.imap_host)
            .bind(account.notify_new_mail)
            .bind(account.is_default)
            .bind(id.0)
            .execute(&self.pool)
            .await?;

            ChangeEvent::Account(id)
        } else {
            let result = sqlx::query(
                r"
                INSERT INTO accounts (name, email, imap_host, notify_new_mail, is_default)
                VALUES (?, ?, ?, ?, ?)
                ",
            )
            .bind(&account.name)
            .bind(&account.email)
            .bind(&account.imap_host)
            .bind(account.notify_new_mail)
            .bind(account.is_default)
            .execute(&self.pool)
            .await?;

            let new_id = AccountId::new(result.last_insert_rowid());
            account.id = Some(new_id);
            debug!("Created account {new_id} ({})", account.email);

            ChangeEvent::AccountsChanged
        };

        // If this account is default, unset others
        if account.is_default
            && let Some(id) = account.id
        {
            sqlx::query("UPDATE accounts SET is_default = 0 WHERE id != ?")
                .bind(id.0)
                .execute(&self.pool)
                .await?;
        }

        self.changes.publish(event);
        Ok(())
    }

    /// Enable or disable new-mail notifications for an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn set_notify_new_mail(&self, id: AccountId, enabled: bool) -> Result<()> {
        sqlx::query(
            "UPDATE accounts SET notify_new_mail = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(enabled)
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        self.changes.publish(ChangeEvent::Account(id));
        Ok(())
    }

    /// Delete an account together with its mailboxes and messages.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn delete(&self, id: AccountId) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            DELETE FROM messages
            WHERE mailbox_id IN (SELECT id FROM mailboxes WHERE account_id = ?)
            ",
        )
        .bind(id.0)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM mailboxes WHERE account_id = ?")
            .bind(id.0)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM accounts WHERE id = ?")
            .bind(id.0)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!("Deleted account {id}");

        self.changes.publish(ChangeEvent::AccountsChanged);
        Ok(())
    }
}

/// Convert a database row to an Account.
pub(crate) fn row_to_account(row: &sqlx::sqlite::SqliteRow) -> Account {
    Account {
        id: Some(AccountId::new(row.get("id"))),
        name: row.get("name"),
        email: row.get("email"),
        imap_host: row.get("imap_host"),
        notify_new_mail: row.get::<i64, _>("notify_new_mail") != 0,
        is_default: row.get::<i64, _>("is_default") != 0,
    }
}
