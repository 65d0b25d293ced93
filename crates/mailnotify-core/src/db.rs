//! Database handle shared by the repositories.

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tokio::sync::broadcast;

use crate::account::{AccountId, AccountRepository};
use crate::change::{ChangeEvent, ChangeFeed, ChangeSource};
use crate::mailbox::MailboxRepository;
use crate::Result;

/// Mail database: one connection pool and one change feed.
///
/// Repositories handed out by [`Database::accounts`] and
/// [`Database::mailboxes`] share the pool and publish on the same feed.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    changes: ChangeFeed,
}

impl Database {
    /// Open the database at the given path.
    ///
    /// Creates the database and tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn open(database_path: &str) -> Result<Self> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let db = Self {
            pool,
            changes: ChangeFeed::new(),
        };
        db.initialize().await?;
        Ok(db)
    }

    /// Create an in-memory database for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let db = Self {
            pool,
            changes: ChangeFeed::new(),
        };
        db.initialize().await?;
        Ok(db)
    }

    /// Initialize database schema.
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS accounts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                imap_host TEXT NOT NULL DEFAULT '',
                notify_new_mail INTEGER NOT NULL DEFAULT 1,
                is_default INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS mailboxes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                account_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                kind TEXT NOT NULL,
                last_seen_uid INTEGER NOT NULL DEFAULT 0,
                UNIQUE(account_id, name)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS messages (
                mailbox_id INTEGER NOT NULL REFERENCES mailboxes(id) ON DELETE CASCADE,
                uid INTEGER NOT NULL,
                from_address TEXT NOT NULL DEFAULT '',
                subject TEXT NOT NULL DEFAULT '',
                is_read INTEGER NOT NULL DEFAULT 0,
                received_at TEXT NOT NULL,
                PRIMARY KEY(mailbox_id, uid)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        // Create index for unread counting
        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_messages_unread ON messages(mailbox_id, is_read, uid)
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Account repository backed by this database.
    #[must_use]
    pub fn accounts(&self) -> AccountRepository {
        AccountRepository::new(self.pool.clone(), self.changes.clone())
    }

    /// Mailbox and message repository backed by this database.
    #[must_use]
    pub fn mailboxes(&self) -> MailboxRepository {
        MailboxRepository::new(self.pool.clone(), self.changes.clone())
    }

    /// The change feed written by this database's repositories.
    #[must_use]
    pub const fn changes(&self) -> &ChangeFeed {
        &self.changes
    }
}

impl ChangeSource for Database {
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }

    async fn account_ids(&self) -> Result<Vec<AccountId>> {
        self.accounts().ids().await
    }
}
