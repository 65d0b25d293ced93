//! `MailNotify` - desktop new-mail notifier
//!
//! Watches the local mail store and keeps one desktop notification per
//! account in sync with its new messages.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod desktop;
mod settings;

use std::sync::Arc;

use anyhow::Context;
use mailnotify_core::policy::{self, VendorPolicy};
use mailnotify_core::{Database, NotificationRefresher, RefreshCoordinator, RefreshTarget};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use desktop::DesktopPresenter;
use settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailnotify=info,mailnotify_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting MailNotify");

    let settings = Settings::load().await.context("failed to load settings")?;
    let db = open_database(&settings).await?;

    let policy = policy::from_providers(settings.providers.clone());
    apply_vendor_defaults(&db, policy.as_ref()).await?;

    let refresher = NotificationRefresher::new(db.accounts(), db.mailboxes(), DesktopPresenter::new())
        .with_min_alert_interval(settings.min_alert_interval());
    let coordinator = RefreshCoordinator::start(
        Arc::new(db.clone()),
        Arc::new(refresher),
        settings.coordinator_config(),
    )
    .context("failed to start refresh coordinator")?;

    coordinator
        .watch(RefreshTarget::All)
        .context("failed to watch accounts")?;
    // Show whatever arrived while we were not running.
    coordinator.on_signal(RefreshTarget::All);

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    info!("Shutting down");
    coordinator.shutdown().await;
    Ok(())
}

/// Open the mail database, creating its directory if needed.
async fn open_database(settings: &Settings) -> anyhow::Result<Database> {
    let db_path = settings.database_path();

    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let path = db_path
        .to_str()
        .with_context(|| format!("database path {} is not valid UTF-8", db_path.display()))?;

    let db = Database::open(path)
        .await
        .with_context(|| format!("failed to open database {path}"))?;
    info!("Using database {path}");
    Ok(db)
}

/// Fill in server hosts the vendor policy knows for accounts that lack one.
async fn apply_vendor_defaults(db: &Database, policy: &dyn VendorPolicy) -> anyhow::Result<()> {
    let accounts = db.accounts();

    for mut account in accounts.list().await.context("failed to list accounts")? {
        if !account.imap_host.is_empty() {
            continue;
        }

        let Some(domain) = account.email.split('@').nth(1) else {
            continue;
        };
        let Some(provider) = policy.find_provider(domain) else {
            continue;
        };

        account.imap_host = provider.imap_host;
        accounts
            .save(&mut account)
            .await
            .with_context(|| format!("failed to update {}", account.email))?;
        info!("Set IMAP host of {} to {}", account.email, account.imap_host);
    }

    Ok(())
}
