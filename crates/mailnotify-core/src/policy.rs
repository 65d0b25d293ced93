//! Optional vendor policy capability.
//!
//! A distribution can ship provider defaults that differ from the built-in
//! ones. The policy is resolved once at startup from configuration; without
//! one, [`NoVendorPolicy`] answers nothing and callers fall back to their
//! own defaults.

use serde::{Deserialize, Serialize};
use tracing::info;

/// Server settings for a mail provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Provider display name, used as the account name.
    pub name: String,
    /// Email domains served by this provider (lowercase).
    pub domains: Vec<String>,
    /// IMAP server hostname.
    pub imap_host: String,
    /// SMTP server hostname.
    pub smtp_host: String,
}

/// Vendor-specific overrides. Every method has a "no opinion" default.
pub trait VendorPolicy: Send + Sync {
    /// Provider settings for an email domain.
    fn find_provider(&self, _domain: &str) -> Option<ProviderSettings> {
        None
    }
}

/// Policy used when no vendor policy is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoVendorPolicy;

impl VendorPolicy for NoVendorPolicy {}

/// Policy backed by a static provider list.
#[derive(Debug, Clone, Default)]
pub struct ProviderTable {
    providers: Vec<ProviderSettings>,
}

impl ProviderTable {
    /// Create a table from a provider list.
    #[must_use]
    pub const fn new(providers: Vec<ProviderSettings>) -> Self {
        Self { providers }
    }

    /// Providers every installation knows about.
    #[must_use]
    pub fn builtin() -> Self {
        fn provider(name: &str, domains: &[&str], imap_host: &str, smtp_host: &str) -> ProviderSettings {
            ProviderSettings {
                name: name.to_string(),
                domains: domains.iter().map(ToString::to_string).collect(),
                imap_host: imap_host.to_string(),
                smtp_host: smtp_host.to_string(),
            }
        }

        Self::new(vec![
            provider(
                "Gmail",
                &["gmail.com", "googlemail.com"],
                "imap.gmail.com",
                "smtp.gmail.com",
            ),
            provider(
                "Outlook",
                &["outlook.com", "hotmail.com", "live.com"],
                "outlook.office365.com",
                "smtp.office365.com",
            ),
            provider(
                "Yahoo",
                &["yahoo.com", "ymail.com"],
                "imap.mail.yahoo.com",
                "smtp.mail.yahoo.com",
            ),
            provider(
                "iCloud",
                &["icloud.com", "me.com", "mac.com"],
                "imap.mail.me.com",
                "smtp.mail.me.com",
            ),
        ])
    }
}

impl VendorPolicy for ProviderTable {
    fn find_provider(&self, domain: &str) -> Option<ProviderSettings> {
        self.providers
            .iter()
            .find(|p| p.domains.iter().any(|d| d.eq_ignore_ascii_case(domain)))
            .cloned()
    }
}

/// Resolve the vendor policy from configured providers.
///
/// An empty provider list means "no vendor policy".
#[must_use]
pub fn from_providers(providers: Vec<ProviderSettings>) -> Box<dyn VendorPolicy> {
    if providers.is_empty() {
        return Box::new(NoVendorPolicy);
    }

    info!("Using vendor policy with {} provider(s)", providers.len());
    Box::new(ProviderTable::new(providers))
}
