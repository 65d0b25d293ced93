//! Account model types.

use serde::{Deserialize, Serialize};

use crate::policy::{ProviderTable, VendorPolicy};

/// Unique identifier for an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(pub i64);

impl AccountId {
    /// Create a new account ID.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Email account as seen by the notifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier (None for unsaved accounts).
    pub id: Option<AccountId>,
    /// Display name for the account.
    pub name: String,
    /// Email address.
    pub email: String,
    /// IMAP server hostname, if known.
    pub imap_host: String,
    /// Whether new mail in this account raises notifications.
    pub notify_new_mail: bool,
    /// Whether this is the default account.
    pub is_default: bool,
}

impl Default for Account {
    fn default() -> Self {
        Self {
            id: None,
            name: String::new(),
            email: String::new(),
            imap_host: String::new(),
            notify_new_mail: true,
            is_default: false,
        }
    }
}

impl Account {
    /// Create a new empty account.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create account with defaults for well-known providers.
    #[must_use]
    pub fn with_email(email: &str) -> Self {
        Self::with_email_using(email, &crate::policy::NoVendorPolicy)
    }

    /// Create account, asking the vendor policy before the built-in provider table.
    #[must_use]
    pub fn with_email_using(email: &str, policy: &dyn VendorPolicy) -> Self {
        let mut account = Self {
            email: email.to_string(),
            ..Default::default()
        };

        if let Some(domain) = email.split('@').nth(1) {
            let domain = domain.to_lowercase();
            let provider = policy
                .find_provider(&domain)
                .or_else(|| ProviderTable::builtin().find_provider(&domain));

            match provider {
                Some(provider) => {
                    account.name = provider.name;
                    account.imap_host = provider.imap_host;
                }
                None => account.name = domain,
            }
        }

        account
    }

    /// Name to show to the user: the account name, or the email if unnamed.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.email
        } else {
            &self.name
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::policy::ProviderSettings;

    mod account_id_tests {
        use super::*;

        #[test]
        fn display() {
            let id = AccountId::new(123);
            assert_eq!(format!("{id}"), "123");
        }

        #[test]
        fn ordering_follows_raw_id() {
            assert!(AccountId::new(1) < AccountId::new(2));
        }
    }

    mod account_tests {
        use super::*;

        #[test]
        fn new_notifies_by_default() {
            let account = Account::new();
            assert!(account.id.is_none());
            assert!(account.notify_new_mail);
            assert!(!account.is_default);
        }

        #[test]
        fn with_email_gmail() {
            let account = Account::with_email("user@gmail.com");
            assert_eq!(account.name, "Gmail");
            assert_eq!(account.imap_host, "imap.gmail.com");
        }

        #[test]
        fn with_email_is_case_insensitive_on_domain() {
            let account = Account::with_email("user@Outlook.COM");
            assert_eq!(account.name, "Outlook");
            assert_eq!(account.email, "user@Outlook.COM");
        }

        #[test]
        fn with_email_unknown_domain() {
            let account = Account::with_email("user@example.org");
            assert_eq!(account.name, "example.org");
            assert!(account.imap_host.is_empty());
        }

        #[test]
        fn vendor_policy_wins_over_builtin() {
            let table = ProviderTable::new(vec![ProviderSettings {
                name: "Corporate Gmail".to_string(),
                domains: vec!["gmail.com".to_string()],
                imap_host: "imap.corp.example".to_string(),
                smtp_host: "smtp.corp.example".to_string(),
            }]);

            let account = Account::with_email_using("user@gmail.com", &table);
            assert_eq!(account.name, "Corporate Gmail");
            assert_eq!(account.imap_host, "imap.corp.example");
        }

        #[test]
        fn display_name_falls_back_to_email() {
            let account = Account {
                email: "who@example.com".to_string(),
                ..Default::default()
            };
            assert_eq!(account.display_name(), "who@example.com");
        }
    }
}
