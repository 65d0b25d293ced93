//! Account management module.
//!
//! Provides account configuration and storage.

mod model;
mod repository;

pub use model::{Account, AccountId};
pub use repository::AccountRepository;
