//! Small helpers shared by the store, the notifier, and the daemon.

mod date;
mod file;
mod text;

pub use date::parse_internal_date;
pub use file::unique_file;
pub use text::{decode_percent, ellipsize, imap_quoted};
