//! New-mail notifications.
//!
//! - [`RefreshCoordinator`] debounces change signals
//! - [`Worker`] runs refresh work on one dedicated thread
//! - [`NotificationRefresher`] turns inbox state into notifications
//! - [`Presenter`] is the seam to the OS notification API

mod coordinator;
mod presenter;
mod refresher;
mod worker;

pub use coordinator::{CoordinatorConfig, DEFAULT_DEBOUNCE, RefreshCoordinator, RefreshTarget};
pub use presenter::{NewMailNotification, Presenter};
pub use refresher::{DEFAULT_MIN_ALERT_INTERVAL, NotificationRefresher, Refresher};
pub use worker::Worker;
