pub mod balancer;

pub use balancer::{Endpoint, HttpNotifier, Notification, Notifier, NotifyError};
