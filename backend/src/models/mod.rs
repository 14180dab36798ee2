//! Data models shared across storage, services and API handlers.

pub mod notification;
pub mod session;
pub mod user;

pub use notification::Notification;
pub use session::{ScheduleEntry, Session};
pub use user::UserRecord;
