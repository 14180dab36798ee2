pub mod id;

pub use id::{EmptyUserId, UserId};
