//! Models describing resolved users and their device settings.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::types::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
/// User profile resolved from an access token.
pub struct UserRecord {
    pub id: UserId,
    pub email: String,
    pub display_name: String,
}
