//! Transaction management utilities for repositories.

use sqlx::postgres::PgTransaction;
use sqlx::PgPool;

use super::session_store::StoreError;

/// Begin a new database transaction.
///
/// On success, the transaction can be committed via [`commit_transaction`].
/// Dropping the handle without committing rolls it back.
pub async fn begin_transaction(db: &PgPool) -> Result<PgTransaction<'static>, StoreError> {
    db.begin().await.map_err(StoreError::from)
}

/// Commit all changes made within the transaction.
pub async fn commit_transaction(tx: PgTransaction<'_>) -> Result<(), StoreError> {
    tx.commit().await.map_err(StoreError::from)
}
