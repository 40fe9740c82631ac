//! Membership lookups against the `group_members` table.
//!
//! The table is written by the membership service; this crate only reads it.

use pantry_core::{GroupId, Member, MembershipDirectory, StoreError, StoreResult, UserId};
use sqlx::PgPool;
use uuid::Uuid;

/// Read-only membership directory.
#[derive(Clone)]
pub struct PostgresMembershipDirectory {
    pool: PgPool,
}

impl PostgresMembershipDirectory {
    /// Create a directory over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl MembershipDirectory for PostgresMembershipDirectory {
    async fn member(&self, user_id: UserId) -> StoreResult<Option<Member>> {
        let row: Option<(Uuid, Uuid, String)> = sqlx::query_as(
            "SELECT user_id, group_id, display_name FROM group_members WHERE user_id = $1",
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to look up member: {e}")))?;

        Ok(row.map(|(user_id, group_id, display_name)| Member {
            user_id: UserId::from_uuid(user_id),
            group_id: GroupId::from_uuid(group_id),
            display_name,
        }))
    }
}
