//! Group membership collaborator.
//!
//! Membership is owned by a separate system; the pantry only asks who a user
//! is and which group they belong to. Every mutating operation and every
//! group-scoped read resolves its actor here first.

use crate::error::{PantryError, Result, StoreResult};
use crate::types::{GroupId, UserId};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// A user's membership record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// The user
    pub user_id: UserId,
    /// The single group the user belongs to
    pub group_id: GroupId,
    /// Display name, copied into history entries
    pub display_name: String,
}

/// Lookup of users and their group.
pub trait MembershipDirectory: Send + Sync {
    /// Find the membership record of `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the directory cannot be queried.
    fn member(&self, user_id: UserId)
    -> impl Future<Output = StoreResult<Option<Member>>> + Send;
}

/// Resolve `user_id` or fail with `NotFound("user")`.
///
/// # Errors
///
/// - [`PantryError::NotFound`] if the user is unknown
/// - [`PantryError::Store`] if the directory fails
pub async fn require_member<D: MembershipDirectory>(directory: &D, user_id: UserId) -> Result<Member> {
    directory
        .member(user_id)
        .await?
        .ok_or_else(|| PantryError::not_found("user", user_id))
}

/// Resolve `user_id` and check that they belong to `group_id`.
///
/// # Errors
///
/// - [`PantryError::NotFound`] if the user is unknown
/// - [`PantryError::Forbidden`] if the user belongs to another group
/// - [`PantryError::Store`] if the directory fails
pub async fn require_group_member<D: MembershipDirectory>(
    directory: &D,
    user_id: UserId,
    group_id: GroupId,
) -> Result<Member> {
    let member = require_member(directory, user_id).await?;
    ensure_same_group(&member, group_id)?;
    Ok(member)
}

/// Check that `member` belongs to `group_id`.
///
/// # Errors
///
/// Returns [`PantryError::Forbidden`] otherwise.
pub fn ensure_same_group(member: &Member, group_id: GroupId) -> Result<()> {
    if member.group_id == group_id {
        Ok(())
    } else {
        tracing::debug!(
            user_id = %member.user_id,
            group_id = %group_id,
            "Actor is not a member of the target group"
        );
        Err(PantryError::Forbidden(
            "You are not a member of this group".to_string(),
        ))
    }
}
