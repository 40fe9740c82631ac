//! In-memory membership directory.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use pantry_core::{GroupId, Member, MembershipDirectory, StoreError, StoreResult, UserId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// `HashMap`-backed [`MembershipDirectory`].
///
/// # Example
///
/// ```
/// use pantry_testing::InMemoryDirectory;
/// use pantry_core::{GroupId, MembershipDirectory};
///
/// # tokio_test::block_on(async {
/// let directory = InMemoryDirectory::new();
/// let ada = directory.add_member(GroupId::new(), "Ada");
///
/// let found = directory.member(ada.user_id).await.unwrap();
/// assert_eq!(found, Some(ada));
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    members: Arc<RwLock<HashMap<UserId, Member>>>,
    fail_lookups: Arc<AtomicBool>,
}

impl InMemoryDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new user in `group_id`.
    pub fn add_member(&self, group_id: GroupId, display_name: &str) -> Member {
        let member = Member {
            user_id: UserId::new(),
            group_id,
            display_name: display_name.to_string(),
        };
        self.insert(member.clone());
        member
    }

    /// Insert or replace a membership record.
    pub fn insert(&self, member: Member) {
        self.members.write().unwrap().insert(member.user_id, member);
    }

    /// Remove a user, as if they left the group.
    pub fn remove(&self, user_id: UserId) {
        self.members.write().unwrap().remove(&user_id);
    }

    /// Make every lookup fail.
    pub fn fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }
}

impl MembershipDirectory for InMemoryDirectory {
    async fn member(&self, user_id: UserId) -> StoreResult<Option<Member>> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(StoreError::Database("injected directory failure".to_string()));
        }
        Ok(self.members.read().unwrap().get(&user_id).cloned())
    }
}
