//! Relationship storage.
//!
//! One record per (follower, followed) pair, indexed from both ends. Record
//! writes and the matching counter updates only happen inside
//! [`RelationshipStore::transition`], which is the atomic unit for every
//! mutation.

mod memory;
mod postgres;

pub use memory::MemoryRelationshipStore;
pub use postgres::{pair_lock_key, PgRelationshipStore};

use async_trait::async_trait;
use uuid::Uuid;

use crate::app::error::FollowResult;
use crate::app::transitions::{FollowAction, Transition};
use crate::domain::social_graph::{FollowStatus, ListCursor, Relationship, RelationshipEdge};
use crate::domain::user::{PrivacyStatus, UserRecord};

/// Result of a committed (or no-op) transition. Both user records carry the
/// counters as they stand after the commit.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub transition: Transition,
    pub relationship: Option<Relationship>,
    pub follower: UserRecord,
    pub followed: UserRecord,
}

#[async_trait]
pub trait RelationshipStore: Send + Sync {
    async fn ping(&self) -> FollowResult<()>;

    async fn user(&self, user_id: Uuid) -> FollowResult<Option<UserRecord>>;

    /// Registers a user or changes their privacy. Counters are left untouched.
    async fn upsert_user(&self, user_id: Uuid, privacy: PrivacyStatus) -> FollowResult<UserRecord>;

    async fn get(&self, follower_id: Uuid, followed_id: Uuid) -> FollowResult<Option<Relationship>>;

    /// Reads the pair, runs the state machine, writes or deletes the record and
    /// applies the count update, all or nothing. Same-pair calls serialize and
    /// give up with a conflict after the store's lock timeout.
    async fn transition(
        &self,
        action: FollowAction,
        follower_id: Uuid,
        followed_id: Uuid,
    ) -> FollowResult<TransitionOutcome>;

    /// Users `follower_id` has an edge to, most recent transition first.
    async fn list_by_follower(
        &self,
        follower_id: Uuid,
        status: FollowStatus,
        cursor: Option<ListCursor>,
        limit: i64,
    ) -> FollowResult<Vec<RelationshipEdge>>;

    /// Users with an edge to `followed_id`, most recent transition first.
    async fn list_by_followed(
        &self,
        followed_id: Uuid,
        status: FollowStatus,
        cursor: Option<ListCursor>,
        limit: i64,
    ) -> FollowResult<Vec<RelationshipEdge>>;
}
