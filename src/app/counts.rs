use uuid::Uuid;

use crate::app::error::{FollowError, FollowResult};
use crate::domain::social_graph::FollowStatus;
use crate::domain::user::UserRecord;

/// Counter change produced by one transition. `delta` is added to the followed
/// user's `follower_count` and to the follower's `followed_count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountUpdate {
    pub follower_id: Uuid,
    pub followed_id: Uuid,
    pub delta: i64,
}

impl CountUpdate {
    /// Only edges entering or leaving FOLLOWING move the counters.
    pub fn on_transition(
        follower_id: Uuid,
        followed_id: Uuid,
        old: Option<FollowStatus>,
        new: Option<FollowStatus>,
    ) -> Option<Self> {
        let was = old == Some(FollowStatus::Following);
        let is = new == Some(FollowStatus::Following);
        let delta = match (was, is) {
            (false, true) => 1,
            (true, false) => -1,
            _ => return None,
        };
        Some(Self {
            follower_id,
            followed_id,
            delta,
        })
    }

    /// Applies the update to in-memory copies of both users. Fails without
    /// touching either record if a counter would go negative.
    pub fn apply(&self, follower: &mut UserRecord, followed: &mut UserRecord) -> FollowResult<()> {
        let followed_count = follower.followed_count + self.delta;
        let follower_count = followed.follower_count + self.delta;
        if followed_count < 0 || follower_count < 0 {
            return Err(FollowError::Internal(anyhow::anyhow!(
                "follow counts for {} -> {} would go negative",
                self.follower_id,
                self.followed_id
            )));
        }
        follower.followed_count = followed_count;
        followed.follower_count = follower_count;
        Ok(())
    }
}
