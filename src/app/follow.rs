use std::sync::Arc;

use uuid::Uuid;

use crate::app::error::{FollowError, FollowResult};
use crate::app::transitions::FollowAction;
use crate::app::visibility::{self, ListingRequest, VisibilityPolicy};
use crate::domain::social_graph::{FollowStatus, FollowedStatus, ListCursor, RelationshipEdge};
use crate::domain::user::UserRecord;
use crate::infra::store::{RelationshipStore, TransitionOutcome};

#[derive(Clone)]
pub struct FollowService {
    store: Arc<dyn RelationshipStore>,
    policy: VisibilityPolicy,
}

/// Result of a follow mutation: the other party, with counters as committed,
/// and the edge status after the transition.
#[derive(Debug, Clone)]
pub struct FollowOutcome {
    pub user: UserRecord,
    pub status: FollowedStatus,
}

/// Both directions of the edge between a viewer and another user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationshipView {
    /// viewer -> other
    pub followed_status: FollowedStatus,
    /// other -> viewer
    pub follower_status: FollowedStatus,
}

#[derive(Debug, Clone)]
pub struct UserView {
    pub user: UserRecord,
    pub relationship: RelationshipView,
}

impl FollowService {
    pub fn new(store: Arc<dyn RelationshipStore>, policy: VisibilityPolicy) -> Self {
        Self { store, policy }
    }

    pub async fn follow(&self, caller_id: Uuid, target_id: Uuid) -> FollowResult<FollowOutcome> {
        if caller_id == target_id {
            return Err(FollowError::validation("cannot follow yourself"));
        }
        let outcome = self.apply(FollowAction::Follow, caller_id, target_id).await?;
        Ok(FollowOutcome {
            status: outcome.transition.status(),
            user: outcome.followed,
        })
    }

    pub async fn unfollow(&self, caller_id: Uuid, target_id: Uuid) -> FollowResult<FollowOutcome> {
        if caller_id == target_id {
            return Err(FollowError::validation("cannot unfollow yourself"));
        }
        let outcome = self.apply(FollowAction::Unfollow, caller_id, target_id).await?;
        Ok(FollowOutcome {
            status: outcome.transition.status(),
            user: outcome.followed,
        })
    }

    /// The caller is the followed party acting on `requester_id`'s edge.
    pub async fn accept_follower(
        &self,
        caller_id: Uuid,
        requester_id: Uuid,
    ) -> FollowResult<FollowOutcome> {
        if caller_id == requester_id {
            return Err(FollowError::validation("cannot accept yourself as a follower"));
        }
        let outcome = self.apply(FollowAction::Accept, requester_id, caller_id).await?;
        Ok(FollowOutcome {
            status: outcome.transition.status(),
            user: outcome.follower,
        })
    }

    /// Denies a pending request, or retracts an accepted one.
    pub async fn deny_follower(
        &self,
        caller_id: Uuid,
        requester_id: Uuid,
    ) -> FollowResult<FollowOutcome> {
        if caller_id == requester_id {
            return Err(FollowError::validation("cannot deny yourself as a follower"));
        }
        let outcome = self.apply(FollowAction::Deny, requester_id, caller_id).await?;
        Ok(FollowOutcome {
            status: outcome.transition.status(),
            user: outcome.follower,
        })
    }

    pub async fn list_followed(
        &self,
        viewer_id: Uuid,
        user_id: Uuid,
        filter: Option<FollowedStatus>,
        cursor: Option<ListCursor>,
        limit: i64,
    ) -> FollowResult<Vec<RelationshipEdge>> {
        let status = self.authorize_listing(viewer_id, user_id, filter).await?;
        self.store.list_by_follower(user_id, status, cursor, limit).await
    }

    pub async fn list_followers(
        &self,
        viewer_id: Uuid,
        user_id: Uuid,
        filter: Option<FollowedStatus>,
        cursor: Option<ListCursor>,
        limit: i64,
    ) -> FollowResult<Vec<RelationshipEdge>> {
        let status = self.authorize_listing(viewer_id, user_id, filter).await?;
        self.store.list_by_followed(user_id, status, cursor, limit).await
    }

    pub async fn relationship(&self, viewer_id: Uuid, other_id: Uuid) -> FollowResult<RelationshipView> {
        if viewer_id == other_id {
            return Ok(RelationshipView {
                followed_status: FollowedStatus::SelfStatus,
                follower_status: FollowedStatus::SelfStatus,
            });
        }
        let followed = self.store.get(viewer_id, other_id).await?;
        let follower = self.store.get(other_id, viewer_id).await?;
        Ok(RelationshipView {
            followed_status: FollowedStatus::of(followed.as_ref()),
            follower_status: FollowedStatus::of(follower.as_ref()),
        })
    }

    /// Stored counters for `user_id` plus the edges between it and the viewer.
    pub async fn user(&self, viewer_id: Uuid, user_id: Uuid) -> FollowResult<UserView> {
        let user = self
            .store
            .user(user_id)
            .await?
            .ok_or_else(|| FollowError::not_found("user not found"))?;
        let relationship = self.relationship(viewer_id, user_id).await?;
        Ok(UserView { user, relationship })
    }

    async fn apply(
        &self,
        action: FollowAction,
        follower_id: Uuid,
        followed_id: Uuid,
    ) -> FollowResult<TransitionOutcome> {
        let outcome = match self.store.transition(action, follower_id, followed_id).await {
            Ok(outcome) => outcome,
            Err(err) if err.is_retryable() => {
                tracing::warn!(
                    action = action.as_str(),
                    %follower_id,
                    %followed_id,
                    error = %err,
                    "follow transition contended"
                );
                return Err(err);
            }
            Err(err) => return Err(err),
        };
        if !outcome.transition.is_noop() {
            tracing::info!(
                action = action.as_str(),
                %follower_id,
                %followed_id,
                from = ?outcome.transition.from,
                to = ?outcome.transition.to,
                "follow relationship transitioned"
            );
        }
        Ok(outcome)
    }

    async fn authorize_listing(
        &self,
        viewer_id: Uuid,
        user_id: Uuid,
        filter: Option<FollowedStatus>,
    ) -> FollowResult<FollowStatus> {
        let target = self
            .store
            .user(user_id)
            .await?
            .ok_or_else(|| FollowError::not_found("user not found"))?;

        let viewer_status = if viewer_id == user_id {
            FollowedStatus::SelfStatus
        } else if self.policy.private_lists_require_follow && target.is_private() {
            FollowedStatus::of(self.store.get(viewer_id, user_id).await?.as_ref())
        } else {
            FollowedStatus::NotFollowing
        };

        visibility::authorize(
            &self.policy,
            &ListingRequest {
                viewer_id,
                target_id: user_id,
                target_privacy: target.privacy_status,
                viewer_status,
                filter,
            },
        )
    }
}
