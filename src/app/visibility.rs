//! Listing authorization.
//!
//! Rules run in order and the first one with an opinion decides. Each rule is
//! a plain function of the request so the chain can be tested without a store.

use uuid::Uuid;

use crate::app::error::{FollowError, FollowResult};
use crate::domain::social_graph::{FollowStatus, FollowedStatus};
use crate::domain::user::PrivacyStatus;

#[derive(Debug, Clone, Copy, Default)]
pub struct VisibilityPolicy {
    /// When set, a PRIVATE user's FOLLOWING lists are visible only to the user
    /// and to viewers who currently follow them.
    pub private_lists_require_follow: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ListingRequest {
    pub viewer_id: Uuid,
    pub target_id: Uuid,
    pub target_privacy: PrivacyStatus,
    /// Viewer -> target edge. Only consulted by the private-list rule.
    pub viewer_status: FollowedStatus,
    pub filter: Option<FollowedStatus>,
}

impl ListingRequest {
    fn is_party(&self) -> bool {
        self.viewer_id == self.target_id
    }

    fn requested(&self) -> FollowedStatus {
        self.filter.unwrap_or(FollowedStatus::Following)
    }
}

type Decision = Option<FollowResult<FollowStatus>>;
type Rule = fn(&VisibilityPolicy, &ListingRequest) -> Decision;

const RULES: [Rule; 5] = [
    reject_unlistable,
    allow_own_lists,
    gate_private_lists,
    allow_following,
    deny_private_states,
];

/// Resolves the stored status a viewer may list for `request.target_id`.
pub fn authorize(policy: &VisibilityPolicy, request: &ListingRequest) -> FollowResult<FollowStatus> {
    RULES
        .iter()
        .find_map(|rule| rule(policy, request))
        .unwrap_or_else(|| Err(FollowError::authorization("listing not permitted")))
}

fn listable(status: FollowedStatus) -> Option<FollowStatus> {
    match status {
        FollowedStatus::Following => Some(FollowStatus::Following),
        FollowedStatus::Requested => Some(FollowStatus::Requested),
        FollowedStatus::Denied => Some(FollowStatus::Denied),
        FollowedStatus::NotFollowing | FollowedStatus::SelfStatus => None,
    }
}

fn reject_unlistable(_: &VisibilityPolicy, request: &ListingRequest) -> Decision {
    match listable(request.requested()) {
        Some(_) => None,
        None => Some(Err(FollowError::validation(
            "cannot list relationships by NOT_FOLLOWING or SELF",
        ))),
    }
}

fn allow_own_lists(_: &VisibilityPolicy, request: &ListingRequest) -> Decision {
    if request.is_party() {
        return listable(request.requested()).map(Ok);
    }
    None
}

fn gate_private_lists(policy: &VisibilityPolicy, request: &ListingRequest) -> Decision {
    if policy.private_lists_require_follow
        && request.target_privacy == PrivacyStatus::Private
        && request.viewer_status != FollowedStatus::Following
    {
        return Some(Err(FollowError::authorization(
            "user is private, follow them to see their relationships",
        )));
    }
    None
}

fn allow_following(_: &VisibilityPolicy, request: &ListingRequest) -> Decision {
    if request.requested() == FollowedStatus::Following {
        return Some(Ok(FollowStatus::Following));
    }
    None
}

fn deny_private_states(_: &VisibilityPolicy, request: &ListingRequest) -> Decision {
    match request.requested() {
        FollowedStatus::Requested | FollowedStatus::Denied => Some(Err(FollowError::authorization(
            "only the user may list their REQUESTED or DENIED relationships",
        ))),
        _ => None,
    }
}
