//! Follow state machine.
//!
//! Pure functions only: stores call [`next_status`] while holding the pair's
//! lock, after reading the current record and the followed user's privacy.
//! `None` stands for NOT_FOLLOWING throughout, which is record absence.

use crate::app::error::{FollowError, FollowResult};
use crate::domain::social_graph::{FollowStatus, FollowedStatus};
use crate::domain::user::PrivacyStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowAction {
    /// Follower asks to follow the followed user.
    Follow,
    /// Follower drops the edge in whatever state it is in.
    Unfollow,
    /// Followed user accepts an inbound request.
    Accept,
    /// Followed user denies an inbound request or retracts an accepted one.
    Deny,
}

impl FollowAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Follow => "follow",
            Self::Unfollow => "unfollow",
            Self::Accept => "accept",
            Self::Deny => "deny",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Option<FollowStatus>,
    pub to: Option<FollowStatus>,
}

impl Transition {
    pub fn is_noop(&self) -> bool {
        self.from == self.to
    }

    pub fn status(&self) -> FollowedStatus {
        self.to.map_or(FollowedStatus::NotFollowing, Into::into)
    }
}

pub fn next_status(
    action: FollowAction,
    current: Option<FollowStatus>,
    followed_privacy: PrivacyStatus,
) -> FollowResult<Transition> {
    use FollowStatus::*;

    let to = match (action, current) {
        (FollowAction::Follow, None | Some(Denied)) => match followed_privacy {
            PrivacyStatus::Public => Some(Following),
            PrivacyStatus::Private => Some(Requested),
        },
        // Already following or waiting on the target: nothing to do.
        (FollowAction::Follow, Some(status @ (Following | Requested))) => Some(status),

        (FollowAction::Unfollow, Some(_)) => None,
        (FollowAction::Unfollow, None) => {
            return Err(FollowError::not_found("not following user"));
        }

        (FollowAction::Accept, Some(Requested | Denied)) => Some(Following),
        (FollowAction::Accept, Some(Following)) => Some(Following),
        (FollowAction::Accept, None) => {
            return Err(FollowError::not_found("no follow request from user"));
        }

        (FollowAction::Deny, Some(Requested | Following)) => Some(Denied),
        (FollowAction::Deny, Some(Denied)) => Some(Denied),
        (FollowAction::Deny, None) => {
            return Err(FollowError::not_found("no follow request from user"));
        }
    };

    Ok(Transition { from: current, to })
}

/// Error for a transition whose follower or followed account does not exist.
pub fn missing_user(action: FollowAction) -> FollowError {
    match action {
        FollowAction::Follow => FollowError::validation("user does not exist"),
        _ => FollowError::not_found("user not found"),
    }
}
