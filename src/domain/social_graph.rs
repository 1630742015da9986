use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Stored state of a follow edge. `NotFollowing` is never stored: it is the
/// absence of a record, see [`FollowedStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FollowStatus {
    Requested,
    Following,
    Denied,
}

impl FollowStatus {
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "requested" => Some(Self::Requested),
            "following" => Some(Self::Following),
            "denied" => Some(Self::Denied),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Following => "following",
            Self::Denied => "denied",
        }
    }
}

/// Logical status of the edge between two users, as seen by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FollowedStatus {
    NotFollowing,
    Requested,
    Following,
    Denied,
    #[serde(rename = "SELF")]
    SelfStatus,
}

impl FollowedStatus {
    pub fn of(record: Option<&Relationship>) -> Self {
        record.map_or(Self::NotFollowing, |rel| rel.status.into())
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "NOT_FOLLOWING" => Some(Self::NotFollowing),
            "REQUESTED" => Some(Self::Requested),
            "FOLLOWING" => Some(Self::Following),
            "DENIED" => Some(Self::Denied),
            "SELF" => Some(Self::SelfStatus),
            _ => None,
        }
    }
}

impl From<FollowStatus> for FollowedStatus {
    fn from(status: FollowStatus) -> Self {
        match status {
            FollowStatus::Requested => Self::Requested,
            FollowStatus::Following => Self::Following,
            FollowStatus::Denied => Self::Denied,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub follower_id: Uuid,
    pub followed_id: Uuid,
    pub status: FollowStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_transition_at: OffsetDateTime,
    /// Transition sequence, taken while both users are locked. Listings order
    /// by it; `last_transition_at` is informational only.
    pub seq: i64,
}

/// One row of a follower/followed listing: the other party of the edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipEdge {
    pub user_id: Uuid,
    pub status: FollowStatus,
    pub transitioned_at: OffsetDateTime,
    pub seq: i64,
}

/// Listing position: the `seq` of the last row returned. Rows with a lower
/// `seq` come next.
pub type ListCursor = i64;
