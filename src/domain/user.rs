use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrivacyStatus {
    Public,
    Private,
}

impl PrivacyStatus {
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "public" => Some(Self::Public),
            "private" => Some(Self::Private),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }
}

/// The slice of a user account this crate consumes. Account creation and
/// privacy settings live upstream; the two counters are written only by
/// relationship transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub privacy_status: PrivacyStatus,
    pub follower_count: i64,
    pub followed_count: i64,
}

impl UserRecord {
    pub fn new(id: Uuid, privacy_status: PrivacyStatus) -> Self {
        Self {
            id,
            privacy_status,
            follower_count: 0,
            followed_count: 0,
        }
    }

    pub fn is_private(&self) -> bool {
        self.privacy_status == PrivacyStatus::Private
    }
}
