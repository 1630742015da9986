use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{RelationshipStore, TransitionOutcome};
use crate::app::counts::CountUpdate;
use crate::app::error::{FollowError, FollowResult};
use crate::app::transitions::{missing_user, next_status, FollowAction};
use crate::domain::social_graph::{FollowStatus, ListCursor, Relationship, RelationshipEdge};
use crate::domain::user::{PrivacyStatus, UserRecord};
use crate::infra::locks::PairLocks;

/// Single-process store. The pair lock serializes transitions on one edge;
/// the state lock is only held for the final write so other pairs keep moving
/// and readers never see half a transition.
pub struct MemoryRelationshipStore {
    state: RwLock<GraphState>,
    locks: PairLocks,
    lock_timeout: Duration,
}

#[derive(Default)]
struct GraphState {
    users: HashMap<Uuid, UserRecord>,
    relationships: HashMap<(Uuid, Uuid), Relationship>,
    by_follower: HashMap<Uuid, HashSet<Uuid>>,
    by_followed: HashMap<Uuid, HashSet<Uuid>>,
    next_seq: i64,
}

impl GraphState {
    fn user(&self, user_id: Uuid) -> FollowResult<UserRecord> {
        self.users
            .get(&user_id)
            .cloned()
            .ok_or_else(|| FollowError::not_found("user not found"))
    }

    fn put(&mut self, relationship: Relationship) {
        let (follower_id, followed_id) = (relationship.follower_id, relationship.followed_id);
        self.by_follower.entry(follower_id).or_default().insert(followed_id);
        self.by_followed.entry(followed_id).or_default().insert(follower_id);
        self.relationships.insert((follower_id, followed_id), relationship);
    }

    fn delete(&mut self, follower_id: Uuid, followed_id: Uuid) {
        self.relationships.remove(&(follower_id, followed_id));
        unindex(&mut self.by_follower, follower_id, followed_id);
        unindex(&mut self.by_followed, followed_id, follower_id);
    }

    fn bump_seq(&mut self) -> i64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn edges(
        &self,
        user_id: Uuid,
        outgoing: bool,
        status: FollowStatus,
        cursor: Option<ListCursor>,
        limit: i64,
    ) -> Vec<RelationshipEdge> {
        let index = if outgoing { &self.by_follower } else { &self.by_followed };
        let Some(others) = index.get(&user_id) else {
            return Vec::new();
        };

        let mut edges: Vec<RelationshipEdge> = others
            .iter()
            .filter_map(|other| {
                let key = if outgoing { (user_id, *other) } else { (*other, user_id) };
                self.relationships.get(&key)
            })
            .filter(|rel| rel.status == status)
            .map(|rel| RelationshipEdge {
                user_id: if outgoing { rel.followed_id } else { rel.follower_id },
                status: rel.status,
                transitioned_at: rel.last_transition_at,
                seq: rel.seq,
            })
            .filter(|edge| cursor.map_or(true, |seq| edge.seq < seq))
            .collect();

        edges.sort_by(|a, b| b.seq.cmp(&a.seq));
        edges.truncate(usize::try_from(limit).unwrap_or(0));
        edges
    }
}

fn unindex(index: &mut HashMap<Uuid, HashSet<Uuid>>, key: Uuid, other: Uuid) {
    if let Some(ids) = index.get_mut(&key) {
        ids.remove(&other);
        if ids.is_empty() {
            index.remove(&key);
        }
    }
}

impl MemoryRelationshipStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            state: RwLock::new(GraphState::default()),
            locks: PairLocks::new(),
            lock_timeout,
        }
    }
}

#[async_trait]
impl RelationshipStore for MemoryRelationshipStore {
    async fn ping(&self) -> FollowResult<()> {
        Ok(())
    }

    async fn user(&self, user_id: Uuid) -> FollowResult<Option<UserRecord>> {
        Ok(self.state.read().await.users.get(&user_id).cloned())
    }

    async fn upsert_user(&self, user_id: Uuid, privacy: PrivacyStatus) -> FollowResult<UserRecord> {
        let mut state = self.state.write().await;
        let user = state
            .users
            .entry(user_id)
            .and_modify(|user| user.privacy_status = privacy)
            .or_insert_with(|| UserRecord::new(user_id, privacy));
        Ok(user.clone())
    }

    async fn get(&self, follower_id: Uuid, followed_id: Uuid) -> FollowResult<Option<Relationship>> {
        let state = self.state.read().await;
        Ok(state.relationships.get(&(follower_id, followed_id)).cloned())
    }

    async fn transition(
        &self,
        action: FollowAction,
        follower_id: Uuid,
        followed_id: Uuid,
    ) -> FollowResult<TransitionOutcome> {
        let _pair = self
            .locks
            .acquire(follower_id, followed_id, self.lock_timeout)
            .await?;

        let (current, followed_privacy) = {
            let state = self.state.read().await;
            if !state.users.contains_key(&follower_id) {
                return Err(missing_user(action));
            }
            let followed = state
                .users
                .get(&followed_id)
                .ok_or_else(|| missing_user(action))?;
            (
                state.relationships.get(&(follower_id, followed_id)).cloned(),
                followed.privacy_status,
            )
        };

        let transition = next_status(action, current.as_ref().map(|rel| rel.status), followed_privacy)?;

        let mut state = self.state.write().await;
        let mut follower = state.user(follower_id)?;
        let mut followed = state.user(followed_id)?;

        if transition.is_noop() {
            return Ok(TransitionOutcome {
                transition,
                relationship: current,
                follower,
                followed,
            });
        }

        if let Some(update) =
            CountUpdate::on_transition(follower_id, followed_id, transition.from, transition.to)
        {
            update.apply(&mut follower, &mut followed)?;
        }

        let relationship = match transition.to {
            Some(status) => {
                let now = OffsetDateTime::now_utc();
                let relationship = Relationship {
                    follower_id,
                    followed_id,
                    status,
                    created_at: current.as_ref().map_or(now, |rel| rel.created_at),
                    last_transition_at: now,
                    seq: state.bump_seq(),
                };
                state.put(relationship.clone());
                Some(relationship)
            }
            None => {
                state.delete(follower_id, followed_id);
                None
            }
        };

        state.users.insert(follower_id, follower.clone());
        state.users.insert(followed_id, followed.clone());

        Ok(TransitionOutcome {
            transition,
            relationship,
            follower,
            followed,
        })
    }

    async fn list_by_follower(
        &self,
        follower_id: Uuid,
        status: FollowStatus,
        cursor: Option<ListCursor>,
        limit: i64,
    ) -> FollowResult<Vec<RelationshipEdge>> {
        let state = self.state.read().await;
        Ok(state.edges(follower_id, true, status, cursor, limit))
    }

    async fn list_by_followed(
        &self,
        followed_id: Uuid,
        status: FollowStatus,
        cursor: Option<ListCursor>,
        limit: i64,
    ) -> FollowResult<Vec<RelationshipEdge>> {
        let state = self.state.read().await;
        Ok(state.edges(followed_id, false, status, cursor, limit))
    }
}
