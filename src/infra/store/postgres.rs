use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Postgres, Row, Transaction};
use uuid::Uuid;

use super::{RelationshipStore, TransitionOutcome};
use crate::app::counts::CountUpdate;
use crate::app::error::{FollowError, FollowResult};
use crate::app::transitions::{missing_user, next_status, FollowAction};
use crate::domain::social_graph::{FollowStatus, ListCursor, Relationship, RelationshipEdge};
use crate::domain::user::{PrivacyStatus, UserRecord};
use crate::infra::db::Db;

const USER_COLUMNS: &str = "id, privacy_status, follower_count, followed_count";
const FOLLOW_COLUMNS: &str = "follower_id, followed_id, status, created_at, last_transition_at, seq";

/// Postgres-backed store. Each transition is one transaction holding a
/// transaction-scoped advisory lock on the pair, bounded by `lock_timeout`.
#[derive(Clone)]
pub struct PgRelationshipStore {
    db: Db,
    lock_timeout: Duration,
}

impl PgRelationshipStore {
    pub fn new(db: Db, lock_timeout: Duration) -> Self {
        Self { db, lock_timeout }
    }

    async fn lock_pair(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        follower_id: Uuid,
        followed_id: Uuid,
    ) -> FollowResult<()> {
        // SET cannot take bind parameters; the value is an integer we own.
        sqlx::query(&format!(
            "SET LOCAL lock_timeout = '{}ms'",
            self.lock_timeout.as_millis()
        ))
        .execute(&mut **tx)
        .await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(pair_lock_key(follower_id, followed_id))
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn put_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        follower_id: Uuid,
        followed_id: Uuid,
        status: FollowStatus,
    ) -> FollowResult<Relationship> {
        // Runs with both user rows locked, so for any one user seq follows
        // commit order. clock_timestamp(), not NOW(): the transaction may have
        // started long before the locks were granted.
        let row = sqlx::query(&format!(
            "INSERT INTO follows (follower_id, followed_id, status, created_at, last_transition_at) \
             VALUES ($1, $2, $3, clock_timestamp(), clock_timestamp()) \
             ON CONFLICT (follower_id, followed_id) DO UPDATE \
             SET status = EXCLUDED.status, \
                 last_transition_at = clock_timestamp(), \
                 seq = nextval('follow_transition_seq') \
             RETURNING {}",
            FOLLOW_COLUMNS
        ))
        .bind(follower_id)
        .bind(followed_id)
        .bind(status.as_db())
        .fetch_one(&mut **tx)
        .await?;

        relationship_from_row(&row)
    }

    async fn delete_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        follower_id: Uuid,
        followed_id: Uuid,
    ) -> FollowResult<()> {
        sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND followed_id = $2")
            .bind(follower_id)
            .bind(followed_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn apply_counts_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        update: CountUpdate,
    ) -> FollowResult<(UserRecord, UserRecord)> {
        let follower = sqlx::query(&format!(
            "UPDATE users SET followed_count = followed_count + $2 \
             WHERE id = $1 AND followed_count + $2 >= 0 \
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(update.follower_id)
        .bind(update.delta)
        .fetch_optional(&mut **tx)
        .await?;

        let followed = sqlx::query(&format!(
            "UPDATE users SET follower_count = follower_count + $2 \
             WHERE id = $1 AND follower_count + $2 >= 0 \
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(update.followed_id)
        .bind(update.delta)
        .fetch_optional(&mut **tx)
        .await?;

        match (follower, followed) {
            (Some(follower), Some(followed)) => Ok((user_from_row(&follower)?, user_from_row(&followed)?)),
            _ => Err(FollowError::Internal(anyhow!(
                "follow counts for {} -> {} would go negative",
                update.follower_id,
                update.followed_id
            ))),
        }
    }

    async fn list_edges(
        &self,
        owner_column: &str,
        other_column: &str,
        user_id: Uuid,
        status: FollowStatus,
        cursor: Option<ListCursor>,
        limit: i64,
    ) -> FollowResult<Vec<RelationshipEdge>> {
        let rows = match cursor {
            Some(seq) => {
                sqlx::query(&format!(
                    "SELECT {other} AS user_id, status, last_transition_at, seq \
                     FROM follows \
                     WHERE {owner} = $1 AND status = $2 AND seq < $3 \
                     ORDER BY seq DESC \
                     LIMIT $4",
                    other = other_column,
                    owner = owner_column,
                ))
                .bind(user_id)
                .bind(status.as_db())
                .bind(seq)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {other} AS user_id, status, last_transition_at, seq \
                     FROM follows \
                     WHERE {owner} = $1 AND status = $2 \
                     ORDER BY seq DESC \
                     LIMIT $3",
                    other = other_column,
                    owner = owner_column,
                ))
                .bind(user_id)
                .bind(status.as_db())
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
        };

        let mut edges = Vec::with_capacity(rows.len());
        for row in rows {
            edges.push(RelationshipEdge {
                user_id: row.try_get("user_id")?,
                status: parse_status(row.try_get("status")?)?,
                transitioned_at: row.try_get("last_transition_at")?,
                seq: row.try_get("seq")?,
            });
        }
        Ok(edges)
    }
}

#[async_trait]
impl RelationshipStore for PgRelationshipStore {
    async fn ping(&self) -> FollowResult<()> {
        self.db.ping().await.map_err(FollowError::Internal)
    }

    async fn user(&self, user_id: Uuid) -> FollowResult<Option<UserRecord>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn upsert_user(&self, user_id: Uuid, privacy: PrivacyStatus) -> FollowResult<UserRecord> {
        let row = sqlx::query(&format!(
            "INSERT INTO users (id, privacy_status) VALUES ($1, $2) \
             ON CONFLICT (id) DO UPDATE SET privacy_status = EXCLUDED.privacy_status \
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(privacy.as_db())
        .fetch_one(self.db.pool())
        .await?;

        user_from_row(&row)
    }

    async fn get(&self, follower_id: Uuid, followed_id: Uuid) -> FollowResult<Option<Relationship>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM follows WHERE follower_id = $1 AND followed_id = $2",
            FOLLOW_COLUMNS
        ))
        .bind(follower_id)
        .bind(followed_id)
        .fetch_optional(self.db.pool())
        .await?;

        row.as_ref().map(relationship_from_row).transpose()
    }

    async fn transition(
        &self,
        action: FollowAction,
        follower_id: Uuid,
        followed_id: Uuid,
    ) -> FollowResult<TransitionOutcome> {
        let mut tx = self.db.pool().begin().await?;
        self.lock_pair(&mut tx, follower_id, followed_id).await?;

        // Row locks in id order, so transitions on (a, b) and (b, a) cannot
        // deadlock on the counter updates below.
        let rows = sqlx::query(&format!(
            "SELECT {} FROM users WHERE id = ANY($1) ORDER BY id FOR UPDATE",
            USER_COLUMNS
        ))
        .bind(vec![follower_id, followed_id])
        .fetch_all(&mut *tx)
        .await?;
        let mut follower = None;
        let mut followed = None;
        for row in &rows {
            let user = user_from_row(row)?;
            if user.id == follower_id {
                follower = Some(user);
            } else {
                followed = Some(user);
            }
        }
        let (Some(mut follower), Some(mut followed)) = (follower, followed) else {
            return Err(missing_user(action));
        };

        let current = sqlx::query(&format!(
            "SELECT {} FROM follows WHERE follower_id = $1 AND followed_id = $2",
            FOLLOW_COLUMNS
        ))
        .bind(follower_id)
        .bind(followed_id)
        .fetch_optional(&mut *tx)
        .await?
        .as_ref()
        .map(relationship_from_row)
        .transpose()?;

        let transition = next_status(
            action,
            current.as_ref().map(|rel| rel.status),
            followed.privacy_status,
        )?;

        if transition.is_noop() {
            tx.commit().await?;
            return Ok(TransitionOutcome {
                transition,
                relationship: current,
                follower,
                followed,
            });
        }

        let relationship = match transition.to {
            Some(status) => Some(self.put_tx(&mut tx, follower_id, followed_id, status).await?),
            None => {
                self.delete_tx(&mut tx, follower_id, followed_id).await?;
                None
            }
        };

        if let Some(update) =
            CountUpdate::on_transition(follower_id, followed_id, transition.from, transition.to)
        {
            (follower, followed) = self.apply_counts_tx(&mut tx, update).await?;
        }

        tx.commit().await?;

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
        self.list_edges("follower_id", "followed_id", follower_id, status, cursor, limit)
            .await
    }

    async fn list_by_followed(
        &self,
        followed_id: Uuid,
        status: FollowStatus,
        cursor: Option<ListCursor>,
        limit: i64,
    ) -> FollowResult<Vec<RelationshipEdge>> {
        self.list_edges("followed_id", "follower_id", followed_id, status, cursor, limit)
            .await
    }
}

/// Advisory lock key serializing transitions on one (follower, followed) pair.
pub fn pair_lock_key(follower_id: Uuid, followed_id: Uuid) -> String {
    format!("follow:{}:{}", follower_id, followed_id)
}

fn parse_status(value: String) -> FollowResult<FollowStatus> {
    FollowStatus::from_db(&value)
        .ok_or_else(|| FollowError::Internal(anyhow!("unknown follow status {:?}", value)))
}

fn user_from_row(row: &PgRow) -> FollowResult<UserRecord> {
    let privacy: String = row.try_get("privacy_status")?;
    Ok(UserRecord {
        id: row.try_get("id")?,
        privacy_status: PrivacyStatus::from_db(&privacy)
            .ok_or_else(|| FollowError::Internal(anyhow!("unknown privacy status {:?}", privacy)))?,
        follower_count: row.try_get("follower_count")?,
        followed_count: row.try_get("followed_count")?,
    })
}

fn relationship_from_row(row: &PgRow) -> FollowResult<Relationship> {
    Ok(Relationship {
        follower_id: row.try_get("follower_id")?,
        followed_id: row.try_get("followed_id")?,
        status: parse_status(row.try_get("status")?)?,
        created_at: row.try_get("created_at")?,
        last_transition_at: row.try_get("last_transition_at")?,
        seq: row.try_get("seq")?,
    })
}
