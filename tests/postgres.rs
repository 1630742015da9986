//! Postgres Store Tests
//!
//! Run against TEST_DATABASE_URL; skipped when it is unset.

mod common;

use std::time::Duration;

use futures::future::join_all;
use uuid::Uuid;

use followgraph::app::error::FollowError;
use followgraph::app::transitions::FollowAction;
use followgraph::domain::social_graph::FollowStatus;
use followgraph::domain::user::PrivacyStatus;
use followgraph::infra::store::{pair_lock_key, PgRelationshipStore, RelationshipStore};

async fn seed(store: &PgRelationshipStore, privacy: PrivacyStatus) -> Uuid {
    let id = Uuid::new_v4();
    store.upsert_user(id, privacy).await.expect("upsert_user failed");
    id
}

async fn counts(store: &PgRelationshipStore, id: Uuid) -> (i64, i64) {
    let user = store.user(id).await.unwrap().expect("user missing");
    (user.follower_count, user.followed_count)
}

async fn live_counts(store: &PgRelationshipStore, id: Uuid) -> (i64, i64) {
    let followers = store
        .list_by_followed(id, FollowStatus::Following, None, 1000)
        .await
        .unwrap();
    let followed = store
        .list_by_follower(id, FollowStatus::Following, None, 1000)
        .await
        .unwrap();
    (followers.len() as i64, followed.len() as i64)
}

/// Holds the pair's advisory lock from an outside transaction.
async fn block_pair(
    pool: &sqlx::PgPool,
    follower_id: Uuid,
    followed_id: Uuid,
) -> sqlx::Transaction<'static, sqlx::Postgres> {
    let mut tx = pool.begin().await.unwrap();
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(pair_lock_key(follower_id, followed_id))
        .execute(&mut *tx)
        .await
        .unwrap();
    tx
}

// ===========================================================================
// Transitions and counts
// ===========================================================================

#[tokio::test]
async fn pg_transitions_move_counts() {
    let Some((store, _pool)) = common::pg_store(Duration::from_secs(2)).await else {
        return;
    };
    let us = seed(&store, PrivacyStatus::Public).await;
    let public = seed(&store, PrivacyStatus::Public).await;
    let private = seed(&store, PrivacyStatus::Private).await;

    let outcome = store.transition(FollowAction::Follow, us, public).await.unwrap();
    assert_eq!(outcome.transition.to, Some(FollowStatus::Following));
    assert_eq!(outcome.followed.follower_count, 1);
    assert_eq!(outcome.follower.followed_count, 1);

    let outcome = store.transition(FollowAction::Follow, us, private).await.unwrap();
    assert_eq!(outcome.transition.to, Some(FollowStatus::Requested));
    assert_eq!(counts(&store, private).await, (0, 0));

    // no-op follow leaves counts alone
    let outcome = store.transition(FollowAction::Follow, us, private).await.unwrap();
    assert!(outcome.transition.is_noop());

    store.transition(FollowAction::Accept, us, private).await.unwrap();
    assert_eq!(counts(&store, private).await, (1, 0));
    assert_eq!(counts(&store, us).await, (0, 2));

    store.transition(FollowAction::Deny, us, private).await.unwrap();
    assert_eq!(counts(&store, private).await, (0, 0));
    assert_eq!(
        store.get(us, private).await.unwrap().map(|rel| rel.status),
        Some(FollowStatus::Denied)
    );

    store.transition(FollowAction::Accept, us, private).await.unwrap();
    store.transition(FollowAction::Unfollow, us, private).await.unwrap();
    store.transition(FollowAction::Unfollow, us, public).await.unwrap();
    assert!(store.get(us, private).await.unwrap().is_none());
    assert_eq!(counts(&store, us).await, (0, 0));
    assert_eq!(counts(&store, public).await, (0, 0));
    assert_eq!(counts(&store, private).await, (0, 0));
}

#[tokio::test]
async fn pg_rejected_transitions_write_nothing() {
    let Some((store, _pool)) = common::pg_store(Duration::from_secs(2)).await else {
        return;
    };
    let us = seed(&store, PrivacyStatus::Public).await;
    let them = seed(&store, PrivacyStatus::Private).await;

    let err = store
        .transition(FollowAction::Follow, us, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, FollowError::Validation(_)));

    let err = store.transition(FollowAction::Unfollow, us, them).await.unwrap_err();
    assert!(matches!(err, FollowError::NotFound(_)));

    let err = store.transition(FollowAction::Accept, us, them).await.unwrap_err();
    assert!(matches!(err, FollowError::NotFound(_)));

    assert!(store.get(us, them).await.unwrap().is_none());
    assert_eq!(counts(&store, us).await, (0, 0));
    assert_eq!(counts(&store, them).await, (0, 0));
}

#[tokio::test]
async fn pg_concurrent_transitions_keep_counts_consistent() {
    let Some((store, _pool)) = common::pg_store(Duration::from_secs(5)).await else {
        return;
    };
    let hub = seed(&store, PrivacyStatus::Private).await;
    let mut spokes = Vec::new();
    for _ in 0..6 {
        spokes.push(seed(&store, PrivacyStatus::Public).await);
    }

    let mut tasks = Vec::new();
    for (i, spoke) in spokes.iter().copied().enumerate() {
        for round in 0..8 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                let (action, follower, followed) = match (i + round) % 4 {
                    0 => (FollowAction::Follow, spoke, hub),
                    1 => (FollowAction::Accept, spoke, hub),
                    2 => (FollowAction::Follow, hub, spoke),
                    _ => (FollowAction::Unfollow, hub, spoke),
                };
                store.transition(action, follower, followed).await
            }));
        }
    }

    for result in join_all(tasks).await {
        match result.unwrap() {
            Ok(_) | Err(FollowError::NotFound(_)) => {}
            Err(err) => assert!(err.is_retryable(), "unexpected error: {}", err),
        }
    }

    assert_eq!(counts(&store, hub).await, live_counts(&store, hub).await);
    for spoke in &spokes {
        assert_eq!(counts(&store, *spoke).await, live_counts(&store, *spoke).await);
    }
}

// ===========================================================================
// Locking
// ===========================================================================

#[tokio::test]
async fn pg_lock_timeout_is_a_conflict() {
    let Some((store, pool)) = common::pg_store(Duration::from_millis(100)).await else {
        return;
    };
    let us = seed(&store, PrivacyStatus::Public).await;
    let them = seed(&store, PrivacyStatus::Public).await;

    let blocker = block_pair(&pool, us, them).await;
    let err = store.transition(FollowAction::Follow, us, them).await.unwrap_err();
    assert!(matches!(err, FollowError::Conflict(_)));
    assert!(store.get(us, them).await.unwrap().is_none());
    assert_eq!(counts(&store, them).await, (0, 0));

    blocker.rollback().await.unwrap();
    let outcome = store.transition(FollowAction::Follow, us, them).await.unwrap();
    assert_eq!(outcome.followed.follower_count, 1);
}

#[tokio::test]
async fn pg_blocked_writer_that_commits_last_is_listed_first() {
    let Some((store, pool)) = common::pg_store(Duration::from_secs(5)).await else {
        return;
    };
    let us = seed(&store, PrivacyStatus::Public).await;
    let first = seed(&store, PrivacyStatus::Public).await;
    let second = seed(&store, PrivacyStatus::Public).await;

    // us -> first starts first but waits on the pair lock.
    let blocker = block_pair(&pool, us, first).await;
    let pending = {
        let store = store.clone();
        tokio::spawn(async move { store.transition(FollowAction::Follow, us, first).await })
    };
    tokio::time::sleep(Duration::from_millis(200)).await;

    // us -> second starts later and commits while the other is still waiting.
    store.transition(FollowAction::Follow, us, second).await.unwrap();
    assert!(!pending.is_finished());

    blocker.rollback().await.unwrap();
    pending.await.unwrap().unwrap();

    let edges = store
        .list_by_follower(us, FollowStatus::Following, None, 10)
        .await
        .unwrap();
    assert_eq!(
        edges.iter().map(|edge| edge.user_id).collect::<Vec<_>>(),
        vec![first, second]
    );
    assert!(edges[0].seq > edges[1].seq);
    assert!(edges[0].transitioned_at >= edges[1].transitioned_at);
}

// ===========================================================================
// Listing
// ===========================================================================

#[tokio::test]
async fn pg_listing_pages_by_seq() {
    let Some((store, _pool)) = common::pg_store(Duration::from_secs(2)).await else {
        return;
    };
    let us = seed(&store, PrivacyStatus::Public).await;
    let mut others = Vec::new();
    for _ in 0..5 {
        let other = seed(&store, PrivacyStatus::Public).await;
        store.transition(FollowAction::Follow, other, us).await.unwrap();
        others.push(other);
    }

    // re-transitioning moves an edge to the front
    store.transition(FollowAction::Unfollow, others[0], us).await.unwrap();
    store.transition(FollowAction::Follow, others[0], us).await.unwrap();

    let page = store
        .list_by_followed(us, FollowStatus::Following, None, 2)
        .await
        .unwrap();
    assert_eq!(
        page.iter().map(|edge| edge.user_id).collect::<Vec<_>>(),
        vec![others[0], others[4]]
    );

    let rest = store
        .list_by_followed(us, FollowStatus::Following, Some(page[1].seq), 10)
        .await
        .unwrap();
    assert_eq!(
        rest.iter().map(|edge| edge.user_id).collect::<Vec<_>>(),
        vec![others[3], others[2], others[1]]
    );

    let requested = store
        .list_by_followed(us, FollowStatus::Requested, None, 10)
        .await
        .unwrap();
    assert!(requested.is_empty());
}
