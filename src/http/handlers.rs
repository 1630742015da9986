use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::follow::FollowOutcome;
use crate::domain::social_graph::{FollowStatus, FollowedStatus, ListCursor, RelationshipEdge};
use crate::domain::user::{PrivacyStatus, UserRecord};
use crate::http::{AppError, AuthUser};
use crate::AppState;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

#[derive(Deserialize)]
pub struct FollowListQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

#[derive(Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

fn parse_cursor(cursor: Option<String>) -> Result<Option<ListCursor>, AppError> {
    cursor
        .map(|value| {
            value
                .parse::<i64>()
                .ok()
                .filter(|seq| *seq > 0)
                .ok_or_else(|| AppError::bad_request("invalid cursor"))
        })
        .transpose()
}

fn parse_status_filter(status: Option<String>) -> Result<Option<FollowedStatus>, AppError> {
    status
        .map(|value| {
            FollowedStatus::parse(&value)
                .ok_or_else(|| AppError::bad_request(format!("invalid status: {}", value)))
        })
        .transpose()
}

fn parse_limit(limit: Option<i64>) -> Result<i64, AppError> {
    let limit = limit.unwrap_or(30);
    if !(1..=200).contains(&limit) {
        return Err(AppError::bad_request("limit must be between 1 and 200"));
    }
    Ok(limit)
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.store.ping().await.is_ok() {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse { status })
}

#[derive(Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub privacy_status: PrivacyStatus,
    pub follower_count: i64,
    pub followed_count: i64,
}

impl From<UserRecord> for UserSummary {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            privacy_status: user.privacy_status,
            follower_count: user.follower_count,
            followed_count: user.followed_count,
        }
    }
}

#[derive(Serialize)]
pub struct UserResponse {
    #[serde(flatten)]
    pub user: UserSummary,
    pub followed_status: FollowedStatus,
    pub follower_status: FollowedStatus,
}

pub async fn get_user(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UserResponse>, AppError> {
    let view = state.follows.user(auth.user_id, id).await?;

    Ok(Json(UserResponse {
        user: view.user.into(),
        followed_status: view.relationship.followed_status,
        follower_status: view.relationship.follower_status,
    }))
}

#[derive(Serialize)]
pub struct RelationshipResponse {
    pub followed_status: FollowedStatus,
    pub follower_status: FollowedStatus,
}

pub async fn relationship_status(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<RelationshipResponse>, AppError> {
    let view = state.follows.relationship(auth.user_id, id).await?;

    Ok(Json(RelationshipResponse {
        followed_status: view.followed_status,
        follower_status: view.follower_status,
    }))
}

/// Response to follow/unfollow: the target and the caller -> target status.
#[derive(Serialize)]
pub struct FollowResponse {
    pub user: UserSummary,
    pub followed_status: FollowedStatus,
}

impl From<FollowOutcome> for FollowResponse {
    fn from(outcome: FollowOutcome) -> Self {
        Self {
            user: outcome.user.into(),
            followed_status: outcome.status,
        }
    }
}

/// Response to accept/deny: the requester and the requester -> caller status.
#[derive(Serialize)]
pub struct FollowerResponse {
    pub user: UserSummary,
    pub follower_status: FollowedStatus,
}

impl From<FollowOutcome> for FollowerResponse {
    fn from(outcome: FollowOutcome) -> Self {
        Self {
            user: outcome.user.into(),
            follower_status: outcome.status,
        }
    }
}

pub async fn follow_user(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<FollowResponse>, AppError> {
    let outcome = state.follows.follow(auth.user_id, id).await?;
    Ok(Json(outcome.into()))
}

pub async fn unfollow_user(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<FollowResponse>, AppError> {
    let outcome = state.follows.unfollow(auth.user_id, id).await?;
    Ok(Json(outcome.into()))
}

pub async fn accept_follower(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<FollowerResponse>, AppError> {
    let outcome = state.follows.accept_follower(auth.user_id, id).await?;
    Ok(Json(outcome.into()))
}

pub async fn deny_follower(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<FollowerResponse>, AppError> {
    let outcome = state.follows.deny_follower(auth.user_id, id).await?;
    Ok(Json(outcome.into()))
}

#[derive(Serialize)]
pub struct FollowItem {
    pub user_id: Uuid,
    pub status: FollowStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub transitioned_at: OffsetDateTime,
}

fn page(mut edges: Vec<RelationshipEdge>, limit: i64) -> ListResponse<FollowItem> {
    let next_cursor = if edges.len() > limit as usize {
        edges.truncate(limit as usize);
        edges.last().map(|edge| edge.seq)
    } else {
        None
    };

    let items = edges
        .into_iter()
        .map(|edge| FollowItem {
            user_id: edge.user_id,
            status: edge.status,
            transitioned_at: edge.transitioned_at,
        })
        .collect();

    ListResponse {
        items,
        next_cursor: next_cursor.map(|seq| seq.to_string()),
    }
}

pub async fn list_followed(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<FollowListQuery>,
) -> Result<Json<ListResponse<FollowItem>>, AppError> {
    let limit = parse_limit(query.limit)?;
    let cursor = parse_cursor(query.cursor)?;
    let filter = parse_status_filter(query.status)?;

    let edges = state
        .follows
        .list_followed(auth.user_id, id, filter, cursor, limit + 1)
        .await?;

    Ok(Json(page(edges, limit)))
}

pub async fn list_followers(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<FollowListQuery>,
) -> Result<Json<ListResponse<FollowItem>>, AppError> {
    let limit = parse_limit(query.limit)?;
    let cursor = parse_cursor(query.cursor)?;
    let filter = parse_status_filter(query.status)?;

    let edges = state
        .follows
        .list_followers(auth.user_id, id, filter, cursor, limit + 1)
        .await?;

    Ok(Json(page(edges, limit)))
}
