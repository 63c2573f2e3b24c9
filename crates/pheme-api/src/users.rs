use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;

use pheme_db::models::UserRow;
use pheme_types::UserId;
use pheme_types::api::{Message, UserPublic};

use crate::error::{ApiError, join_error};
use crate::middleware::AuthUser;
use crate::phemes::parse_timestamp;
use crate::AppState;

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let row = tokio::task::spawn_blocking(move || db.db.get_user(id))
        .await
        .map_err(join_error)??
        .ok_or(ApiError::NotFound)?;

    Ok(Json(to_user_public(row)))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub name: String,
}

pub async fn search_users(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let rows = tokio::task::spawn_blocking(move || db.db.search_users(&query.name))
        .await
        .map_err(join_error)??;

    Ok(Json(rows.into_iter().map(to_user_public).collect::<Vec<_>>()))
}

pub async fn get_friends(
    State(state): State<AppState>,
    Extension(AuthUser(viewer)): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let ids = tokio::task::spawn_blocking(move || db.db.friend_ids(viewer))
        .await
        .map_err(join_error)??;

    Ok(Json(ids))
}

pub async fn get_followers(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let ids = tokio::task::spawn_blocking(move || db.db.follower_ids(id))
        .await
        .map_err(join_error)??;

    Ok(Json(ids))
}

pub async fn add_friend(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Extension(AuthUser(viewer)): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    check_edge_target(&state, viewer, id).await?;

    let db = state.clone();
    tokio::task::spawn_blocking(move || db.db.add_friend(viewer, id))
        .await
        .map_err(join_error)??;

    Ok(success())
}

pub async fn remove_friend(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Extension(AuthUser(viewer)): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    check_edge_target(&state, viewer, id).await?;

    // Removing an edge that was never there is a no-op, not an error.
    let db = state.clone();
    tokio::task::spawn_blocking(move || db.db.remove_friend(viewer, id))
        .await
        .map_err(join_error)??;

    Ok(success())
}

pub async fn add_follower(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Extension(AuthUser(viewer)): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    check_edge_target(&state, viewer, id).await?;

    let db = state.clone();
    tokio::task::spawn_blocking(move || db.db.add_follower(viewer, id))
        .await
        .map_err(join_error)??;

    Ok(success())
}

pub async fn remove_follower(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Extension(AuthUser(viewer)): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    check_edge_target(&state, viewer, id).await?;

    let db = state.clone();
    tokio::task::spawn_blocking(move || db.db.remove_follower(viewer, id))
        .await
        .map_err(join_error)??;

    Ok(success())
}

/// Shared guard for edge mutations: no self-edges, and the other user must
/// exist.
async fn check_edge_target(state: &AppState, viewer: UserId, other: UserId) -> Result<(), ApiError> {
    if viewer == other {
        return Err(ApiError::Validation(
            "user id and target id are the same".into(),
        ));
    }

    let db = state.clone();
    let user = tokio::task::spawn_blocking(move || db.db.get_user(other))
        .await
        .map_err(join_error)??;
    if user.is_none() {
        return Err(ApiError::NotFound);
    }

    Ok(())
}

fn success() -> Json<Message> {
    Json(Message {
        message: "Success".into(),
    })
}

fn to_user_public(row: UserRow) -> UserPublic {
    UserPublic {
        id: row.id,
        user_name: row.name,
        avatar: row.avatar,
        created_at: parse_timestamp(&row.created_at),
    }
}
