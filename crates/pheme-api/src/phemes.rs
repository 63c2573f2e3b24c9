use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use tracing::warn;

use pheme_db::CreateOutcome;
use pheme_db::models::PhemeRow;
use pheme_types::UserId;
use pheme_types::api::{Pheme, PhemeId, PhemeParams};
use pheme_types::visibility::{ViewerRelation, Visibility, is_visible};

use crate::error::{ApiError, join_error};
use crate::middleware::AuthUser;
use crate::{AppState, feed};

/// The three-tier feed (own, friends, followers), assembled off the async
/// runtime.
pub async fn get_feed(
    State(state): State<AppState>,
    Extension(AuthUser(viewer)): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let rows = tokio::task::spawn_blocking(move || feed::assemble_feed(&db.db, viewer))
        .await
        .map_err(join_error)??;

    Ok(Json(rows.into_iter().map(to_pheme).collect::<Vec<_>>()))
}

pub async fn get_my_phemes(
    State(state): State<AppState>,
    Extension(AuthUser(viewer)): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let rows = tokio::task::spawn_blocking(move || {
        db.db.phemes_by_owner(viewer, ViewerRelation::Owner.floor())
    })
    .await
    .map_err(join_error)??;

    Ok(Json(rows.into_iter().map(to_pheme).collect::<Vec<_>>()))
}

/// Phemes on another user's profile. There is no relationship fan-out here:
/// the viewer is assumed a stranger, so the policy admits public phemes plus
/// anything the viewer authored or was targeted by.
pub async fn get_user_phemes(
    State(state): State<AppState>,
    Path(owner): Path<UserId>,
    Extension(AuthUser(viewer)): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let rows =
        tokio::task::spawn_blocking(move || db.db.phemes_by_owner(owner, Visibility::Private))
            .await
            .map_err(join_error)??;

    let relation = if viewer == owner {
        ViewerRelation::Owner
    } else {
        ViewerRelation::Stranger
    };
    let phemes: Vec<Pheme> = rows
        .into_iter()
        .map(to_pheme)
        .filter(|p| is_visible(viewer, p, relation))
        .collect();

    Ok(Json(phemes))
}

/// Single-pheme fetch is stricter than the feed on purpose: the pheme comes
/// back only when the viewer is both its author and its target profile.
pub async fn get_pheme(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(AuthUser(viewer)): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let row = tokio::task::spawn_blocking(move || db.db.get_pheme(id))
        .await
        .map_err(join_error)??
        .ok_or(ApiError::NotFound)?;

    if row.created_by != viewer || row.user_id != viewer {
        return Err(ApiError::NotFound);
    }

    Ok(Json(to_pheme(row)))
}

pub async fn create_pheme(
    State(state): State<AppState>,
    Extension(AuthUser(viewer)): Extension<AuthUser>,
    Json(params): Json<PhemeParams>,
) -> Result<impl IntoResponse, ApiError> {
    validate(&params)?;

    let db = state.clone();
    let outcome = tokio::task::spawn_blocking(move || db.db.create_pheme(viewer, &params))
        .await
        .map_err(join_error)??;

    match outcome {
        CreateOutcome::Created(id) => Ok((StatusCode::CREATED, Json(PhemeId { id }))),
        CreateOutcome::NotFriends => {
            Err(ApiError::Forbidden("cannot create phemes for non-friend users"))
        }
    }
}

pub async fn update_pheme(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(AuthUser(viewer)): Extension<AuthUser>,
    Json(params): Json<PhemeParams>,
) -> Result<impl IntoResponse, ApiError> {
    validate(&params)?;

    let db = state.clone();
    let row = tokio::task::spawn_blocking(move || db.db.update_pheme(id, viewer, &params))
        .await
        .map_err(join_error)??;

    Ok(Json(to_pheme(row)))
}

pub async fn delete_pheme(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(AuthUser(viewer)): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    tokio::task::spawn_blocking(move || db.db.delete_pheme(id, viewer))
        .await
        .map_err(join_error)??;

    Ok(Json(PhemeId { id }))
}

fn validate(params: &PhemeParams) -> Result<(), ApiError> {
    if params.category.trim().is_empty() {
        return Err(ApiError::Validation("category must not be empty".into()));
    }
    if params.text.trim().is_empty() {
        return Err(ApiError::Validation("text must not be empty".into()));
    }
    Ok(())
}

fn to_pheme(row: PhemeRow) -> Pheme {
    Pheme {
        id: row.id,
        version: row.version,
        created_at: parse_timestamp(&row.created_at),
        updated_at: row.updated_at.as_deref().map(parse_timestamp),
        visibility: Visibility::try_from(row.visibility).unwrap_or_else(|e| {
            warn!("Corrupt visibility on pheme '{}': {}", row.id, e);
            Visibility::Private
        }),
        category: row.category,
        text: row.text,
        created_by: row.created_by,
        user_id: row.user_id,
    }
}

pub(crate) fn parse_timestamp(ts: &str) -> DateTime<Utc> {
    ts.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite DEFAULT datetime('now') stores "YYYY-MM-DD HH:MM:SS"
            // without a timezone. Parse as naive UTC and convert.
            chrono::NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", ts, e);
            DateTime::default()
        })
}
