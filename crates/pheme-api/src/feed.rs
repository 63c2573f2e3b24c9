use tracing::warn;

use pheme_db::models::PhemeRow;
use pheme_db::{Database, StoreError};
use pheme_types::UserId;
use pheme_types::visibility::ViewerRelation;

/// Three-tier feed: the viewer's own phemes, then friends' protected-or-higher
/// phemes, then followers' public phemes. Each block is newest first; the
/// blocks are concatenated, not merged into one chronological order, so
/// per-source recency survives.
///
/// Only a failure loading the viewer's own block is fatal. A broken
/// relationship lookup downgrades its block to empty so the viewer still gets
/// their own phemes.
pub fn assemble_feed(db: &Database, viewer: UserId) -> Result<Vec<PhemeRow>, StoreError> {
    let mut phemes = db.phemes_by_owner(viewer, ViewerRelation::Owner.floor())?;

    match friends_block(db, viewer) {
        Ok(mut block) => phemes.append(&mut block),
        Err(err) => warn!("skipping friends block for user {viewer}: {err}"),
    }

    match followers_block(db, viewer) {
        Ok(mut block) => phemes.append(&mut block),
        Err(err) => warn!("skipping followers block for user {viewer}: {err}"),
    }

    Ok(phemes)
}

fn friends_block(db: &Database, viewer: UserId) -> Result<Vec<PhemeRow>, StoreError> {
    let friends = db.friend_ids(viewer)?;
    db.phemes_by_owners(&friends, ViewerRelation::Friend.floor())
}

fn followers_block(db: &Database, viewer: UserId) -> Result<Vec<PhemeRow>, StoreError> {
    let followers = db.follower_ids(viewer)?;
    db.phemes_by_owners(&followers, ViewerRelation::Follower.floor())
}
