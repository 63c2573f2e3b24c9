use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row};

use pheme_types::UserId;
use pheme_types::api::PhemeParams;
use pheme_types::visibility::{PHEME_VERSION, Visibility};

use crate::models::{PhemeRow, UserRow};
use crate::{Database, StoreError};

/// Outcome of a pheme insert. The write gate refuses a cross-post to a
/// non-friend without that being a store error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(i64),
    NotFriends,
}

fn now() -> String {
    // Fixed-width fraction so stored timestamps sort lexicographically.
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl Database {
    // -- Users --

    /// Accounts are provisioned by the auth service sharing this database;
    /// this mirrors its insert for tests and local tooling.
    pub fn insert_user(&self, name: &str, email: &str, avatar: &str) -> Result<UserId, StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (name, email, avatar) VALUES (?1, ?2, ?3)",
                (name, email, avatar),
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user(&self, id: UserId) -> Result<Option<UserRow>, StoreError> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, name, email, avatar, created_at FROM users WHERE id = ?1",
                    [id],
                    row_to_user,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Substring match on the display name, newest accounts first.
    pub fn search_users(&self, name: &str) -> Result<Vec<UserRow>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, email, avatar, created_at FROM users
                 WHERE name LIKE ?1
                 ORDER BY created_at DESC, id DESC",
            )?;
            let rows = stmt
                .query_map([format!("%{name}%")], row_to_user)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Phemes --

    /// Insert a pheme authored by `author`. Schema version and creation time
    /// are stamped here; client-supplied values never reach the row.
    ///
    /// A cross-post (`params.user_id != author`) is only admitted when the
    /// author holds a friendship edge to the target profile. The check and
    /// the insert share one transaction, so a concurrent unfriend cannot let
    /// a pheme in under a just-revoked friendship.
    pub fn create_pheme(
        &self,
        author: UserId,
        params: &PhemeParams,
    ) -> Result<CreateOutcome, StoreError> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if author != params.user_id && !friendship_exists(&tx, author, params.user_id)? {
                return Ok(CreateOutcome::NotFriends);
            }

            tx.execute(
                "INSERT INTO phemes (version, created_at, visibility, category, text, created_by, user_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    PHEME_VERSION,
                    now(),
                    u8::from(params.visibility),
                    params.category,
                    params.text,
                    author,
                    params.user_id,
                ],
            )?;
            let id = tx.last_insert_rowid();
            tx.commit()?;

            Ok(CreateOutcome::Created(id))
        })
    }

    /// Update visibility, category and text of a pheme the caller authored.
    /// Re-stamps the schema version and update time. A target that does not
    /// exist, or was authored by someone else, comes back as `NotFound`.
    pub fn update_pheme(
        &self,
        id: i64,
        author: UserId,
        params: &PhemeParams,
    ) -> Result<PhemeRow, StoreError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE phemes SET version = ?1, updated_at = ?2, visibility = ?3, category = ?4, text = ?5
                 WHERE id = ?6 AND created_by = ?7",
                rusqlite::params![
                    PHEME_VERSION,
                    now(),
                    u8::from(params.visibility),
                    params.category,
                    params.text,
                    id,
                    author,
                ],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound);
            }

            conn.query_row(
                "SELECT id, version, created_at, updated_at, visibility, category, text, created_by, user_id
                 FROM phemes WHERE id = ?1",
                [id],
                row_to_pheme,
            )
            .map_err(StoreError::from)
        })
    }

    /// Hard-delete a pheme from a profile. Deletion is keyed on the profile
    /// owner, not the author; zero affected rows is a `NotFound`, never a
    /// silent no-op.
    pub fn delete_pheme(&self, id: i64, owner: UserId) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM phemes WHERE id = ?1 AND user_id = ?2",
                [id, owner],
            )?;
            if deleted == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
    }

    pub fn get_pheme(&self, id: i64) -> Result<Option<PhemeRow>, StoreError> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, version, created_at, updated_at, visibility, category, text, created_by, user_id
                     FROM phemes WHERE id = ?1",
                    [id],
                    row_to_pheme,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Phemes posted to `owner`'s profile at or above `floor`, newest first.
    pub fn phemes_by_owner(
        &self,
        owner: UserId,
        floor: Visibility,
    ) -> Result<Vec<PhemeRow>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, version, created_at, updated_at, visibility, category, text, created_by, user_id
                 FROM phemes WHERE user_id = ?1 AND visibility >= ?2
                 ORDER BY created_at DESC, id DESC",
            )?;
            let rows = stmt
                .query_map(
                    rusqlite::params![owner, u8::from(floor)],
                    row_to_pheme,
                )?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Batch variant of [`Database::phemes_by_owner`] over a set of profiles,
    /// newest first across the whole block.
    pub fn phemes_by_owners(
        &self,
        owners: &[UserId],
        floor: Visibility,
    ) -> Result<Vec<PhemeRow>, StoreError> {
        if owners.is_empty() {
            return Ok(Vec::new());
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> = (1..=owners.len()).map(|i| format!("?{i}")).collect();
            let sql = format!(
                "SELECT id, version, created_at, updated_at, visibility, category, text, created_by, user_id
                 FROM phemes WHERE user_id IN ({}) AND visibility >= ?{}
                 ORDER BY created_at DESC, id DESC",
                placeholders.join(", "),
                owners.len() + 1,
            );

            let mut stmt = conn.prepare(&sql)?;
            let mut values: Vec<i64> = owners.to_vec();
            values.push(i64::from(u8::from(floor)));
            let rows = stmt
                .query_map(rusqlite::params_from_iter(values), row_to_pheme)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Relationship edges --

    pub fn friend_ids(&self, user_id: UserId) -> Result<Vec<UserId>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT friend_id FROM friendship WHERE user_id = ?1")?;
            let ids = stmt
                .query_map([user_id], |row| row.get(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ids)
        })
    }

    pub fn follower_ids(&self, user_id: UserId) -> Result<Vec<UserId>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT follower_id FROM followship WHERE user_id = ?1")?;
            let ids = stmt
                .query_map([user_id], |row| row.get(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ids)
        })
    }

    pub fn is_friend(&self, user_id: UserId, friend_id: UserId) -> Result<bool, StoreError> {
        self.with_conn(|conn| friendship_exists(conn, user_id, friend_id))
    }

    /// Idempotent edge insert; returns whether a new row was added.
    pub fn add_friend(&self, user_id: UserId, friend_id: UserId) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO friendship (user_id, friend_id) VALUES (?1, ?2)",
                [user_id, friend_id],
            )?;
            Ok(inserted > 0)
        })
    }

    /// Idempotent edge delete; removing an absent edge is a no-op, not an
    /// error. Returns whether a row was removed.
    pub fn remove_friend(&self, user_id: UserId, friend_id: UserId) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM friendship WHERE user_id = ?1 AND friend_id = ?2",
                [user_id, friend_id],
            )?;
            Ok(removed > 0)
        })
    }

    pub fn add_follower(&self, user_id: UserId, follower_id: UserId) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO followship (user_id, follower_id) VALUES (?1, ?2)",
                [user_id, follower_id],
            )?;
            Ok(inserted > 0)
        })
    }

    pub fn remove_follower(&self, user_id: UserId, follower_id: UserId) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM followship WHERE user_id = ?1 AND follower_id = ?2",
                [user_id, follower_id],
            )?;
            Ok(removed > 0)
        })
    }
}

fn friendship_exists(
    conn: &Connection,
    user_id: UserId,
    friend_id: UserId,
) -> Result<bool, StoreError> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM friendship WHERE user_id = ?1 AND friend_id = ?2)",
        [user_id, friend_id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn row_to_pheme(row: &Row<'_>) -> rusqlite::Result<PhemeRow> {
    Ok(PhemeRow {
        id: row.get(0)?,
        version: row.get(1)?,
        created_at: row.get(2)?,
        updated_at: row.get(3)?,
        visibility: row.get(4)?,
        category: row.get(5)?,
        text: row.get(6)?,
        created_by: row.get(7)?,
        user_id: row.get(8)?,
    })
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        avatar: row.get(3)?,
        created_at: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn seed_users(db: &Database, n: usize) -> Vec<UserId> {
        (0..n)
            .map(|i| {
                db.insert_user(&format!("user{i}"), &format!("user{i}@test.com"), "")
                    .unwrap()
            })
            .collect()
    }

    fn params(user_id: UserId, visibility: Visibility) -> PhemeParams {
        PhemeParams {
            visibility,
            category: "main".into(),
            text: "Hello world!".into(),
            user_id,
        }
    }

    #[test]
    fn create_stamps_version_and_timestamps() {
        let db = test_db();
        let users = seed_users(&db, 1);

        let outcome = db
            .create_pheme(users[0], &params(users[0], Visibility::Public))
            .unwrap();
        let CreateOutcome::Created(id) = outcome else {
            panic!("expected an insert, got {outcome:?}");
        };

        let row = db.get_pheme(id).unwrap().unwrap();
        assert_eq!(row.version, PHEME_VERSION);
        assert!(!row.created_at.is_empty());
        assert!(row.updated_at.is_none());
        assert_eq!(row.created_by, users[0]);
        assert_eq!(row.user_id, users[0]);
    }

    #[test]
    fn cross_post_requires_friendship() {
        let db = test_db();
        let users = seed_users(&db, 2);

        let outcome = db
            .create_pheme(users[0], &params(users[1], Visibility::Public))
            .unwrap();
        assert_eq!(outcome, CreateOutcome::NotFriends);
        assert!(db.phemes_by_owner(users[1], Visibility::Private).unwrap().is_empty());

        assert!(db.add_friend(users[0], users[1]).unwrap());
        let outcome = db
            .create_pheme(users[0], &params(users[1], Visibility::Public))
            .unwrap();
        assert!(matches!(outcome, CreateOutcome::Created(id) if id > 0));
        assert_eq!(db.phemes_by_owner(users[1], Visibility::Private).unwrap().len(), 1);
    }

    #[test]
    fn friendship_is_directional() {
        let db = test_db();
        let users = seed_users(&db, 2);

        db.add_friend(users[0], users[1]).unwrap();
        assert!(db.is_friend(users[0], users[1]).unwrap());
        assert!(!db.is_friend(users[1], users[0]).unwrap());
    }

    #[test]
    fn update_is_author_only_and_restamps() {
        let db = test_db();
        let users = seed_users(&db, 2);
        let CreateOutcome::Created(id) = db
            .create_pheme(users[0], &params(users[0], Visibility::Private))
            .unwrap()
        else {
            panic!("insert failed");
        };

        let err = db
            .update_pheme(id, users[1], &params(users[0], Visibility::Public))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));

        let row = db
            .update_pheme(id, users[0], &params(users[0], Visibility::Public))
            .unwrap();
        assert_eq!(row.visibility, u8::from(Visibility::Public));
        assert!(row.updated_at.is_some());
    }

    #[test]
    fn delete_requires_profile_owner() {
        let db = test_db();
        let users = seed_users(&db, 2);
        let CreateOutcome::Created(id) = db
            .create_pheme(users[0], &params(users[0], Visibility::Private))
            .unwrap()
        else {
            panic!("insert failed");
        };

        let err = db.delete_pheme(id, users[1]).unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
        assert!(db.get_pheme(id).unwrap().is_some());

        db.delete_pheme(id, users[0]).unwrap();
        assert!(db.get_pheme(id).unwrap().is_none());
    }

    #[test]
    fn cross_posted_pheme_is_deleted_by_target_not_author() {
        // Deletion keys on user_id: the target profile owns the row.
        let db = test_db();
        let users = seed_users(&db, 2);
        db.add_friend(users[0], users[1]).unwrap();
        let CreateOutcome::Created(id) = db
            .create_pheme(users[0], &params(users[1], Visibility::Protected))
            .unwrap()
        else {
            panic!("insert failed");
        };

        assert!(matches!(db.delete_pheme(id, users[0]), Err(StoreError::NotFound)));
        db.delete_pheme(id, users[1]).unwrap();
    }

    #[test]
    fn edges_are_idempotent() {
        let db = test_db();
        let users = seed_users(&db, 2);

        assert!(db.add_friend(users[0], users[1]).unwrap());
        assert!(!db.add_friend(users[0], users[1]).unwrap());
        assert_eq!(db.friend_ids(users[0]).unwrap(), vec![users[1]]);

        assert!(db.remove_friend(users[0], users[1]).unwrap());
        assert!(!db.remove_friend(users[0], users[1]).unwrap());
        assert!(db.friend_ids(users[0]).unwrap().is_empty());
    }

    #[test]
    fn follower_edges_do_not_grant_friendship() {
        let db = test_db();
        let users = seed_users(&db, 2);

        assert!(db.add_follower(users[0], users[1]).unwrap());
        assert!(!db.is_friend(users[0], users[1]).unwrap());
        assert_eq!(db.follower_ids(users[0]).unwrap(), vec![users[1]]);
        assert!(db.remove_follower(users[0], users[1]).unwrap());
    }

    #[test]
    fn owner_scan_respects_tier_floor_and_recency() {
        let db = test_db();
        let users = seed_users(&db, 1);
        for tier in [Visibility::Private, Visibility::Protected, Visibility::Public] {
            db.create_pheme(users[0], &params(users[0], tier)).unwrap();
        }

        let all = db.phemes_by_owner(users[0], Visibility::Private).unwrap();
        assert_eq!(all.len(), 3);
        assert!(
            all.windows(2)
                .all(|w| (w[0].created_at.as_str(), w[0].id) > (w[1].created_at.as_str(), w[1].id))
        );

        assert_eq!(db.phemes_by_owner(users[0], Visibility::Protected).unwrap().len(), 2);
        assert_eq!(db.phemes_by_owner(users[0], Visibility::Public).unwrap().len(), 1);
    }

    #[test]
    fn owners_scan_spans_profiles() {
        let db = test_db();
        let users = seed_users(&db, 3);
        db.create_pheme(users[1], &params(users[1], Visibility::Public)).unwrap();
        db.create_pheme(users[2], &params(users[2], Visibility::Protected)).unwrap();

        let rows = db
            .phemes_by_owners(&[users[1], users[2]], Visibility::Protected)
            .unwrap();
        assert_eq!(rows.len(), 2);

        assert!(db.phemes_by_owners(&[], Visibility::Private).unwrap().is_empty());
    }

    #[test]
    fn search_users_matches_substring() {
        let db = test_db();
        db.insert_user("alice", "alice@test.com", "").unwrap();
        db.insert_user("alina", "alina@test.com", "").unwrap();
        db.insert_user("bob", "bob@test.com", "").unwrap();

        assert_eq!(db.search_users("ali").unwrap().len(), 2);
        assert!(db.search_users("zzz").unwrap().is_empty());
    }
}
