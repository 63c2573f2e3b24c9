use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL,
            email       TEXT NOT NULL UNIQUE,
            avatar      TEXT NOT NULL DEFAULT '',
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_users_name ON users(name);

        CREATE TABLE IF NOT EXISTS phemes (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            version     INTEGER NOT NULL,
            created_at  TEXT NOT NULL,
            updated_at  TEXT,
            visibility  INTEGER NOT NULL,
            category    TEXT NOT NULL,
            text        TEXT NOT NULL,
            created_by  INTEGER NOT NULL REFERENCES users(id),
            user_id     INTEGER NOT NULL REFERENCES users(id)
        );

        CREATE INDEX IF NOT EXISTS idx_phemes_profile
            ON phemes(user_id, visibility, created_at);

        CREATE TABLE IF NOT EXISTS friendship (
            user_id     INTEGER NOT NULL REFERENCES users(id),
            friend_id   INTEGER NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(user_id, friend_id)
        );

        CREATE TABLE IF NOT EXISTS followship (
            user_id     INTEGER NOT NULL REFERENCES users(id),
            follower_id INTEGER NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(user_id, follower_id)
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
