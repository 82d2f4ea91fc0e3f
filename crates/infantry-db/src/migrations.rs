use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (credentials, users)");
        conn.execute_batch(
            "
            CREATE TABLE credentials (
                id              TEXT PRIMARY KEY,
                user_id         TEXT UNIQUE,
                username        TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password_hash   TEXT NOT NULL,
                salt            TEXT NOT NULL,
                active          INTEGER NOT NULL,
                role            TEXT NOT NULL DEFAULT 'normal'
                    CHECK (role IN ('guest', 'normal', 'super', 'admin',
                                    'partner', 'partner-admin', 'celebrity')),
                tokens          TEXT NOT NULL DEFAULT '[]',
                flags           TEXT NOT NULL DEFAULT '{}',
                version         INTEGER NOT NULL DEFAULT 1,
                modified_at     TEXT NOT NULL
            );

            CREATE TABLE users (
                id              TEXT PRIMARY KEY,
                email           TEXT NOT NULL UNIQUE COLLATE NOCASE,
                info            TEXT NOT NULL,
                photo           TEXT NOT NULL DEFAULT '{}',
                options         TEXT NOT NULL DEFAULT '{}',
                version         INTEGER NOT NULL DEFAULT 1,
                modified_at     TEXT NOT NULL
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
