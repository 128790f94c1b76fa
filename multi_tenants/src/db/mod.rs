pub mod pool;

use pool::DbPool;
use rusqlite::Connection;

const MIGRATIONS: &[(&str, &str)] = &[
    ("001_initial", include_str!("migrations/001_initial.sql")),
    ("002_audit_log", include_str!("migrations/002_audit_log.sql")),
];

/// Apply the platform (directory + audit) migrations.
pub fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    pool.write(|conn| apply_migrations(conn, MIGRATIONS, "platform"))
}

/// Apply `migrations` in order, skipping names already recorded in
/// `_migrations`. Each migration commits together with its ledger row.
pub fn apply_migrations(
    conn: &Connection,
    migrations: &[(&str, &str)],
    target: &str,
) -> anyhow::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        )",
    )?;

    for (name, sql) in migrations {
        let applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM _migrations WHERE name = ?1",
            [name],
            |row| row.get(0),
        )?;

        if !applied {
            let tx = conn.unchecked_transaction()?;
            tx.execute_batch(sql)?;
            tx.execute("INSERT INTO _migrations (name) VALUES (?1)", [name])?;
            tx.commit()?;
            tracing::info!("applied migration {} to {}", name, target);
        }
    }
    Ok(())
}
