use anyhow::Context;
use rusqlite::Connection;

/// Applied in order, each exactly once. Later entries include one-time data
/// passes over records written by older releases.
const MIGRATIONS: &[(&str, &str)] = &[
    ("0001_init.sql", include_str!("../../migrations/0001_init.sql")),
    (
        "0002_seed_commission_rates.sql",
        include_str!("../../migrations/0002_seed_commission_rates.sql"),
    ),
    (
        "0003_backfill_provider_defaults.sql",
        include_str!("../../migrations/0003_backfill_provider_defaults.sql"),
    ),
];

pub fn run_migrations(conn: &Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .context("failed to create migrations table")?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM _migrations WHERE name = ?1",
                [name],
                |row| row.get(0),
            )
            .context("failed to check migration status")?;

        if already_applied {
            continue;
        }

        let tx = conn
            .unchecked_transaction()
            .context("failed to begin migration transaction")?;

        tx.execute_batch(sql)
            .with_context(|| format!("failed to apply migration: {name}"))?;

        tx.execute("INSERT INTO _migrations (name) VALUES (?1)", [name])
            .with_context(|| format!("failed to record migration: {name}"))?;

        tx.commit()
            .with_context(|| format!("failed to commit migration: {name}"))?;

        tracing::info!("applied migration: {name}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let applied: i64 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(applied, MIGRATIONS.len() as i64);
    }

    #[test]
    fn test_seeded_commission_rates() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let verified: String = conn
            .query_row(
                "SELECT rate FROM commission_rates WHERE tier = 'VERIFIED'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(verified, "0.18");
    }

    #[test]
    fn test_backfill_repairs_legacy_providers() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(MIGRATIONS[0].1).unwrap();
        conn.execute_batch(
            "INSERT INTO providers (id, name, tier) VALUES ('legacy', 'Old Co', 'GOLD');",
        )
        .unwrap();

        run_migrations(&conn).unwrap();

        let tier: String = conn
            .query_row("SELECT tier FROM providers WHERE id = 'legacy'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(tier, "NEW");

        let has_hours: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM availability WHERE provider_id = 'legacy'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(has_hours);
    }
}
