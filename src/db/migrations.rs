use anyhow::{bail, Context, Result};
use rusqlite::Connection;

/// Schema steps in order. Entry `i` moves `user_version` from `i` to `i + 1`.
const MIGRATIONS: &[&str] = &[include_str!("schemas/schema_v1.sql")];

fn target_version() -> i32 {
    MIGRATIONS.len() as i32
}

pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let current: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read cache schema version")?;
    let target = target_version();

    if current > target {
        bail!("result cache schema v{current} is newer than this build supports (v{target})");
    }
    if current == target {
        return Ok(());
    }

    let tx = conn
        .transaction()
        .context("failed to open migration transaction")?;

    for (index, sql) in MIGRATIONS.iter().enumerate().skip(current.max(0) as usize) {
        let version = index + 1;
        tx.execute_batch(sql)
            .with_context(|| format!("cache migration to v{version} failed"))?;
    }

    tx.pragma_update(None, "user_version", target)
        .context("failed to record cache schema version")?;
    tx.commit().context("failed to commit cache migrations")?;
    log::info!("Result cache migrated from v{current} to v{target}");

    Ok(())
}
