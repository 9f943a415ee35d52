//! Embedded relational store for per-domain anti-bot profiles.
//!
//! New module grounded on the `rusqlite` usage pattern in
//! `danielchristiancazares-forge` (an embedded single-file store
//! opened once and shared behind a mutex/connection pool). WAL mode
//! per the concurrency design: readers on the API's hot path should
//! never block behind an admin-triggered write.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

use crate::error::Result;
use crate::types::{DomainProfile, EngineKind};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS domain_profiles (
    domain TEXT PRIMARY KEY,
    engine TEXT NOT NULL,
    use_proxy INTEGER NOT NULL,
    render_js INTEGER NOT NULL DEFAULT 0,
    render_delay_ms INTEGER NOT NULL,
    preset TEXT,
    hit_count INTEGER NOT NULL,
    last_status_code INTEGER,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)";

const SELECT_COLUMNS: &str =
    "domain, engine, use_proxy, render_js, render_delay_ms, preset, hit_count, last_status_code, created_at, updated_at";

/// A `rusqlite` connection behind a mutex, holding the `domain_profiles`
/// table. `rusqlite::Connection` is `!Sync`, so concurrent callers
/// serialize through the mutex; each operation is a single, fast
/// indexed lookup or upsert.
pub struct ProfileStore {
    conn: Mutex<Connection>,
}

impl ProfileStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| crate::error::FetchError::Other(format!("creating db dir: {e}")))?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute(SCHEMA, [])?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute(SCHEMA, [])?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn get(&self, domain: &str) -> Result<Option<DomainProfile>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM domain_profiles WHERE domain = ?1"),
                params![domain],
                row_to_profile,
            )
            .optional()?;
        Ok(row)
    }

    /// Inserts a new profile, or updates an existing one (overwriting
    /// the config fields, bumping `hit_count`, refreshing `updated_at`).
    pub fn upsert(&self, profile: &DomainProfile) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO domain_profiles
                (domain, engine, use_proxy, render_js, render_delay_ms, preset, hit_count, last_status_code, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(domain) DO UPDATE SET
                engine = excluded.engine,
                use_proxy = excluded.use_proxy,
                render_js = excluded.render_js,
                render_delay_ms = excluded.render_delay_ms,
                preset = excluded.preset,
                hit_count = domain_profiles.hit_count + 1,
                last_status_code = excluded.last_status_code,
                updated_at = excluded.updated_at",
            params![
                profile.domain,
                profile.engine.to_string(),
                profile.use_proxy as i64,
                profile.render_js as i64,
                profile.render_delay_ms as i64,
                profile.preset,
                profile.hit_count as i64,
                profile.last_status_code.map(|c| c as i64),
                profile.created_at.to_rfc3339(),
                profile.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Bumps `hit_count` and `updated_at` for a cache hit, without
    /// touching the rest of the profile's configuration.
    pub fn increment_hit(&self, domain: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE domain_profiles SET hit_count = hit_count + 1, updated_at = ?1 WHERE domain = ?2",
            params![chrono::Utc::now().to_rfc3339(), domain],
        )?;
        Ok(())
    }

    pub fn delete(&self, domain: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute("DELETE FROM domain_profiles WHERE domain = ?1", params![domain])?;
        Ok(changed > 0)
    }

    pub fn all(&self) -> Result<Vec<DomainProfile>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!("SELECT {SELECT_COLUMNS} FROM domain_profiles ORDER BY domain"))?;
        let rows = stmt.query_map([], row_to_profile)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

fn row_to_profile(row: &rusqlite::Row<'_>) -> rusqlite::Result<DomainProfile> {
    let engine_str: String = row.get(1)?;
    let engine = parse_engine_kind(&engine_str);
    let created_at: String = row.get(8)?;
    let updated_at: String = row.get(9)?;
    Ok(DomainProfile {
        domain: row.get(0)?,
        engine,
        use_proxy: row.get::<_, i64>(2)? != 0,
        render_js: row.get::<_, i64>(3)? != 0,
        render_delay_ms: row.get::<_, i64>(4)? as u64,
        preset: row.get(5)?,
        hit_count: row.get::<_, i64>(6)? as u64,
        last_status_code: row.get::<_, Option<i64>>(7)?.map(|c| c as u16),
        created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| chrono::Utc::now()),
        updated_at: chrono::DateTime::parse_from_rfc3339(&updated_at)
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| chrono::Utc::now()),
    })
}

fn parse_engine_kind(s: &str) -> EngineKind {
    match s {
        "fast" => EngineKind::Fast,
        "remote_browser" => EngineKind::RemoteBrowser,
        "stealth" => EngineKind::Stealth,
        "unblock" => EngineKind::Unblock,
        _ => EngineKind::Auto,
    }
}
