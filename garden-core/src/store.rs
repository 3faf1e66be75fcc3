//! SQLite persistence layer for players, coupons, and play history.
//!
//! Schema mirrors the engine's three durable stores:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS players (
//!     player_id         TEXT PRIMARY KEY,
//!     created_at        TEXT NOT NULL,
//!     squares_claimed   INTEGER NOT NULL DEFAULT 0,
//!     gardens_completed INTEGER NOT NULL DEFAULT 0,
//!     total_plays       INTEGER NOT NULL DEFAULT 0,
//!     total_wins        INTEGER NOT NULL DEFAULT 0,
//!     last_play_at      TEXT,
//!     forced_outcome    TEXT
//! );
//! CREATE TABLE IF NOT EXISTS coupons (
//!     code        TEXT PRIMARY KEY,
//!     player_id   TEXT NOT NULL,
//!     percentage  INTEGER NOT NULL,
//!     issued_at   TEXT NOT NULL,
//!     redeemed_at TEXT
//! );
//! CREATE TABLE IF NOT EXISTS plays (
//!     id                INTEGER PRIMARY KEY AUTOINCREMENT,
//!     player_id         TEXT NOT NULL,
//!     played_at         TEXT NOT NULL,
//!     round_id          TEXT NOT NULL,
//!     target_tile       INTEGER NOT NULL,
//!     selected_tile     INTEGER NOT NULL,
//!     won               INTEGER NOT NULL,
//!     reward_percentage INTEGER,
//!     coupon_code       TEXT
//! );
//! ```
//!
//! Active rounds never touch this layer; they are ephemeral by contract.
//! Everything a resolved play changes (player counters, coupon, history
//! row) commits inside one transaction, so a failed commit leaves no
//! partial side effects. The `coupons.code` primary key is the backstop
//! that keeps two concurrent wins from ever sharing a code.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tracing::{debug, info};

use crate::config::PersistenceConfig;
use crate::error::{GardenError, Result};
use crate::reward::RewardGrant;
use crate::types::{Coupon, ForcedOutcome, Player, PlayerId, RoundId, TileId};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS players (
        player_id         TEXT PRIMARY KEY,
        created_at        TEXT NOT NULL,
        squares_claimed   INTEGER NOT NULL DEFAULT 0,
        gardens_completed INTEGER NOT NULL DEFAULT 0,
        total_plays       INTEGER NOT NULL DEFAULT 0,
        total_wins        INTEGER NOT NULL DEFAULT 0,
        last_play_at      TEXT,
        forced_outcome    TEXT
    );
    CREATE TABLE IF NOT EXISTS coupons (
        code        TEXT PRIMARY KEY,
        player_id   TEXT NOT NULL,
        percentage  INTEGER NOT NULL,
        issued_at   TEXT NOT NULL,
        redeemed_at TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_coupons_player ON coupons(player_id, issued_at);
    CREATE TABLE IF NOT EXISTS plays (
        id                INTEGER PRIMARY KEY AUTOINCREMENT,
        player_id         TEXT NOT NULL,
        played_at         TEXT NOT NULL,
        round_id          TEXT NOT NULL,
        target_tile       INTEGER NOT NULL,
        selected_tile     INTEGER NOT NULL,
        won               INTEGER NOT NULL,
        reward_percentage INTEGER,
        coupon_code       TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_plays_player ON plays(player_id, played_at);
";

/// Everything a single resolved play writes, committed atomically.
#[derive(Debug)]
pub struct PlayCommit<'a> {
    /// The player being resolved.
    pub player_id: PlayerId,
    /// Resolution timestamp; becomes `last_play_at`.
    pub now: DateTime<Utc>,
    /// Whether the play resolved as a win.
    pub won: bool,
    /// Post-advance square count.
    pub squares_claimed: u32,
    /// Post-advance garden count.
    pub gardens_completed: u32,
    /// The resolved round's id, for the history row.
    pub round_id: RoundId,
    /// The round's correct tile.
    pub target_tile: TileId,
    /// The tile the player selected.
    pub selected_tile: TileId,
    /// Minted reward, present only on a win.
    pub reward: Option<&'a RewardGrant>,
}

/// One row of a player's play history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayRecord {
    /// When the play resolved.
    pub played_at: DateTime<Utc>,
    /// The round that was resolved.
    pub round_id: RoundId,
    /// The round's correct tile.
    pub target_tile: TileId,
    /// The tile the player selected.
    pub selected_tile: TileId,
    /// Whether the play won.
    pub won: bool,
    /// Reward percentage, wins only.
    pub reward_percentage: Option<u8>,
    /// Coupon code, wins only.
    pub coupon_code: Option<String>,
}

/// Handle to the engine's SQLite database.
pub struct GardenStore {
    conn: Connection,
    db_path: PathBuf,
}

impl std::fmt::Debug for GardenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GardenStore")
            .field("db_path", &self.db_path)
            .finish_non_exhaustive()
    }
}

impl GardenStore {
    /// Open (or create) the database at `path`, applying pragmas and schema.
    ///
    /// # Errors
    /// Returns [`GardenError::Database`] on SQLite failures.
    pub fn open<P: AsRef<Path>>(path: P, config: &PersistenceConfig) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&db_path, flags)?;

        if config.wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(&format!("PRAGMA busy_timeout = {};", config.busy_timeout_ms))?;
        conn.execute_batch(SCHEMA)?;

        info!(
            path = %db_path.display(),
            wal = config.wal_mode,
            "garden store opened"
        );

        Ok(Self { conn, db_path })
    }

    /// Open an in-memory database (tests, benches).
    ///
    /// # Errors
    /// Returns [`GardenError::Database`] on SQLite failures.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn,
            db_path: PathBuf::from(":memory:"),
        })
    }

    // ------------------------------------------------------------------
    // Players
    // ------------------------------------------------------------------

    /// Insert a fresh player record.
    ///
    /// # Errors
    /// Returns [`GardenError::Database`] on SQLite failures, including a
    /// duplicate id.
    pub fn insert_player(&self, player: &Player) -> Result<()> {
        self.conn.execute(
            "INSERT INTO players (player_id, created_at, squares_claimed, gardens_completed,
                                  total_plays, total_wins, last_play_at, forced_outcome)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                player.id.to_string(),
                player.created_at.to_rfc3339(),
                player.squares_claimed,
                player.gardens_completed,
                player.total_plays,
                player.total_wins,
                player.last_play_at.map(|t| t.to_rfc3339()),
                player.forced_outcome.map(ForcedOutcome::as_str),
            ],
        )?;
        debug!(player = %player.id, "player created");
        Ok(())
    }

    /// Load a player record. Returns `None` if the id is unknown.
    ///
    /// # Errors
    /// Returns [`GardenError::Database`] on SQLite failures, or
    /// [`GardenError::CorruptRecord`] if a stored value fails to decode.
    pub fn load_player(&self, player_id: &PlayerId) -> Result<Option<Player>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT created_at, squares_claimed, gardens_completed, total_plays, total_wins,
                    last_play_at, forced_outcome
             FROM players WHERE player_id = ?1",
        )?;

        type Row = (String, u32, u32, u64, u64, Option<String>, Option<String>);
        let row: Option<Row> = stmt
            .query_row(params![player_id.to_string()], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                ))
            })
            .optional()?;

        let Some((created, squares, gardens, plays, wins, last_play, forced)) = row else {
            return Ok(None);
        };

        Ok(Some(Player {
            id: *player_id,
            created_at: parse_timestamp(&created)?,
            squares_claimed: squares,
            gardens_completed: gardens,
            total_plays: plays,
            total_wins: wins,
            last_play_at: last_play.as_deref().map(parse_timestamp).transpose()?,
            forced_outcome: forced.as_deref().map(parse_forced_outcome).transpose()?,
        }))
    }

    /// Overwrite a player's `last_play_at` (dev channel).
    ///
    /// # Errors
    /// Returns [`GardenError::UnknownPlayer`] if no row was updated.
    pub fn set_last_play(
        &self,
        player_id: &PlayerId,
        last_play_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE players SET last_play_at = ?2 WHERE player_id = ?1",
            params![player_id.to_string(), last_play_at.map(|t| t.to_rfc3339())],
        )?;
        if updated == 0 {
            return Err(GardenError::UnknownPlayer(*player_id));
        }
        Ok(())
    }

    /// Zero a player's garden progression (dev channel).
    ///
    /// # Errors
    /// Returns [`GardenError::UnknownPlayer`] if no row was updated.
    pub fn reset_garden(&self, player_id: &PlayerId) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE players SET squares_claimed = 0, gardens_completed = 0 WHERE player_id = ?1",
            params![player_id.to_string()],
        )?;
        if updated == 0 {
            return Err(GardenError::UnknownPlayer(*player_id));
        }
        Ok(())
    }

    /// Arm or clear a player's one-shot forced outcome (dev channel).
    ///
    /// # Errors
    /// Returns [`GardenError::UnknownPlayer`] if no row was updated.
    pub fn set_forced_outcome(
        &self,
        player_id: &PlayerId,
        outcome: Option<ForcedOutcome>,
    ) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE players SET forced_outcome = ?2 WHERE player_id = ?1",
            params![player_id.to_string(), outcome.map(ForcedOutcome::as_str)],
        )?;
        if updated == 0 {
            return Err(GardenError::UnknownPlayer(*player_id));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Play resolution
    // ------------------------------------------------------------------

    /// Commit every durable side effect of one resolved play atomically:
    /// player counters and cooldown stamp, the coupon (wins only), and the
    /// history row. The armed forced outcome, if any, is always consumed.
    ///
    /// # Errors
    /// Returns [`GardenError::UnknownPlayer`] if the player row vanished,
    /// or [`GardenError::Database`] on SQLite failures; in both cases
    /// nothing was applied.
    pub fn commit_play(&mut self, commit: &PlayCommit<'_>) -> Result<()> {
        let tx = self.conn.transaction()?;

        let updated = tx.execute(
            "UPDATE players
             SET last_play_at = ?2,
                 total_plays = total_plays + 1,
                 total_wins = total_wins + ?3,
                 squares_claimed = ?4,
                 gardens_completed = ?5,
                 forced_outcome = NULL
             WHERE player_id = ?1",
            params![
                commit.player_id.to_string(),
                commit.now.to_rfc3339(),
                u32::from(commit.won),
                commit.squares_claimed,
                commit.gardens_completed,
            ],
        )?;
        if updated == 0 {
            return Err(GardenError::UnknownPlayer(commit.player_id));
        }

        if let Some(reward) = commit.reward {
            tx.execute(
                "INSERT INTO coupons (code, player_id, percentage, issued_at, redeemed_at)
                 VALUES (?1, ?2, ?3, ?4, NULL)",
                params![
                    reward.code,
                    commit.player_id.to_string(),
                    reward.percentage,
                    commit.now.to_rfc3339(),
                ],
            )?;
        }

        tx.execute(
            "INSERT INTO plays (player_id, played_at, round_id, target_tile, selected_tile,
                                won, reward_percentage, coupon_code)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                commit.player_id.to_string(),
                commit.now.to_rfc3339(),
                commit.round_id.to_string(),
                commit.target_tile.0,
                commit.selected_tile.0,
                commit.won,
                commit.reward.map(|r| r.percentage),
                commit.reward.map(|r| r.code.as_str()),
            ],
        )?;

        tx.commit()?;
        debug!(
            player = %commit.player_id,
            round = %commit.round_id,
            won = commit.won,
            "play committed"
        );
        Ok(())
    }

    /// Whether `err` is the unique-constraint violation raised when a
    /// coupon code candidate already exists. The caller regenerates and
    /// retries the commit on this signal.
    #[must_use]
    pub fn is_code_conflict(err: &GardenError) -> bool {
        match err {
            GardenError::Database(rusqlite::Error::SqliteFailure(failure, message)) => {
                failure.code == rusqlite::ErrorCode::ConstraintViolation
                    && message
                        .as_deref()
                        .is_some_and(|m| m.contains("coupons.code"))
            }
            _ => false,
        }
    }

    /// A player's play history, most recent first.
    ///
    /// # Errors
    /// Returns [`GardenError::Database`] on SQLite failures.
    pub fn play_history(&self, player_id: &PlayerId, limit: usize) -> Result<Vec<PlayRecord>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT played_at, round_id, target_tile, selected_tile, won,
                    reward_percentage, coupon_code
             FROM plays WHERE player_id = ?1
             ORDER BY id DESC LIMIT ?2",
        )?;

        type Row = (String, String, u32, u32, bool, Option<u8>, Option<String>);
        let rows = stmt.query_map(params![player_id.to_string(), limit as i64], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (played_at, round_id, target, selected, won, pct, code): Row = row?;
            records.push(PlayRecord {
                played_at: parse_timestamp(&played_at)?,
                round_id: RoundId::from_str(&round_id)
                    .map_err(|e| GardenError::CorruptRecord(format!("round id: {e}")))?,
                target_tile: TileId(target),
                selected_tile: TileId(selected),
                won,
                reward_percentage: pct,
                coupon_code: code,
            });
        }
        Ok(records)
    }

    // ------------------------------------------------------------------
    // Coupons
    // ------------------------------------------------------------------

    /// Whether a coupon code is already taken.
    ///
    /// # Errors
    /// Returns [`GardenError::Database`] on SQLite failures.
    pub fn coupon_exists(&self, code: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM coupons WHERE code = ?1",
            params![code],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Look up a coupon by code.
    ///
    /// # Errors
    /// Returns [`GardenError::Database`] on SQLite failures.
    pub fn find_coupon(&self, code: &str) -> Result<Option<Coupon>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT code, player_id, percentage, issued_at, redeemed_at
             FROM coupons WHERE code = ?1",
        )?;
        let row = stmt
            .query_row(params![code], coupon_columns)
            .optional()?;
        row.map(coupon_from_columns).transpose()
    }

    /// The most recently issued coupon for a player, if any.
    ///
    /// # Errors
    /// Returns [`GardenError::Database`] on SQLite failures.
    pub fn latest_coupon_for(&self, player_id: &PlayerId) -> Result<Option<Coupon>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT code, player_id, percentage, issued_at, redeemed_at
             FROM coupons WHERE player_id = ?1
             ORDER BY issued_at DESC LIMIT 1",
        )?;
        let row = stmt
            .query_row(params![player_id.to_string()], coupon_columns)
            .optional()?;
        row.map(coupon_from_columns).transpose()
    }

    /// Redeem a coupon: stamp `redeemed_at` exactly once.
    ///
    /// The update is conditional on `redeemed_at IS NULL`, so concurrent
    /// redemptions of the same code cannot both succeed.
    ///
    /// # Errors
    /// Returns [`GardenError::CouponInvalid`] for an unknown or
    /// already-redeemed code.
    pub fn redeem_coupon(&self, code: &str, now: DateTime<Utc>) -> Result<Coupon> {
        let updated = self.conn.execute(
            "UPDATE coupons SET redeemed_at = ?2 WHERE code = ?1 AND redeemed_at IS NULL",
            params![code, now.to_rfc3339()],
        )?;
        if updated == 0 {
            return Err(GardenError::CouponInvalid { code: code.to_string() });
        }
        let coupon = self.find_coupon(code)?.ok_or_else(|| GardenError::CouponInvalid {
            code: code.to_string(),
        })?;
        info!(code = %coupon.code, player = %coupon.player_id, "coupon redeemed");
        Ok(coupon)
    }
}

// ---------------------------------------------------------------------------
// Row decoding helpers
// ---------------------------------------------------------------------------

type CouponColumns = (String, String, u8, String, Option<String>);

fn coupon_columns(row: &rusqlite::Row<'_>) -> rusqlite::Result<CouponColumns> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn coupon_from_columns(columns: CouponColumns) -> Result<Coupon> {
    let (code, player_id, percentage, issued_at, redeemed_at) = columns;
    Ok(Coupon {
        code,
        player_id: PlayerId::from_str(&player_id)
            .map_err(|e| GardenError::CorruptRecord(format!("player id: {e}")))?,
        percentage,
        issued_at: parse_timestamp(&issued_at)?,
        redeemed_at: redeemed_at.as_deref().map(parse_timestamp).transpose()?,
    })
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| GardenError::CorruptRecord(format!("timestamp {raw:?}: {e}")))
}

fn parse_forced_outcome(raw: &str) -> Result<ForcedOutcome> {
    ForcedOutcome::parse(raw)
        .ok_or_else(|| GardenError::CorruptRecord(format!("forced outcome {raw:?}")))
}
