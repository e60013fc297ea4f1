// SQLite persistence layer: the durable side of the auction.
//
// Authoritative per-player auction fields and team purses/rosters live
// here; the in-memory store is rebuilt from this on load and reset.

use std::sync::{Mutex, MutexGuard};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};

use crate::auction::player::{BidRecord, CardAssignment};
use crate::config::{PlayerSeed, TeamConfig};

/// A player row as persisted. Auction fields are nullable: a record that
/// has never been bid on carries no `current_bid`, which lets clients
/// distinguish "no server knowledge" from a real value when reconciling.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRecord {
    pub id: i64,
    pub name: String,
    pub country: String,
    pub rating: u32,
    pub matches: u32,
    pub runs: u32,
    pub wickets: u32,
    pub average: f64,
    pub strike_rate: f64,
    pub base_price: u32,
    pub category: String,
    pub image: Option<String>,
    pub current_bid: Option<u32>,
    pub highest_bidder: Option<String>,
    pub sold_status: String,
    pub sold_to: Option<String>,
    pub sold_price: Option<u32>,
    pub sold_at: Option<String>,
    pub assigned_card: Option<CardAssignment>,
    pub bid_history: Vec<BidRecord>,
}

/// Sparse update of auction-relevant player fields. `None` leaves a column
/// untouched; the inner `Option` writes NULL.
#[derive(Debug, Clone, Default)]
pub struct PlayerPatch {
    pub current_bid: Option<u32>,
    pub highest_bidder: Option<Option<String>>,
    pub sold_status: Option<String>,
    pub sold_to: Option<Option<String>>,
    pub sold_price: Option<Option<u32>>,
    pub assigned_card: Option<Option<CardAssignment>>,
    pub is_closed: Option<bool>,
    pub bid_history: Option<Vec<BidRecord>>,
}

/// A team row as persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct TeamRow {
    pub id: String,
    pub code: String,
    pub name: String,
    pub color: String,
    pub purse_balance: u32,
    pub initial_purse: u32,
    pub sold_players: Vec<i64>,
}

/// SQLite-backed persistence for the player pool, team purses/rosters,
/// and key-value auction state.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database
    /// (useful for tests).
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS players (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                name           TEXT NOT NULL,
                country        TEXT NOT NULL DEFAULT 'IND',
                rating         INTEGER NOT NULL DEFAULT 0,
                matches        INTEGER NOT NULL DEFAULT 0,
                runs           INTEGER NOT NULL DEFAULT 0,
                wickets        INTEGER NOT NULL DEFAULT 0,
                average        REAL NOT NULL DEFAULT 0,
                strike_rate    REAL NOT NULL DEFAULT 0,
                base_price     INTEGER NOT NULL,
                category       TEXT NOT NULL,
                image          TEXT,
                current_bid    INTEGER,
                highest_bidder TEXT,
                sold_status    TEXT NOT NULL DEFAULT 'OPEN',
                is_closed      INTEGER NOT NULL DEFAULT 0,
                sold_to        TEXT,
                sold_price     INTEGER,
                sold_at        TEXT,
                assigned_card  TEXT,
                bid_history    TEXT NOT NULL DEFAULT '[]',
                created_at     TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE IF NOT EXISTS teams (
                id            TEXT PRIMARY KEY,
                code          TEXT NOT NULL,
                name          TEXT NOT NULL,
                color         TEXT NOT NULL DEFAULT '',
                purse_balance INTEGER NOT NULL,
                initial_purse INTEGER NOT NULL,
                sold_players  TEXT NOT NULL DEFAULT '[]'
            );

            CREATE TABLE IF NOT EXISTS auction_state (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Player pool
    // ------------------------------------------------------------------

    /// Number of players in the pool.
    pub fn player_count(&self) -> Result<usize> {
        let conn = self.conn();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM players", [], |row| row.get(0))
            .context("failed to count players")?;
        Ok(count as usize)
    }

    /// Import seed players in a single transaction. Intended for first
    /// run, when the pool is empty.
    pub fn import_players(&self, seed: &[PlayerSeed]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .context("failed to begin import transaction")?;

        for player in seed {
            tx.execute(
                "INSERT INTO players
                    (name, country, rating, matches, runs, wickets, average, strike_rate,
                     base_price, category, image)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    player.name,
                    player.country,
                    player.rating,
                    player.matches,
                    player.runs,
                    player.wickets,
                    player.average,
                    player.strike_rate,
                    player.base_price,
                    player.category,
                    player.image,
                ],
            )
            .context("failed to insert seed player")?;
        }

        tx.commit().context("failed to commit player import")?;
        Ok(())
    }

    /// Load the full pool, ordered by creation. This ordering is
    /// load-bearing: the client-side active-player index is defined
    /// relative to it.
    pub fn load_players(&self) -> Result<Vec<PlayerRecord>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT id, name, country, rating, matches, runs, wickets, average,
                        strike_rate, base_price, category, image, current_bid,
                        highest_bidder, sold_status, sold_to, sold_price, sold_at,
                        assigned_card, bid_history
                 FROM players ORDER BY id",
            )
            .context("failed to prepare load_players query")?;

        let players = stmt
            .query_map([], |row| {
                let assigned_card_json: Option<String> = row.get(18)?;
                let bid_history_json: Option<String> = row.get(19)?;
                Ok(PlayerRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    country: row.get(2)?,
                    rating: row.get(3)?,
                    matches: row.get(4)?,
                    runs: row.get(5)?,
                    wickets: row.get(6)?,
                    average: row.get(7)?,
                    strike_rate: row.get(8)?,
                    base_price: row.get(9)?,
                    category: row.get(10)?,
                    image: row.get(11)?,
                    current_bid: row.get(12)?,
                    highest_bidder: row.get(13)?,
                    sold_status: row.get(14)?,
                    sold_to: row.get(15)?,
                    sold_price: row.get(16)?,
                    sold_at: row.get(17)?,
                    assigned_card: assigned_card_json
                        .and_then(|json| serde_json::from_str(&json).ok()),
                    bid_history: bid_history_json
                        .and_then(|json| serde_json::from_str(&json).ok())
                        .unwrap_or_default(),
                })
            })
            .context("failed to query players")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map player rows")?;

        Ok(players)
    }

    /// Apply a sparse update of auction fields to one player, atomically.
    /// Errors on an unknown id.
    pub fn update_player(&self, player_id: i64, patch: &PlayerPatch) -> Result<()> {
        let mut clauses: Vec<&'static str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(bid) = patch.current_bid {
            clauses.push("current_bid = ?");
            values.push(Value::Integer(bid as i64));
        }
        if let Some(ref bidder) = patch.highest_bidder {
            clauses.push("highest_bidder = ?");
            values.push(match bidder {
                Some(b) => Value::Text(b.clone()),
                None => Value::Null,
            });
        }
        if let Some(ref status) = patch.sold_status {
            clauses.push("sold_status = ?");
            values.push(Value::Text(status.clone()));
        }
        if let Some(ref sold_to) = patch.sold_to {
            clauses.push("sold_to = ?");
            values.push(match sold_to {
                Some(t) => Value::Text(t.clone()),
                None => Value::Null,
            });
        }
        if let Some(sold_price) = patch.sold_price {
            clauses.push("sold_price = ?");
            values.push(match sold_price {
                Some(p) => Value::Integer(p as i64),
                None => Value::Null,
            });
        }
        if let Some(ref card) = patch.assigned_card {
            clauses.push("assigned_card = ?");
            values.push(match card {
                Some(c) => Value::Text(
                    serde_json::to_string(c).context("failed to serialize assigned_card")?,
                ),
                None => Value::Null,
            });
        }
        if let Some(closed) = patch.is_closed {
            clauses.push("is_closed = ?");
            values.push(Value::Integer(closed as i64));
        }
        if let Some(ref history) = patch.bid_history {
            clauses.push("bid_history = ?");
            values.push(Value::Text(
                serde_json::to_string(history).context("failed to serialize bid_history")?,
            ));
        }

        let conn = self.conn();
        if clauses.is_empty() {
            // Nothing to update; still validate the id.
            let exists: bool = conn
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM players WHERE id = ?1)",
                    params![player_id],
                    |row| row.get(0),
                )
                .context("failed to check player existence")?;
            if !exists {
                bail!("unknown player id {player_id}");
            }
            return Ok(());
        }

        let sql = format!("UPDATE players SET {} WHERE id = ?", clauses.join(", "));
        values.push(Value::Integer(player_id));
        let changed = conn
            .execute(&sql, params_from_iter(values.iter()))
            .context("failed to update player")?;
        if changed == 0 {
            bail!("unknown player id {player_id}");
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Teams
    // ------------------------------------------------------------------

    /// Register configured teams, preserving any persisted purse state.
    /// Display fields (code, name, color) are refreshed from config.
    pub fn ensure_teams(&self, teams: &[TeamConfig], starting_purse: u32) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .context("failed to begin teams transaction")?;

        for team in teams {
            tx.execute(
                "INSERT INTO teams (id, code, name, color, purse_balance, initial_purse)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                    code  = excluded.code,
                    name  = excluded.name,
                    color = excluded.color",
                params![team.id, team.code, team.name, team.color, starting_purse],
            )
            .context("failed to upsert team")?;
        }

        tx.commit().context("failed to commit teams")?;
        Ok(())
    }

    /// Load all registered teams.
    pub fn load_teams(&self) -> Result<Vec<TeamRow>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT id, code, name, color, purse_balance, initial_purse, sold_players
                 FROM teams ORDER BY id",
            )
            .context("failed to prepare load_teams query")?;

        let teams = stmt
            .query_map([], |row| {
                let sold_players_json: String = row.get(6)?;
                Ok(TeamRow {
                    id: row.get(0)?,
                    code: row.get(1)?,
                    name: row.get(2)?,
                    color: row.get(3)?,
                    purse_balance: row.get(4)?,
                    initial_purse: row.get(5)?,
                    sold_players: serde_json::from_str(&sold_players_json).unwrap_or_default(),
                })
            })
            .context("failed to query teams")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map team rows")?;

        Ok(teams)
    }

    // ------------------------------------------------------------------
    // Sale transactions
    // ------------------------------------------------------------------

    /// Persist a completed sale: wallet debit, roster append and player
    /// status flip in one transaction, so a crash can never leave the
    /// purse and roster inconsistent.
    pub fn record_sale(
        &self,
        player_id: i64,
        team_id: &str,
        price: u32,
        card: Option<&CardAssignment>,
    ) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .context("failed to begin sale transaction")?;

        let sold_status: String = tx
            .query_row(
                "SELECT sold_status FROM players WHERE id = ?1",
                params![player_id],
                |row| row.get(0),
            )
            .with_context(|| format!("player {player_id} not found"))?;
        if sold_status == "SOLD" {
            bail!("player {player_id} is already sold");
        }

        let (purse, sold_players_json): (u32, String) = tx
            .query_row(
                "SELECT purse_balance, sold_players FROM teams WHERE id = ?1",
                params![team_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .with_context(|| format!("team {team_id} not found"))?;
        if purse < price {
            bail!("insufficient purse balance for team {team_id}");
        }
        let mut sold_players: Vec<i64> =
            serde_json::from_str(&sold_players_json).unwrap_or_default();
        if sold_players.len() >= crate::auction::team::ROSTER_CAP {
            bail!("team {team_id} roster is already at capacity");
        }

        let card_json = card
            .map(serde_json::to_string)
            .transpose()
            .context("failed to serialize assigned_card")?;
        tx.execute(
            "UPDATE players SET
                current_bid = ?1, highest_bidder = NULL, sold_status = 'SOLD',
                is_closed = 1, sold_to = ?2, sold_price = ?1, sold_at = ?3,
                assigned_card = ?4
             WHERE id = ?5",
            params![price, team_id, Utc::now().to_rfc3339(), card_json, player_id],
        )
        .context("failed to mark player sold")?;

        sold_players.push(player_id);
        tx.execute(
            "UPDATE teams SET purse_balance = ?1, sold_players = ?2 WHERE id = ?3",
            params![
                purse - price,
                serde_json::to_string(&sold_players).context("failed to serialize roster")?,
                team_id
            ],
        )
        .context("failed to debit team purse")?;

        tx.commit().context("failed to commit sale")?;
        Ok(())
    }

    /// Persist a reopen of a SOLD player: wallet refund (the recorded sale
    /// price), roster removal and player reset in one transaction.
    pub fn revert_sale(&self, player_id: i64) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .context("failed to begin revert transaction")?;

        let (sold_status, sold_to, sold_price): (String, Option<String>, Option<u32>) = tx
            .query_row(
                "SELECT sold_status, sold_to, sold_price FROM players WHERE id = ?1",
                params![player_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .with_context(|| format!("player {player_id} not found"))?;
        if sold_status != "SOLD" {
            bail!("revert is only allowed for SOLD players");
        }
        let Some(team_id) = sold_to else {
            bail!("no team is associated with sold player {player_id}");
        };
        let refund = sold_price.unwrap_or(0);

        tx.execute(
            "UPDATE players SET
                highest_bidder = NULL, sold_status = 'OPEN', is_closed = 0,
                sold_to = NULL, sold_price = NULL, sold_at = NULL, assigned_card = NULL
             WHERE id = ?1",
            params![player_id],
        )
        .context("failed to reopen player")?;

        let (purse, initial_purse, sold_players_json): (u32, u32, String) = tx
            .query_row(
                "SELECT purse_balance, initial_purse, sold_players FROM teams WHERE id = ?1",
                params![team_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .with_context(|| format!("team {team_id} not found for reverted player"))?;
        let mut sold_players: Vec<i64> =
            serde_json::from_str(&sold_players_json).unwrap_or_default();
        sold_players.retain(|&id| id != player_id);

        tx.execute(
            "UPDATE teams SET purse_balance = ?1, sold_players = ?2 WHERE id = ?3",
            params![
                (purse + refund).min(initial_purse),
                serde_json::to_string(&sold_players).context("failed to serialize roster")?,
                team_id
            ],
        )
        .context("failed to credit team purse")?;

        tx.commit().context("failed to commit revert")?;
        Ok(())
    }

    /// Restore every player to OPEN/untouched and every team to its
    /// starting wallet with an empty roster, in one transaction. Returns
    /// the refreshed pool.
    pub fn reset_auction(&self) -> Result<Vec<PlayerRecord>> {
        {
            let mut conn = self.conn();
            let tx = conn
                .transaction()
                .context("failed to begin reset transaction")?;
            tx.execute_batch(
                "UPDATE players SET
                    current_bid = NULL, highest_bidder = NULL, sold_status = 'OPEN',
                    is_closed = 0, sold_to = NULL, sold_price = NULL, sold_at = NULL,
                    assigned_card = NULL, bid_history = '[]';
                 UPDATE teams SET purse_balance = initial_purse, sold_players = '[]';",
            )
            .context("failed to reset auction tables")?;
            tx.commit().context("failed to commit reset")?;
        }
        self.load_players()
    }

    // ------------------------------------------------------------------
    // Key-value auction state (viewer-side team cache and the like)
    // ------------------------------------------------------------------

    /// Persist an arbitrary JSON value under `key`. Repeated saves
    /// overwrite the previous value.
    pub fn save_state(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let conn = self.conn();
        let json_str = serde_json::to_string(value).context("failed to serialize state value")?;
        conn.execute(
            "INSERT OR REPLACE INTO auction_state (key, value) VALUES (?1, ?2)",
            params![key, json_str],
        )
        .context("failed to save state")?;
        Ok(())
    }

    /// Load a previously saved JSON value by `key`. Returns `None` if the
    /// key does not exist.
    pub fn load_state(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT value FROM auction_state WHERE key = ?1")
            .context("failed to prepare load_state query")?;

        let mut rows = stmt
            .query_map(params![key], |row| {
                let json_str: String = row.get(0)?;
                Ok(json_str)
            })
            .context("failed to query auction state")?;

        match rows.next() {
            Some(row_result) => {
                let json_str = row_result.context("failed to read state row")?;
                let value: serde_json::Value = serde_json::from_str(&json_str)
                    .context("failed to deserialize state value")?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}
