use std::sync::{Arc, Mutex, MutexGuard};

use eyre::{eyre, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::models::{ApprovalActivity, NewToken, ScopeOption, ScopeOptionUser, ScrapeGroup, SniperBot, Token};

/// Connection shared by the listener, the bot, the notifier and the API
pub type SharedConn = Arc<Mutex<Connection>>;

const INIT_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS tokens (
  id               INTEGER PRIMARY KEY AUTOINCREMENT,
  address          TEXT UNIQUE NOT NULL,
  name             TEXT NOT NULL,
  deployer_address TEXT NOT NULL,
  pair_address     TEXT NOT NULL,
  trading_enabled  INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS sniper_bots (
  id      INTEGER PRIMARY KEY AUTOINCREMENT,
  address TEXT UNIQUE NOT NULL,
  name    TEXT UNIQUE NOT NULL
);

CREATE TABLE IF NOT EXISTS approval_activities (
  id        INTEGER PRIMARY KEY AUTOINCREMENT,
  sniper_id INTEGER NOT NULL REFERENCES sniper_bots(id) ON DELETE CASCADE,
  token_id  INTEGER NOT NULL REFERENCES tokens(id),
  timestamp INTEGER NOT NULL, -- unix seconds
  tx_hash   TEXT UNIQUE NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_approval_activities_timestamp
  ON approval_activities(timestamp);

CREATE TABLE IF NOT EXISTS scope_option_users (
  id            INTEGER PRIMARY KEY AUTOINCREMENT,
  user_id       TEXT NOT NULL,
  option_type   INTEGER NOT NULL,
  status        INTEGER NOT NULL,
  start_time    INTEGER NOT NULL,
  expire_time   INTEGER NOT NULL,
  token_address TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS keywords (
  id      INTEGER PRIMARY KEY AUTOINCREMENT,
  keyword TEXT UNIQUE NOT NULL
);

CREATE TABLE IF NOT EXISTS scrape_groups (
  id          INTEGER PRIMARY KEY AUTOINCREMENT,
  group_id    TEXT UNIQUE NOT NULL,
  group_name  TEXT NOT NULL,
  group_title TEXT NOT NULL
);
"#;

/// Connect to SQLite (with WAL mode for performance)
pub fn connect(path: &str) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    Ok(conn)
}

/// Run schema migrations
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.execute_batch(INIT_SQL)?;
    Ok(())
}

pub fn lock(conn: &SharedConn) -> Result<MutexGuard<'_, Connection>> {
    conn.lock().map_err(|_| eyre!("database mutex poisoned"))
}

// ---------- tokens ----------

fn token_from_row(r: &Row<'_>) -> rusqlite::Result<Token> {
    Ok(Token {
        id: r.get(0)?,
        address: r.get(1)?,
        name: r.get(2)?,
        deployer_address: r.get(3)?,
        pair_address: r.get(4)?,
        trading_enabled: r.get(5)?,
    })
}

pub fn find_token_by_address(conn: &Connection, address: &str) -> Result<Option<Token>> {
    let token = conn
        .query_row(
            "SELECT id, address, name, deployer_address, pair_address, trading_enabled
             FROM tokens WHERE address = LOWER(?1)",
            [address],
            token_from_row,
        )
        .optional()?;
    Ok(token)
}

/// Insert a token unless the address already exists, then return the stored row.
/// A row inserted by a concurrent path wins and is returned unchanged.
pub fn insert_token_if_absent(conn: &Connection, token: &NewToken) -> Result<Token> {
    let address = token.address.to_lowercase();
    conn.execute(
        r#"
        INSERT INTO tokens (address, name, deployer_address, pair_address, trading_enabled)
        VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT(address) DO NOTHING
        "#,
        params![
            address,
            token.name,
            token.deployer_address,
            token.pair_address,
            token.trading_enabled
        ],
    )?;

    find_token_by_address(conn, &address)?
        .ok_or_else(|| eyre!("token {} missing right after insert", address))
}

// ---------- sniper bots ----------

fn sniper_from_row(r: &Row<'_>) -> rusqlite::Result<SniperBot> {
    Ok(SniperBot {
        id: r.get(0)?,
        address: r.get(1)?,
        name: r.get(2)?,
    })
}

pub fn list_sniper_bots(conn: &Connection) -> Result<Vec<SniperBot>> {
    let mut stmt = conn.prepare("SELECT id, address, name FROM sniper_bots ORDER BY id")?;
    let bots = stmt
        .query_map([], sniper_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(bots)
}

pub fn find_sniper_bot(conn: &Connection, id: i64) -> Result<Option<SniperBot>> {
    let bot = conn
        .query_row(
            "SELECT id, address, name FROM sniper_bots WHERE id = ?1",
            [id],
            sniper_from_row,
        )
        .optional()?;
    Ok(bot)
}

/// Existing bot sharing either the name or the address
pub fn find_sniper_conflict(
    conn: &Connection,
    name: &str,
    address: &str,
) -> Result<Option<SniperBot>> {
    let bot = conn
        .query_row(
            "SELECT id, address, name FROM sniper_bots
             WHERE address = LOWER(?1) OR name = ?2
             LIMIT 1",
            params![address, name],
            sniper_from_row,
        )
        .optional()?;
    Ok(bot)
}

pub fn insert_sniper_bot(conn: &Connection, name: &str, address: &str) -> Result<SniperBot> {
    conn.execute(
        "INSERT INTO sniper_bots (address, name) VALUES (LOWER(?1), ?2)",
        params![address, name],
    )?;
    Ok(SniperBot {
        id: conn.last_insert_rowid(),
        address: address.to_lowercase(),
        name: name.to_string(),
    })
}

/// Delete a bot (and, through the cascade, its approval history)
pub fn delete_sniper_bot(conn: &Connection, id: i64) -> Result<bool> {
    let removed = conn.execute("DELETE FROM sniper_bots WHERE id = ?1", [id])?;
    Ok(removed > 0)
}

// ---------- approval activities ----------

/// Append one approval activity. Returns false when the tx hash was already recorded.
pub fn record_approval(
    conn: &Connection,
    sniper_id: i64,
    token_id: i64,
    timestamp: i64,
    tx_hash: &str,
) -> Result<bool> {
    let inserted = conn.execute(
        r#"
        INSERT INTO approval_activities (sniper_id, token_id, timestamp, tx_hash)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(tx_hash) DO NOTHING
        "#,
        params![sniper_id, token_id, timestamp, tx_hash],
    )?;
    Ok(inserted > 0)
}

/// Latest approvals for one token, newest first
pub fn recent_approvals(conn: &Connection, token_id: i64, limit: u32) -> Result<Vec<ApprovalActivity>> {
    let mut stmt = conn.prepare(
        "SELECT id, sniper_id, token_id, timestamp, tx_hash
         FROM approval_activities
         WHERE token_id = ?1
         ORDER BY timestamp DESC, id DESC
         LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(params![token_id, limit as i64], |r| {
            Ok(ApprovalActivity {
                id: r.get(0)?,
                sniper_id: r.get(1)?,
                token_id: r.get(2)?,
                timestamp: r.get(3)?,
                tx_hash: r.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

#[cfg(test)]
pub(crate) fn count_approvals_for_token(conn: &Connection, token_id: i64) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM approval_activities WHERE token_id = ?1",
        [token_id],
        |r| r.get(0),
    )?;
    Ok(count)
}

// ---------- scope subscriptions ----------

fn scope_from_row(r: &Row<'_>) -> rusqlite::Result<ScopeOptionUser> {
    let option: i64 = r.get(2)?;
    Ok(ScopeOptionUser {
        id: r.get(0)?,
        user_id: r.get(1)?,
        option_type: ScopeOption::from_i64(option).unwrap_or(ScopeOption::CheckCa),
        status: r.get(3)?,
        start_time: r.get(4)?,
        expire_time: r.get(5)?,
        token_address: r.get(6)?,
    })
}

/// Deactivate every subscription of `user_id`, then create the new active one
pub fn replace_scope_subscription(
    conn: &Connection,
    user_id: &str,
    option: ScopeOption,
    token_address: &str,
    now: i64,
    expire_duration: i64,
) -> Result<ScopeOptionUser> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "UPDATE scope_option_users SET status = 0 WHERE user_id = ?1",
        [user_id],
    )?;
    tx.execute(
        r#"
        INSERT INTO scope_option_users
            (user_id, option_type, status, start_time, expire_time, token_address)
        VALUES (?1, ?2, 1, ?3, ?4, ?5)
        "#,
        params![
            user_id,
            option.as_i64(),
            now,
            now + expire_duration,
            token_address
        ],
    )?;
    let id = tx.last_insert_rowid();
    tx.commit()?;

    Ok(ScopeOptionUser {
        id,
        user_id: user_id.to_string(),
        option_type: option,
        status: true,
        start_time: now,
        expire_time: now + expire_duration,
        token_address: token_address.to_string(),
    })
}

pub fn active_subscriptions(
    conn: &Connection,
    option: ScopeOption,
    now: i64,
) -> Result<Vec<ScopeOptionUser>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, option_type, status, start_time, expire_time, token_address
         FROM scope_option_users
         WHERE option_type = ?1 AND status = 1 AND expire_time >= ?2
         ORDER BY id",
    )?;
    let subs = stmt
        .query_map(params![option.as_i64(), now], scope_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(subs)
}

// ---------- keywords & scrape groups ----------

pub fn add_keyword(conn: &Connection, keyword: &str) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT INTO keywords (keyword) VALUES (?1) ON CONFLICT(keyword) DO NOTHING",
        [keyword],
    )?;
    Ok(inserted > 0)
}

pub fn delete_keyword(conn: &Connection, keyword: &str) -> Result<bool> {
    let removed = conn.execute("DELETE FROM keywords WHERE keyword = ?1", [keyword])?;
    Ok(removed > 0)
}

pub fn list_keywords(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT keyword FROM keywords ORDER BY id")?;
    let keywords = stmt
        .query_map([], |r| r.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(keywords)
}

pub fn add_group(conn: &Connection, group_id: &str, name: &str, title: &str) -> Result<bool> {
    let inserted = conn.execute(
        r#"
        INSERT INTO scrape_groups (group_id, group_name, group_title)
        VALUES (?1, ?2, ?3)
        ON CONFLICT(group_id) DO NOTHING
        "#,
        params![group_id, name, title],
    )?;
    Ok(inserted > 0)
}

pub fn delete_group(conn: &Connection, group_id: &str) -> Result<bool> {
    let removed = conn.execute("DELETE FROM scrape_groups WHERE group_id = ?1", [group_id])?;
    Ok(removed > 0)
}

pub fn list_groups(conn: &Connection) -> Result<Vec<ScrapeGroup>> {
    let mut stmt =
        conn.prepare("SELECT id, group_id, group_name, group_title FROM scrape_groups ORDER BY id")?;
    let groups = stmt
        .query_map([], |r| {
            Ok(ScrapeGroup {
                id: r.get(0)?,
                group_id: r.get(1)?,
                group_name: r.get(2)?,
                group_title: r.get(3)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(groups)
}

#[cfg(test)]
pub(crate) fn test_conn() -> Connection {
    let conn = Connection::open_in_memory().expect("in-memory db");
    run_migrations(&conn).expect("migrations");
    conn
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_token(address: &str, name: &str) -> NewToken {
        NewToken {
            address: address.to_string(),
            name: name.to_string(),
            deployer_address: String::new(),
            pair_address: String::new(),
            trading_enabled: true,
        }
    }

    #[test]
    fn token_insert_is_idempotent_and_keeps_first_row() {
        let conn = test_conn();
        let first = insert_token_if_absent(&conn, &new_token("0xABCDEF", "First")).unwrap();
        let second = insert_token_if_absent(&conn, &new_token("0xabcdef", "Second")).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.address, "0xabcdef");
        assert_eq!(first.name, "First");
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM tokens", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn duplicate_tx_hash_is_absorbed() {
        let conn = test_conn();
        let bot = insert_sniper_bot(&conn, "banana", "0xAA").unwrap();
        let token = insert_token_if_absent(&conn, &new_token("0x01", "T")).unwrap();

        assert!(record_approval(&conn, bot.id, token.id, 100, "0xhash").unwrap());
        assert!(!record_approval(&conn, bot.id, token.id, 101, "0xhash").unwrap());
        assert_eq!(count_approvals_for_token(&conn, token.id).unwrap(), 1);
    }

    #[test]
    fn recent_approvals_newest_first() {
        let conn = test_conn();
        let bot = insert_sniper_bot(&conn, "banana", "0xaa").unwrap();
        let token = insert_token_if_absent(&conn, &new_token("0x01", "T")).unwrap();
        record_approval(&conn, bot.id, token.id, 100, "0x1").unwrap();
        record_approval(&conn, bot.id, token.id, 300, "0x3").unwrap();
        record_approval(&conn, bot.id, token.id, 200, "0x2").unwrap();

        let recent = recent_approvals(&conn, token.id, 2).unwrap();
        let hashes: Vec<_> = recent.iter().map(|a| a.tx_hash.as_str()).collect();
        assert_eq!(hashes, vec!["0x3", "0x2"]);
        assert_eq!(recent[0].sniper_id, bot.id);
    }

    #[test]
    fn sniper_conflict_matches_name_or_address() {
        let conn = test_conn();
        insert_sniper_bot(&conn, "banana", "0xAbC").unwrap();

        assert!(find_sniper_conflict(&conn, "banana", "0xdef").unwrap().is_some());
        assert!(find_sniper_conflict(&conn, "maestro", "0xABC").unwrap().is_some());
        assert!(find_sniper_conflict(&conn, "maestro", "0xdef").unwrap().is_none());
    }

    #[test]
    fn deleting_a_bot_drops_its_activity() {
        let conn = test_conn();
        let bot = insert_sniper_bot(&conn, "banana", "0xaa").unwrap();
        let token = insert_token_if_absent(&conn, &new_token("0x01", "T")).unwrap();
        record_approval(&conn, bot.id, token.id, 100, "0x1").unwrap();

        assert!(delete_sniper_bot(&conn, bot.id).unwrap());
        assert!(!delete_sniper_bot(&conn, bot.id).unwrap());
        assert_eq!(count_approvals_for_token(&conn, token.id).unwrap(), 0);
    }

    #[test]
    fn new_subscription_deactivates_previous_ones() {
        let conn = test_conn();
        replace_scope_subscription(&conn, "42", ScopeOption::CheckCa, "0x01", 1_000, 7_200).unwrap();
        let latest =
            replace_scope_subscription(&conn, "42", ScopeOption::CheckCa, "0x02", 1_100, 7_200)
                .unwrap();

        let active = active_subscriptions(&conn, ScopeOption::CheckCa, 1_200).unwrap();
        assert_eq!(active, vec![latest]);
        assert_eq!(active[0].expire_time, 8_300);
    }

    #[test]
    fn expired_subscriptions_are_not_active() {
        let conn = test_conn();
        replace_scope_subscription(&conn, "7", ScopeOption::CheckCa, "0x01", 1_000, 100).unwrap();

        assert_eq!(active_subscriptions(&conn, ScopeOption::CheckCa, 1_100).unwrap().len(), 1);
        assert!(active_subscriptions(&conn, ScopeOption::CheckCa, 1_101).unwrap().is_empty());
    }

    #[test]
    fn keywords_and_groups_are_unique_sets() {
        let conn = test_conn();
        assert!(add_keyword(&conn, "launch").unwrap());
        assert!(!add_keyword(&conn, "launch").unwrap());
        assert_eq!(list_keywords(&conn).unwrap(), vec!["launch".to_string()]);
        assert!(delete_keyword(&conn, "launch").unwrap());
        assert!(list_keywords(&conn).unwrap().is_empty());

        assert!(add_group(&conn, "-100123", "alpha", "Alpha Calls").unwrap());
        assert!(!add_group(&conn, "-100123", "alpha", "Alpha Calls").unwrap());
        assert_eq!(list_groups(&conn).unwrap()[0].group_title, "Alpha Calls");
        assert!(delete_group(&conn, "-100123").unwrap());
    }
}
