use eyre::Result;
use rusqlite::{params, Connection, Row};

use crate::models::{BotCount, TokenCount};

/// Count filter applied to per-token approval counts in the range query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountFilter {
    /// count in `[min, max]`
    Range { min: i64, max: i64 },
    /// count exactly `value`
    Fixed(i64),
}

impl CountFilter {
    fn bounds(self) -> (i64, i64) {
        match self {
            CountFilter::Range { min, max } => (min, max),
            CountFilter::Fixed(value) => (value, value),
        }
    }
}

fn token_count_from_row(r: &Row<'_>) -> rusqlite::Result<TokenCount> {
    Ok(TokenCount {
        token_id: r.get(0)?,
        token_address: r.get(1)?,
        token_name: r.get(2)?,
        count: r.get(3)?,
        last_seen: r.get(4)?,
    })
}

/// Tokens with the most approvals in `(now - window, now)`, highest count first
pub fn top_tokens(conn: &Connection, now: i64, window: i64, limit: u32) -> Result<Vec<TokenCount>> {
    let mut stmt = conn.prepare(
        "
        SELECT t.id, t.address, t.name, COUNT(*) AS cnt, MAX(a.timestamp) AS last_seen
        FROM approval_activities a
        JOIN tokens t ON t.id = a.token_id
        WHERE a.timestamp > ?1 AND a.timestamp < ?2
        GROUP BY a.token_id
        ORDER BY cnt DESC, last_seen DESC
        LIMIT ?3
        ",
    )?;

    let rows = stmt
        .query_map(params![now - window, now, limit as i64], token_count_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Tokens whose approval count in `(now - window, now)` satisfies `filter`,
/// most recently approved first
pub fn tokens_in_range(
    conn: &Connection,
    now: i64,
    window: i64,
    filter: CountFilter,
    limit: u32,
) -> Result<Vec<TokenCount>> {
    let (min, max) = filter.bounds();
    let mut stmt = conn.prepare(
        "
        SELECT t.id, t.address, t.name, COUNT(*) AS cnt, MAX(a.timestamp) AS last_seen
        FROM approval_activities a
        JOIN tokens t ON t.id = a.token_id
        WHERE a.timestamp > ?1 AND a.timestamp < ?2
        GROUP BY a.token_id
        HAVING cnt >= ?3 AND cnt <= ?4
        ORDER BY last_seen DESC
        LIMIT ?5
        ",
    )?;

    let rows = stmt
        .query_map(
            params![now - window, now, min, max, limit as i64],
            token_count_from_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Approval count per known sniper bot for one token, in bot id order.
/// Bots with no approvals for the token are listed with zero.
pub fn bot_counts_for_token(conn: &Connection, token_address: &str) -> Result<Vec<BotCount>> {
    let mut stmt = conn.prepare(
        "
        SELECT s.name, COUNT(a.id)
        FROM sniper_bots s
        LEFT JOIN approval_activities a
            ON a.sniper_id = s.id
            AND a.token_id = (SELECT id FROM tokens WHERE address = LOWER(?1))
        GROUP BY s.id
        ORDER BY s.id
        ",
    )?;

    let rows = stmt
        .query_map([token_address], |r| {
            Ok(BotCount {
                name: r.get(0)?,
                count: r.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use rusqlite::Connection;

    use crate::{db, models::NewToken};

    /// Seed `count` approvals for `address` spread over the seconds before `at`
    pub fn seed_token(conn: &Connection, bot_id: i64, address: &str, count: i64, at: i64) -> i64 {
        let token = db::insert_token_if_absent(
            conn,
            &NewToken {
                address: address.to_string(),
                name: format!("Token{address}"),
                deployer_address: "0xdeployer".to_string(),
                pair_address: "0xpair".to_string(),
                trading_enabled: true,
            },
        )
        .unwrap();
        for i in 0..count {
            db::record_approval(conn, bot_id, token.id, at - i, &format!("{address}-{at}-{i}"))
                .unwrap();
        }
        token.id
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::seed_token;
    use super::*;
    use crate::db::{self, test_conn};

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn range_mode_keeps_counts_inside_bounds() {
        let conn = test_conn();
        let bot = db::insert_sniper_bot(&conn, "banana", "0xb1").unwrap();
        seed_token(&conn, bot.id, "0xa", 1, NOW - 60);
        seed_token(&conn, bot.id, "0xb", 3, NOW - 60);
        seed_token(&conn, bot.id, "0xc", 6, NOW - 60);

        let rows =
            tokens_in_range(&conn, NOW, 86_400, CountFilter::Range { min: 2, max: 5 }, 10).unwrap();
        let addresses: Vec<_> = rows.iter().map(|r| r.token_address.as_str()).collect();
        assert_eq!(addresses, vec!["0xb"]);
        assert_eq!(rows[0].count, 3);
    }

    #[test]
    fn fixed_mode_matches_exact_count() {
        let conn = test_conn();
        let bot = db::insert_sniper_bot(&conn, "banana", "0xb1").unwrap();
        seed_token(&conn, bot.id, "0xa", 4, NOW - 100);
        seed_token(&conn, bot.id, "0xb", 4, NOW - 10);
        seed_token(&conn, bot.id, "0xc", 5, NOW - 10);

        let rows = tokens_in_range(&conn, NOW, 86_400, CountFilter::Fixed(4), 10).unwrap();
        let addresses: Vec<_> = rows.iter().map(|r| r.token_address.as_str()).collect();
        // most recently approved first
        assert_eq!(addresses, vec!["0xb", "0xa"]);
    }

    #[test]
    fn window_bounds_are_exclusive() {
        let conn = test_conn();
        let bot = db::insert_sniper_bot(&conn, "banana", "0xb1").unwrap();
        seed_token(&conn, bot.id, "0xold", 1, NOW - 3_600);
        seed_token(&conn, bot.id, "0xnow", 1, NOW);
        seed_token(&conn, bot.id, "0xin", 1, NOW - 1);

        let rows = top_tokens(&conn, NOW, 3_600, 10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].token_address, "0xin");
    }

    #[test]
    fn top_tokens_sorted_and_limited() {
        let conn = test_conn();
        let bot = db::insert_sniper_bot(&conn, "banana", "0xb1").unwrap();
        for i in 1..=12 {
            seed_token(&conn, bot.id, &format!("0x{i:02}"), i, NOW - 30);
        }

        let rows = top_tokens(&conn, NOW, 3_600, 10).unwrap();
        assert_eq!(rows.len(), 10);
        assert!(rows.windows(2).all(|w| w[0].count >= w[1].count));
        assert_eq!(rows[0].token_address, "0x12");
        assert_eq!(rows[0].count, 12);
    }

    #[test]
    fn bot_counts_include_zero_rows_and_sum_to_total() {
        let conn = test_conn();
        let banana = db::insert_sniper_bot(&conn, "banana", "0xb1").unwrap();
        let maestro = db::insert_sniper_bot(&conn, "maestro", "0xb2").unwrap();
        db::insert_sniper_bot(&conn, "idle", "0xb3").unwrap();
        let token_id = seed_token(&conn, banana.id, "0xt", 3, NOW);
        db::record_approval(&conn, maestro.id, token_id, NOW, "0xm1").unwrap();

        let counts = bot_counts_for_token(&conn, "0xT").unwrap();
        assert_eq!(
            counts,
            vec![
                BotCount { name: "banana".into(), count: 3 },
                BotCount { name: "maestro".into(), count: 1 },
                BotCount { name: "idle".into(), count: 0 },
            ]
        );
        let total: i64 = counts.iter().map(|c| c.count).sum();
        assert_eq!(total, db::count_approvals_for_token(&conn, token_id).unwrap());
    }
}
