use std::fmt::Write as _;

use eyre::Result;
use reqwest::Url;
use rusqlite::Connection;
use teloxide::types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup, ParseMode};

use crate::{
    aggregator,
    config::BotLinks,
    db::{self, SharedConn},
    models::{BotCount, Token},
    telegram::{Messenger, Outgoing},
};

const UNKNOWN: &str = "Unknown";

/// Approval breakdown for one token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenReport {
    pub address: String,
    pub token: Option<Token>,
    pub bots: Vec<BotCount>,
}

impl TokenReport {
    pub fn load(conn: &Connection, address: &str) -> Result<Self> {
        let address = address.to_lowercase();
        let token = db::find_token_by_address(conn, &address)?;
        let bots = aggregator::bot_counts_for_token(conn, &address)?;
        Ok(Self {
            address,
            token,
            bots,
        })
    }

    pub fn total(&self) -> i64 {
        self.bots.iter().map(|b| b.count).sum()
    }

    pub fn render(&self) -> String {
        let name = self
            .token
            .as_ref()
            .map(|t| escape_html(&t.name))
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| UNKNOWN.to_string());
        let address = self
            .token
            .as_ref()
            .map(|t| t.address.as_str())
            .unwrap_or(self.address.as_str());
        let deployer = self
            .token
            .as_ref()
            .map(|t| t.deployer_address.as_str())
            .filter(|d| !d.is_empty())
            .unwrap_or(UNKNOWN);

        let mut msg = format!("<b>🚨 {} preapprovals for ${}! 🚨</b>\n", self.total(), name);
        for (i, bot) in self.bots.iter().enumerate() {
            let branch = if i + 1 == self.bots.len() { "└" } else { "├" };
            let _ = writeln!(msg, "{} 🤖 <b>{}</b>: {}", branch, escape_html(&bot.name), bot.count);
        }

        let _ = writeln!(msg, "\n<b>💲Token Name:</b> {}", name);
        let _ = writeln!(
            msg,
            "├ <b>Token Address:</b> <a href=\"https://etherscan.io/address/{0}\">{0}</a>",
            address
        );
        let _ = writeln!(
            msg,
            "└ <b>Deployer Wallet:</b> <a href=\"https://etherscan.io/address/{0}\">{0}</a>",
            deployer
        );

        msg.push_str("\n<b>📈 Charts:</b>\n");
        let _ = write!(
            msg,
            "└─ <a href=\"https://www.dexview.com/eth/{0}\">DEXView</a> | \
             <a href=\"https://photon.tinyastro.io/en/lp/{0}\">Photon</a> | \
             <a href=\"https://www.dextools.io/app/ether/pair-explorer/{0}\">DEXTools</a> | \
             <a href=\"https://dexscreener.com/ethereum/{0}\">DEXScreen</a>",
            address
        );

        msg.push_str("\n\n👀 <b>#TradingEnabled</b> 👀");
        msg
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn button(text: &str, url: &Url) -> InlineKeyboardButton {
    InlineKeyboardButton::url(text, url.clone())
}

/// Buttons under every approval report
pub fn scope_keyboard(links: &BotLinks) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![button("CA EYE Bot", &links.ca_bot)],
        vec![
            button("🍌 Snipe Banana Bot", &links.banana_bot),
            button("🎯 Snipe Maestro Bot", &links.maestro_bot),
        ],
        vec![
            button("🛡 TTF Scan", &links.ttf_bot),
            button("🛡 Otto Scan", &links.otto_bot),
        ],
    ])
}

/// Buttons under the welcome message
pub fn welcome_keyboard(links: &BotLinks) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            button("🍌 Snipe Banana Bot", &links.banana_bot),
            button("🎯 Snipe Maestro Bot", &links.maestro_bot),
        ],
        vec![
            button("🔭 Scope EYE", &links.scope_bot),
            button("🔎 CA EYE", &links.ca_bot),
        ],
    ])
}

pub fn render_for(conn: &SharedConn, address: &str) -> Result<String> {
    let db = db::lock(conn)?;
    Ok(TokenReport::load(&db, address)?.render())
}

/// Send a rendered report with the scope keyboard
pub async fn deliver<M: Messenger>(
    messenger: &M,
    links: &BotLinks,
    chat_id: ChatId,
    text: String,
) -> Result<()> {
    messenger
        .send(
            Outgoing::text(chat_id, text)
                .parse_mode(ParseMode::Html)
                .keyboard(scope_keyboard(links)),
        )
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{aggregator::fixtures::seed_token, db::test_conn};

    #[test]
    fn report_lists_every_bot_and_sums_counts() {
        let conn = test_conn();
        let banana = db::insert_sniper_bot(&conn, "banana", "0xb1").unwrap();
        let maestro = db::insert_sniper_bot(&conn, "maestro", "0xb2").unwrap();
        let token_id = seed_token(&conn, banana.id, "0xtok", 2, 1_000);
        db::record_approval(&conn, maestro.id, token_id, 1_000, "0xother").unwrap();
        db::insert_sniper_bot(&conn, "idle", "0xb3").unwrap();

        let report = TokenReport::load(&conn, "0xTOK").unwrap();
        assert_eq!(report.total(), db::count_approvals_for_token(&conn, token_id).unwrap());

        let text = report.render();
        assert!(text.starts_with("<b>🚨 3 preapprovals for $Token0xtok! 🚨</b>\n"));
        assert!(text.contains("├ 🤖 <b>banana</b>: 2\n"));
        assert!(text.contains("├ 🤖 <b>maestro</b>: 1\n"));
        assert!(text.contains("└ 🤖 <b>idle</b>: 0\n"));
        assert!(text.contains("https://dexscreener.com/ethereum/0xtok"));
        assert!(text.contains("etherscan.io/address/0xdeployer"));
        assert!(text.ends_with("#TradingEnabled</b> 👀"));
    }

    #[test]
    fn unknown_token_renders_placeholders() {
        let conn = test_conn();
        let report = TokenReport::load(&conn, "0xnothing").unwrap();

        let text = report.render();
        assert!(text.starts_with("<b>🚨 0 preapprovals for $Unknown! 🚨</b>"));
        assert!(text.contains("<b>Deployer Wallet:</b> <a href=\"https://etherscan.io/address/Unknown\">Unknown</a>"));
        assert!(text.contains("https://www.dexview.com/eth/0xnothing"));
    }

    #[test]
    fn token_names_are_escaped() {
        let conn = test_conn();
        db::insert_token_if_absent(
            &conn,
            &crate::models::NewToken {
                address: "0xevil".into(),
                name: "<script>&".into(),
                deployer_address: String::new(),
                pair_address: String::new(),
                trading_enabled: true,
            },
        )
        .unwrap();

        let text = TokenReport::load(&conn, "0xevil").unwrap().render();
        assert!(text.contains("$&lt;script&gt;&amp;!"));
    }

    #[test]
    fn report_keyboard_links_every_bot() {
        let links = crate::config::test_config().links;
        let keyboard = scope_keyboard(&links);
        let rows: Vec<usize> = keyboard.inline_keyboard.iter().map(Vec::len).collect();
        assert_eq!(rows, vec![1, 2, 2]);
        assert_eq!(keyboard.inline_keyboard[0][0].text, "CA EYE Bot");
    }
}
