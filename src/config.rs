use alloy::primitives::{address, Address};
use dotenvy::dotenv;
use eyre::{eyre, Result, WrapErr};
use reqwest::Url;
use std::{collections::HashSet, env, fmt::Display, str::FromStr, time::Duration};
use tracing::info;

const UNISWAP_V2_FACTORY: Address = address!("0x5C69bEe701ef814a2B6a3EDD4B1652CB9cc5aA6f");
const WETH: Address = address!("0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");

/// Links behind the inline keyboards attached to bot messages
#[derive(Debug, Clone)]
pub struct BotLinks {
    pub ca_bot: Url,
    pub banana_bot: Url,
    pub maestro_bot: Url,
    pub ttf_bot: Url,
    pub otto_bot: Url,
    pub scope_bot: Url,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_bot_token: String,
    pub alchemy_ws_url: String,
    pub rpc_http_url: String,
    pub db_path: String,
    pub port: u16,
    pub admin_ids: HashSet<String>,
    pub expire_duration: i64,     // seconds a show_ca subscription stays active
    pub post_interval: Duration,  // re-notification period
    pub show_all_window: i64,     // seconds
    pub show_all_limit: u32,
    pub show_range_window: i64,   // seconds
    pub show_range_limit: u32,
    pub uniswap_factory: Address,
    pub weth_address: Address,
    pub links: BotLinks,
}

impl Config {
    pub fn is_admin(&self, user_id: &str) -> bool {
        self.admin_ids.contains(user_id)
    }
}

fn required(key: &str) -> Result<String> {
    env::var(key).map_err(|_| eyre!("{} must be set", key))
}

fn parsed_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Like `parsed_or`, but the value must parse and be above zero
fn positive_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr + PartialOrd + Default + Display,
{
    let value = match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| eyre!("{} must be a number, got {:?}", key, raw))?,
        Err(_) => default,
    };
    if value <= T::default() {
        return Err(eyre!("{} must be greater than zero, got {}", key, value));
    }
    Ok(value)
}

fn url_or(key: &str, default: &str) -> Result<Url> {
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    Url::parse(&raw).wrap_err_with(|| format!("{} is not a valid URL: {}", key, raw))
}

pub fn load() -> Result<Config> {
    dotenv().ok(); // Load from .env file

    let telegram_bot_token = required("TELEGRAM_BOT_TOKEN")
        .or_else(|_| required("SCOPE_EYE_BOT_TOKEN"))?;
    let alchemy_ws_url = required("ALCHEMY_WS_URL")?;
    let rpc_http_url = required("RPC_HTTP_URL").or_else(|_| required("ALCHEMY_API_URL"))?;

    let db_path = env::var("DATABASE_URL").unwrap_or_else(|_| "scope.db".to_string());

    let admin_ids: HashSet<String> = env::var("ADMIN_IDS")
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    let cfg = Config {
        telegram_bot_token,
        alchemy_ws_url,
        rpc_http_url,
        db_path,
        port: parsed_or("PORT", 8080),
        admin_ids,
        expire_duration: positive_or("EXPIRE_DURATION", 7200)?,
        post_interval: Duration::from_secs(positive_or("POST_INTERVAL", 1200)?),
        show_all_window: positive_or("SHOW_ALL_WINDOW", 3600)?,
        show_all_limit: positive_or("SHOW_ALL_LIMIT", 10)?,
        show_range_window: positive_or("SHOW_RANGE_WINDOW", 86_400)?,
        show_range_limit: positive_or("SHOW_RANGE_LIMIT", 10)?,
        uniswap_factory: parsed_or("UNISWAP_FACTORY", UNISWAP_V2_FACTORY),
        weth_address: parsed_or("WETH_ADDRESS", WETH),
        links: BotLinks {
            ca_bot: url_or("CA_BOT_URL", "https://t.me/ca_eye_bot")?,
            banana_bot: url_or("BANANA_BOT_URL", "https://t.me/BananaGunSniper_bot")?,
            maestro_bot: url_or("MAESTRO_BOT_URL", "https://t.me/MaestroSniperBot")?,
            ttf_bot: url_or("TTF_BOT_URL", "https://t.me/ttfbotbot")?,
            otto_bot: url_or("OTTO_BOT_URL", "https://t.me/OttoSimBot")?,
            scope_bot: url_or("SCOPE_BOT_URL", "https://t.me/scope_eye_bot")?,
        },
    };

    info!(
        "Loaded config: db={}, port={}, admins={}, post_interval={:?}",
        cfg.db_path,
        cfg.port,
        cfg.admin_ids.len(),
        cfg.post_interval
    );

    Ok(cfg)
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        telegram_bot_token: "token".to_string(),
        alchemy_ws_url: "wss://example.invalid".to_string(),
        rpc_http_url: "https://example.invalid".to_string(),
        db_path: ":memory:".to_string(),
        port: 0,
        admin_ids: ["1".to_string()].into_iter().collect(),
        expire_duration: 7200,
        post_interval: Duration::from_secs(1200),
        show_all_window: 3600,
        show_all_limit: 10,
        show_range_window: 86_400,
        show_range_limit: 10,
        uniswap_factory: UNISWAP_V2_FACTORY,
        weth_address: WETH,
        links: BotLinks {
            ca_bot: link("https://t.me/ca"),
            banana_bot: link("https://t.me/banana"),
            maestro_bot: link("https://t.me/maestro"),
            ttf_bot: link("https://t.me/ttf"),
            otto_bot: link("https://t.me/otto"),
            scope_bot: link("https://t.me/scope"),
        },
    }
}

#[cfg(test)]
fn link(url: &str) -> Url {
    Url::parse(url).unwrap()
}
