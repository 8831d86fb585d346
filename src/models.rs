// src/models.rs
use serde::Serialize;

/// A token first seen through a sniper bot approval
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub id: i64,
    pub address: String,          // lowercase 0x-hex, unique
    pub name: String,
    pub deployer_address: String, // empty when no transfer history was found
    pub pair_address: String,
    pub trading_enabled: bool,
}

/// Fields gathered by enrichment before the token row exists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewToken {
    pub address: String,
    pub name: String,
    pub deployer_address: String,
    pub pair_address: String,
    pub trading_enabled: bool,
}

/// A tracked sniping bot contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SniperBot {
    pub id: i64,
    pub address: String, // lowercase, unique
    pub name: String,    // unique
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApprovalActivity {
    pub id: i64,
    pub sniper_id: i64,
    pub token_id: i64,
    pub timestamp: i64, // unix seconds
    pub tx_hash: String,
}

/// Kinds of standing scope subscriptions. Only `CheckCa` is re-notified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScopeOption {
    CheckCa,
    ShowAllLastDuration,
    ShowWithCustomCount,
}

impl ScopeOption {
    pub fn as_i64(self) -> i64 {
        match self {
            ScopeOption::CheckCa => 0,
            ScopeOption::ShowAllLastDuration => 1,
            ScopeOption::ShowWithCustomCount => 2,
        }
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(ScopeOption::CheckCa),
            1 => Some(ScopeOption::ShowAllLastDuration),
            2 => Some(ScopeOption::ShowWithCustomCount),
            _ => None,
        }
    }
}

/// A user's subscription to periodic re-notification for one token
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeOptionUser {
    pub id: i64,
    pub user_id: String,
    pub option_type: ScopeOption,
    pub status: bool,
    pub start_time: i64,
    pub expire_time: i64,
    pub token_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrapeGroup {
    pub id: i64,
    pub group_id: String,
    pub group_name: String,
    pub group_title: String,
}

/// Approval count for one token inside a query window
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenCount {
    pub token_id: i64,
    pub token_address: String,
    pub token_name: String,
    pub count: i64,
    pub last_seen: i64,
}

/// Per-bot approval count for one token; bots without approvals carry zero
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BotCount {
    pub name: String,
    pub count: i64,
}
