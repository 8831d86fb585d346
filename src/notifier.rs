use std::sync::Arc;

use chrono::Utc;
use eyre::Result;
use teloxide::types::ChatId;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::{
    config::{BotLinks, Config},
    db::{self, SharedConn},
    models::ScopeOption,
    report::{self, TokenReport},
    telegram::Messenger,
};

/// Re-send the token report to every active, unexpired CheckCa subscriber.
/// Returns how many reports were delivered.
pub async fn notify_active<M: Messenger>(
    conn: &SharedConn,
    messenger: &M,
    links: &BotLinks,
    now: i64,
) -> Result<usize> {
    let pending: Vec<(String, String)> = {
        let db = db::lock(conn)?;
        let mut pending = Vec::new();
        for sub in db::active_subscriptions(&db, ScopeOption::CheckCa, now)? {
            let text = TokenReport::load(&db, &sub.token_address)?.render();
            pending.push((sub.user_id, text));
        }
        pending
    };

    let mut delivered = 0;
    for (user_id, text) in pending {
        let Ok(chat) = user_id.parse::<i64>() else {
            warn!("Skipping subscription for non-numeric user {}", user_id);
            continue;
        };
        match report::deliver(messenger, links, ChatId(chat), text).await {
            Ok(()) => delivered += 1,
            Err(e) => warn!("Re-notify to {} failed: {:?}", user_id, e),
        }
    }
    Ok(delivered)
}

pub async fn run<M: Messenger>(cfg: Arc<Config>, conn: SharedConn, messenger: Arc<M>) -> Result<()> {
    let mut ticker = interval(cfg.post_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await; // first tick fires immediately

    info!("⏰ Re-notifier running every {}s", cfg.post_interval.as_secs());

    loop {
        ticker.tick().await;
        match notify_active(&conn, messenger.as_ref(), &cfg.links, Utc::now().timestamp()).await {
            Ok(0) => {}
            Ok(sent) => info!("📨 Re-sent {} scope reports", sent),
            Err(e) => error!("Re-notify tick failed: {:?}", e),
        }
    }
}
