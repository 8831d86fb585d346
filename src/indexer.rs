use std::sync::Arc;

use alloy::{
    providers::{Provider, ProviderBuilder, WsConnect},
    rpc::types::{Filter, Log},
    sol_types::SolEvent,
};
use chrono::Utc;
use eyre::{Result, WrapErr};
use futures_util::StreamExt;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

use crate::{
    config::Config,
    db::{self, SharedConn},
    enrichment,
    parser::{self, Approval, ApprovalEvent},
    registry::SniperRegistry,
    rpc::ChainReader,
};

/// What happened to one decoded approval
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// spender is not a tracked sniper bot
    Untracked,
    Recorded { sniper_id: i64, token_id: i64 },
    /// tx hash already recorded
    Duplicate,
}

/// Decode → sniper match → token enrichment → approval record
pub struct Pipeline<C> {
    conn: SharedConn,
    registry: Arc<SniperRegistry>,
    chain: C,
}

impl<C: ChainReader> Pipeline<C> {
    pub fn new(conn: SharedConn, registry: Arc<SniperRegistry>, chain: C) -> Self {
        Self {
            conn,
            registry,
            chain,
        }
    }

    pub async fn process(&self, event: &ApprovalEvent) -> Result<Outcome> {
        let sniper = {
            let db = db::lock(&self.conn)?;
            self.registry.lookup(&db, &event.spender_address())?
        };
        let Some(sniper) = sniper else {
            return Ok(Outcome::Untracked);
        };

        let token = enrichment::ensure_token(&self.conn, &self.chain, event.token).await?;

        let db = db::lock(&self.conn)?;
        if !db::record_approval(&db, sniper.id, token.id, event.timestamp, &event.tx_hash)? {
            debug!("Approval {} already recorded", event.tx_hash);
            return Ok(Outcome::Duplicate);
        }

        Ok(Outcome::Recorded {
            sniper_id: sniper.id,
            token_id: token.id,
        })
    }

    /// Handle one raw log. Every failure ends here.
    pub async fn handle_log(&self, log: Log) {
        let Some(event) = parser::decode_approval(&log, Utc::now().timestamp()) else {
            return;
        };

        match self.process(&event).await {
            Ok(Outcome::Recorded { sniper_id, .. }) => info!(
                "🎯 Sniper #{} approved {} (tx {})",
                sniper_id,
                event.token_address(),
                event.tx_hash
            ),
            Ok(_) => {}
            Err(e) => error!("Dropping approval {}: {:?}", event.tx_hash, e),
        }
    }
}

/// Subscribe to every `Approval` log on the chain and feed the pipeline.
///
/// Failing to open the first subscription is fatal; a stream that ends later
/// is reopened with backoff.
pub async fn run<C: ChainReader + 'static>(cfg: Arc<Config>, pipeline: Arc<Pipeline<C>>) -> Result<()> {
    let filter = Filter::new().event_signature(Approval::SIGNATURE_HASH);
    let mut retry_delay = 10;
    let mut first_attempt = true;

    loop {
        let subscribed = async {
            let provider = ProviderBuilder::new()
                .connect_ws(WsConnect::new(cfg.alchemy_ws_url.clone()))
                .await?;
            let sub = provider.subscribe_logs(&filter).await?;
            Ok::<_, eyre::Report>((provider, sub))
        }
        .await;

        let (_provider, sub) = match subscribed {
            Ok(pair) => pair,
            Err(e) if first_attempt => return Err(e).wrap_err("cannot open approval subscription"),
            Err(e) => {
                warn!("Resubscribe failed: {:?}. Retrying in {}s", e, retry_delay);
                sleep(Duration::from_secs(retry_delay)).await;
                retry_delay = (retry_delay * 2).min(120);
                continue;
            }
        };
        first_attempt = false;
        retry_delay = 10;

        info!("👁️ Listening for Approval events...");
        let mut stream = sub.into_stream();
        while let Some(log) = stream.next().await {
            let pipeline = Arc::clone(&pipeline);
            tokio::spawn(async move { pipeline.handle_log(log).await });
        }

        warn!("Approval stream ended. Reconnecting in {}s", retry_delay);
        sleep(Duration::from_secs(retry_delay)).await;
    }
}
