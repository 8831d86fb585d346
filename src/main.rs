mod aggregator;
mod api;
mod bot;
mod config;
mod db;
mod enrichment;
mod error;
mod indexer;
mod messages;
mod models;
mod notifier;
mod parser;
mod registry;
mod report;
mod rpc;
mod session;
mod telegram;

use std::sync::{Arc, Mutex};
use teloxide::{prelude::Requester, Bot};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stdout)
        .with_target(false)
        .init();

    info!("Approval Scope starting...");

    let cfg = Arc::new(config::load()?);

    // Run DB migrations once at startup
    let conn = db::connect(&cfg.db_path)?;
    db::run_migrations(&conn)?;
    let shared_conn: db::SharedConn = Arc::new(Mutex::new(conn));

    let registry = Arc::new(registry::SniperRegistry::new());
    let chain = rpc::AlchemyRpc::new(&cfg)?;
    let pipeline = Arc::new(indexer::Pipeline::new(
        Arc::clone(&shared_conn),
        Arc::clone(&registry),
        chain,
    ));

    let tg_bot = Bot::new(&cfg.telegram_bot_token);
    let me = tg_bot.get_me().await?;
    let username = me.user.username.clone().unwrap_or_default();
    info!("Telegram bot @{} authorised", username);

    let messenger = Arc::new(telegram::TelegramMessenger::new(tg_bot.clone()));
    let scope_bot = Arc::new(bot::ScopeBot::new(
        Arc::clone(&cfg),
        Arc::clone(&shared_conn),
        Arc::clone(&registry),
        Arc::clone(&messenger),
        username,
    ));

    // Spawn API task
    let api_handle = tokio::spawn({
        let cfg = Arc::clone(&cfg);
        let conn = Arc::clone(&shared_conn);
        async move { api::serve(cfg, conn).await }
    });

    // Spawn Indexer task
    let indexer_handle = tokio::spawn({
        let cfg = Arc::clone(&cfg);
        async move { indexer::run(cfg, pipeline).await }
    });

    // Spawn Bot task
    let bot_handle = tokio::spawn(bot::run(scope_bot, tg_bot));

    // Spawn Re-notifier task
    let notifier_handle = tokio::spawn({
        let cfg = Arc::clone(&cfg);
        let conn = Arc::clone(&shared_conn);
        async move { notifier::run(cfg, conn, messenger).await }
    });

    // Graceful shutdown
    tokio::select! {
        res = api_handle => match res {
            Ok(Ok(_)) => info!("API exited cleanly"),
            Ok(Err(e)) => error!("API error: {:?}", e),
            Err(e) => error!("API task panicked: {:?}", e),
        },
        res = indexer_handle => match res {
            Ok(Ok(_)) => info!("Indexer exited cleanly"),
            Ok(Err(e)) => error!("Indexer error: {:?}", e),
            Err(e) => error!("Indexer task panicked: {:?}", e),
        },
        res = bot_handle => match res {
            Ok(Ok(_)) => info!("Bot exited cleanly"),
            Ok(Err(e)) => error!("Bot error: {:?}", e),
            Err(e) => error!("Bot task panicked: {:?}", e),
        },
        res = notifier_handle => match res {
            Ok(Ok(_)) => info!("Re-notifier exited cleanly"),
            Ok(Err(e)) => error!("Re-notifier error: {:?}", e),
            Err(e) => error!("Re-notifier task panicked: {:?}", e),
        },
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received, stopping...");
        }
    }

    info!("Approval Scope stopped.");
    Ok(())
}
