use std::sync::Arc;

use chrono::Utc;
use eyre::Result;
use teloxide::{
    prelude::*,
    types::{BotCommand, ParseMode},
    utils::command::{BotCommands, ParseError},
};
use tracing::{debug, error, info, warn};

use crate::{
    aggregator::{self, CountFilter},
    config::Config,
    db::{self, SharedConn},
    messages::{self, fill},
    models::{ScopeOption, TokenCount},
    registry::SniperRegistry,
    report,
    session::{self, Action, SessionState, Sessions, Step},
    telegram::{Incoming, Messenger, Outgoing, TelegramMessenger},
};

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "snake_case")]
pub enum Command {
    Start,
    ShowCa,
    ShowAll,
    ShowRange,
    AddSniperbot,
    ShowSniperbots,
    DeleteSniperbot,
    AddKeyword(String),
    DeleteKeyword(String),
    ShowKeywords,
    AddGroup(String),
    DeleteGroup(String),
    EndGroup(String),
    ShowGroups,
}

impl Command {
    pub fn admin_only(&self) -> bool {
        !matches!(
            self,
            Command::Start | Command::ShowCa | Command::ShowAll | Command::ShowRange
        )
    }
}

fn general_commands() -> Vec<BotCommand> {
    vec![
        BotCommand::new("start", "Opens the control panel"),
        BotCommand::new("show_ca", "Check approvals for a specific token address."),
        BotCommand::new("show_all", "Displays the top 10 sniping activities in the last hour."),
        BotCommand::new(
            "show_range",
            "Show the latest 10 activities in a specific range or specific value last 24 hours.",
        ),
    ]
}

fn admin_commands() -> Vec<BotCommand> {
    vec![
        BotCommand::new("add_sniperbot", "Add a new sniper bot"),
        BotCommand::new("show_sniperbots", "Show all added sniper bots"),
        BotCommand::new("delete_sniperbot", "Delete a sniper bot by its ID"),
        BotCommand::new("add_keyword", "Add a scrape keyword"),
        BotCommand::new("delete_keyword", "Remove a scrape keyword"),
        BotCommand::new("show_keywords", "Show scrape keywords"),
        BotCommand::new("add_group", "Add a scrape group"),
        BotCommand::new("delete_group", "Remove a scrape group"),
        BotCommand::new("show_groups", "Show scrape groups"),
    ]
}

/// Welcome text, sent with HTML parse mode
pub fn welcome_text(is_admin: bool) -> String {
    let mut msg = String::from("🌟 Welcome to the <b>Sniper Bot</b>! 🌟\n\nHere are the commands you can use:\n");
    if is_admin {
        msg.push_str(
            "\nAdmin Commands:\n\n\
             📥 /add_sniperbot - Add a new sniper bot.\n\n\
             📜 /show_sniperbots - Show all added sniper bots.\n\n\
             🗑️ /delete_sniperbot - Delete a sniper bot by its ID.\n\n\
             🔑 /add_keyword, /delete_keyword, /show_keywords - Manage scrape keywords.\n\n\
             👥 /add_group, /delete_group, /show_groups - Manage scrape groups.\n\n",
        );
    }
    msg.push_str(
        "User Commands:\n\n\
         🔍 /show_ca - Check approvals for a specific token address.\n\n\
         📊 /show_all - Displays the top 10 sniping activities in the last hour.\n\n\
         📊 /show_range - Show the latest 10 activities in a specific range or specific value last 24 hours.\n\n\
         For any assistance, feel free to reach out! 🤖",
    );
    msg
}

/// Command dispatcher and conversation driver for the scope bot
pub struct ScopeBot<M> {
    cfg: Arc<Config>,
    conn: SharedConn,
    registry: Arc<SniperRegistry>,
    messenger: Arc<M>,
    sessions: Sessions,
    username: String, // commands addressed to another @bot are ignored
}

impl<M: Messenger> ScopeBot<M> {
    pub fn new(
        cfg: Arc<Config>,
        conn: SharedConn,
        registry: Arc<SniperRegistry>,
        messenger: Arc<M>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            cfg,
            conn,
            registry,
            messenger,
            sessions: Sessions::default(),
            username: username.into(),
        }
    }

    async fn say(&self, chat_id: ChatId, text: impl Into<String>) {
        if let Err(e) = self.messenger.send(Outgoing::text(chat_id, text)).await {
            warn!("Send to {} failed: {:?}", chat_id, e);
        }
    }

    async fn ask(&self, msg: &Incoming, state: SessionState) {
        self.say(msg.peer.chat_id(), state.prompt()).await;
        self.sessions.begin(msg.peer.id, &msg.user_id, state).await;
    }

    /// Route one inbound text message. Errors stop here.
    pub async fn dispatch(&self, msg: Incoming) {
        let result = if session::is_command(&msg.text) {
            match Command::parse(msg.text.trim(), &self.username) {
                Ok(command) => self.handle_command(&msg, command).await,
                Err(ParseError::WrongBotName(name)) => {
                    debug!("Ignoring command for @{} in chat {}", name, msg.peer.id);
                    Ok(())
                }
                Err(e) => {
                    debug!("Unparsed command {:?}: {}", msg.text, e);
                    Ok(())
                }
            }
        } else {
            self.handle_reply(&msg).await
        };

        if let Err(e) = result {
            error!("Handler failed for chat {}: {:?}", msg.peer.id, e);
            self.say(msg.peer.chat_id(), messages::DB_ERROR).await;
        }
    }

    async fn handle_reply(&self, msg: &Incoming) -> Result<()> {
        let Some(state) = self.sessions.take(msg.peer.id, &msg.user_id).await else {
            return Ok(());
        };
        let chat_id = msg.peer.chat_id();

        match session::advance(state, &msg.text) {
            Step::Next(next) => self.ask(msg, next).await,
            Step::Retry { notice, state, error } => {
                info!("Rejected reply in chat {}: {}", msg.peer.id, error);
                self.say(chat_id, notice).await;
                self.ask(msg, state).await;
            }
            Step::Done(action) => self.execute(msg, action).await?,
        }
        Ok(())
    }

    async fn handle_command(&self, msg: &Incoming, command: Command) -> Result<()> {
        let chat_id = msg.peer.chat_id();

        if command.admin_only() && !self.cfg.is_admin(&msg.user_id) {
            self.say(chat_id, messages::UNAUTHORIZED).await;
            return Ok(());
        }

        match command {
            Command::Start => self.start(msg).await,
            Command::ShowCa => self.ask(msg, SessionState::TokenAddress).await,
            Command::ShowAll => self.show_all(chat_id).await?,
            Command::ShowRange => self.ask(msg, SessionState::RangeType).await,
            Command::AddSniperbot => self.ask(msg, SessionState::SniperName).await,
            Command::DeleteSniperbot => self.ask(msg, SessionState::SniperId).await,
            Command::ShowSniperbots => self.show_sniper_bots(chat_id).await?,
            Command::AddKeyword(keyword) => self.add_keyword(chat_id, keyword.trim()).await?,
            Command::DeleteKeyword(keyword) => self.delete_keyword(chat_id, keyword.trim()).await?,
            Command::ShowKeywords => self.show_keywords(chat_id).await?,
            Command::AddGroup(args) => self.add_group(chat_id, &args).await?,
            Command::DeleteGroup(group_id) | Command::EndGroup(group_id) => {
                self.delete_group(chat_id, group_id.trim()).await?
            }
            Command::ShowGroups => self.show_groups(chat_id).await?,
        }
        Ok(())
    }

    async fn execute(&self, msg: &Incoming, action: Action) -> Result<()> {
        let chat_id = msg.peer.chat_id();
        match action {
            Action::AddSniper { name, address } => {
                let created = {
                    let db = db::lock(&self.conn)?;
                    match db::find_sniper_conflict(&db, &name, &address)? {
                        Some(_) => None,
                        None => Some(db::insert_sniper_bot(&db, &name, &address)?),
                    }
                };
                match created {
                    Some(bot) => {
                        self.registry.invalidate();
                        info!("Sniper bot {} ({}) added", bot.name, bot.address);
                        let id = bot.id.to_string();
                        let text = fill(
                            messages::SNIPER_ADDED,
                            &[("id", &id), ("address", &bot.address), ("name", &bot.name)],
                        );
                        self.say(chat_id, text).await;
                    }
                    None => {
                        self.say(chat_id, messages::SNIPER_EXISTS).await;
                        self.ask(msg, SessionState::SniperName).await;
                    }
                }
            }
            Action::DeleteSniper { id } => {
                let removed = {
                    let db = db::lock(&self.conn)?;
                    match db::find_sniper_bot(&db, id)? {
                        Some(bot) if db::delete_sniper_bot(&db, bot.id)? => Some(bot),
                        _ => None,
                    }
                };
                if let Some(bot) = removed {
                    self.registry.invalidate();
                    info!("Sniper bot {} (#{}) deleted", bot.name, bot.id);
                    self.say(chat_id, messages::SNIPER_DELETED).await;
                } else {
                    self.say(chat_id, messages::SNIPER_NOT_EXIST).await;
                    self.ask(msg, SessionState::SniperId).await;
                }
            }
            Action::ShowCa { address } => self.show_ca(msg, &address).await?,
            Action::ShowRange(filter) => self.show_range(chat_id, filter).await?,
        }
        Ok(())
    }

    async fn start(&self, msg: &Incoming) {
        let chat_id = msg.peer.chat_id();
        let is_admin = self.cfg.is_admin(&msg.user_id);

        // private chats get a chat menu, groups a menu for this member only
        if let Some(scope) = msg.command_scope() {
            let mut commands = general_commands();
            if is_admin {
                commands.extend(admin_commands());
            }
            if let Err(e) = self.messenger.set_commands(commands, scope).await {
                warn!("Setting commands for {} failed: {:?}", chat_id, e);
            }
        }

        let welcome = Outgoing::text(chat_id, welcome_text(is_admin))
            .parse_mode(ParseMode::Html)
            .keyboard(report::welcome_keyboard(&self.cfg.links));
        if let Err(e) = self.messenger.send(welcome).await {
            warn!("Welcome to {} failed: {:?}", chat_id, e);
        }
    }

    async fn show_ca(&self, msg: &Incoming, address: &str) -> Result<()> {
        let chat_id = msg.peer.chat_id();
        let now = Utc::now().timestamp();

        let text = {
            let db = db::lock(&self.conn)?;
            if db::find_token_by_address(&db, address)?.is_none() {
                None
            } else {
                db::replace_scope_subscription(
                    &db,
                    &msg.user_id,
                    ScopeOption::CheckCa,
                    address,
                    now,
                    self.cfg.expire_duration,
                )?;
                Some(report::TokenReport::load(&db, address)?.render())
            }
        };

        match text {
            Some(text) => self.send_report(chat_id, text).await,
            None => self.say(chat_id, messages::NO_TOKEN_INFO).await,
        }
        Ok(())
    }

    async fn show_all(&self, chat_id: ChatId) -> Result<()> {
        let now = Utc::now().timestamp();
        let tokens = {
            let db = db::lock(&self.conn)?;
            aggregator::top_tokens(&db, now, self.cfg.show_all_window, self.cfg.show_all_limit)?
        };
        self.send_reports(chat_id, &tokens).await
    }

    async fn show_range(&self, chat_id: ChatId, filter: CountFilter) -> Result<()> {
        let now = Utc::now().timestamp();
        let tokens = {
            let db = db::lock(&self.conn)?;
            aggregator::tokens_in_range(
                &db,
                now,
                self.cfg.show_range_window,
                filter,
                self.cfg.show_range_limit,
            )?
        };
        self.send_reports(chat_id, &tokens).await
    }

    async fn send_reports(&self, chat_id: ChatId, tokens: &[TokenCount]) -> Result<()> {
        if tokens.is_empty() {
            self.say(chat_id, messages::NO_MATCHES).await;
            return Ok(());
        }
        for token in tokens {
            let text = report::render_for(&self.conn, &token.token_address)?;
            self.send_report(chat_id, text).await;
        }
        Ok(())
    }

    async fn send_report(&self, chat_id: ChatId, text: String) {
        if let Err(e) = report::deliver(self.messenger.as_ref(), &self.cfg.links, chat_id, text).await {
            warn!("Report to {} failed: {:?}", chat_id, e);
        }
    }

    async fn show_sniper_bots(&self, chat_id: ChatId) -> Result<()> {
        let bots = {
            let db = db::lock(&self.conn)?;
            db::list_sniper_bots(&db)?
        };
        if bots.is_empty() {
            self.say(chat_id, messages::NO_SNIPER_BOTS).await;
            return Ok(());
        }

        let count = bots.len().to_string();
        let mut text = fill(messages::SNIPER_COUNT, &[("count", &count)]);
        for bot in &bots {
            let id = bot.id.to_string();
            text.push_str(&fill(
                messages::SNIPER_INFO,
                &[("id", &id), ("address", &bot.address), ("name", &bot.name)],
            ));
        }
        self.say(chat_id, text).await;
        Ok(())
    }

    async fn add_keyword(&self, chat_id: ChatId, keyword: &str) -> Result<()> {
        if keyword.is_empty() {
            self.say(chat_id, messages::KEYWORD_USAGE).await;
            return Ok(());
        }
        let added = {
            let db = db::lock(&self.conn)?;
            db::add_keyword(&db, keyword)?
        };
        let reply = if added { messages::KEYWORD_ADDED } else { messages::KEYWORD_EXISTS };
        self.say(chat_id, reply).await;
        Ok(())
    }

    async fn delete_keyword(&self, chat_id: ChatId, keyword: &str) -> Result<()> {
        let removed = {
            let db = db::lock(&self.conn)?;
            db::delete_keyword(&db, keyword)?
        };
        if removed {
            self.say(chat_id, fill(messages::KEYWORD_DELETED, &[("keyword", keyword)])).await;
        } else {
            self.say(chat_id, messages::KEYWORD_NOT_EXIST).await;
        }
        Ok(())
    }

    async fn show_keywords(&self, chat_id: ChatId) -> Result<()> {
        let keywords = {
            let db = db::lock(&self.conn)?;
            db::list_keywords(&db)?
        };
        if keywords.is_empty() {
            self.say(chat_id, messages::NO_KEYWORDS).await;
        } else {
            let list: Vec<String> = keywords.iter().map(|k| format!("🔑 {k}")).collect();
            self.say(chat_id, list.join("\n")).await;
        }
        Ok(())
    }

    async fn add_group(&self, chat_id: ChatId, args: &str) -> Result<()> {
        let mut parts = args.split_whitespace();
        let (Some(group_id), Some(group_name)) = (parts.next(), parts.next()) else {
            self.say(chat_id, messages::GROUP_USAGE).await;
            return Ok(());
        };
        let rest: Vec<&str> = parts.collect();
        let group_title = if rest.is_empty() { group_name.to_string() } else { rest.join(" ") };

        let added = {
            let db = db::lock(&self.conn)?;
            db::add_group(&db, group_id, group_name, &group_title)?
        };
        if added {
            let text = fill(
                messages::GROUP_ADDED,
                &[("groupTitle", &group_title), ("groupId", group_id), ("groupName", group_name)],
            );
            self.say(chat_id, text).await;
        } else {
            self.say(chat_id, messages::GROUP_EXISTS).await;
        }
        Ok(())
    }

    async fn delete_group(&self, chat_id: ChatId, group_id: &str) -> Result<()> {
        let removed = {
            let db = db::lock(&self.conn)?;
            db::delete_group(&db, group_id)?
        };
        let reply = if removed { messages::GROUP_REMOVED } else { messages::GROUP_NOT_EXIST };
        self.say(chat_id, reply).await;
        Ok(())
    }

    async fn show_groups(&self, chat_id: ChatId) -> Result<()> {
        let groups = {
            let db = db::lock(&self.conn)?;
            db::list_groups(&db)?
        };
        if groups.is_empty() {
            self.say(chat_id, messages::NO_GROUPS).await;
            return Ok(());
        }

        let count = groups.len().to_string();
        let mut text = fill(messages::GROUP_COUNT, &[("count", &count)]);
        for g in &groups {
            text.push_str(&fill(
                messages::GROUP_INFO,
                &[("groupTitle", &g.group_title), ("groupId", &g.group_id), ("groupName", &g.group_name)],
            ));
        }
        self.say(chat_id, text).await;
        Ok(())
    }
}

async fn on_message(scope: Arc<ScopeBot<TelegramMessenger>>, msg: Message) -> ResponseResult<()> {
    if let Some(incoming) = Incoming::from_message(&msg) {
        scope.dispatch(incoming).await;
    }
    Ok(())
}

/// Long-poll Telegram and feed every text message and channel post to the dispatcher
pub async fn run(scope: Arc<ScopeBot<TelegramMessenger>>, bot: Bot) -> Result<()> {
    info!("🤖 Scope bot @{} polling for updates...", scope.username);

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(on_message))
        .branch(Update::filter_channel_post().endpoint(on_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![scope])
        .default_handler(|_| async {})
        .build()
        .dispatch()
        .await;

    Ok(())
}
