use std::future::Future;

use eyre::Result;
use teloxide::{
    prelude::*,
    types::{BotCommand, BotCommandScope, InlineKeyboardMarkup, ParseMode, Recipient},
};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerKind {
    User,
    Group,
    Channel,
}

/// Normalised chat peer: where a message came from and where replies go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Peer {
    pub kind: PeerKind,
    pub id: i64,
}

impl Peer {
    pub fn chat_id(&self) -> ChatId {
        ChatId(self.id)
    }
}

/// A text message ready for dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incoming {
    pub peer: Peer,
    /// Telegram user who wrote it; none for channel posts
    pub sender: Option<UserId>,
    pub user_id: String, // sender id as stored, the chat id for channel posts
    pub text: String,
}

impl Incoming {
    pub fn from_message(msg: &Message) -> Option<Self> {
        let text = msg.text()?.to_string();
        let kind = if msg.chat.is_private() {
            PeerKind::User
        } else if msg.chat.is_channel() {
            PeerKind::Channel
        } else {
            PeerKind::Group
        };
        let peer = Peer { kind, id: msg.chat.id.0 };
        let sender = msg.from.as_ref().map(|u| u.id);
        let user_id = sender
            .map(|id| id.0.to_string())
            .unwrap_or_else(|| peer.id.to_string());
        Some(Self {
            peer,
            sender,
            user_id,
            text,
        })
    }

    /// Scope for a per-user command menu in this chat
    pub fn command_scope(&self) -> Option<BotCommandScope> {
        let chat_id = Recipient::Id(self.peer.chat_id());
        match (self.peer.kind, self.sender) {
            (PeerKind::User, _) => Some(BotCommandScope::Chat { chat_id }),
            (PeerKind::Group, Some(user_id)) => Some(BotCommandScope::ChatMember { chat_id, user_id }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outgoing {
    pub chat_id: ChatId,
    pub text: String,
    pub parse_mode: Option<ParseMode>,
    pub keyboard: Option<InlineKeyboardMarkup>,
}

impl Outgoing {
    pub fn text(chat_id: ChatId, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            parse_mode: None,
            keyboard: None,
        }
    }

    pub fn parse_mode(mut self, mode: ParseMode) -> Self {
        self.parse_mode = Some(mode);
        self
    }

    pub fn keyboard(mut self, keyboard: InlineKeyboardMarkup) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

/// Outbound side of the bot
pub trait Messenger: Send + Sync {
    fn send(&self, message: Outgoing) -> impl Future<Output = Result<()>> + Send;

    /// Replace the command menu shown for `scope`
    fn set_commands(
        &self,
        commands: Vec<BotCommand>,
        scope: BotCommandScope,
    ) -> impl Future<Output = Result<()>> + Send;
}

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

impl Messenger for TelegramMessenger {
    async fn send(&self, message: Outgoing) -> Result<()> {
        debug!("Sending message to {}", message.chat_id);
        let mut request = self.bot.send_message(message.chat_id, message.text);
        if let Some(mode) = message.parse_mode {
            request = request.parse_mode(mode);
        }
        if let Some(keyboard) = message.keyboard {
            request = request.reply_markup(keyboard);
        }
        request.await?;
        Ok(())
    }

    async fn set_commands(&self, commands: Vec<BotCommand>, scope: BotCommandScope) -> Result<()> {
        self.bot.set_my_commands(commands).scope(scope).await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::sync::Mutex;

    use eyre::{eyre, Result};
    use teloxide::types::{BotCommand, BotCommandScope, ChatId};

    use super::{Messenger, Outgoing};

    /// Records every message; chats listed in `failing` reject delivery
    #[derive(Default)]
    pub struct RecordingMessenger {
        pub sent: Mutex<Vec<Outgoing>>,
        pub commands: Mutex<Vec<(BotCommandScope, Vec<BotCommand>)>>,
        pub failing: Vec<ChatId>,
    }

    impl RecordingMessenger {
        pub fn texts(&self) -> Vec<String> {
            self.sent.lock().unwrap().iter().map(|m| m.text.clone()).collect()
        }

        pub fn take(&self) -> Vec<Outgoing> {
            std::mem::take(&mut *self.sent.lock().unwrap())
        }
    }

    impl Messenger for RecordingMessenger {
        async fn send(&self, message: Outgoing) -> Result<()> {
            if self.failing.contains(&message.chat_id) {
                return Err(eyre!("Forbidden: bot was blocked by the user"));
            }
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn set_commands(&self, commands: Vec<BotCommand>, scope: BotCommandScope) -> Result<()> {
            self.commands.lock().unwrap().push((scope, commands));
            Ok(())
        }
    }
}
