use std::collections::HashMap;

use alloy::primitives::Address;
use tokio::sync::Mutex;

use crate::{aggregator::CountFilter, error::InputError, messages, parser::lower_hex};

/// Where a chat is inside a multi-step conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    SniperName,
    SniperAddress { name: String },
    SniperId,
    TokenAddress,
    RangeType,
    RangeMin,
    RangeMax { min: i64 },
    FixedValue,
}

impl SessionState {
    /// Question sent when entering this state
    pub fn prompt(&self) -> &'static str {
        match self {
            SessionState::SniperName => messages::INPUT_SNIPER_NAME,
            SessionState::SniperAddress { .. } => messages::INPUT_SNIPER_ADDRESS,
            SessionState::SniperId => messages::INPUT_SNIPER_ID,
            SessionState::TokenAddress => messages::INPUT_TOKEN_ADDRESS,
            SessionState::RangeType => messages::DETERMINE_RANGE_TYPE,
            SessionState::RangeMin => messages::INPUT_MIN,
            SessionState::RangeMax { .. } => messages::INPUT_MAX,
            SessionState::FixedValue => messages::INPUT_FIXED,
        }
    }

    /// Notice sent when a reply fails validation in this state
    fn rejection(&self) -> &'static str {
        match self {
            SessionState::SniperName => messages::INPUT_SNIPER_NAME,
            SessionState::SniperAddress { .. } => messages::INVALID_ADDRESS,
            SessionState::SniperId => messages::INVALID_SNIPER_ID,
            SessionState::TokenAddress => messages::VALID_ADDRESS,
            SessionState::RangeType => messages::INVALID_RANGE_TYPE,
            SessionState::RangeMin => messages::INVALID_MIN,
            SessionState::RangeMax { .. } => messages::INVALID_MAX,
            SessionState::FixedValue => messages::INVALID_FIXED,
        }
    }
}

/// Side effect requested by a finished conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    AddSniper { name: String, address: String },
    DeleteSniper { id: i64 },
    ShowCa { address: String },
    ShowRange(CountFilter),
}

/// Result of feeding one reply to a state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// move on and ask the next question
    Next(SessionState),
    /// reply rejected; send the notice and ask the same question again
    Retry {
        notice: &'static str,
        state: SessionState,
        error: InputError,
    },
    Done(Action),
}

pub fn is_command(text: &str) -> bool {
    text.trim_start().starts_with('/')
}

pub fn parse_address(text: &str) -> Result<String, InputError> {
    let trimmed = text.trim();
    if !trimmed.starts_with("0x") && !trimmed.starts_with("0X") {
        return Err(InputError::InvalidAddress(trimmed.to_string()));
    }
    trimmed
        .parse::<Address>()
        .map(|a| lower_hex(&a))
        .map_err(|_| InputError::InvalidAddress(trimmed.to_string()))
}

fn parse_above(text: &str, floor: i64) -> Result<i64, InputError> {
    let trimmed = text.trim();
    let value: i64 = trimmed
        .parse()
        .map_err(|_| InputError::NotANumber(trimmed.to_string()))?;
    if value <= floor {
        return Err(InputError::TooSmall { value, floor });
    }
    Ok(value)
}

/// Feed one plain-text reply to `state`
pub fn advance(state: SessionState, reply: &str) -> Step {
    let result = match &state {
        SessionState::SniperName => {
            let name = reply.trim();
            if name.is_empty() {
                Err(InputError::Empty)
            } else {
                Ok(Step::Next(SessionState::SniperAddress {
                    name: name.to_string(),
                }))
            }
        }
        SessionState::SniperAddress { name } => parse_address(reply).map(|address| {
            Step::Done(Action::AddSniper {
                name: name.clone(),
                address,
            })
        }),
        SessionState::SniperId => reply
            .trim()
            .parse::<i64>()
            .map(|id| Step::Done(Action::DeleteSniper { id }))
            .map_err(|_| InputError::NotANumber(reply.trim().to_string())),
        SessionState::TokenAddress => {
            parse_address(reply).map(|address| Step::Done(Action::ShowCa { address }))
        }
        // case-sensitive on purpose: only `R` and `F` are accepted
        SessionState::RangeType => match reply.trim() {
            "R" => Ok(Step::Next(SessionState::RangeMin)),
            "F" => Ok(Step::Next(SessionState::FixedValue)),
            other => Err(InputError::UnknownRangeType(other.to_string())),
        },
        SessionState::RangeMin => {
            parse_above(reply, 0).map(|min| Step::Next(SessionState::RangeMax { min }))
        }
        SessionState::RangeMax { min } => {
            let min = *min;
            parse_above(reply, min)
                .map(|max| Step::Done(Action::ShowRange(CountFilter::Range { min, max })))
        }
        SessionState::FixedValue => {
            parse_above(reply, 0).map(|value| Step::Done(Action::ShowRange(CountFilter::Fixed(value))))
        }
    };

    match result {
        Ok(step) => step,
        Err(error) => Step::Retry {
            notice: state.rejection(),
            state,
            error,
        },
    }
}

#[derive(Debug, Clone)]
struct Pending {
    owner: String, // user who started the conversation
    state: SessionState,
}

/// Pending conversations keyed by chat id
#[derive(Debug, Default)]
pub struct Sessions {
    pending: Mutex<HashMap<i64, Pending>>,
}

impl Sessions {
    /// Start (or restart) the conversation for `chat` on behalf of `owner`
    pub async fn begin(&self, chat: i64, owner: &str, state: SessionState) {
        let pending = Pending {
            owner: owner.to_string(),
            state,
        };
        self.pending.lock().await.insert(chat, pending);
    }

    /// Claim the pending state; replies from anyone but its owner leave it in place
    pub async fn take(&self, chat: i64, user: &str) -> Option<SessionState> {
        let mut pending = self.pending.lock().await;
        match pending.get(&chat) {
            Some(p) if p.owner == user => pending.remove(&chat).map(|p| p.state),
            _ => None,
        }
    }

    pub async fn current(&self, chat: i64) -> Option<SessionState> {
        self.pending.lock().await.get(&chat).map(|p| p.state.clone())
    }
}
