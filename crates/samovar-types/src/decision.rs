//! Response decision outcome types.

use serde::{Deserialize, Serialize};

use std::fmt;

/// Which gate caused the bot to respond.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseTrigger {
    /// One-to-one conversations always get a reply.
    DirectChat,
    /// The message mentioned the bot's handle or persona name.
    Mention,
    /// The message is a platform-level reply to the bot.
    ReplyToBot,
    /// The classifier judged the message a continuation of the bot's last turn.
    Continuation,
    /// Randomized proactive participation in a group.
    Proactive,
}

impl fmt::Display for ResponseTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResponseTrigger::DirectChat => "direct_chat",
            ResponseTrigger::Mention => "mention",
            ResponseTrigger::ReplyToBot => "reply_to_bot",
            ResponseTrigger::Continuation => "continuation",
            ResponseTrigger::Proactive => "proactive",
        };
        write!(f, "{s}")
    }
}

/// Outcome of the response-decision policy for one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Respond(ResponseTrigger),
    Silent,
}

impl Decision {
    pub fn should_respond(&self) -> bool {
        matches!(self, Decision::Respond(_))
    }

    pub fn trigger(&self) -> Option<ResponseTrigger> {
        match self {
            Decision::Respond(trigger) => Some(*trigger),
            Decision::Silent => None,
        }
    }
}
