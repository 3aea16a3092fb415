//! Inbound and outbound message events.
//!
//! These are the narrow boundary between the messaging-platform adapter
//! and the core pipeline: the adapter translates platform updates into
//! [`InboundMessage`] and turns [`BotReply`] back into platform sends.

use serde::{Deserialize, Serialize};

use crate::conversation::{ChatKind, ConversationKey, UserId};

/// One inbound message event delivered by the platform adapter.
///
/// Voice and video inputs are transcribed by the adapter before delivery;
/// by the time an event reaches the core it is always text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub conversation: ConversationKey,
    pub user_id: UserId,
    /// Platform display name of the sender.
    pub user_name: String,
    pub text: String,
    /// Whether this is a platform-level reply to a message the bot sent.
    #[serde(default)]
    pub is_reply_to_bot: bool,
    #[serde(default)]
    pub platform_message_id: Option<i64>,
}

impl InboundMessage {
    pub fn chat_kind(&self) -> ChatKind {
        self.conversation.kind()
    }
}

/// An outbound reply handed back to the platform adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotReply {
    pub conversation: ConversationKey,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::GroupId;

    #[test]
    fn test_inbound_deserialize_defaults() {
        let msg: InboundMessage = serde_json::from_str(
            r#"{
                "conversation": "group:-5",
                "user_id": 42,
                "user_name": "Alice",
                "text": "hello"
            }"#,
        )
        .unwrap();
        assert_eq!(msg.conversation, ConversationKey::Group(GroupId(-5)));
        assert!(!msg.is_reply_to_bot);
        assert!(msg.platform_message_id.is_none());
        assert_eq!(msg.chat_kind(), ChatKind::Group);
    }
}
