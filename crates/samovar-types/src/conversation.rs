//! Conversation identity types.
//!
//! A conversation is keyed by the peer user for one-to-one chats and by
//! the group for multi-party chats. The key is stable for the lifetime of
//! the conversation and doubles as the history-store index and the JSON
//! map key in the persisted state, so it serializes as a string
//! (`user:<id>` / `group:<id>`).

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use std::fmt;
use std::str::FromStr;

/// Platform-level user identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Platform-level group chat identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub i64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GroupId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Whether a conversation is one-to-one or multi-party.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Direct,
    Group,
}

impl ChatKind {
    pub fn is_group(self) -> bool {
        matches!(self, ChatKind::Group)
    }
}

/// Identifies a conversation in the history store.
///
/// Equals the peer's user id for one-to-one chats and the group id for
/// multi-party chats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConversationKey {
    Direct(UserId),
    Group(GroupId),
}

impl ConversationKey {
    pub fn kind(&self) -> ChatKind {
        match self {
            ConversationKey::Direct(_) => ChatKind::Direct,
            ConversationKey::Group(_) => ChatKind::Group,
        }
    }

    /// The user this conversation belongs to, for one-to-one chats.
    pub fn as_direct_user(&self) -> Option<UserId> {
        match self {
            ConversationKey::Direct(user) => Some(*user),
            ConversationKey::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<GroupId> {
        match self {
            ConversationKey::Direct(_) => None,
            ConversationKey::Group(group) => Some(*group),
        }
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversationKey::Direct(user) => write!(f, "user:{user}"),
            ConversationKey::Group(group) => write!(f, "group:{group}"),
        }
    }
}

impl FromStr for ConversationKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some(("user", id)) => id
                .parse()
                .map(ConversationKey::Direct)
                .map_err(|e| format!("invalid user id in conversation key '{s}': {e}")),
            Some(("group", id)) => id
                .parse()
                .map(ConversationKey::Group)
                .map_err(|e| format!("invalid group id in conversation key '{s}': {e}")),
            _ => Err(format!("invalid conversation key: '{s}'")),
        }
    }
}

// String-form serde so the key can index JSON objects in the persisted state.
impl Serialize for ConversationKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ConversationKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_key_display_parse() {
        let direct = ConversationKey::Direct(UserId(42));
        let group = ConversationKey::Group(GroupId(-100123));

        assert_eq!(direct.to_string(), "user:42");
        assert_eq!(group.to_string(), "group:-100123");

        let parsed: ConversationKey = "user:42".parse().unwrap();
        assert_eq!(parsed, direct);
        let parsed: ConversationKey = "group:-100123".parse().unwrap();
        assert_eq!(parsed, group);
    }

    #[test]
    fn test_conversation_key_rejects_garbage() {
        assert!("42".parse::<ConversationKey>().is_err());
        assert!("user:abc".parse::<ConversationKey>().is_err());
        assert!("channel:7".parse::<ConversationKey>().is_err());
    }

    #[test]
    fn test_conversation_key_kind() {
        assert_eq!(ConversationKey::Direct(UserId(1)).kind(), ChatKind::Direct);
        assert_eq!(ConversationKey::Group(GroupId(1)).kind(), ChatKind::Group);
        assert!(ChatKind::Group.is_group());
        assert!(!ChatKind::Direct.is_group());
    }

    #[test]
    fn test_conversation_key_as_json_map_key() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(ConversationKey::Direct(UserId(7)), 1u32);
        map.insert(ConversationKey::Group(GroupId(9)), 2u32);

        let json = serde_json::to_string(&map).unwrap();
        let back: HashMap<ConversationKey, u32> = serde_json::from_str(&json).unwrap();
        assert_eq!(back[&ConversationKey::Direct(UserId(7))], 1);
        assert_eq!(back[&ConversationKey::Group(GroupId(9))], 2);
    }
}
