//! Contacts and conversations seen on one connection.

use std::collections::HashMap;
use std::fmt;

/// Identifies a conversation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConversationKey {
    /// A channel, keyed by its name.
    Channel(String),
    /// A direct conversation, keyed by the other party's source.
    Direct(String),
}

impl ConversationKey {
    /// Conversation for a message from `source` addressed to `target`.
    pub fn for_message(source: &str, target: &str) -> Self {
        if target.starts_with('#') {
            Self::Channel(target.to_owned())
        } else {
            Self::Direct(source.to_owned())
        }
    }

    /// Channel name or remote party.
    pub fn name(&self) -> &str {
        match self {
            Self::Channel(name) | Self::Direct(name) => name,
        }
    }

    /// Whether this is a channel.
    pub fn is_channel(&self) -> bool {
        matches!(self, Self::Channel(_))
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A sender seen on the connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Contact {
    /// Source string as sent by the server.
    pub source: String,
    /// Messages received from this contact.
    pub messages: u64,
}

/// A channel or direct conversation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conversation {
    /// Key for lookups.
    pub key: ConversationKey,
    /// Messages received in this conversation.
    pub messages: u64,
}

/// Contact and conversation registries.
#[derive(Clone, Debug, Default)]
pub struct Roster {
    contacts: HashMap<String, Contact>,
    conversations: HashMap<ConversationKey, Conversation>,
}

impl Roster {
    /// Look up a contact by source.
    pub fn contact(&self, source: &str) -> Option<&Contact> {
        self.contacts.get(source)
    }

    /// Look up a conversation.
    pub fn conversation(&self, key: &ConversationKey) -> Option<&Conversation> {
        self.conversations.get(key)
    }

    /// Number of known contacts.
    pub fn contact_count(&self) -> usize {
        self.contacts.len()
    }

    /// Number of known conversations.
    pub fn conversation_count(&self) -> usize {
        self.conversations.len()
    }

    /// Find or create the contact for `source`. The flag is `true` when it
    /// was created.
    pub(crate) fn contact_mut(&mut self, source: &str) -> (&mut Contact, bool) {
        let created = !self.contacts.contains_key(source);
        let contact = self
            .contacts
            .entry(source.to_owned())
            .or_insert_with(|| Contact {
                source: source.to_owned(),
                messages: 0,
            });
        (contact, created)
    }

    /// Find or create a conversation. The flag is `true` when it was created.
    pub(crate) fn conversation_mut(&mut self, key: &ConversationKey) -> (&mut Conversation, bool) {
        let created = !self.conversations.contains_key(key);
        let conversation = self
            .conversations
            .entry(key.clone())
            .or_insert_with(|| Conversation {
                key: key.clone(),
                messages: 0,
            });
        (conversation, created)
    }
}
