//! Conversation state: the ordered message list and the operations that grow it.

use crate::error::ChatError;
use crate::events::Message;
use crate::storage::HistoryStore;

pub const GREETING: &str =
    "Hi! I'm the Rate My Professor support assistant. How can I help you today?";
pub const CLEARED_GREETING: &str = "Chat history has been cleared. How can I help you today?";

/// Ordered, role-tagged messages; never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    /// Fresh conversation seeded with the greeting
    pub fn new() -> Self {
        Self {
            messages: vec![Message::assistant(GREETING)],
        }
    }

    /// Use `messages` as-is, or the greeting when there are none
    pub fn from_messages(messages: Vec<Message>) -> Self {
        if messages.is_empty() {
            Self::new()
        } else {
            Self { messages }
        }
    }

    /// Load the persisted copy, falling back to the greeting
    pub fn restore(store: &HistoryStore) -> Self {
        match store.load() {
            Some(messages) => Self::from_messages(messages),
            None => Self::new(),
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Only conversations that grew past the seed are worth saving
    pub fn is_persistable(&self) -> bool {
        self.messages.len() > 1
    }

    /// Start a turn: returns the request payload (prior messages plus the new user
    /// message) and appends the user message and an empty assistant placeholder.
    pub fn begin_turn(&mut self, content: &str) -> Result<Vec<Message>, ChatError> {
        if !is_sendable(content) {
            return Err(ChatError::EmptyMessage);
        }

        let user = Message::user(content);
        let mut payload = self.messages.clone();
        payload.push(user.clone());

        self.messages.push(user);
        self.messages.push(Message::assistant(""));
        Ok(payload)
    }

    /// Append a streamed fragment to the newest message
    pub fn apply_fragment(&mut self, fragment: &str) {
        if let Some(last) = self.messages.last_mut() {
            last.content.push_str(fragment);
        }
    }

    /// Reset to a single fresh greeting
    pub fn clear(&mut self) {
        self.messages = vec![Message::assistant(CLEARED_GREETING)];
    }

    /// Flat text document: `role: content` blocks separated by blank lines
    pub fn export_text(&self) -> String {
        self.messages
            .iter()
            .map(|message| format!("{}: {}", message.role, message.content))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// The send action is enabled only for text with something besides whitespace
pub fn is_sendable(content: &str) -> bool {
    !content.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_conversation_has_greeting() {
        let conversation = Conversation::new();
        assert_eq!(conversation.messages(), &[Message::assistant(GREETING)]);
        assert!(!conversation.is_persistable());
    }

    #[test]
    fn test_from_empty_messages_falls_back_to_greeting() {
        assert_eq!(Conversation::from_messages(Vec::new()), Conversation::new());
    }

    #[test]
    fn test_begin_turn_appends_user_and_placeholder() {
        let mut conversation = Conversation::new();
        let payload = conversation.begin_turn("Hello").unwrap();

        assert_eq!(
            conversation.messages(),
            &[
                Message::assistant(GREETING),
                Message::user("Hello"),
                Message::assistant(""),
            ]
        );
        assert_eq!(
            payload,
            vec![Message::assistant(GREETING), Message::user("Hello")]
        );
        assert_eq!(conversation.last(), Some(&Message::assistant("")));
    }

    #[test]
    fn test_begin_turn_rejects_whitespace() {
        let mut conversation = Conversation::new();
        assert!(matches!(
            conversation.begin_turn("  \n\t"),
            Err(ChatError::EmptyMessage)
        ));
        assert_eq!(conversation.len(), 1);
    }

    #[test]
    fn test_fragments_apply_in_order() {
        let mut conversation = Conversation::new();
        conversation.begin_turn("Hello").unwrap();

        let mut seen = Vec::new();
        for fragment in ["Hi", " there", "!"] {
            conversation.apply_fragment(fragment);
            seen.push(conversation.last().unwrap().content.clone());
        }

        assert_eq!(seen, vec!["Hi", "Hi there", "Hi there!"]);
        assert_eq!(conversation.len(), 3);
    }

    #[test]
    fn test_clear_resets_to_cleared_greeting() {
        let mut conversation = Conversation::new();
        conversation.begin_turn("Hello").unwrap();
        conversation.clear();
        assert_eq!(
            conversation.messages(),
            &[Message::assistant(CLEARED_GREETING)]
        );
    }

    #[test]
    fn test_export_text() {
        let conversation =
            Conversation::from_messages(vec![Message::assistant("Hi"), Message::user("Yo")]);
        assert_eq!(conversation.export_text(), "assistant: Hi\n\nuser: Yo");
    }

    #[test]
    fn test_is_sendable() {
        assert!(!is_sendable(""));
        assert!(!is_sendable("   "));
        assert!(!is_sendable("\n\t "));
        assert!(is_sendable(" a "));
        assert!(is_sendable("Hello"));
    }
}
