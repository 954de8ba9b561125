//! Events that can occur in a session

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    /// A chat message from the user
    UserMessage { text: String },
    /// Explicit cancel from the client, outside the message stream
    UserCancel,
}

impl Event {
    pub fn message(text: impl Into<String>) -> Self {
        Event::UserMessage { text: text.into() }
    }
}
