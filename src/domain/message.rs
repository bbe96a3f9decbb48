use serde::{Deserialize, Serialize};
use std::fmt;

/// Remote message identifier. Doubles as the archive file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One page of the remote listing, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagePage {
    pub ids: Vec<MessageId>,
    pub next_page_token: Option<String>,
}

impl MessagePage {
    /// An empty continuation token means "no more pages".
    pub fn new(ids: Vec<MessageId>, next_page_token: Option<String>) -> Self {
        Self {
            ids,
            next_page_token: next_page_token.filter(|t| !t.is_empty()),
        }
    }

    pub fn is_last(&self) -> bool {
        self.next_page_token.as_deref().is_none_or(str::is_empty)
    }
}

/// Full message as returned by the API, still base64-url encoded.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub id: MessageId,
    pub encoded: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
}

/// Options for one listing call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRequest {
    pub include_spam_trash: bool,
    pub page_token: Option<String>,
}

/// Options for one fetch-by-id call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchRequest {
    pub include_spam_trash: bool,
}
