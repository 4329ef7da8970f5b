use serde::{Deserialize, Serialize};

use ragbase_types::prelude::{Id, Timestamp};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub id: Id,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: Timestamp,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Thread {
    pub id: Id,
    pub title: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub messages: Vec<Message>,
}

impl Thread {
    pub fn summary(&self) -> ThreadSummary {
        ThreadSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            message_count: self.messages.len() as u64,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ThreadSummary {
    pub id: Id,
    pub title: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub message_count: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ThreadSortField {
    CreatedAt,
    #[default]
    UpdatedAt,
    Title,
}

impl ThreadSortField {
    /// Unrecognized fields fall back to the default rather than erroring,
    /// matching the list endpoints' forgiving query-parameter handling.
    pub fn parse(value: &str) -> Self {
        match value {
            "created_at" => ThreadSortField::CreatedAt,
            "title" => ThreadSortField::Title,
            _ => ThreadSortField::UpdatedAt,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "asc" => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }

    pub fn is_descending(self) -> bool {
        matches!(self, SortOrder::Desc)
    }
}
