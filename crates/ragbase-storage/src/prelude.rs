pub use crate::conversation::ConversationStore;
pub use crate::errors::StorageError;
pub use crate::memory::{MemoryConversationStore, DEFAULT_REQUEST_QUOTA};
pub use crate::model::{
    Message, MessageRole, SortOrder, Thread, ThreadSortField, ThreadSummary,
};
