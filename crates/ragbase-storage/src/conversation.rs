use async_trait::async_trait;

use ragbase_types::prelude::{Page, PageRequest};

use crate::errors::StorageError;
use crate::model::{Message, MessageRole, SortOrder, Thread, ThreadSortField, ThreadSummary};

/// Conversation persistence contract. Threads are scoped to an owner key
/// (the verified email); an owner never sees another owner's threads.
///
/// The store also tracks a per-owner request quota: the number of answered
/// queries still available across all of that owner's threads.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn create_thread(&self, owner: &str, title: &str) -> Result<Thread, StorageError>;

    async fn thread(&self, owner: &str, thread_id: &str)
        -> Result<Option<Thread>, StorageError>;

    /// Appends one message and bumps the thread's `updated_at`. Fails with
    /// not-found when the thread does not exist for this owner.
    async fn append_message(
        &self,
        owner: &str,
        thread_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<Message, StorageError>;

    async fn list_threads(
        &self,
        owner: &str,
        page: PageRequest,
        sort_by: ThreadSortField,
        order: SortOrder,
    ) -> Result<Page<ThreadSummary>, StorageError>;

    /// Messages sorted by timestamp; ascending gives chronological order.
    async fn list_messages(
        &self,
        owner: &str,
        thread_id: &str,
        page: PageRequest,
        order: SortOrder,
    ) -> Result<Page<Message>, StorageError>;

    /// Returns true when the thread existed and was removed.
    async fn delete_thread(&self, owner: &str, thread_id: &str) -> Result<bool, StorageError>;

    async fn requests_available(&self, owner: &str) -> Result<u32, StorageError>;

    /// Decrements the owner's quota (floored at zero) and returns the
    /// remaining count.
    async fn consume_request(&self, owner: &str) -> Result<u32, StorageError>;
}
