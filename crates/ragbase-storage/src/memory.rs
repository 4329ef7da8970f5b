use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use ragbase_types::prelude::{Id, Page, PageRequest, Timestamp};

use crate::conversation::ConversationStore;
use crate::errors::StorageError;
use crate::model::{Message, MessageRole, SortOrder, Thread, ThreadSortField, ThreadSummary};

pub const DEFAULT_REQUEST_QUOTA: u32 = 30;

#[derive(Clone, Debug)]
struct OwnerData {
    threads: Vec<Thread>,
    requests_available: u32,
}

/// In-memory conversation store. The production deployment fronts an
/// external document store; this backend keeps the same contract for tests
/// and single-node setups.
#[derive(Clone)]
pub struct MemoryConversationStore {
    inner: Arc<RwLock<HashMap<String, OwnerData>>>,
    default_quota: u32,
}

impl MemoryConversationStore {
    pub fn new(default_quota: u32) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            default_quota,
        }
    }

    fn with_owner<T>(&self, owner: &str, f: impl FnOnce(&mut OwnerData) -> T) -> T {
        let mut guard = self.inner.write();
        let data = guard.entry(owner.to_string()).or_insert_with(|| OwnerData {
            threads: Vec::new(),
            requests_available: self.default_quota,
        });
        f(data)
    }
}

impl Default for MemoryConversationStore {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_QUOTA)
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn create_thread(&self, owner: &str, title: &str) -> Result<Thread, StorageError> {
        let now = Timestamp::now();
        let thread = Thread {
            id: Id::new_random(),
            title: title.to_string(),
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
        };
        self.with_owner(owner, |data| data.threads.push(thread.clone()));
        Ok(thread)
    }

    async fn thread(
        &self,
        owner: &str,
        thread_id: &str,
    ) -> Result<Option<Thread>, StorageError> {
        let guard = self.inner.read();
        Ok(guard.get(owner).and_then(|data| {
            data.threads
                .iter()
                .find(|thread| thread.id.as_str() == thread_id)
                .cloned()
        }))
    }

    async fn append_message(
        &self,
        owner: &str,
        thread_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<Message, StorageError> {
        let message = Message {
            id: Id::new_random(),
            role,
            content: content.to_string(),
            timestamp: Timestamp::now(),
        };
        self.with_owner(owner, |data| {
            match data
                .threads
                .iter_mut()
                .find(|thread| thread.id.as_str() == thread_id)
            {
                Some(thread) => {
                    thread.messages.push(message.clone());
                    thread.updated_at = message.timestamp;
                    Ok(message)
                }
                None => Err(StorageError::not_found(&format!(
                    "thread {thread_id} not found for owner"
                ))),
            }
        })
    }

    async fn list_threads(
        &self,
        owner: &str,
        page: PageRequest,
        sort_by: ThreadSortField,
        order: SortOrder,
    ) -> Result<Page<ThreadSummary>, StorageError> {
        let mut summaries: Vec<ThreadSummary> = {
            let guard = self.inner.read();
            guard
                .get(owner)
                .map(|data| data.threads.iter().map(Thread::summary).collect())
                .unwrap_or_default()
        };

        match sort_by {
            ThreadSortField::CreatedAt => summaries.sort_by_key(|t| t.created_at),
            ThreadSortField::UpdatedAt => summaries.sort_by_key(|t| t.updated_at),
            ThreadSortField::Title => {
                summaries.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase()))
            }
        }
        if order.is_descending() {
            summaries.reverse();
        }

        Ok(Page::from_vec(summaries, page))
    }

    async fn list_messages(
        &self,
        owner: &str,
        thread_id: &str,
        page: PageRequest,
        order: SortOrder,
    ) -> Result<Page<Message>, StorageError> {
        let thread = self
            .thread(owner, thread_id)
            .await?
            .ok_or_else(|| StorageError::not_found(&format!("thread {thread_id} not found")))?;

        let mut messages = thread.messages;
        messages.sort_by_key(|m| m.timestamp);
        if order.is_descending() {
            messages.reverse();
        }

        Ok(Page::from_vec(messages, page))
    }

    async fn delete_thread(&self, owner: &str, thread_id: &str) -> Result<bool, StorageError> {
        Ok(self.with_owner(owner, |data| {
            let before = data.threads.len();
            data.threads.retain(|thread| thread.id.as_str() != thread_id);
            data.threads.len() != before
        }))
    }

    async fn requests_available(&self, owner: &str) -> Result<u32, StorageError> {
        Ok(self.with_owner(owner, |data| data.requests_available))
    }

    async fn consume_request(&self, owner: &str) -> Result<u32, StorageError> {
        Ok(self.with_owner(owner, |data| {
            data.requests_available = data.requests_available.saturating_sub(1);
            data.requests_available
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: &str = "user@example.com";

    #[tokio::test]
    async fn create_append_and_fetch_round_trip() {
        let store = MemoryConversationStore::default();
        let thread = store.create_thread(OWNER, "first question").await.unwrap();

        store
            .append_message(OWNER, thread.id.as_str(), MessageRole::User, "hello")
            .await
            .unwrap();
        store
            .append_message(OWNER, thread.id.as_str(), MessageRole::Assistant, "hi")
            .await
            .unwrap();

        let fetched = store
            .thread(OWNER, thread.id.as_str())
            .await
            .unwrap()
            .expect("thread exists");
        assert_eq!(fetched.messages.len(), 2);
        assert_eq!(fetched.messages[0].role, MessageRole::User);
        assert!(fetched.updated_at >= fetched.created_at);
    }

    #[tokio::test]
    async fn append_to_missing_thread_is_not_found() {
        let store = MemoryConversationStore::default();
        let err = store
            .append_message(OWNER, "missing", MessageRole::User, "hello")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn owners_are_isolated() {
        let store = MemoryConversationStore::default();
        let thread = store.create_thread(OWNER, "mine").await.unwrap();

        let other = store
            .thread("intruder@example.com", thread.id.as_str())
            .await
            .unwrap();
        assert!(other.is_none());
    }

    #[tokio::test]
    async fn thread_listing_paginates_and_sorts_by_title() {
        let store = MemoryConversationStore::default();
        for title in ["banana", "Apple", "cherry"] {
            store.create_thread(OWNER, title).await.unwrap();
        }

        let page = store
            .list_threads(
                OWNER,
                PageRequest::new(1, 2),
                ThreadSortField::Title,
                SortOrder::Asc,
            )
            .await
            .unwrap();
        assert_eq!(page.total_count, 3);
        assert_eq!(page.total_pages, 2);
        assert!(page.has_next);
        assert_eq!(page.items[0].title, "Apple");
        assert_eq!(page.items[1].title, "banana");
    }

    #[tokio::test]
    async fn delete_thread_reports_missing() {
        let store = MemoryConversationStore::default();
        let thread = store.create_thread(OWNER, "to delete").await.unwrap();

        assert!(store.delete_thread(OWNER, thread.id.as_str()).await.unwrap());
        assert!(!store.delete_thread(OWNER, thread.id.as_str()).await.unwrap());
    }

    #[tokio::test]
    async fn quota_decrements_and_floors_at_zero() {
        let store = MemoryConversationStore::new(2);
        assert_eq!(store.requests_available(OWNER).await.unwrap(), 2);
        assert_eq!(store.consume_request(OWNER).await.unwrap(), 1);
        assert_eq!(store.consume_request(OWNER).await.unwrap(), 0);
        assert_eq!(store.consume_request(OWNER).await.unwrap(), 0);
    }
}
