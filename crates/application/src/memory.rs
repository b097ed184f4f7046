//! 内存存储实现
//!
//! 未配置数据库时使用，也供测试直接构造。

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use domain::{
    ItemId, Message, MessageId, NewMessage, RepositoryError, ThreadId, ThreadParticipants, UserId,
};
use tokio::sync::RwLock;

use crate::repository::{ItemDirectory, ItemSummary, MessageRepository, UserDirectory};

#[derive(Debug, Default)]
pub struct InMemoryMessageStore {
    messages: RwLock<Vec<Message>>,
    next_id: AtomicI64,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted(mut messages: Vec<Message>) -> Vec<Message> {
        messages.sort_by_key(|message| (message.created_at, message.id));
        messages
    }

    async fn filtered(&self, predicate: impl Fn(&Message) -> bool) -> Vec<Message> {
        let messages = self.messages.read().await;
        Self::sorted(messages.iter().filter(|m| predicate(m)).cloned().collect())
    }

    async fn mark_where(&self, predicate: impl Fn(&Message) -> bool) -> u64 {
        let mut messages = self.messages.write().await;
        messages
            .iter_mut()
            .filter(|m| predicate(m))
            .map(|m| u64::from(m.mark_read()))
            .sum()
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageStore {
    async fn create(&self, message: NewMessage) -> Result<Message, RepositoryError> {
        let mut messages = self.messages.write().await;
        // 在写锁内分配，保证标识顺序与写入顺序一致
        let id = MessageId::new(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let stored = Message::stored(id, message);
        messages.push(stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: MessageId) -> Result<Option<Message>, RepositoryError> {
        let messages = self.messages.read().await;
        Ok(messages.iter().find(|m| m.id == id).cloned())
    }

    async fn mark_read(&self, id: MessageId) -> Result<bool, RepositoryError> {
        let mut messages = self.messages.write().await;
        let message = messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(RepositoryError::NotFound)?;
        Ok(message.mark_read())
    }

    async fn mark_thread_read(
        &self,
        thread_id: ThreadId,
        receiver: UserId,
    ) -> Result<u64, RepositoryError> {
        Ok(self
            .mark_where(|m| m.thread_id == thread_id && m.receiver_id == receiver)
            .await)
    }

    async fn mark_read_from(
        &self,
        receiver: UserId,
        sender: UserId,
    ) -> Result<u64, RepositoryError> {
        Ok(self
            .mark_where(|m| m.receiver_id == receiver && m.sender_id == sender)
            .await)
    }

    async fn list_thread(&self, thread_id: ThreadId) -> Result<Vec<Message>, RepositoryError> {
        Ok(self.filtered(|m| m.thread_id == thread_id).await)
    }

    async fn thread_participants(
        &self,
        thread_id: ThreadId,
    ) -> Result<Option<ThreadParticipants>, RepositoryError> {
        let messages = self.messages.read().await;
        Ok(messages
            .iter()
            .filter(|m| m.thread_id == thread_id)
            .min_by_key(|m| (m.created_at, m.id))
            .map(ThreadParticipants::of))
    }

    async fn list_between(&self, a: UserId, b: UserId) -> Result<Vec<Message>, RepositoryError> {
        Ok(self
            .filtered(|m| {
                (m.sender_id == a && m.receiver_id == b) || (m.sender_id == b && m.receiver_id == a)
            })
            .await)
    }

    async fn list_for_user(&self, user: UserId) -> Result<Vec<Message>, RepositoryError> {
        Ok(self.filtered(|m| m.involves(user)).await)
    }

    async fn count_unread(&self, receiver: UserId) -> Result<u64, RepositoryError> {
        let messages = self.messages.read().await;
        Ok(messages.iter().filter(|m| m.is_unread_for(receiver)).count() as u64)
    }

    async fn count_unread_from(
        &self,
        receiver: UserId,
        sender: UserId,
    ) -> Result<u64, RepositoryError> {
        let messages = self.messages.read().await;
        Ok(messages
            .iter()
            .filter(|m| m.sender_id == sender && m.is_unread_for(receiver))
            .count() as u64)
    }
}

/// 用户目录，值为可选的展示名
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<UserId, Option<String>>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, id: UserId, display_name: Option<String>) {
        self.users.write().await.insert(id, display_name);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn exists(&self, id: UserId) -> Result<bool, RepositoryError> {
        Ok(self.users.read().await.contains_key(&id))
    }

    async fn display_name(&self, id: UserId) -> Result<Option<String>, RepositoryError> {
        Ok(self.users.read().await.get(&id).cloned().flatten())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryItemDirectory {
    items: RwLock<HashMap<ItemId, ItemSummary>>,
}

impl InMemoryItemDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, item: ItemSummary) {
        self.items.write().await.insert(item.id, item);
    }
}

#[async_trait]
impl ItemDirectory for InMemoryItemDirectory {
    async fn find(&self, id: ItemId) -> Result<Option<ItemSummary>, RepositoryError> {
        Ok(self.items.read().await.get(&id).cloned())
    }
}
