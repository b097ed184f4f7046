use async_trait::async_trait;
use domain::{
    ItemId, Message, MessageId, NewMessage, RepositoryError, ThreadId, ThreadParticipants, UserId,
};

use crate::error::AuthError;

/// 把凭证换成已验证的用户身份
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, credential: &str) -> Result<UserId, AuthError>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    // 写入新消息，由存储分配单调递增的标识
    async fn create(&self, message: NewMessage) -> Result<Message, RepositoryError>;

    async fn find_by_id(&self, id: MessageId) -> Result<Option<Message>, RepositoryError>;

    // 条件更新，返回是否从未读变为已读
    async fn mark_read(&self, id: MessageId) -> Result<bool, RepositoryError>;

    // 线程内接收方为 receiver 的未读消息全部置为已读，返回变更条数
    async fn mark_thread_read(
        &self,
        thread_id: ThreadId,
        receiver: UserId,
    ) -> Result<u64, RepositoryError>;

    // 跨线程：sender 发给 receiver 的未读消息全部置为已读
    async fn mark_read_from(&self, receiver: UserId, sender: UserId)
        -> Result<u64, RepositoryError>;

    // 按创建时间升序（同一时间按标识升序）
    async fn list_thread(&self, thread_id: ThreadId) -> Result<Vec<Message>, RepositoryError>;

    // 线程最早一条消息的双方；空线程返回 None
    async fn thread_participants(
        &self,
        thread_id: ThreadId,
    ) -> Result<Option<ThreadParticipants>, RepositoryError>;

    // 两个用户之间跨线程的全部消息，升序
    async fn list_between(&self, a: UserId, b: UserId) -> Result<Vec<Message>, RepositoryError>;

    async fn list_for_user(&self, user: UserId) -> Result<Vec<Message>, RepositoryError>;

    async fn count_unread(&self, receiver: UserId) -> Result<u64, RepositoryError>;

    async fn count_unread_from(
        &self,
        receiver: UserId,
        sender: UserId,
    ) -> Result<u64, RepositoryError>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn exists(&self, id: UserId) -> Result<bool, RepositoryError>;

    /// 展示名；用户不存在或没有可展示的名字时返回 `None`
    async fn display_name(&self, id: UserId) -> Result<Option<String>, RepositoryError>;
}

/// 商品目录中与私信相关的最小信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSummary {
    pub id: ItemId,
    pub owner_id: UserId,
    pub name: String,
}

#[async_trait]
pub trait ItemDirectory: Send + Sync {
    async fn find(&self, id: ItemId) -> Result<Option<ItemSummary>, RepositoryError>;

    async fn exists(&self, id: ItemId) -> Result<bool, RepositoryError> {
        Ok(self.find(id).await?.is_some())
    }
}
