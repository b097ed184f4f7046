//! 消息实体定义
//!
//! 消息创建后只有已读标记可以变化，且只能从未读变为已读。

use serde::{Deserialize, Serialize};

use crate::errors::{DomainError, DomainResult};
use crate::value_objects::{ItemId, MessageContent, MessageId, ThreadId, Timestamp, UserId};

/// 尚未持久化的消息，由存储分配标识后成为 [`Message`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub content: MessageContent,
    pub subject_item: Option<ItemId>,
    pub thread_id: ThreadId,
    pub created_at: Timestamp,
}

impl NewMessage {
    pub fn compose(
        sender_id: UserId,
        receiver_id: UserId,
        content: MessageContent,
        subject_item: Option<ItemId>,
        thread_id: ThreadId,
        created_at: Timestamp,
    ) -> DomainResult<Self> {
        if sender_id == receiver_id {
            return Err(DomainError::SelfMessage);
        }
        Ok(Self {
            sender_id,
            receiver_id,
            content,
            subject_item,
            thread_id,
            created_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub content: MessageContent,
    pub subject_item: Option<ItemId>,
    pub thread_id: ThreadId,
    pub created_at: Timestamp,
    pub is_read: bool,
}

impl Message {
    /// 存储写入成功后，用分配到的标识组装完整消息
    pub fn stored(id: MessageId, draft: NewMessage) -> Self {
        Self {
            id,
            sender_id: draft.sender_id,
            receiver_id: draft.receiver_id,
            content: draft.content,
            subject_item: draft.subject_item,
            thread_id: draft.thread_id,
            created_at: draft.created_at,
            is_read: false,
        }
    }

    /// 标记为已读，返回本次调用是否改变了状态
    pub fn mark_read(&mut self) -> bool {
        let changed = !self.is_read;
        self.is_read = true;
        changed
    }

    pub fn involves(&self, user: UserId) -> bool {
        self.sender_id == user || self.receiver_id == user
    }

    /// 对 `user` 而言的另一方；`user` 不是参与者时返回 `None`
    pub fn counterpart_of(&self, user: UserId) -> Option<UserId> {
        if self.sender_id == user {
            Some(self.receiver_id)
        } else if self.receiver_id == user {
            Some(self.sender_id)
        } else {
            None
        }
    }

    pub fn is_unread_for(&self, user: UserId) -> bool {
        self.receiver_id == user && !self.is_read
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn draft(sender: i64, receiver: i64) -> DomainResult<NewMessage> {
        NewMessage::compose(
            UserId::new(sender),
            UserId::new(receiver),
            MessageContent::new("interested").unwrap(),
            Some(ItemId::new(42)),
            ThreadId::derive(UserId::new(sender), UserId::new(receiver), None),
            Utc::now(),
        )
    }

    #[test]
    fn self_message_is_rejected() {
        assert_eq!(draft(7, 7), Err(DomainError::SelfMessage));
    }

    #[test]
    fn stored_message_starts_unread() {
        let message = Message::stored(MessageId::new(1), draft(1, 2).unwrap());

        assert_eq!(message.id, MessageId::new(1));
        assert!(!message.is_read);
        assert!(message.is_unread_for(UserId::new(2)));
        assert!(!message.is_unread_for(UserId::new(1)));
    }

    #[test]
    fn mark_read_is_idempotent() {
        let mut message = Message::stored(MessageId::new(1), draft(1, 2).unwrap());

        assert!(message.mark_read());
        assert!(!message.mark_read());
        assert!(message.is_read);
    }

    #[test]
    fn counterpart_is_relative_to_user() {
        let message = Message::stored(MessageId::new(1), draft(1, 2).unwrap());

        assert_eq!(message.counterpart_of(UserId::new(1)), Some(UserId::new(2)));
        assert_eq!(message.counterpart_of(UserId::new(2)), Some(UserId::new(1)));
        assert_eq!(message.counterpart_of(UserId::new(3)), None);
        assert!(!message.involves(UserId::new(3)));
    }
}
