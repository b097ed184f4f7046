use async_trait::async_trait;
use domain::{MessageId, UserId};
use thiserror::Error;

use crate::dto::MessageDto;

/// 交给实时推送的已持久化消息
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MessageBroadcast {
    pub message: MessageDto,
}

impl MessageBroadcast {
    pub fn new(message: MessageDto) -> Self {
        Self { message }
    }

    pub fn message_id(&self) -> MessageId {
        self.message.id
    }

    /// 需要收到推送的用户：接收方在前，发送方只出现一次
    pub fn recipients(&self) -> Vec<UserId> {
        let mut recipients = vec![self.message.receiver_id];
        if self.message.sender_id != self.message.receiver_id {
            recipients.push(self.message.sender_id);
        }
        recipients
    }
}

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("fan-out queue is full")]
    QueueFull,
    #[error("fan-out queue is closed")]
    Closed,
    #[error("broadcast failed: {0}")]
    Failed(String),
}

impl BroadcastError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MessageBroadcaster: Send + Sync {
    async fn broadcast(&self, payload: MessageBroadcast) -> Result<(), BroadcastError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domain::ThreadId;

    fn broadcast_between(sender: i64, receiver: i64) -> MessageBroadcast {
        MessageBroadcast::new(MessageDto {
            id: MessageId::new(1),
            sender_id: UserId::new(sender),
            sender_name: "sender".into(),
            receiver_id: UserId::new(receiver),
            receiver_name: "receiver".into(),
            content: "hello".into(),
            subject_item: None,
            thread_id: ThreadId::allocate(),
            created_at: Utc::now(),
            is_read: false,
        })
    }

    #[test]
    fn receiver_comes_first_then_sender() {
        assert_eq!(
            broadcast_between(1, 2).recipients(),
            vec![UserId::new(2), UserId::new(1)]
        );
    }

    #[test]
    fn same_sender_and_receiver_is_delivered_once() {
        assert_eq!(broadcast_between(5, 5).recipients(), vec![UserId::new(5)]);
    }
}
