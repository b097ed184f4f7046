//! 对外返回与推送的数据结构

use domain::{ConversationDigest, ItemId, Message, MessageId, ThreadId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// 展示名缺失时的占位名
pub fn fallback_display_name(id: UserId) -> String {
    format!("User {id}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDto {
    pub id: MessageId,
    pub sender_id: UserId,
    pub sender_name: String,
    pub receiver_id: UserId,
    pub receiver_name: String,
    pub content: String,
    pub subject_item: Option<ItemId>,
    pub thread_id: ThreadId,
    pub created_at: Timestamp,
    pub is_read: bool,
}

impl MessageDto {
    pub fn from_message(message: Message, sender_name: String, receiver_name: String) -> Self {
        Self {
            id: message.id,
            sender_id: message.sender_id,
            sender_name,
            receiver_id: message.receiver_id,
            receiver_name,
            content: message.content.into_inner(),
            subject_item: message.subject_item,
            thread_id: message.thread_id,
            created_at: message.created_at,
            is_read: message.is_read,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummaryDto {
    pub counterpart_id: UserId,
    pub counterpart_name: String,
    pub thread_id: ThreadId,
    pub last_message_id: MessageId,
    pub last_message: String,
    pub last_message_at: Timestamp,
    pub unread_count: u64,
    pub last_from_me: bool,
}

impl ConversationSummaryDto {
    pub fn from_digest(digest: ConversationDigest, counterpart_name: String) -> Self {
        let last = digest.last_message;
        Self {
            counterpart_id: digest.counterpart,
            counterpart_name,
            thread_id: last.thread_id,
            last_message_id: last.id,
            last_message: last.content.into_inner(),
            last_message_at: last.created_at,
            unread_count: digest.unread_count,
            last_from_me: digest.last_from_me,
        }
    }
}

/// 服务端经实时通道下发的事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    NewMessage { message: MessageDto },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domain::{MessageContent, NewMessage};

    #[test]
    fn new_message_event_is_tagged() {
        let sender = UserId::new(1);
        let receiver = UserId::new(2);
        let message = Message::stored(
            MessageId::new(7),
            NewMessage::compose(
                sender,
                receiver,
                MessageContent::new("interested").unwrap(),
                Some(ItemId::new(42)),
                ThreadId::derive(sender, receiver, Some(ItemId::new(42))),
                Utc::now(),
            )
            .unwrap(),
        );
        let event = ServerEvent::NewMessage {
            message: MessageDto::from_message(message, "alice".into(), fallback_display_name(receiver)),
        };

        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "new_message");
        assert_eq!(json["message"]["id"], 7);
        assert_eq!(json["message"]["sender_name"], "alice");
        assert_eq!(json["message"]["receiver_name"], "User 2");
        assert_eq!(json["message"]["subject_item"], 42);
        assert_eq!(json["message"]["is_read"], false);
    }
}
