//! 站内私信核心领域模型
//!
//! 包含消息实体、会话线程标识的推导规则、实时连接的状态机，
//! 以及这些规则共享的错误类型。

pub mod connection;
pub mod conversation;
pub mod errors;
pub mod message;
pub mod value_objects;

// 重新导出常用类型
pub use connection::ConnectionState;
pub use conversation::{
    authorize_view, digest_conversations, ConversationDigest, ConversationRef, ConversationTarget,
    ThreadParticipants,
};
pub use errors::{DomainError, DomainResult, RepositoryError};
pub use message::{Message, NewMessage};
pub use value_objects::{
    ItemId, MessageContent, MessageId, ThreadId, Timestamp, UserId, DEFAULT_MAX_CONTENT_CHARS,
};
