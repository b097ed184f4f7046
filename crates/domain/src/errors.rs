//! 领域模型错误定义
//!
//! 私信子系统中所有面向调用方的错误都在这里，均属于可恢复的输入或授权错误。

use thiserror::Error;

use crate::connection::ConnectionState;
use crate::value_objects::{ItemId, MessageId, ThreadId, UserId};

/// 领域模型错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// 发送方或接收方不存在
    #[error("unknown participant: {0}")]
    UnknownParticipant(UserId),

    /// 讨论的商品不存在
    #[error("unknown subject item: {0}")]
    UnknownItem(ItemId),

    /// 不能给自己发消息
    #[error("cannot send a message to yourself")]
    SelfMessage,

    /// 消息内容为空
    #[error("message content cannot be empty")]
    EmptyContent,

    /// 消息内容过长（按 Unicode 码点计）
    #[error("message content too long: {len} > {max}")]
    ContentTooLong { len: usize, max: usize },

    /// 调用方不是该线程的参与者
    #[error("thread {0} is not accessible")]
    ForbiddenThread(ThreadId),

    /// 消息不存在
    #[error("message not found: {0}")]
    MessageNotFound(MessageId),

    /// 只有接收方可以把消息标记为已读
    #[error("only the receiver may mark a message as read")]
    NotReceiver,

    /// 连接状态机的非法迁移
    #[error("invalid connection transition: {from} -> {to}")]
    InvalidTransition {
        from: ConnectionState,
        to: ConnectionState,
    },
}

/// 仓储层错误，由外部存储适配器产生
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,

    #[error("record conflict")]
    Conflict,

    #[error("storage error: {message}")]
    Storage { message: String },
}

impl RepositoryError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

/// 领域模型结果类型
pub type DomainResult<T> = Result<T, DomainError>;
