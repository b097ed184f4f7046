//! 应用层实现。
//!
//! 围绕领域模型的私信用例服务：输入校验、会话线程解析、持久化顺序，
//! 以及对外部适配器（身份校验、存储、实时推送）的抽象。

pub mod broadcaster;
pub mod clock;
pub mod dto;
pub mod error;
pub mod fan_out;
pub mod memory;
pub mod repository;
pub mod services;
pub mod session_registry;

pub use broadcaster::{BroadcastError, MessageBroadcast, MessageBroadcaster};
pub use clock::{Clock, SteppingClock, SystemClock};
pub use dto::{ConversationSummaryDto, MessageDto, ServerEvent};
pub use error::{ApplicationError, AuthError};
pub use fan_out::SessionFanOut;
pub use memory::{InMemoryItemDirectory, InMemoryMessageStore, InMemoryUserDirectory};
pub use repository::{IdentityVerifier, ItemDirectory, ItemSummary, MessageRepository, UserDirectory};
pub use services::{
    ContactItemRequest, MessagingService, MessagingServiceDependencies, SendMessageRequest,
    StartConversationRequest,
};
pub use session_registry::{Session, SessionId, SessionRegistry};
