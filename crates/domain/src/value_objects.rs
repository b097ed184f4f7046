use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DomainError;

/// 统一的时间戳类型。
pub type Timestamp = DateTime<Utc>;

/// 消息正文的默认长度上限（Unicode 码点）。
pub const DEFAULT_MAX_CONTENT_CHARS: usize = 2000;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl $name {
            pub fn new(id: i64) -> Self {
                Self(id)
            }

            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i64 {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

numeric_id!(
    /// 用户（参与者）唯一标识。
    UserId
);

numeric_id!(
    /// 被讨论的商品标识。
    ItemId
);

numeric_id!(
    /// 消息唯一标识，由存储分配，单调递增。
    MessageId
);

/// 会话线程标识。
///
/// 两种来源：由参与者对（加可选商品）确定性推导，或由 `start_conversation`
/// 显式分配。两者共用同一个类型，存储层不区分。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ThreadId(pub Uuid);

/// 推导线程标识使用的 UUIDv5 命名空间，修改会让既有的推导线程全部失配。
const THREAD_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a4e_93d7_4b0a_8e55_0c3d_7a91_b2e4);

impl ThreadId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// 为新会话分配一个全新的显式标识
    pub fn allocate() -> Self {
        Self(Uuid::new_v4())
    }

    /// 从参与者对与可选商品推导线程标识。
    ///
    /// 对两个参与者的顺序不敏感：先排序再拼接规范键。
    pub fn derive(a: UserId, b: UserId, item: Option<ItemId>) -> Self {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        let item = item.map_or_else(|| "-".to_owned(), |item| item.to_string());
        let key = format!("{low}:{high}:{item}");
        Self(Uuid::new_v5(&THREAD_NAMESPACE, key.as_bytes()))
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ThreadId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<ThreadId> for Uuid {
    fn from(value: ThreadId) -> Self {
        value.0
    }
}

/// 消息正文内容。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContent(String);

impl MessageContent {
    /// 使用默认长度上限校验
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        Self::bounded(value, DEFAULT_MAX_CONTENT_CHARS)
    }

    /// 校验非空（去除首尾空白后）且不超过 `max_chars` 个码点
    pub fn bounded(value: impl Into<String>, max_chars: usize) -> Result<Self, DomainError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DomainError::EmptyContent);
        }
        let len = value.chars().count();
        if len > max_chars {
            return Err(DomainError::ContentTooLong {
                len,
                max: max_chars,
            });
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for MessageContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
