//! 在线会话注册表
//!
//! 每个用户最多一个会话，新注册会顶替旧会话；旧会话的发送端被丢弃后，
//! 对应连接的接收循环会自然结束。

use std::collections::HashMap;

use domain::UserId;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::dto::ServerEvent;

pub type SessionId = Uuid;

#[derive(Debug, Clone)]
struct SessionHandle {
    session_id: SessionId,
    outbound: mpsc::Sender<ServerEvent>,
}

/// 一次注册得到的会话：标识加上待下发事件的接收端
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    pub events: mpsc::Receiver<ServerEvent>,
}

#[derive(Debug)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<UserId, SessionHandle>>,
    buffer: usize,
}

impl SessionRegistry {
    /// `buffer` 是每个会话的出站队列容量
    pub fn new(buffer: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            buffer: buffer.max(1),
        }
    }

    pub async fn register(&self, user_id: UserId) -> Session {
        let (outbound, events) = mpsc::channel(self.buffer);
        let session_id = Uuid::new_v4();

        let replaced = {
            let mut sessions = self.sessions.write().await;
            sessions.insert(
                user_id,
                SessionHandle {
                    session_id,
                    outbound,
                },
            )
        };

        if let Some(previous) = replaced {
            info!(
                user_id = %user_id,
                previous_session = %previous.session_id,
                session_id = %session_id,
                "新会话顶替了旧会话"
            );
        } else {
            info!(user_id = %user_id, session_id = %session_id, "会话已注册");
        }

        Session {
            id: session_id,
            user_id,
            events,
        }
    }

    /// 只有当前登记的仍是这个会话时才移除，返回是否移除
    pub async fn deregister(&self, user_id: UserId, session_id: SessionId) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get(&user_id) {
            Some(handle) if handle.session_id == session_id => {
                sessions.remove(&user_id);
                info!(user_id = %user_id, session_id = %session_id, "会话已注销");
                true
            }
            _ => {
                debug!(
                    user_id = %user_id,
                    session_id = %session_id,
                    "会话已被替换，跳过注销"
                );
                false
            }
        }
    }

    /// 尽力投递，不等待。用户不在线、队列已满或会话已关闭都返回 `false`
    pub async fn send_to(&self, user_id: UserId, event: ServerEvent) -> bool {
        let handle = {
            let sessions = self.sessions.read().await;
            match sessions.get(&user_id) {
                Some(handle) => handle.clone(),
                None => return false,
            }
        };

        match handle.outbound.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(
                    user_id = %user_id,
                    session_id = %handle.session_id,
                    "会话出站队列已满，丢弃事件"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(
                    user_id = %user_id,
                    session_id = %handle.session_id,
                    "会话已关闭，丢弃事件"
                );
                false
            }
        }
    }

    pub async fn is_connected(&self, user_id: UserId) -> bool {
        self.sessions.read().await.contains_key(&user_id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::MessageDto;
    use chrono::Utc;
    use domain::{MessageId, ThreadId};

    fn event(id: i64) -> ServerEvent {
        ServerEvent::NewMessage {
            message: MessageDto {
                id: MessageId::new(id),
                sender_id: UserId::new(1),
                sender_name: "User 1".into(),
                receiver_id: UserId::new(2),
                receiver_name: "User 2".into(),
                content: "hi".into(),
                subject_item: None,
                thread_id: ThreadId::derive(UserId::new(1), UserId::new(2), None),
                created_at: Utc::now(),
                is_read: false,
            },
        }
    }

    #[tokio::test]
    async fn send_to_delivers_to_registered_session() {
        let registry = SessionRegistry::new(4);
        let mut session = registry.register(UserId::new(2)).await;

        assert!(registry.send_to(UserId::new(2), event(1)).await);
        assert_eq!(session.events.recv().await, Some(event(1)));
    }

    #[tokio::test]
    async fn send_to_absent_user_is_a_silent_no_op() {
        let registry = SessionRegistry::new(4);
        assert!(!registry.send_to(UserId::new(9), event(1)).await);
    }

    #[tokio::test]
    async fn newer_registration_replaces_older() {
        let registry = SessionRegistry::new(4);
        let mut old = registry.register(UserId::new(2)).await;
        let mut new = registry.register(UserId::new(2)).await;

        assert_eq!(registry.len().await, 1);
        assert!(registry.send_to(UserId::new(2), event(1)).await);
        assert_eq!(new.events.recv().await, Some(event(1)));
        // 旧会话的发送端已被丢弃
        assert_eq!(old.events.recv().await, None);
    }

    #[tokio::test]
    async fn stale_deregistration_keeps_current_session() {
        let registry = SessionRegistry::new(4);
        let old = registry.register(UserId::new(2)).await;
        let new = registry.register(UserId::new(2)).await;

        assert!(!registry.deregister(UserId::new(2), old.id).await);
        assert!(registry.is_connected(UserId::new(2)).await);

        assert!(registry.deregister(UserId::new(2), new.id).await);
        assert!(!registry.is_connected(UserId::new(2)).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn full_buffer_drops_instead_of_blocking() {
        let registry = SessionRegistry::new(1);
        let _session = registry.register(UserId::new(2)).await;

        assert!(registry.send_to(UserId::new(2), event(1)).await);
        assert!(!registry.send_to(UserId::new(2), event(2)).await);
    }

    #[tokio::test]
    async fn closed_session_is_not_delivered() {
        let registry = SessionRegistry::new(4);
        let session = registry.register(UserId::new(2)).await;
        drop(session);

        assert!(!registry.send_to(UserId::new(2), event(1)).await);
    }
}
