//! 新消息的实时推送
//!
//! `broadcast` 只把消息放进有界队列就返回；后台任务按顺序取出并经会话
//! 注册表投递给接收方和发送方。

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use domain::MessageId;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::broadcaster::{BroadcastError, MessageBroadcast, MessageBroadcaster};
use crate::dto::ServerEvent;
use crate::session_registry::SessionRegistry;

#[derive(Debug, Clone)]
pub struct SessionFanOut {
    queue: mpsc::Sender<MessageBroadcast>,
}

impl SessionFanOut {
    /// 启动推送任务。`dedupe_window` 是记住的最近已投递消息数。
    pub fn start(
        registry: Arc<SessionRegistry>,
        queue_capacity: usize,
        dedupe_window: usize,
    ) -> (Self, JoinHandle<()>) {
        let (queue, receiver) = mpsc::channel(queue_capacity.max(1));
        let worker = tokio::spawn(run_worker(
            receiver,
            registry,
            RecentDeliveries::new(dedupe_window),
        ));
        (Self { queue }, worker)
    }
}

#[async_trait]
impl MessageBroadcaster for SessionFanOut {
    async fn broadcast(&self, payload: MessageBroadcast) -> Result<(), BroadcastError> {
        self.queue.try_send(payload).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => BroadcastError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => BroadcastError::Closed,
        })
    }
}

async fn run_worker(
    mut receiver: mpsc::Receiver<MessageBroadcast>,
    registry: Arc<SessionRegistry>,
    mut recent: RecentDeliveries,
) {
    while let Some(payload) = receiver.recv().await {
        let message_id = payload.message_id();
        if !recent.remember(message_id) {
            debug!(message_id = %message_id, "重复的推送请求，已忽略");
            continue;
        }

        let recipients = payload.recipients();
        let event = ServerEvent::NewMessage {
            message: payload.message,
        };
        for user_id in recipients {
            let delivered = registry.send_to(user_id, event.clone()).await;
            debug!(
                message_id = %message_id,
                user_id = %user_id,
                delivered,
                "推送新消息"
            );
        }
    }
    info!("推送队列已关闭，推送任务退出");
}

/// 有界的最近投递记录，超过容量时淘汰最早的一条
#[derive(Debug)]
struct RecentDeliveries {
    order: VecDeque<MessageId>,
    seen: HashSet<MessageId>,
    capacity: usize,
}

impl RecentDeliveries {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    /// 首次见到返回 `true`
    fn remember(&mut self, id: MessageId) -> bool {
        if self.capacity == 0 {
            return true;
        }
        if !self.seen.insert(id) {
            return false;
        }
        self.order.push_back(id);
        if self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.seen.remove(&evicted);
            }
        }
        true
    }
}
