use std::collections::HashMap;
use std::sync::Arc;

use domain::{
    authorize_view, digest_conversations, ConversationRef, ConversationTarget, DomainError, ItemId,
    Message, MessageContent, MessageId, NewMessage, ThreadId, UserId,
};
use tracing::{info, warn};

use crate::{
    broadcaster::{MessageBroadcast, MessageBroadcaster},
    clock::Clock,
    dto::{fallback_display_name, ConversationSummaryDto, MessageDto},
    error::ApplicationError,
    repository::{ItemDirectory, MessageRepository, UserDirectory},
};

#[derive(Debug, Clone)]
pub struct StartConversationRequest {
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub subject_item: Option<ItemId>,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct SendMessageRequest {
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub target: ConversationTarget,
    pub subject_item: Option<ItemId>,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct ContactItemRequest {
    pub user_id: UserId,
    pub item_id: ItemId,
    /// 为空时使用默认问候语
    pub content: Option<String>,
}

pub struct MessagingServiceDependencies {
    pub message_repository: Arc<dyn MessageRepository>,
    pub user_directory: Arc<dyn UserDirectory>,
    pub item_directory: Arc<dyn ItemDirectory>,
    pub clock: Arc<dyn Clock>,
    pub broadcaster: Arc<dyn MessageBroadcaster>,
    pub max_content_chars: usize,
}

/// 私信引擎。自身无状态，所有数据都在存储中。
pub struct MessagingService {
    deps: MessagingServiceDependencies,
}

impl MessagingService {
    pub fn new(deps: MessagingServiceDependencies) -> Self {
        Self { deps }
    }

    /// 开启一个新会话，线程标识总是新分配的
    pub async fn start_conversation(
        &self,
        request: StartConversationRequest,
    ) -> Result<MessageDto, ApplicationError> {
        let content = self
            .validate(
                request.sender_id,
                request.receiver_id,
                request.subject_item,
                request.content,
            )
            .await?;

        let thread_id = ThreadId::allocate();
        info!(
            sender_id = %request.sender_id,
            receiver_id = %request.receiver_id,
            thread_id = %thread_id,
            "开启新会话"
        );

        self.post(
            request.sender_id,
            request.receiver_id,
            content,
            request.subject_item,
            thread_id,
        )
        .await
    }

    pub async fn send_message(
        &self,
        request: SendMessageRequest,
    ) -> Result<MessageDto, ApplicationError> {
        let content = self
            .validate(
                request.sender_id,
                request.receiver_id,
                request.subject_item,
                request.content,
            )
            .await?;

        let participants = match request.target {
            ConversationTarget::Thread(thread_id) => {
                self.deps
                    .message_repository
                    .thread_participants(thread_id)
                    .await?
            }
            ConversationTarget::Derive => None,
        };
        let thread_id = request.target.resolve(
            request.sender_id,
            request.receiver_id,
            request.subject_item,
            participants,
        )?;

        self.post(
            request.sender_id,
            request.receiver_id,
            content,
            request.subject_item,
            thread_id,
        )
        .await
    }

    /// 联系商品的主人，以该商品为主题开启会话
    pub async fn contact_item_owner(
        &self,
        request: ContactItemRequest,
    ) -> Result<MessageDto, ApplicationError> {
        let item = self
            .deps
            .item_directory
            .find(request.item_id)
            .await?
            .ok_or(DomainError::UnknownItem(request.item_id))?;

        if item.owner_id == request.user_id {
            return Err(DomainError::SelfMessage.into());
        }

        let content = match request.content {
            Some(content) if !content.trim().is_empty() => content,
            _ => format!("Hi, I'm interested in your product: {}", item.name),
        };

        self.start_conversation(StartConversationRequest {
            sender_id: request.user_id,
            receiver_id: item.owner_id,
            subject_item: Some(item.id),
            content,
        })
        .await
    }

    /// 只有接收方可以标记；重复标记不报错
    ///
    /// 返回本次调用是否把消息由未读变为已读。
    pub async fn mark_read(
        &self,
        message_id: MessageId,
        acting_user: UserId,
    ) -> Result<bool, ApplicationError> {
        let message = self
            .deps
            .message_repository
            .find_by_id(message_id)
            .await?
            .ok_or(DomainError::MessageNotFound(message_id))?;

        if message.receiver_id != acting_user {
            return Err(DomainError::NotReceiver.into());
        }
        if message.is_read {
            return Ok(false);
        }

        Ok(self.deps.message_repository.mark_read(message_id).await?)
    }

    /// 返回本次由未读变为已读的条数
    pub async fn mark_thread_read(
        &self,
        thread_id: ThreadId,
        acting_user: UserId,
    ) -> Result<u64, ApplicationError> {
        let updated = self
            .deps
            .message_repository
            .mark_thread_read(thread_id, acting_user)
            .await?;
        if updated > 0 {
            info!(thread_id = %thread_id, user_id = %acting_user, updated, "线程消息已读");
        }
        Ok(updated)
    }

    pub async fn mark_history_read(
        &self,
        acting_user: UserId,
        counterpart: UserId,
    ) -> Result<u64, ApplicationError> {
        Ok(self
            .deps
            .message_repository
            .mark_read_from(acting_user, counterpart)
            .await?)
    }

    pub async fn get_conversation(
        &self,
        reference: ConversationRef,
        acting_user: UserId,
    ) -> Result<Vec<MessageDto>, ApplicationError> {
        let thread_id = reference.thread_for(acting_user);
        let participants = self
            .deps
            .message_repository
            .thread_participants(thread_id)
            .await?;

        // 按参与者对寻址的线程还没有消息时是空会话，不是越权
        if participants.is_none() && matches!(reference, ConversationRef::Pair { .. }) {
            return Ok(Vec::new());
        }
        authorize_view(thread_id, acting_user, participants)?;

        let messages = self.deps.message_repository.list_thread(thread_id).await?;
        self.to_dtos(messages).await
    }

    /// 与某个用户之间跨所有线程的消息
    pub async fn history_with(
        &self,
        acting_user: UserId,
        counterpart: UserId,
    ) -> Result<Vec<MessageDto>, ApplicationError> {
        let messages = self
            .deps
            .message_repository
            .list_between(acting_user, counterpart)
            .await?;
        self.to_dtos(messages).await
    }

    pub async fn list_conversations(
        &self,
        user: UserId,
    ) -> Result<Vec<ConversationSummaryDto>, ApplicationError> {
        let messages = self.deps.message_repository.list_for_user(user).await?;
        let digests = digest_conversations(user, messages);

        let mut summaries = Vec::with_capacity(digests.len());
        for digest in digests {
            let name = self.display_name(digest.counterpart).await?;
            summaries.push(ConversationSummaryDto::from_digest(digest, name));
        }
        Ok(summaries)
    }

    pub async fn unread_count(&self, user: UserId) -> Result<u64, ApplicationError> {
        Ok(self.deps.message_repository.count_unread(user).await?)
    }

    pub async fn unread_count_from(
        &self,
        user: UserId,
        counterpart: UserId,
    ) -> Result<u64, ApplicationError> {
        Ok(self
            .deps
            .message_repository
            .count_unread_from(user, counterpart)
            .await?)
    }

    // 所有校验都在写入前完成
    async fn validate(
        &self,
        sender_id: UserId,
        receiver_id: UserId,
        subject_item: Option<ItemId>,
        content: String,
    ) -> Result<MessageContent, ApplicationError> {
        if sender_id == receiver_id {
            return Err(DomainError::SelfMessage.into());
        }

        let content = MessageContent::bounded(content, self.deps.max_content_chars)?;

        for user_id in [sender_id, receiver_id] {
            if !self.deps.user_directory.exists(user_id).await? {
                return Err(DomainError::UnknownParticipant(user_id).into());
            }
        }

        if let Some(item_id) = subject_item {
            if !self.deps.item_directory.exists(item_id).await? {
                return Err(DomainError::UnknownItem(item_id).into());
            }
        }

        Ok(content)
    }

    async fn post(
        &self,
        sender_id: UserId,
        receiver_id: UserId,
        content: MessageContent,
        subject_item: Option<ItemId>,
        thread_id: ThreadId,
    ) -> Result<MessageDto, ApplicationError> {
        let draft = NewMessage::compose(
            sender_id,
            receiver_id,
            content,
            subject_item,
            thread_id,
            self.deps.clock.now(),
        )?;

        let stored = self.deps.message_repository.create(draft).await?;

        // 落库之后不再失败：取名出错时用默认展示名
        let sender_name = self.committed_name(stored.sender_id, stored.id).await;
        let receiver_name = self.committed_name(stored.receiver_id, stored.id).await;
        let dto = MessageDto::from_message(stored, sender_name, receiver_name);

        // 消息已经落库，推送失败只记录不影响发送结果
        if let Err(broadcast_error) = self
            .deps
            .broadcaster
            .broadcast(MessageBroadcast::new(dto.clone()))
            .await
        {
            warn!(
                message_id = %dto.id,
                thread_id = %dto.thread_id,
                error = %broadcast_error,
                "消息已保存，但推送失败"
            );
        }

        Ok(dto)
    }

    async fn display_name(&self, user_id: UserId) -> Result<String, ApplicationError> {
        Ok(self
            .deps
            .user_directory
            .display_name(user_id)
            .await?
            .unwrap_or_else(|| fallback_display_name(user_id)))
    }

    async fn committed_name(&self, user_id: UserId, message_id: MessageId) -> String {
        match self.display_name(user_id).await {
            Ok(name) => name,
            Err(err) => {
                warn!(
                    user_id = %user_id,
                    message_id = %message_id,
                    error = %err,
                    "消息已保存，展示名查询失败"
                );
                fallback_display_name(user_id)
            }
        }
    }

    async fn to_dtos(&self, messages: Vec<Message>) -> Result<Vec<MessageDto>, ApplicationError> {
        let mut names: HashMap<UserId, String> = HashMap::new();
        let mut dtos = Vec::with_capacity(messages.len());
        for message in messages {
            for user_id in [message.sender_id, message.receiver_id] {
                if !names.contains_key(&user_id) {
                    let name = self.display_name(user_id).await?;
                    names.insert(user_id, name);
                }
            }
            let sender_name = names
                .get(&message.sender_id)
                .cloned()
                .unwrap_or_else(|| fallback_display_name(message.sender_id));
            let receiver_name = names
                .get(&message.receiver_id)
                .cloned()
                .unwrap_or_else(|| fallback_display_name(message.receiver_id));
            dtos.push(MessageDto::from_message(message, sender_name, receiver_name));
        }
        Ok(dtos)
    }
}
