//! 会话解析
//!
//! 把一次发送或查询请求落到唯一的线程标识上：显式线程标识原样透传（需校验
//! 参与者身份），否则由参与者对推导。两者冲突时以显式标识为准，线程一旦开启
//! 就保持自己的标识，即使同一对用户后来讨论了别的商品。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::errors::{DomainError, DomainResult};
use crate::message::Message;
use crate::value_objects::{ItemId, ThreadId, UserId};

/// 发送消息时的寻址方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "thread_id", rename_all = "snake_case")]
pub enum ConversationTarget {
    /// 继续一个已存在的线程
    Thread(ThreadId),
    /// 由发送方、接收方与商品推导
    Derive,
}

/// 查询会话时的寻址方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationRef {
    Thread(ThreadId),
    Pair {
        counterpart: UserId,
        item: Option<ItemId>,
    },
}

/// 线程的两个参与者，取自线程中最早的一条消息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadParticipants {
    first: UserId,
    second: UserId,
}

impl ThreadParticipants {
    pub fn new(first: UserId, second: UserId) -> Self {
        Self { first, second }
    }

    pub fn of(message: &Message) -> Self {
        Self::new(message.sender_id, message.receiver_id)
    }

    pub fn contains(&self, user: UserId) -> bool {
        self.first == user || self.second == user
    }

    pub fn other(&self, user: UserId) -> Option<UserId> {
        if self.first == user {
            Some(self.second)
        } else if self.second == user {
            Some(self.first)
        } else {
            None
        }
    }
}

impl ConversationTarget {
    /// 解析出消息应归属的线程。
    ///
    /// `participants` 只对 `Thread` 有意义：没有任何消息的线程没有参与者，
    /// 视为不可访问。
    pub fn resolve(
        self,
        sender: UserId,
        receiver: UserId,
        item: Option<ItemId>,
        participants: Option<ThreadParticipants>,
    ) -> DomainResult<ThreadId> {
        match self {
            ConversationTarget::Derive => Ok(ThreadId::derive(sender, receiver, item)),
            ConversationTarget::Thread(thread_id) => {
                let participants = participants.ok_or(DomainError::ForbiddenThread(thread_id))?;
                match participants.other(sender) {
                    Some(other) if other == receiver => Ok(thread_id),
                    _ => Err(DomainError::ForbiddenThread(thread_id)),
                }
            }
        }
    }
}

impl ConversationRef {
    /// 查询方视角下的线程标识
    pub fn thread_for(self, acting_user: UserId) -> ThreadId {
        match self {
            ConversationRef::Thread(thread_id) => thread_id,
            ConversationRef::Pair { counterpart, item } => {
                ThreadId::derive(acting_user, counterpart, item)
            }
        }
    }
}

/// 校验查询方可以读取该线程
pub fn authorize_view(
    thread_id: ThreadId,
    acting_user: UserId,
    participants: Option<ThreadParticipants>,
) -> DomainResult<()> {
    match participants {
        Some(participants) if participants.contains(acting_user) => Ok(()),
        _ => Err(DomainError::ForbiddenThread(thread_id)),
    }
}

/// 会话列表中的一项，不含展示名等外部数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationDigest {
    pub counterpart: UserId,
    pub last_message: Message,
    pub unread_count: u64,
    pub last_from_me: bool,
}

/// 按对方聚合 `user` 参与的消息。
///
/// 结果按最后一条消息时间倒序，时间相同则消息标识大的在前。
pub fn digest_conversations<I>(user: UserId, messages: I) -> Vec<ConversationDigest>
where
    I: IntoIterator<Item = Message>,
{
    let mut by_counterpart: HashMap<UserId, ConversationDigest> = HashMap::new();

    for message in messages {
        let Some(counterpart) = message.counterpart_of(user) else {
            continue;
        };
        let unread = u64::from(message.is_unread_for(user));

        match by_counterpart.get_mut(&counterpart) {
            Some(digest) => {
                digest.unread_count += unread;
                if is_newer(&message, &digest.last_message) {
                    digest.last_from_me = message.sender_id == user;
                    digest.last_message = message;
                }
            }
            None => {
                by_counterpart.insert(
                    counterpart,
                    ConversationDigest {
                        counterpart,
                        last_from_me: message.sender_id == user,
                        last_message: message,
                        unread_count: unread,
                    },
                );
            }
        }
    }

    let mut digests: Vec<_> = by_counterpart.into_values().collect();
    digests.sort_by(|a, b| {
        (b.last_message.created_at, b.last_message.id)
            .cmp(&(a.last_message.created_at, a.last_message.id))
    });
    digests
}

fn is_newer(candidate: &Message, current: &Message) -> bool {
    (candidate.created_at, candidate.id) > (current.created_at, current.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::NewMessage;
    use crate::value_objects::{MessageContent, MessageId};
    use chrono::{DateTime, Duration, Utc};

    fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + seconds, 0).unwrap()
    }

    fn message(id: i64, sender: i64, receiver: i64, seconds: i64) -> Message {
        let sender = UserId::new(sender);
        let receiver = UserId::new(receiver);
        Message::stored(
            MessageId::new(id),
            NewMessage::compose(
                sender,
                receiver,
                MessageContent::new(format!("message {id}")).unwrap(),
                None,
                ThreadId::derive(sender, receiver, None),
                at(seconds),
            )
            .unwrap(),
        )
    }

    #[test]
    fn derive_target_ignores_participants() {
        let sender = UserId::new(1);
        let receiver = UserId::new(2);

        let resolved = ConversationTarget::Derive
            .resolve(sender, receiver, Some(ItemId::new(42)), None)
            .unwrap();

        assert_eq!(resolved, ThreadId::derive(receiver, sender, Some(ItemId::new(42))));
    }

    #[test]
    fn explicit_thread_passes_through_for_participants() {
        let thread = ThreadId::allocate();
        let participants = ThreadParticipants::new(UserId::new(1), UserId::new(2));

        let resolved = ConversationTarget::Thread(thread)
            .resolve(UserId::new(2), UserId::new(1), None, Some(participants))
            .unwrap();

        assert_eq!(resolved, thread);
    }

    #[test]
    fn explicit_thread_wins_over_derived_identity() {
        // 同一对用户在旧线程里谈论另一件商品，仍然留在旧线程
        let thread = ThreadId::allocate();
        let participants = ThreadParticipants::new(UserId::new(1), UserId::new(2));

        let resolved = ConversationTarget::Thread(thread)
            .resolve(
                UserId::new(1),
                UserId::new(2),
                Some(ItemId::new(99)),
                Some(participants),
            )
            .unwrap();

        assert_eq!(resolved, thread);
        assert_ne!(
            resolved,
            ThreadId::derive(UserId::new(1), UserId::new(2), Some(ItemId::new(99)))
        );
    }

    #[test]
    fn explicit_thread_rejects_outsiders() {
        let thread = ThreadId::allocate();
        let participants = ThreadParticipants::new(UserId::new(1), UserId::new(2));

        let outsider = ConversationTarget::Thread(thread).resolve(
            UserId::new(3),
            UserId::new(1),
            None,
            Some(participants),
        );
        assert_eq!(outsider, Err(DomainError::ForbiddenThread(thread)));

        // 参与者把消息发给线程外的人同样被拒绝，避免误投
        let misrouted = ConversationTarget::Thread(thread).resolve(
            UserId::new(1),
            UserId::new(3),
            None,
            Some(participants),
        );
        assert_eq!(misrouted, Err(DomainError::ForbiddenThread(thread)));
    }

    #[test]
    fn empty_explicit_thread_is_forbidden() {
        let thread = ThreadId::allocate();
        let result =
            ConversationTarget::Thread(thread).resolve(UserId::new(1), UserId::new(2), None, None);
        assert_eq!(result, Err(DomainError::ForbiddenThread(thread)));
    }

    #[test]
    fn pair_reference_resolves_from_acting_side() {
        let reference = ConversationRef::Pair {
            counterpart: UserId::new(2),
            item: None,
        };
        assert_eq!(
            reference.thread_for(UserId::new(1)),
            ThreadId::derive(UserId::new(2), UserId::new(1), None)
        );
    }

    #[test]
    fn view_requires_participation() {
        let thread = ThreadId::allocate();
        let participants = Some(ThreadParticipants::new(UserId::new(1), UserId::new(2)));

        assert!(authorize_view(thread, UserId::new(1), participants).is_ok());
        assert_eq!(
            authorize_view(thread, UserId::new(3), participants),
            Err(DomainError::ForbiddenThread(thread))
        );
        assert_eq!(
            authorize_view(thread, UserId::new(1), None),
            Err(DomainError::ForbiddenThread(thread))
        );
    }

    #[test]
    fn digests_group_by_counterpart_and_sort_newest_first() {
        let me = 1;
        let messages = vec![
            message(1, 2, me, 0),
            message(2, me, 2, 10),
            message(3, 3, me, 5),
            message(4, 3, me, 6),
            message(5, 4, 5, 100), // 与我无关
        ];

        let digests = digest_conversations(UserId::new(me), messages);

        assert_eq!(digests.len(), 2);
        assert_eq!(digests[0].counterpart, UserId::new(2));
        assert_eq!(digests[0].last_message.id, MessageId::new(2));
        assert!(digests[0].last_from_me);
        assert_eq!(digests[0].unread_count, 1);

        assert_eq!(digests[1].counterpart, UserId::new(3));
        assert_eq!(digests[1].last_message.id, MessageId::new(4));
        assert!(!digests[1].last_from_me);
        assert_eq!(digests[1].unread_count, 2);
    }

    #[test]
    fn digests_break_timestamp_ties_by_message_id() {
        let me = 1;
        let messages = vec![message(10, 2, me, 0), message(11, 3, me, 0)];

        let digests = digest_conversations(UserId::new(me), messages);

        assert_eq!(digests[0].counterpart, UserId::new(3));
        assert_eq!(digests[1].counterpart, UserId::new(2));
    }

    #[test]
    fn read_messages_do_not_count_as_unread() {
        let me = UserId::new(1);
        let mut read = message(1, 2, 1, 0);
        read.mark_read();
        let unread = message(2, 2, 1, 1);

        let digests = digest_conversations(me, vec![read, unread]);

        assert_eq!(digests[0].unread_count, 1);
        assert_eq!(
            digests[0].last_message.created_at,
            at(0) + Duration::seconds(1)
        );
    }
}
