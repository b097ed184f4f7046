use std::sync::Arc;

use application::repository::{ItemDirectory, ItemSummary, MessageRepository, UserDirectory};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    ItemId, Message, MessageContent, MessageId, NewMessage, RepositoryError, ThreadId,
    ThreadParticipants, UserId,
};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use uuid::Uuid;

const MESSAGE_COLUMNS: &str =
    "id, sender_id, receiver_id, content, item_id, thread_id, created_at, is_read";

fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    tracing::debug!(error = %err, "数据库操作失败");
    RepositoryError::storage(err.to_string())
}

fn invalid_data(message: impl Into<String>) -> RepositoryError {
    RepositoryError::storage(message)
}

fn to_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

#[derive(Debug, FromRow)]
struct MessageRecord {
    id: i64,
    sender_id: i64,
    receiver_id: i64,
    content: String,
    item_id: Option<i64>,
    thread_id: Uuid,
    created_at: DateTime<Utc>,
    is_read: bool,
}

impl TryFrom<MessageRecord> for Message {
    type Error = RepositoryError;

    fn try_from(value: MessageRecord) -> Result<Self, Self::Error> {
        // 已落库的内容不再按当前配置的长度上限校验
        let content = MessageContent::bounded(value.content, usize::MAX)
            .map_err(|err| invalid_data(err.to_string()))?;

        Ok(Message {
            id: MessageId::new(value.id),
            sender_id: UserId::new(value.sender_id),
            receiver_id: UserId::new(value.receiver_id),
            content,
            subject_item: value.item_id.map(ItemId::new),
            thread_id: ThreadId::new(value.thread_id),
            created_at: value.created_at,
            is_read: value.is_read,
        })
    }
}

fn into_messages(records: Vec<MessageRecord>) -> Result<Vec<Message>, RepositoryError> {
    records.into_iter().map(Message::try_from).collect()
}

#[derive(Debug, Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn create(&self, message: NewMessage) -> Result<Message, RepositoryError> {
        let record = sqlx::query_as::<_, MessageRecord>(&format!(
            r#"
            INSERT INTO messages (sender_id, receiver_id, content, item_id, thread_id, created_at, is_read)
            VALUES ($1, $2, $3, $4, $5, $6, FALSE)
            RETURNING {MESSAGE_COLUMNS}
            "#
        ))
        .bind(message.sender_id.get())
        .bind(message.receiver_id.get())
        .bind(message.content.as_str())
        .bind(message.subject_item.map(ItemId::get))
        .bind(message.thread_id.as_uuid())
        .bind(message.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Message::try_from(record)
    }

    async fn find_by_id(&self, id: MessageId) -> Result<Option<Message>, RepositoryError> {
        let record = sqlx::query_as::<_, MessageRecord>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1"
        ))
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(Message::try_from).transpose()
    }

    async fn mark_read(&self, id: MessageId) -> Result<bool, RepositoryError> {
        let exists: Option<bool> = sqlx::query_scalar("SELECT is_read FROM messages WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        if exists.is_none() {
            return Err(RepositoryError::NotFound);
        }

        let result =
            sqlx::query("UPDATE messages SET is_read = TRUE WHERE id = $1 AND is_read = FALSE")
                .bind(id.get())
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_thread_read(
        &self,
        thread_id: ThreadId,
        receiver: UserId,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r#"UPDATE messages SET is_read = TRUE
            WHERE thread_id = $1 AND receiver_id = $2 AND is_read = FALSE"#,
        )
        .bind(thread_id.as_uuid())
        .bind(receiver.get())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(result.rows_affected())
    }

    async fn mark_read_from(
        &self,
        receiver: UserId,
        sender: UserId,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r#"UPDATE messages SET is_read = TRUE
            WHERE receiver_id = $1 AND sender_id = $2 AND is_read = FALSE"#,
        )
        .bind(receiver.get())
        .bind(sender.get())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(result.rows_affected())
    }

    async fn list_thread(&self, thread_id: ThreadId) -> Result<Vec<Message>, RepositoryError> {
        let records = sqlx::query_as::<_, MessageRecord>(&format!(
            r#"SELECT {MESSAGE_COLUMNS} FROM messages
            WHERE thread_id = $1
            ORDER BY created_at ASC, id ASC"#
        ))
        .bind(thread_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        into_messages(records)
    }

    async fn thread_participants(
        &self,
        thread_id: ThreadId,
    ) -> Result<Option<ThreadParticipants>, RepositoryError> {
        let row: Option<(i64, i64)> = sqlx::query_as(
            r#"SELECT sender_id, receiver_id FROM messages
            WHERE thread_id = $1
            ORDER BY created_at ASC, id ASC
            LIMIT 1"#,
        )
        .bind(thread_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(row.map(|(sender, receiver)| {
            ThreadParticipants::new(UserId::new(sender), UserId::new(receiver))
        }))
    }

    async fn list_between(&self, a: UserId, b: UserId) -> Result<Vec<Message>, RepositoryError> {
        let records = sqlx::query_as::<_, MessageRecord>(&format!(
            r#"SELECT {MESSAGE_COLUMNS} FROM messages
            WHERE (sender_id = $1 AND receiver_id = $2) OR (sender_id = $2 AND receiver_id = $1)
            ORDER BY created_at ASC, id ASC"#
        ))
        .bind(a.get())
        .bind(b.get())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        into_messages(records)
    }

    async fn list_for_user(&self, user: UserId) -> Result<Vec<Message>, RepositoryError> {
        let records = sqlx::query_as::<_, MessageRecord>(&format!(
            r#"SELECT {MESSAGE_COLUMNS} FROM messages
            WHERE sender_id = $1 OR receiver_id = $1
            ORDER BY created_at ASC, id ASC"#
        ))
        .bind(user.get())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        into_messages(records)
    }

    async fn count_unread(&self, receiver: UserId) -> Result<u64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages WHERE receiver_id = $1 AND is_read = FALSE",
        )
        .bind(receiver.get())
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(to_count(count))
    }

    async fn count_unread_from(
        &self,
        receiver: UserId,
        sender: UserId,
    ) -> Result<u64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM messages
            WHERE receiver_id = $1 AND sender_id = $2 AND is_read = FALSE"#,
        )
        .bind(receiver.get())
        .bind(sender.get())
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(to_count(count))
    }
}

#[derive(Debug, Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn exists(&self, id: UserId) -> Result<bool, RepositoryError> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(id.get())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_err)
    }

    async fn display_name(&self, id: UserId) -> Result<Option<String>, RepositoryError> {
        // 全名优先，其次登录名
        let name: Option<Option<String>> = sqlx::query_scalar(
            r#"SELECT COALESCE(NULLIF(TRIM(full_name), ''), NULLIF(TRIM(login), ''))
            FROM users WHERE id = $1"#,
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(name.flatten())
    }
}

#[derive(Debug, FromRow)]
struct ItemRecord {
    id: i64,
    owner_id: i64,
    name: String,
}

impl From<ItemRecord> for ItemSummary {
    fn from(value: ItemRecord) -> Self {
        ItemSummary {
            id: ItemId::new(value.id),
            owner_id: UserId::new(value.owner_id),
            name: value.name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PgItemDirectory {
    pool: PgPool,
}

impl PgItemDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ItemDirectory for PgItemDirectory {
    async fn find(&self, id: ItemId) -> Result<Option<ItemSummary>, RepositoryError> {
        let record =
            sqlx::query_as::<_, ItemRecord>("SELECT id, owner_id, name FROM items WHERE id = $1")
                .bind(id.get())
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_err)?;

        Ok(record.map(ItemSummary::from))
    }
}

#[derive(Clone)]
pub struct PgStorage {
    pub pool: PgPool,
    pub message_repository: Arc<PgMessageRepository>,
    pub user_directory: Arc<PgUserDirectory>,
    pub item_directory: Arc<PgItemDirectory>,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self {
            message_repository: Arc::new(PgMessageRepository::new(pool.clone())),
            user_directory: Arc::new(PgUserDirectory::new(pool.clone())),
            item_directory: Arc::new(PgItemDirectory::new(pool.clone())),
            pool,
        }
    }
}

pub async fn create_pg_pool(
    database_url: &str,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    tracing::info!(max_connections, "创建 PostgreSQL 连接池");
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}
