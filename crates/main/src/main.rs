//! 主应用程序入口
//!
//! 启动私信与实时推送服务。

use std::sync::Arc;

use application::{
    InMemoryItemDirectory, InMemoryMessageStore, InMemoryUserDirectory, ItemDirectory,
    ItemSummary, MessageRepository, MessagingService, MessagingServiceDependencies, SessionFanOut,
    SessionRegistry, SystemClock, UserDirectory,
};
use config::{AppConfig, SeedConfig};
use domain::{ItemId, UserId};
use infrastructure::{create_pg_pool, PgStorage, MIGRATOR};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState, JwtService};

struct Stores {
    messages: Arc<dyn MessageRepository>,
    users: Arc<dyn UserDirectory>,
    items: Arc<dyn ItemDirectory>,
}

async fn open_stores(config: &AppConfig) -> anyhow::Result<Stores> {
    let Some(url) = config.database.url.as_deref() else {
        tracing::warn!("未配置数据库，使用内存存储，重启后数据丢失");
        return Ok(seeded_memory_stores(&config.seed).await);
    };

    let pool = create_pg_pool(url, config.database.max_connections).await?;
    MIGRATOR.run(&pool).await?;
    tracing::info!("数据库迁移完成");

    let storage = PgStorage::new(pool);
    Ok(Stores {
        messages: storage.message_repository,
        users: storage.user_directory,
        items: storage.item_directory,
    })
}

async fn seeded_memory_stores(seed: &SeedConfig) -> Stores {
    let users = Arc::new(InMemoryUserDirectory::new());
    for user in &seed.users {
        users.insert(UserId::new(user.id), user.name.clone()).await;
    }

    let items = Arc::new(InMemoryItemDirectory::new());
    for item in &seed.items {
        items
            .insert(ItemSummary {
                id: ItemId::new(item.id),
                owner_id: UserId::new(item.owner_id),
                name: item.name.clone(),
            })
            .await;
    }

    tracing::info!(
        users = seed.users.len(),
        items = seed.items.len(),
        "内存存储已预置"
    );
    Stores {
        messages: Arc::new(InMemoryMessageStore::new()),
        users,
        items,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load()?;
    tracing::info!(config = %config.sanitize(), "配置加载完成");

    let stores = open_stores(&config).await?;

    let sessions = Arc::new(SessionRegistry::new(config.realtime.session_buffer));
    let (fan_out, _fan_out_worker) = SessionFanOut::start(
        sessions.clone(),
        config.realtime.fanout_queue,
        config.realtime.dedupe_window,
    );

    let messaging_service = MessagingService::new(MessagingServiceDependencies {
        message_repository: stores.messages,
        user_directory: stores.users,
        item_directory: stores.items,
        clock: Arc::new(SystemClock),
        broadcaster: Arc::new(fan_out),
        max_content_chars: config.messaging.max_content_chars,
    });

    let jwt_service = JwtService::new(config.jwt.clone());

    let state = AppState::new(
        Arc::new(messaging_service),
        sessions,
        Arc::new(jwt_service),
    );

    let app = router(state);
    let address = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    tracing::info!("私信服务启动在 http://{}", address);
    axum::serve(listener, app).await?;

    Ok(())
}
