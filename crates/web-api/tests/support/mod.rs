use std::{net::SocketAddr, sync::Arc, time::Duration};

use application::{
    InMemoryItemDirectory, InMemoryMessageStore, InMemoryUserDirectory, ItemSummary,
    MessagingService, MessagingServiceDependencies, SessionFanOut, SessionRegistry, SystemClock,
};
use domain::{ItemId, UserId};
use tokio::{net::TcpListener, sync::oneshot, time::sleep};
use web_api::{router, AppState, JwtConfig, JwtService};

pub const ALICE: UserId = UserId(1);
pub const BOB: UserId = UserId(2);
pub const CAROL: UserId = UserId(3);
pub const LAMP: ItemId = ItemId(42);

/// 在随机端口上运行的测试服务
pub struct TestServer {
    pub addr: SocketAddr,
    pub jwt: JwtService,
    pub sessions: Arc<SessionRegistry>,
    _shutdown: oneshot::Sender<()>,
}

impl TestServer {
    pub fn http(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws(&self) -> String {
        format!("ws://{}/api/v1/ws", self.addr)
    }

    pub fn token(&self, user_id: UserId) -> String {
        self.jwt.generate_token(user_id).expect("token")
    }

    pub fn bearer(&self, user_id: UserId) -> String {
        format!("Bearer {}", self.token(user_id))
    }

    /// 等待握手完成后的会话注册
    pub async fn wait_connected(&self, user_id: UserId) {
        for _ in 0..100 {
            if self.sessions.is_connected(user_id).await {
                return;
            }
            sleep(Duration::from_millis(20)).await;
        }
        panic!("user {user_id} never connected");
    }

    pub async fn wait_disconnected(&self, user_id: UserId) {
        for _ in 0..100 {
            if !self.sessions.is_connected(user_id).await {
                return;
            }
            sleep(Duration::from_millis(20)).await;
        }
        panic!("user {user_id} never disconnected");
    }
}

pub async fn spawn_server() -> TestServer {
    let users = Arc::new(InMemoryUserDirectory::new());
    users.insert(ALICE, Some("Alice".into())).await;
    users.insert(BOB, Some("Bob".into())).await;
    users.insert(CAROL, None).await;

    let items = Arc::new(InMemoryItemDirectory::new());
    items
        .insert(ItemSummary {
            id: LAMP,
            owner_id: BOB,
            name: "Desk lamp".into(),
        })
        .await;

    let sessions = Arc::new(SessionRegistry::new(32));
    let (fan_out, _worker) = SessionFanOut::start(sessions.clone(), 128, 256);

    let messaging_service = MessagingService::new(MessagingServiceDependencies {
        message_repository: Arc::new(InMemoryMessageStore::new()),
        user_directory: users,
        item_directory: items,
        clock: Arc::new(SystemClock),
        broadcaster: Arc::new(fan_out),
        max_content_chars: 2000,
    });

    let jwt = JwtService::new(JwtConfig {
        secret: "integration-test-secret-with-32-plus-chars".to_string(),
        expiration_hours: 1,
    });

    let state = AppState::new(
        Arc::new(messaging_service),
        sessions.clone(),
        Arc::new(jwt.clone()),
    );
    let app = router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .ok();
    });

    TestServer {
        addr,
        jwt,
        sessions,
        _shutdown: shutdown_tx,
    }
}
