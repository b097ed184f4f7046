use application::{AuthError, ServerEvent, Session};
use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::Response,
};
use domain::{ConnectionState, UserId};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::{auth::bearer_token, error::ApiError, state::AppState};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct WsQuery {
    token: Option<String>,
}

/// 握手：先认证再升级，认证失败时不会建立任何会话
pub(crate) async fn websocket_upgrade(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let credential = credential_from(&headers, query.token.as_deref())?;
    let user_id = match state.identity.verify(credential).await {
        Ok(user_id) => user_id,
        Err(err) => {
            tracing::info!(error = %err, "WebSocket 握手认证失败");
            return Err(err.into());
        }
    };

    let lifecycle = ConnectionState::Connecting.transition(ConnectionState::Authenticated)?;
    tracing::debug!(user_id = %user_id, state = %lifecycle, "WebSocket 握手认证通过");

    let connection = WebSocketConnection {
        state,
        user_id,
        lifecycle,
    };
    Ok(ws.on_upgrade(move |socket| connection.run(socket)))
}

/// 优先使用 `Authorization` 头，其次是 `token` 查询参数
fn credential_from<'a>(
    headers: &'a HeaderMap,
    query_token: Option<&'a str>,
) -> Result<&'a str, AuthError> {
    if let Some(token) = bearer_token(headers)? {
        return Ok(token);
    }
    match query_token {
        Some(token) if !token.trim().is_empty() => Ok(token),
        _ => Err(AuthError::Unauthenticated),
    }
}

/// 单个已认证的 WebSocket 连接
///
/// 身份在握手时绑定，连接存续期间不再重新认证。
struct WebSocketConnection {
    state: AppState,
    user_id: UserId,
    lifecycle: ConnectionState,
}

impl WebSocketConnection {
    fn advance(&mut self, next: ConnectionState) {
        match self.lifecycle.transition(next) {
            Ok(state) => {
                tracing::info!(user_id = %self.user_id, from = %self.lifecycle, to = %state, "连接状态变更");
                self.lifecycle = state;
            }
            Err(err) => {
                tracing::warn!(user_id = %self.user_id, error = %err, "非法的连接状态变更");
            }
        }
    }

    async fn run(mut self, socket: WebSocket) {
        let Session {
            id: session_id,
            mut events,
            ..
        } = self.state.sessions.register(self.user_id).await;
        self.advance(ConnectionState::Open);

        let (mut sender, mut incoming) = socket.split();

        // 写端只归发送任务所有，接收任务通过命令通道请求回写
        let (control_tx, mut control_rx) = mpsc::channel::<ControlFrame>(8);

        // 推送事件与控制帧
        let mut send_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(frame) = control_rx.recv() => {
                        let ControlFrame::Pong(data) = frame;
                        if sender.send(WsMessage::Pong(data.into())).await.is_err() {
                            tracing::debug!("pong 写入失败，连接已断开");
                            break;
                        }
                    }
                    event = events.recv() => {
                        let Some(event) = event else {
                            // 会话被新连接顶替
                            let _ = sender.send(WsMessage::Close(None)).await;
                            break;
                        };
                        let payload = match serialize_event(&event) {
                            Ok(json) => json,
                            Err(err) => {
                                tracing::warn!(error = %err, "推送事件序列化失败");
                                continue;
                            }
                        };
                        if sender.send(WsMessage::Text(payload.into())).await.is_err() {
                            tracing::debug!("推送写入失败，连接已断开");
                            break;
                        }
                    }
                }
            }
            tracing::debug!("推送任务结束");
        });

        // 客户端只发心跳与关闭帧
        let mut recv_task = tokio::spawn(async move {
            while let Some(Ok(message)) = incoming.next().await {
                if handle_incoming(message, &control_tx).await.is_err() {
                    break;
                }
            }
            tracing::debug!("读取任务结束");
        });

        // 任意一方结束即关闭连接
        tokio::select! {
            _ = &mut send_task => recv_task.abort(),
            _ = &mut recv_task => send_task.abort(),
        }

        self.state
            .sessions
            .deregister(self.user_id, session_id)
            .await;
        self.advance(ConnectionState::Closed);
    }
}

fn serialize_event(event: &ServerEvent) -> Result<String, serde_json::Error> {
    serde_json::to_string(event)
}

/// 返回 `Err` 表示读取循环应当结束
///
/// 文本与二进制帧一律忽略。
async fn handle_incoming(
    message: WsMessage,
    control_tx: &mpsc::Sender<ControlFrame>,
) -> Result<(), ()> {
    match message {
        WsMessage::Close(_) => {
            tracing::debug!("客户端关闭连接");
            return Err(());
        }
        WsMessage::Ping(data) => {
            if control_tx.send(ControlFrame::Pong(data.to_vec())).await.is_err() {
                tracing::debug!("推送任务已结束，无法回复 pong");
                return Err(());
            }
        }
        WsMessage::Pong(_) => {}
        WsMessage::Text(_) | WsMessage::Binary(_) => {
            tracing::debug!("忽略客户端消息");
        }
    }
    Ok(())
}

#[derive(Debug)]
enum ControlFrame {
    Pong(Vec<u8>),
}
