use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use application::{
    ContactItemRequest, ConversationSummaryDto, MessageDto, SendMessageRequest,
    StartConversationRequest,
};
use domain::{ConversationRef, ConversationTarget, ItemId, MessageId, ThreadId, UserId};

use crate::{auth::AuthUser, error::ApiError, state::AppState, ws_connection::websocket_upgrade};

#[derive(Debug, Deserialize)]
struct StartConversationPayload {
    receiver_id: i64,
    item_id: Option<i64>,
    content: String,
}

#[derive(Debug, Deserialize)]
struct SendMessagePayload {
    receiver_id: i64,
    content: String,
    /// 缺省时按双方与商品推导线程
    thread_id: Option<Uuid>,
    item_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct ContactPayload {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PairQuery {
    item_id: Option<i64>,
}

#[derive(Debug, Serialize)]
struct CountResponse {
    count: u64,
}

#[derive(Debug, Serialize)]
struct UpdatedResponse {
    updated: u64,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/conversations",
            post(start_conversation).get(list_conversations),
        )
        .route("/messages", post(send_message))
        .route("/messages/{message_id}/read", patch(mark_read))
        .route("/threads/{thread_id}/messages", get(get_thread))
        .route("/threads/{thread_id}/read", post(mark_thread_read))
        .route("/users/{other_id}/thread", get(get_pair_thread))
        .route("/users/{other_id}/messages", get(history_with))
        .route("/users/{other_id}/read", post(mark_history_read))
        .route("/unread", get(unread_count))
        .route("/unread/{other_id}", get(unread_count_from))
        .route("/items/{item_id}/contact", post(contact_item_owner))
        .route("/ws", get(websocket_upgrade))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn start_conversation(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<StartConversationPayload>,
) -> Result<(StatusCode, Json<MessageDto>), ApiError> {
    let dto = state
        .messaging_service
        .start_conversation(StartConversationRequest {
            sender_id: user_id,
            receiver_id: UserId::new(payload.receiver_id),
            subject_item: payload.item_id.map(ItemId::new),
            content: payload.content,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(dto)))
}

async fn list_conversations(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<ConversationSummaryDto>>, ApiError> {
    let items = state.messaging_service.list_conversations(user_id).await?;
    Ok(Json(items))
}

async fn send_message(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<SendMessagePayload>,
) -> Result<(StatusCode, Json<MessageDto>), ApiError> {
    let target = match payload.thread_id {
        Some(thread_id) => ConversationTarget::Thread(ThreadId::new(thread_id)),
        None => ConversationTarget::Derive,
    };

    let dto = state
        .messaging_service
        .send_message(SendMessageRequest {
            sender_id: user_id,
            receiver_id: UserId::new(payload.receiver_id),
            target,
            subject_item: payload.item_id.map(ItemId::new),
            content: payload.content,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(dto)))
}

async fn mark_read(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(message_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state
        .messaging_service
        .mark_read(MessageId::new(message_id), user_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn get_thread(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(thread_id): Path<Uuid>,
) -> Result<Json<Vec<MessageDto>>, ApiError> {
    let items = state
        .messaging_service
        .get_conversation(ConversationRef::Thread(ThreadId::new(thread_id)), user_id)
        .await?;

    Ok(Json(items))
}

async fn mark_thread_read(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(thread_id): Path<Uuid>,
) -> Result<Json<UpdatedResponse>, ApiError> {
    let updated = state
        .messaging_service
        .mark_thread_read(ThreadId::new(thread_id), user_id)
        .await?;

    Ok(Json(UpdatedResponse { updated }))
}

async fn get_pair_thread(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(other_id): Path<i64>,
    Query(query): Query<PairQuery>,
) -> Result<Json<Vec<MessageDto>>, ApiError> {
    let reference = ConversationRef::Pair {
        counterpart: UserId::new(other_id),
        item: query.item_id.map(ItemId::new),
    };
    let items = state
        .messaging_service
        .get_conversation(reference, user_id)
        .await?;

    Ok(Json(items))
}

async fn history_with(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(other_id): Path<i64>,
) -> Result<Json<Vec<MessageDto>>, ApiError> {
    let items = state
        .messaging_service
        .history_with(user_id, UserId::new(other_id))
        .await?;

    Ok(Json(items))
}

async fn mark_history_read(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(other_id): Path<i64>,
) -> Result<Json<UpdatedResponse>, ApiError> {
    let updated = state
        .messaging_service
        .mark_history_read(user_id, UserId::new(other_id))
        .await?;

    Ok(Json(UpdatedResponse { updated }))
}

async fn unread_count(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<CountResponse>, ApiError> {
    let count = state.messaging_service.unread_count(user_id).await?;
    Ok(Json(CountResponse { count }))
}

async fn unread_count_from(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(other_id): Path<i64>,
) -> Result<Json<CountResponse>, ApiError> {
    let count = state
        .messaging_service
        .unread_count_from(user_id, UserId::new(other_id))
        .await?;
    Ok(Json(CountResponse { count }))
}

async fn contact_item_owner(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(item_id): Path<i64>,
    Json(payload): Json<ContactPayload>,
) -> Result<(StatusCode, Json<MessageDto>), ApiError> {
    let dto = state
        .messaging_service
        .contact_item_owner(ContactItemRequest {
            user_id,
            item_id: ItemId::new(item_id),
            content: payload.content,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(dto)))
}
