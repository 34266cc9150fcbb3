use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive},
        Sse,
    },
    Extension, Json,
};
use chrono::{DateTime, Utc};
use futures::stream::{Stream, StreamExt};
use serde::Deserialize;
use std::convert::Infallible;
use uuid::Uuid;

use crate::{
    error::Result,
    middleware::CurrentUser,
    state::AppState,
};
use super::{
    notification_dto::{
        MarkAllReadResponse, NotificationListResponse, NotificationResponse, UnreadCountResponse,
    },
    notification_models::{NotificationCategory, NotificationPriority, NotificationType},
    notification_repository::NotificationFilters,
};

#[derive(Deserialize)]
pub struct NotificationQuery {
    category: Option<NotificationCategory>,
    notif_type: Option<NotificationType>,
    priority: Option<NotificationPriority>,
    search: Option<String>,
    created_from: Option<DateTime<Utc>>,
    created_to: Option<DateTime<Utc>>,
    unread_only: Option<bool>,
    page: Option<u32>,
    limit: Option<u32>,
}

/// List notifications visible to the authenticated user
#[utoipa::path(
    get,
    path = "/api/notifications",
    params(
        ("category" = Option<String>, Query, description = "Filter by category"),
        ("notif_type" = Option<String>, Query, description = "Filter by type"),
        ("priority" = Option<String>, Query, description = "Filter by priority"),
        ("search" = Option<String>, Query, description = "Search title, message and tags"),
        ("created_from" = Option<String>, Query, description = "Created on or after (RFC 3339)"),
        ("created_to" = Option<String>, Query, description = "Created on or before (RFC 3339)"),
        ("unread_only" = Option<bool>, Query, description = "Only unread notifications"),
        ("page" = Option<u32>, Query, description = "Page number"),
        ("limit" = Option<u32>, Query, description = "Items per page")
    ),
    responses(
        (status = 200, description = "Visible notifications with the caller's read flags", body = NotificationListResponse),
        (status = 401, description = "Unauthorized")
    ),
    tag = "notifications",
    security(("bearer_auth" = []))
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<NotificationListResponse>> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(10).clamp(1, 100);

    let filters = NotificationFilters {
        category: query.category,
        notif_type: query.notif_type,
        priority: query.priority,
        search: query.search,
        created_from: query.created_from,
        created_to: query.created_to,
        unread_only: query.unread_only.unwrap_or(false),
        page,
        limit,
    };

    let (items, total, unread_count) = state.notification_service.list(user.id, &filters).await?;

    let total_pages = (total as f64 / limit as f64).ceil() as u32;

    Ok(Json(NotificationListResponse {
        data: items.into_iter().map(NotificationResponse::from).collect(),
        unread_count,
        total,
        page,
        limit,
        total_pages,
    }))
}

/// Unread count for the authenticated user
#[utoipa::path(
    get,
    path = "/api/notifications/unread-count",
    responses(
        (status = 200, description = "Unread count", body = UnreadCountResponse),
        (status = 401, description = "Unauthorized")
    ),
    tag = "notifications",
    security(("bearer_auth" = []))
)]
pub async fn unread_count(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<UnreadCountResponse>> {
    let unread_count = state.notification_service.unread_count(user.id).await?;

    Ok(Json(UnreadCountResponse { unread_count }))
}

/// Subscribe to newly created notifications via Server-Sent Events
#[utoipa::path(
    get,
    path = "/api/notifications/stream",
    responses(
        (status = 200, description = "SSE stream of notifications visible to the caller"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "notifications",
    security(("bearer_auth" = []))
)]
pub async fn notification_stream(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let rx = state.notification_tx.subscribe();
    let user_id = user.id;

    let stream = tokio_stream::wrappers::BroadcastStream::new(rx)
        .filter_map(move |event| async move {
            match event {
                Ok(event) => {
                    let visible = event
                        .recipients
                        .as_ref()
                        .map_or(true, |recipients| recipients.contains(&user_id));
                    if !visible {
                        return None;
                    }
                    let response = NotificationResponse::from(event.notification);
                    serde_json::to_string(&response)
                        .ok()
                        .map(|data| Ok(Event::default().data(data)))
                }
                Err(_) => None,
            }
        });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Get a single notification visible to the authenticated user
#[utoipa::path(
    get,
    path = "/api/notifications/{id}",
    params(
        ("id" = Uuid, Path, description = "Notification ID")
    ),
    responses(
        (status = 200, description = "Notification with the caller's read flag", body = NotificationResponse),
        (status = 404, description = "Notification not found or not visible"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "notifications",
    security(("bearer_auth" = []))
)]
pub async fn get_notification(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<NotificationResponse>> {
    let notification = state
        .notification_service
        .get(notification_id, user.id)
        .await?;

    Ok(Json(NotificationResponse::from(notification)))
}

/// Mark a notification as read for the authenticated user
#[utoipa::path(
    patch,
    path = "/api/notifications/{id}/read",
    params(
        ("id" = Uuid, Path, description = "Notification ID")
    ),
    responses(
        (status = 204, description = "Marked as read"),
        (status = 403, description = "Not a recipient"),
        (status = 404, description = "Notification not found"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "notifications",
    security(("bearer_auth" = []))
)]
pub async fn mark_notification_read(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(notification_id): Path<Uuid>,
) -> Result<StatusCode> {
    state
        .notification_service
        .mark_read(notification_id, user.id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Mark a notification as unread for the authenticated user
#[utoipa::path(
    patch,
    path = "/api/notifications/{id}/unread",
    params(
        ("id" = Uuid, Path, description = "Notification ID")
    ),
    responses(
        (status = 204, description = "Marked as unread"),
        (status = 403, description = "Not a recipient"),
        (status = 404, description = "Notification not found"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "notifications",
    security(("bearer_auth" = []))
)]
pub async fn mark_notification_unread(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(notification_id): Path<Uuid>,
) -> Result<StatusCode> {
    state
        .notification_service
        .mark_unread(notification_id, user.id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Mark everything currently visible and unread as read
#[utoipa::path(
    post,
    path = "/api/notifications/read-all",
    responses(
        (status = 200, description = "Number of markers created or flipped", body = MarkAllReadResponse),
        (status = 401, description = "Unauthorized")
    ),
    tag = "notifications",
    security(("bearer_auth" = []))
)]
pub async fn mark_all_notifications_read(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<MarkAllReadResponse>> {
    let updated_count = state.notification_service.mark_all_read(user.id).await?;

    Ok(Json(MarkAllReadResponse { updated_count }))
}

/// Archive a notification (creator or operator only)
#[utoipa::path(
    delete,
    path = "/api/notifications/{id}",
    params(
        ("id" = Uuid, Path, description = "Notification ID")
    ),
    responses(
        (status = 204, description = "Notification archived"),
        (status = 403, description = "Not the creator or an operator"),
        (status = 404, description = "Notification not found"),
        (status = 409, description = "Already archived"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "notifications",
    security(("bearer_auth" = []))
)]
pub async fn delete_notification(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(notification_id): Path<Uuid>,
) -> Result<StatusCode> {
    state
        .notification_service
        .soft_delete(notification_id, &user)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
