use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use super::{
    notification_dto::{
        BroadcastByRoleRequest, CleanupResponse, CreateNotificationRequest, NotificationResponse,
        StatsSnapshot, UpdateNotificationRequest,
    },
    notification_models::{Notification, NotificationEvent, RecipientEntry},
};
use crate::{
    error::{AppError, Result},
    middleware::CurrentUser,
    state::AppState,
};

fn publish(state: &AppState, notification: &Notification, recipients: Option<Vec<Uuid>>) {
    // Best-effort push; send only fails when no client is subscribed.
    let _ = state.notification_tx.send(NotificationEvent {
        recipients,
        notification: notification.clone(),
    });
}

/// Create a notification (global or targeted)
#[utoipa::path(
    post,
    path = "/api/admin/notifications",
    request_body = CreateNotificationRequest,
    responses(
        (status = 201, description = "Notification created", body = NotificationResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin access required")
    ),
    tag = "admin",
    security(("bearer_auth" = []))
)]
pub async fn create_notification(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<CreateNotificationRequest>,
) -> Result<(StatusCode, Json<NotificationResponse>)> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let recipients = payload.recipients.clone().filter(|_| !payload.is_global);
    let notification = state.notification_service.create(user.id, payload).await?;

    publish(&state, &notification, recipients);

    Ok((StatusCode::CREATED, Json(NotificationResponse::from(notification))))
}

/// Broadcast to every active user holding one of the given roles
#[utoipa::path(
    post,
    path = "/api/admin/notifications/broadcast",
    request_body = BroadcastByRoleRequest,
    responses(
        (status = 201, description = "Notification created for the resolved recipients", body = NotificationResponse),
        (status = 400, description = "Validation error or no matching users"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin access required")
    ),
    tag = "admin",
    security(("bearer_auth" = []))
)]
pub async fn broadcast_by_role(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<BroadcastByRoleRequest>,
) -> Result<(StatusCode, Json<NotificationResponse>)> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let notification = state
        .notification_service
        .broadcast_by_role(user.id, payload)
        .await?;

    let recipients = state
        .notification_service
        .recipients(notification.id)
        .await?
        .into_iter()
        .map(|entry| entry.user_id)
        .collect();
    publish(&state, &notification, Some(recipients));

    Ok((StatusCode::CREATED, Json(NotificationResponse::from(notification))))
}

/// Update content and/or distribution mode
#[utoipa::path(
    put,
    path = "/api/admin/notifications/{id}",
    params(
        ("id" = Uuid, Path, description = "Notification ID")
    ),
    request_body = UpdateNotificationRequest,
    responses(
        (status = 200, description = "Updated notification", body = NotificationResponse),
        (status = 400, description = "Validation error"),
        (status = 404, description = "Notification not found"),
        (status = 409, description = "Notification is archived"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin access required")
    ),
    tag = "admin",
    security(("bearer_auth" = []))
)]
pub async fn update_notification(
    State(state): State<AppState>,
    Path(notification_id): Path<Uuid>,
    Json(payload): Json<UpdateNotificationRequest>,
) -> Result<Json<NotificationResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let notification = state
        .notification_service
        .update(notification_id, payload)
        .await?;

    Ok(Json(NotificationResponse::from(notification)))
}

/// Per-user read markers for one notification (operator-only view)
#[utoipa::path(
    get,
    path = "/api/admin/notifications/{id}/recipients",
    params(
        ("id" = Uuid, Path, description = "Notification ID")
    ),
    responses(
        (status = 200, description = "Recipient entries", body = Vec<RecipientEntry>),
        (status = 404, description = "Notification not found"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin access required")
    ),
    tag = "admin",
    security(("bearer_auth" = []))
)]
pub async fn get_recipients(
    State(state): State<AppState>,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<Vec<RecipientEntry>>> {
    let entries = state.notification_service.recipients(notification_id).await?;

    Ok(Json(entries))
}

/// Permanently delete a notification and its read markers
#[utoipa::path(
    delete,
    path = "/api/admin/notifications/{id}/purge",
    params(
        ("id" = Uuid, Path, description = "Notification ID")
    ),
    responses(
        (status = 204, description = "Notification purged"),
        (status = 404, description = "Notification not found"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin access required")
    ),
    tag = "admin",
    security(("bearer_auth" = []))
)]
pub async fn purge_notification(
    State(state): State<AppState>,
    Path(notification_id): Path<Uuid>,
) -> Result<StatusCode> {
    state.notification_service.hard_delete(notification_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Archive all notifications whose expiry has passed
#[utoipa::path(
    post,
    path = "/api/admin/notifications/cleanup",
    responses(
        (status = 200, description = "Number of notifications archived", body = CleanupResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin access required")
    ),
    tag = "admin",
    security(("bearer_auth" = []))
)]
pub async fn cleanup_expired(State(state): State<AppState>) -> Result<Json<CleanupResponse>> {
    let count = state.notification_service.cleanup_expired().await?;

    Ok(Json(CleanupResponse { count }))
}

/// Distribution counts for operators
#[utoipa::path(
    get,
    path = "/api/admin/notifications/stats",
    responses(
        (status = 200, description = "Aggregate counts", body = StatsSnapshot),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin access required")
    ),
    tag = "admin",
    security(("bearer_auth" = []))
)]
pub async fn notification_stats(State(state): State<AppState>) -> Result<Json<StatsSnapshot>> {
    let stats = state.notification_service.stats().await?;

    Ok(Json(stats))
}
