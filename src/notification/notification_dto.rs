use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::notification_models::{
    Notification, NotificationCategory, NotificationPriority, NotificationType,
    RelatedEntityKind, UserNotification,
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RelatedTo {
    pub kind: RelatedEntityKind,
    pub id: Uuid,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateNotificationRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 2000))]
    pub message: String,
    pub notif_type: Option<NotificationType>,
    pub priority: Option<NotificationPriority>,
    pub category: Option<NotificationCategory>,
    pub is_global: bool,
    pub recipients: Option<Vec<Uuid>>,
    pub related_to: Option<RelatedTo>,
    pub expires_at: Option<DateTime<Utc>>,
    pub tags: Option<Vec<String>>,
    pub action_url: Option<String>,
    pub is_action_required: Option<bool>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BroadcastByRoleRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 2000))]
    pub message: String,
    pub notif_type: Option<NotificationType>,
    pub priority: Option<NotificationPriority>,
    pub category: Option<NotificationCategory>,
    #[validate(length(min = 1))]
    pub roles: Vec<String>,
    pub related_to: Option<RelatedTo>,
    pub expires_at: Option<DateTime<Utc>>,
    pub tags: Option<Vec<String>>,
    pub action_url: Option<String>,
    pub is_action_required: Option<bool>,
}

/// Patch for an operator edit. Content fields update freely; a
/// distribution-mode change must be explicit via `is_global`, and supplying
/// `recipients` is only valid for a notification that ends up targeted.
/// Omitted fields are left as-is, so `expires_at` and `action_url` cannot be
/// cleared back to NULL through this request.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateNotificationRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 2000))]
    pub message: Option<String>,
    pub notif_type: Option<NotificationType>,
    pub priority: Option<NotificationPriority>,
    pub category: Option<NotificationCategory>,
    pub is_global: Option<bool>,
    pub recipients: Option<Vec<Uuid>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub tags: Option<Vec<String>>,
    pub action_url: Option<String>,
    pub is_action_required: Option<bool>,
}

/// The caller's view of a notification. Carries the caller's own read flag
/// only; the recipient list is never serialized to non-operator callers.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct NotificationResponse {
    pub id: Uuid,
    pub title: String,
    pub message: String,
    pub notif_type: NotificationType,
    pub priority: NotificationPriority,
    pub category: NotificationCategory,
    pub is_global: bool,
    pub related_to: Option<RelatedTo>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_action_required: bool,
    pub action_url: Option<String>,
    pub tags: Vec<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

impl NotificationResponse {
    fn from_parts(n: Notification, read: bool) -> Self {
        let related_to = match (n.related_kind, n.related_id) {
            (Some(kind), Some(id)) => Some(RelatedTo { kind, id }),
            _ => None,
        };

        Self {
            id: n.id,
            title: n.title,
            message: n.message,
            notif_type: n.notif_type,
            priority: n.priority,
            category: n.category,
            is_global: n.is_global,
            related_to,
            expires_at: n.expires_at,
            is_action_required: n.is_action_required,
            action_url: n.action_url,
            tags: n.tags,
            created_by: n.created_by,
            created_at: n.created_at,
            read,
        }
    }
}

impl From<UserNotification> for NotificationResponse {
    fn from(un: UserNotification) -> Self {
        Self::from_parts(un.notification, un.is_read)
    }
}

// A freshly created notification has no read markers yet.
impl From<Notification> for NotificationResponse {
    fn from(n: Notification) -> Self {
        Self::from_parts(n, false)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NotificationListResponse {
    pub data: Vec<NotificationResponse>,
    pub unread_count: i64,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UnreadCountResponse {
    pub unread_count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MarkAllReadResponse {
    pub updated_count: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CleanupResponse {
    pub count: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeliveryCounts {
    pub global: i64,
    pub targeted: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReadStatusCounts {
    pub read: i64,
    pub unread: i64,
}

/// Operator-only aggregate view. Read-status counts are over recipient
/// entries, not notifications: one global notification read by three users
/// contributes three to `read`.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatsSnapshot {
    pub by_category: HashMap<String, i64>,
    pub by_type: HashMap<String, i64>,
    pub by_priority: HashMap<String, i64>,
    pub by_delivery: DeliveryCounts,
    pub by_read_status: ReadStatusCounts,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_rejects_empty_title() {
        let req = CreateNotificationRequest {
            title: "".to_string(),
            message: "irrigation pump offline".to_string(),
            notif_type: None,
            priority: None,
            category: None,
            is_global: true,
            recipients: None,
            related_to: None,
            expires_at: None,
            tags: None,
            action_url: None,
            is_action_required: None,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_broadcast_request_rejects_empty_roles() {
        let req = BroadcastByRoleRequest {
            title: "Harvest window".to_string(),
            message: "South field ready this week".to_string(),
            notif_type: None,
            priority: None,
            category: None,
            roles: vec![],
            related_to: None,
            expires_at: None,
            tags: None,
            action_url: None,
            is_action_required: None,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_response_never_exposes_recipients() {
        let json = serde_json::to_value(NotificationResponse {
            id: Uuid::new_v4(),
            title: "t".into(),
            message: "m".into(),
            notif_type: NotificationType::Info,
            priority: NotificationPriority::Medium,
            category: NotificationCategory::Other,
            is_global: false,
            related_to: None,
            expires_at: None,
            is_action_required: false,
            action_url: None,
            tags: vec![],
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
            read: false,
        })
        .unwrap();
        assert!(json.get("recipients").is_none());
        assert_eq!(json.get("read"), Some(&serde_json::Value::Bool(false)));
    }
}
