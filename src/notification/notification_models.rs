use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Info,
    Warning,
    Alert,
    Success,
    Task,
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationType::Info => write!(f, "info"),
            NotificationType::Warning => write!(f, "warning"),
            NotificationType::Alert => write!(f, "alert"),
            NotificationType::Success => write!(f, "success"),
            NotificationType::Task => write!(f, "task"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NotificationPriority {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for NotificationPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationPriority::Low => write!(f, "low"),
            NotificationPriority::Medium => write!(f, "medium"),
            NotificationPriority::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NotificationCategory {
    System,
    Crop,
    Inventory,
    Land,
    Health,
    Weather,
    Other,
}

/// Closed set of domain entities a notification may point back at. The
/// producing module supplies the pointer; this service never dereferences it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RelatedEntityKind {
    Crop,
    Inventory,
    Land,
    Health,
    User,
}

/// Lifecycle state of a notification record. Purge is not a state: a purged
/// notification is deleted outright, recipient entries included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    Active,
    Archived,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Notification {
    pub id: Uuid,
    pub title: String,
    pub message: String,
    pub notif_type: NotificationType,
    pub priority: NotificationPriority,
    pub category: NotificationCategory,
    pub is_global: bool,
    pub related_kind: Option<RelatedEntityKind>,
    pub related_id: Option<Uuid>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_action_required: bool,
    pub action_url: Option<String>,
    pub tags: Vec<String>,
    pub lifecycle: Lifecycle,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A notification joined with the requesting user's own read marker. For a
/// global notification with no marker row, `is_read` is false.
#[derive(Debug, Clone, FromRow)]
pub struct UserNotification {
    #[sqlx(flatten)]
    pub notification: Notification,
    pub is_read: bool,
}

/// Per-user read marker. Sparse for global notifications, complete for
/// targeted ones.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct RecipientEntry {
    pub user_id: Uuid,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
}

/// Broadcast payload for SSE subscribers. `recipients` is None for global
/// notifications, which every subscriber may see.
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub recipients: Option<Vec<Uuid>>,
    pub notification: Notification,
}

/// Fully resolved creation record, defaults applied, recipient set decided.
/// Built by the service; the repository persists it verbatim.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub title: String,
    pub message: String,
    pub notif_type: NotificationType,
    pub priority: NotificationPriority,
    pub category: NotificationCategory,
    pub is_global: bool,
    pub related_kind: Option<RelatedEntityKind>,
    pub related_id: Option<Uuid>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_action_required: bool,
    pub action_url: Option<String>,
    pub tags: Vec<String>,
    pub created_by: Uuid,
}
