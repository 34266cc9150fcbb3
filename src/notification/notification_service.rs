use uuid::Uuid;

use super::notification_dto::{
    BroadcastByRoleRequest, CreateNotificationRequest, StatsSnapshot, UpdateNotificationRequest,
};
use super::notification_models::{
    Lifecycle, NewNotification, Notification, NotificationCategory, NotificationPriority,
    NotificationType, RecipientEntry, UserNotification,
};
use super::notification_repository::{NotificationFilters, NotificationRepository};
use crate::error::{AppError, Result};
use crate::middleware::CurrentUser;
use crate::user::UserRepository;

enum ModeChange {
    MakeGlobal,
    SetTargeted(Vec<Uuid>),
}

/// Business rules over the notification store: distribution decisions at
/// creation time, per-user read-state semantics, mode transitions, lifecycle.
#[derive(Clone)]
pub struct NotificationService {
    repo: NotificationRepository,
    users: UserRepository,
}

impl NotificationService {
    pub fn new(repo: NotificationRepository, users: UserRepository) -> Self {
        Self { repo, users }
    }

    /// Create a notification. Global delivery starts with an empty recipient
    /// set (membership is implicit); targeted delivery requires an explicit
    /// non-empty user list materialized as unread entries.
    pub async fn create(
        &self,
        created_by: Uuid,
        payload: CreateNotificationRequest,
    ) -> Result<Notification> {
        let title = payload.title.trim();
        let message = payload.message.trim();
        if title.is_empty() || message.is_empty() {
            return Err(AppError::Validation(
                "title and message are required".to_string(),
            ));
        }

        let recipients = if payload.is_global {
            // Any supplied list is ignored: global membership is lazy.
            Vec::new()
        } else {
            let mut recipients = payload.recipients.unwrap_or_default();
            recipients.sort_unstable();
            recipients.dedup();
            if recipients.is_empty() {
                return Err(AppError::Validation(
                    "recipients required for non-global notifications".to_string(),
                ));
            }
            recipients
        };

        let new = NewNotification {
            title: title.to_string(),
            message: message.to_string(),
            notif_type: payload.notif_type.unwrap_or(NotificationType::Info),
            priority: payload.priority.unwrap_or(NotificationPriority::Medium),
            category: payload.category.unwrap_or(NotificationCategory::Other),
            is_global: payload.is_global,
            related_kind: payload.related_to.as_ref().map(|r| r.kind),
            related_id: payload.related_to.as_ref().map(|r| r.id),
            expires_at: payload.expires_at,
            is_action_required: payload.is_action_required.unwrap_or(false),
            action_url: payload.action_url,
            tags: payload.tags.unwrap_or_default(),
            created_by,
        };

        self.repo.create(&new, &recipients).await
    }

    /// Resolve all active users holding any of the given roles and create a
    /// targeted notification with that fixed recipient set. Eager, unlike
    /// global delivery.
    pub async fn broadcast_by_role(
        &self,
        created_by: Uuid,
        payload: BroadcastByRoleRequest,
    ) -> Result<Notification> {
        let recipients = self.users.find_active_ids_by_roles(&payload.roles).await?;
        if recipients.is_empty() {
            return Err(AppError::Validation(
                "no active users match the requested roles".to_string(),
            ));
        }

        self.create(
            created_by,
            CreateNotificationRequest {
                title: payload.title,
                message: payload.message,
                notif_type: payload.notif_type,
                priority: payload.priority,
                category: payload.category,
                is_global: false,
                recipients: Some(recipients),
                related_to: payload.related_to,
                expires_at: payload.expires_at,
                tags: payload.tags,
                action_url: payload.action_url,
                is_action_required: payload.is_action_required,
            },
        )
        .await
    }

    /// Producer entry point for notifications raised as a side effect of some
    /// other operation (low stock, failed health check). A failure here must
    /// never fail the primary operation: it is logged and swallowed.
    pub async fn create_best_effort(
        &self,
        created_by: Uuid,
        payload: CreateNotificationRequest,
    ) -> Option<Notification> {
        match self.create(created_by, payload).await {
            Ok(notification) => Some(notification),
            Err(e) => {
                tracing::warn!("Best-effort notification dropped: {}", e);
                None
            }
        }
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        filters: &NotificationFilters,
    ) -> Result<(Vec<UserNotification>, i64, i64)> {
        let (items, total) = self.repo.find_visible(user_id, filters).await?;
        let unread_count = self.repo.count_unread(user_id).await?;
        Ok((items, total, unread_count))
    }

    /// Invisible and nonexistent ids are indistinguishable to the caller.
    pub async fn get(&self, id: Uuid, user_id: Uuid) -> Result<UserNotification> {
        self.repo
            .find_visible_by_id(id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))
    }

    pub async fn unread_count(&self, user_id: Uuid) -> Result<i64> {
        self.repo.count_unread(user_id).await
    }

    pub async fn mark_read(&self, id: Uuid, user_id: Uuid) -> Result<()> {
        self.set_read_state(id, user_id, true).await
    }

    pub async fn mark_unread(&self, id: Uuid, user_id: Uuid) -> Result<()> {
        self.set_read_state(id, user_id, false).await
    }

    async fn set_read_state(&self, id: Uuid, user_id: Uuid, read: bool) -> Result<()> {
        let notification = self
            .repo
            .find_by_id(id)
            .await?
            .filter(|n| n.lifecycle == Lifecycle::Active)
            .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))?;

        if notification.is_global {
            // Lazy membership: the upsert creates the marker on first touch.
            self.repo.upsert_read_state(id, user_id, read).await
        } else {
            let rows = self.repo.update_read_state(id, user_id, read).await?;
            if rows == 0 {
                return Err(AppError::Forbidden(
                    "Not a recipient of this notification".to_string(),
                ));
            }
            Ok(())
        }
    }

    pub async fn mark_all_read(&self, user_id: Uuid) -> Result<u64> {
        self.repo.mark_all_read(user_id).await
    }

    /// Operator edit. Content fields patch freely; distribution-mode changes
    /// are explicit and asymmetric: Targeted -> Global drops the recipient
    /// list (read history included), Global -> Targeted needs an explicit
    /// non-empty list and preserves retained users' markers.
    pub async fn update(&self, id: Uuid, payload: UpdateNotificationRequest) -> Result<Notification> {
        let current = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))?;

        if current.lifecycle == Lifecycle::Archived {
            return Err(AppError::State(
                "Cannot edit an archived notification".to_string(),
            ));
        }

        // Decide the distribution change up front so a bad patch fails before
        // any content field is touched.
        let mode_change = match (payload.is_global, payload.recipients.clone()) {
            (Some(true), Some(_)) => {
                return Err(AppError::Validation(
                    "recipients can only be set on targeted notifications".to_string(),
                ));
            }
            (Some(true), None) if !current.is_global => Some(ModeChange::MakeGlobal),
            (Some(true), None) => None,
            // Reasserting targeted mode without a list is a content-only patch.
            (Some(false), None) if !current.is_global => None,
            (Some(false), recipients) => {
                Some(ModeChange::SetTargeted(Self::normalized_recipients(recipients)?))
            }
            (None, Some(recipients)) => {
                if current.is_global {
                    return Err(AppError::Validation(
                        "recipients can only be set on targeted notifications".to_string(),
                    ));
                }
                Some(ModeChange::SetTargeted(Self::normalized_recipients(Some(
                    recipients,
                ))?))
            }
            (None, None) => None,
        };

        self.repo
            .update_content(
                id,
                payload.title.as_deref(),
                payload.message.as_deref(),
                payload.notif_type,
                payload.priority,
                payload.category,
                payload.expires_at,
                payload.is_action_required,
                payload.action_url.as_deref(),
                payload.tags.as_deref(),
            )
            .await?;

        match mode_change {
            Some(ModeChange::MakeGlobal) => self.repo.make_global(id).await?,
            Some(ModeChange::SetTargeted(recipients)) => {
                self.repo.set_targeted_recipients(id, &recipients).await?;
            }
            None => {}
        }

        self.repo
            .find_by_id(id)
            .await?
            .ok_or(AppError::InternalError)
    }

    fn normalized_recipients(recipients: Option<Vec<Uuid>>) -> Result<Vec<Uuid>> {
        let mut recipients = recipients.unwrap_or_default();
        recipients.sort_unstable();
        recipients.dedup();
        if recipients.is_empty() {
            return Err(AppError::Validation(
                "recipients required for non-global notifications".to_string(),
            ));
        }
        Ok(recipients)
    }

    /// Active -> Archived. Allowed for the original creator and operators.
    pub async fn soft_delete(&self, id: Uuid, caller: &CurrentUser) -> Result<()> {
        let notification = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))?;

        if notification.created_by != caller.id && !caller.is_operator() {
            return Err(AppError::Forbidden(
                "Only the creator or an operator can delete a notification".to_string(),
            ));
        }

        let rows = self.repo.soft_delete(id).await?;
        if rows == 0 {
            return Err(AppError::State(
                "Notification is already archived".to_string(),
            ));
        }
        Ok(())
    }

    /// Purge: irreversible, lifecycle-agnostic, cascades recipient entries.
    pub async fn hard_delete(&self, id: Uuid) -> Result<()> {
        let rows = self.repo.hard_delete(id).await?;
        if rows == 0 {
            return Err(AppError::NotFound("Notification not found".to_string()));
        }
        Ok(())
    }

    pub async fn cleanup_expired(&self) -> Result<u64> {
        let count = self.repo.cleanup_expired().await?;
        if count > 0 {
            tracing::info!("Archived {} expired notifications", count);
        }
        Ok(count)
    }

    pub async fn stats(&self) -> Result<StatsSnapshot> {
        self.repo.stats().await
    }

    pub async fn recipients(&self, id: Uuid) -> Result<Vec<RecipientEntry>> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))?;

        self.repo.find_recipients(id).await
    }
}
