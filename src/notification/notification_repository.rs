use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use super::notification_dto::{DeliveryCounts, ReadStatusCounts, StatsSnapshot};
use super::notification_models::{
    NewNotification, Notification, NotificationCategory, NotificationPriority,
    NotificationType, RecipientEntry, UserNotification,
};
use crate::error::Result;

#[derive(Debug)]
pub struct NotificationFilters {
    pub category: Option<NotificationCategory>,
    pub notif_type: Option<NotificationType>,
    pub priority: Option<NotificationPriority>,
    pub search: Option<String>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    pub unread_only: bool,
    pub page: u32,
    pub limit: u32,
}

impl Default for NotificationFilters {
    fn default() -> Self {
        Self {
            category: None,
            notif_type: None,
            priority: None,
            search: None,
            created_from: None,
            created_to: None,
            unread_only: false,
            page: 1,
            limit: 20,
        }
    }
}

// Visibility for ordinary callers: active, and either global or carrying a
// marker row for the user. The LEFT JOIN on the composite key doubles as the
// membership check and yields the caller's read flag.
const VISIBLE_FROM: &str = "FROM notifications n
     LEFT JOIN notification_recipients r
       ON r.notification_id = n.id AND r.user_id = $1
     WHERE n.lifecycle = 'active'
       AND (n.is_global = TRUE OR r.user_id IS NOT NULL)";

#[derive(Clone)]
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert the notification and, for targeted delivery, its complete
    /// recipient set in one transaction. Global notifications get no rows
    /// here: their markers appear lazily on first read-state interaction.
    pub async fn create(&self, new: &NewNotification, recipients: &[Uuid]) -> Result<Notification> {
        let mut tx = self.pool.begin().await?;

        let notification = sqlx::query_as::<_, Notification>(
            "INSERT INTO notifications
                (title, message, notif_type, priority, category, is_global,
                 related_kind, related_id, expires_at, is_action_required,
                 action_url, tags, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
             RETURNING *",
        )
        .bind(&new.title)
        .bind(&new.message)
        .bind(new.notif_type)
        .bind(new.priority)
        .bind(new.category)
        .bind(new.is_global)
        .bind(new.related_kind)
        .bind(new.related_id)
        .bind(new.expires_at)
        .bind(new.is_action_required)
        .bind(&new.action_url)
        .bind(&new.tags)
        .bind(new.created_by)
        .fetch_one(&mut *tx)
        .await?;

        if !recipients.is_empty() {
            sqlx::query(
                "INSERT INTO notification_recipients (notification_id, user_id)
                 SELECT $1, unnest($2::uuid[])",
            )
            .bind(notification.id)
            .bind(recipients)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(notification)
    }

    pub async fn find_visible(
        &self,
        user_id: Uuid,
        filters: &NotificationFilters,
    ) -> Result<(Vec<UserNotification>, i64)> {
        let mut conditions = String::new();
        let mut params_count = 1; // $1 = user_id

        if filters.category.is_some() {
            params_count += 1;
            conditions.push_str(&format!(" AND n.category = ${}", params_count));
        }
        if filters.notif_type.is_some() {
            params_count += 1;
            conditions.push_str(&format!(" AND n.notif_type = ${}", params_count));
        }
        if filters.priority.is_some() {
            params_count += 1;
            conditions.push_str(&format!(" AND n.priority = ${}", params_count));
        }
        if filters.search.is_some() {
            params_count += 1;
            conditions.push_str(&format!(
                " AND (n.title ILIKE ${p} OR n.message ILIKE ${p}
                       OR EXISTS (SELECT 1 FROM unnest(n.tags) AS t WHERE t ILIKE ${p}))",
                p = params_count
            ));
        }
        if filters.created_from.is_some() {
            params_count += 1;
            conditions.push_str(&format!(" AND n.created_at >= ${}", params_count));
        }
        if filters.created_to.is_some() {
            params_count += 1;
            conditions.push_str(&format!(" AND n.created_at <= ${}", params_count));
        }
        if filters.unread_only {
            // Re-derives the unread predicate rather than post-filtering, so
            // it stays consistent with count_unread.
            conditions.push_str(" AND COALESCE(r.is_read, FALSE) = FALSE");
        }

        let count_sql = format!("SELECT COUNT(*) {VISIBLE_FROM}{conditions}");
        let list_sql = format!(
            "SELECT n.*, COALESCE(r.is_read, FALSE) AS is_read {VISIBLE_FROM}{conditions}
             ORDER BY n.created_at DESC
             LIMIT ${} OFFSET ${}",
            params_count + 1,
            params_count + 2
        );

        let search_pattern = filters.search.as_ref().map(|s| format!("%{}%", s));

        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql).bind(user_id);
        let mut list_query = sqlx::query_as::<_, UserNotification>(&list_sql).bind(user_id);

        if let Some(category) = filters.category {
            count_query = count_query.bind(category);
            list_query = list_query.bind(category);
        }
        if let Some(notif_type) = filters.notif_type {
            count_query = count_query.bind(notif_type);
            list_query = list_query.bind(notif_type);
        }
        if let Some(priority) = filters.priority {
            count_query = count_query.bind(priority);
            list_query = list_query.bind(priority);
        }
        if let Some(ref pattern) = search_pattern {
            count_query = count_query.bind(pattern);
            list_query = list_query.bind(pattern);
        }
        if let Some(from) = filters.created_from {
            count_query = count_query.bind(from);
            list_query = list_query.bind(from);
        }
        if let Some(to) = filters.created_to {
            count_query = count_query.bind(to);
            list_query = list_query.bind(to);
        }

        let limit = filters.limit.max(1) as i64;
        let offset = (filters.page.max(1) as i64 - 1) * limit;
        list_query = list_query.bind(limit).bind(offset);

        let total = count_query.fetch_one(&self.pool).await?;
        let items = list_query.fetch_all(&self.pool).await?;

        Ok((items, total))
    }

    pub async fn find_visible_by_id(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<UserNotification>> {
        let sql = format!(
            "SELECT n.*, COALESCE(r.is_read, FALSE) AS is_read {VISIBLE_FROM} AND n.id = $2"
        );
        let notification = sqlx::query_as::<_, UserNotification>(&sql)
            .bind(user_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(notification)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Notification>> {
        let notification =
            sqlx::query_as::<_, Notification>("SELECT * FROM notifications WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(notification)
    }

    pub async fn count_unread(&self, user_id: Uuid) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) {VISIBLE_FROM} AND COALESCE(r.is_read, FALSE) = FALSE");
        let count = sqlx::query_scalar::<_, i64>(&sql)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Atomic upsert of one user's read marker, for global notifications.
    /// Marking an already-read entry read again keeps its original read_at;
    /// marking unread always clears it.
    pub async fn upsert_read_state(
        &self,
        notification_id: Uuid,
        user_id: Uuid,
        read: bool,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO notification_recipients (notification_id, user_id, is_read, read_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (notification_id, user_id) DO UPDATE
             SET is_read = EXCLUDED.is_read,
                 read_at = CASE
                     WHEN EXCLUDED.is_read AND notification_recipients.is_read
                         THEN notification_recipients.read_at
                     ELSE EXCLUDED.read_at
                 END",
        )
        .bind(notification_id)
        .bind(user_id)
        .bind(read)
        .bind(read.then(Utc::now))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Guarded update of an existing marker, for targeted notifications.
    /// Returns 0 when the user holds no entry, i.e. is not a recipient.
    pub async fn update_read_state(
        &self,
        notification_id: Uuid,
        user_id: Uuid,
        read: bool,
    ) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE notification_recipients
             SET is_read = $3,
                 read_at = CASE
                     WHEN $3 AND is_read THEN read_at
                     WHEN $3 THEN $4
                     ELSE NULL
                 END
             WHERE notification_id = $1 AND user_id = $2",
        )
        .bind(notification_id)
        .bind(user_id)
        .bind(read)
        .bind(read.then(Utc::now))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Marks everything currently unread and visible to the user as read.
    /// Two independent statements, each idempotent, so a retry after partial
    /// failure only touches the remainder.
    pub async fn mark_all_read(&self, user_id: Uuid) -> Result<u64> {
        let now = Utc::now();

        // Global: upsert a read marker wherever one is missing or unread.
        let global = sqlx::query(
            "INSERT INTO notification_recipients (notification_id, user_id, is_read, read_at)
             SELECT n.id, $1, TRUE, $2
             FROM notifications n
             WHERE n.is_global = TRUE AND n.lifecycle = 'active'
             ON CONFLICT (notification_id, user_id) DO UPDATE
             SET is_read = TRUE, read_at = EXCLUDED.read_at
             WHERE notification_recipients.is_read = FALSE",
        )
        .bind(user_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        // Targeted: flip the user's own unread entries.
        let targeted = sqlx::query(
            "UPDATE notification_recipients r
             SET is_read = TRUE, read_at = $2
             FROM notifications n
             WHERE n.id = r.notification_id
               AND r.user_id = $1
               AND r.is_read = FALSE
               AND n.is_global = FALSE
               AND n.lifecycle = 'active'",
        )
        .bind(user_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(global.rows_affected() + targeted.rows_affected())
    }

    pub async fn update_content(
        &self,
        id: Uuid,
        title: Option<&str>,
        message: Option<&str>,
        notif_type: Option<NotificationType>,
        priority: Option<NotificationPriority>,
        category: Option<NotificationCategory>,
        expires_at: Option<DateTime<Utc>>,
        is_action_required: Option<bool>,
        action_url: Option<&str>,
        tags: Option<&[String]>,
    ) -> Result<Notification> {
        let notification = sqlx::query_as::<_, Notification>(
            "UPDATE notifications SET
                title = COALESCE($1, title),
                message = COALESCE($2, message),
                notif_type = COALESCE($3, notif_type),
                priority = COALESCE($4, priority),
                category = COALESCE($5, category),
                expires_at = COALESCE($6, expires_at),
                is_action_required = COALESCE($7, is_action_required),
                action_url = COALESCE($8, action_url),
                tags = COALESCE($9, tags),
                updated_at = NOW()
             WHERE id = $10
             RETURNING *",
        )
        .bind(title)
        .bind(message)
        .bind(notif_type)
        .bind(priority)
        .bind(category)
        .bind(expires_at)
        .bind(is_action_required)
        .bind(action_url)
        .bind(tags)
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(notification)
    }

    /// Targeted -> Global: the recipient list, read history included, is
    /// dropped. Membership for a global notification is implicit again.
    pub async fn make_global(&self, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM notification_recipients WHERE notification_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "UPDATE notifications SET is_global = TRUE, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Reconciles the recipient set against an explicit list: dropped users
    /// are deleted, retained users keep their read state, new users start
    /// unread. Also the Global -> Targeted path, which retains any lazily
    /// created markers for users in the new list.
    pub async fn set_targeted_recipients(&self, id: Uuid, recipients: &[Uuid]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE notifications SET is_global = FALSE, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "DELETE FROM notification_recipients
             WHERE notification_id = $1 AND user_id <> ALL($2)",
        )
        .bind(id)
        .bind(recipients)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "INSERT INTO notification_recipients (notification_id, user_id)
             SELECT $1, unnest($2::uuid[])
             ON CONFLICT (notification_id, user_id) DO NOTHING",
        )
        .bind(id)
        .bind(recipients)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn find_recipients(&self, id: Uuid) -> Result<Vec<RecipientEntry>> {
        let entries = sqlx::query_as::<_, RecipientEntry>(
            "SELECT user_id, is_read, read_at
             FROM notification_recipients
             WHERE notification_id = $1
             ORDER BY user_id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    pub async fn soft_delete(&self, id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET lifecycle = 'archived', updated_at = NOW()
             WHERE id = $1 AND lifecycle = 'active'",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn hard_delete(&self, id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn cleanup_expired(&self) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET lifecycle = 'archived', updated_at = NOW()
             WHERE lifecycle = 'active' AND expires_at IS NOT NULL AND expires_at < NOW()",
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn stats(&self) -> Result<StatsSnapshot> {
        let by_category = self.group_count("category").await?;
        let by_type = self.group_count("notif_type").await?;
        let by_priority = self.group_count("priority").await?;

        let (global, targeted) = sqlx::query_as::<_, (i64, i64)>(
            "SELECT COUNT(*) FILTER (WHERE is_global),
                    COUNT(*) FILTER (WHERE NOT is_global)
             FROM notifications
             WHERE lifecycle = 'active'",
        )
        .fetch_one(&self.pool)
        .await?;

        let (read, unread) = sqlx::query_as::<_, (i64, i64)>(
            "SELECT COUNT(*) FILTER (WHERE r.is_read),
                    COUNT(*) FILTER (WHERE NOT r.is_read)
             FROM notification_recipients r
             JOIN notifications n ON n.id = r.notification_id
             WHERE n.lifecycle = 'active'",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(StatsSnapshot {
            by_category,
            by_type,
            by_priority,
            by_delivery: DeliveryCounts { global, targeted },
            by_read_status: ReadStatusCounts { read, unread },
        })
    }

    async fn group_count(&self, column: &str) -> Result<HashMap<String, i64>> {
        // `column` is one of our own column names, never caller input.
        let sql = format!(
            "SELECT {column}, COUNT(*) FROM notifications WHERE lifecycle = 'active' GROUP BY {column}"
        );
        let rows = sqlx::query_as::<_, (String, i64)>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().collect())
    }
}
