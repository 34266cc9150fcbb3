use crate::{
    admin::admin_authorization,
    middleware::auth_middleware,
    notification::{admin_handlers, notification_dto::*, notification_handlers, notification_models::*},
    state::AppState,
    user::User,
};
use axum::{
    middleware,
    routing::{delete, get, patch, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        notification_handlers::list_notifications,
        notification_handlers::unread_count,
        notification_handlers::notification_stream,
        notification_handlers::get_notification,
        notification_handlers::mark_notification_read,
        notification_handlers::mark_notification_unread,
        notification_handlers::mark_all_notifications_read,
        notification_handlers::delete_notification,
        admin_handlers::create_notification,
        admin_handlers::broadcast_by_role,
        admin_handlers::update_notification,
        admin_handlers::get_recipients,
        admin_handlers::purge_notification,
        admin_handlers::cleanup_expired,
        admin_handlers::notification_stats,
    ),
    components(
        schemas(
            CreateNotificationRequest,
            BroadcastByRoleRequest,
            UpdateNotificationRequest,
            NotificationResponse,
            NotificationListResponse,
            UnreadCountResponse,
            MarkAllReadResponse,
            CleanupResponse,
            StatsSnapshot,
            DeliveryCounts,
            ReadStatusCounts,
            RelatedTo,
            Notification,
            NotificationType,
            NotificationPriority,
            NotificationCategory,
            RelatedEntityKind,
            Lifecycle,
            RecipientEntry,
            User,
        )
    ),
    tags(
        (name = "notifications", description = "Per-user notification views and read state"),
        (name = "admin", description = "Operator endpoints: creation, distribution, lifecycle, stats")
    ),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::Http::new(
                        utoipa::openapi::security::HttpAuthScheme::Bearer,
                    ),
                ),
            )
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Any authenticated user
    let notification_routes = Router::new()
        .route("/", get(notification_handlers::list_notifications))
        .route("/unread-count", get(notification_handlers::unread_count))
        .route("/stream", get(notification_handlers::notification_stream))
        .route("/read-all", post(notification_handlers::mark_all_notifications_read))
        .route(
            "/:id",
            get(notification_handlers::get_notification)
                .delete(notification_handlers::delete_notification),
        )
        .route("/:id/read", patch(notification_handlers::mark_notification_read))
        .route("/:id/unread", patch(notification_handlers::mark_notification_unread))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Operators only; auth runs first (outermost), then the role gate
    let admin_routes = Router::new()
        .route("/", post(admin_handlers::create_notification))
        .route("/broadcast", post(admin_handlers::broadcast_by_role))
        .route("/cleanup", post(admin_handlers::cleanup_expired))
        .route("/stats", get(admin_handlers::notification_stats))
        .route("/:id", put(admin_handlers::update_notification))
        .route("/:id/recipients", get(admin_handlers::get_recipients))
        .route("/:id/purge", delete(admin_handlers::purge_notification))
        .route_layer(middleware::from_fn(admin_authorization))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let api_routes = Router::new()
        .nest("/notifications", notification_routes)
        .nest("/admin/notifications", admin_routes);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api", api_routes)
        .layer(cors)
        .with_state(state)
}
