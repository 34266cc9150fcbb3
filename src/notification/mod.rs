pub mod admin_handlers;
pub mod notification_dto;
pub mod notification_handlers;
pub mod notification_models;
pub mod notification_repository;
pub mod notification_service;

pub use notification_models::{Notification, NotificationEvent};
pub use notification_repository::{NotificationFilters, NotificationRepository};
pub use notification_service::NotificationService;
