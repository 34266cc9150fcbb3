pub mod admin_middleware;

pub use admin_middleware::admin_authorization;
