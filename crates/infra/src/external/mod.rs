//! External service clients/adapters.

pub mod auth_service;

pub use auth_service::HttpAuthService;
