//! `loyalty-auth`: authentication/authorization boundary.
//!
//! Token validation is delegated to an external auth service behind the
//! [`AuthService`] trait; this crate is decoupled from HTTP and storage.

pub mod authorize;
pub mod principal;
pub mod roles;
pub mod service;

pub use authorize::{require_role, AuthzError};
pub use principal::Principal;
pub use roles::Role;
pub use service::{AuthDecision, AuthService, AuthServiceError, StaticAuthService};
