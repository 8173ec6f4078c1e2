//! Route-level authorization policy.
//!
//! Which roles each route group admits lives here; the decision itself is
//! `loyalty_auth::require_role`, which stays free of HTTP concerns.

use loyalty_auth::{require_role, AuthDecision, AuthzError, Role};

use crate::context::PrincipalContext;

/// Roles admitted on the client-facing engagement routes.
pub const CLIENT_ROUTE_ROLES: &[Role] = &[Role::CLIENT];

/// Resolve an auth-service decision into the request principal.
pub fn authorize_principal(decision: &AuthDecision, allowed: &[Role]) -> Result<PrincipalContext, AuthzError> {
    require_role(decision, allowed).map(PrincipalContext::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_routes_reject_other_roles() {
        let admin = AuthDecision {
            valid: true,
            user_id: Some("ops-1".to_string()),
            role: Some(Role::ADMIN),
        };
        assert!(matches!(
            authorize_principal(&admin, CLIENT_ROUTE_ROLES),
            Err(AuthzError::Forbidden(role)) if role == "admin"
        ));

        let client = AuthDecision {
            role: Some(Role::CLIENT),
            ..admin
        };
        let ctx = authorize_principal(&client, CLIENT_ROUTE_ROLES).unwrap();
        assert_eq!(ctx.user_id().as_str(), "ops-1");
    }
}
