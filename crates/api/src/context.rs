use loyalty_auth::{Principal, Role};
use loyalty_core::UserId;

/// Principal context for a request (authenticated client + role).
///
/// Inserted by the bearer middleware; handlers only ever read the user id
/// from here, never from the request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
}

impl PrincipalContext {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    pub fn user_id(&self) -> &UserId {
        &self.principal.user_id
    }

    pub fn role(&self) -> &Role {
        &self.principal.role
    }
}
