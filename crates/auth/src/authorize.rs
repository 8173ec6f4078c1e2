use thiserror::Error;

use crate::{AuthDecision, Principal, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("token rejected by auth service")]
    InvalidToken,

    #[error("forbidden: role '{0}' is not allowed here")]
    Forbidden(String),

    #[error("auth service returned no usable user id")]
    MissingUserId,
}

/// Turn an auth-service decision into a principal allowed on this route.
///
/// - No IO
/// - No panics
/// - Pure role comparison
pub fn require_role(decision: &AuthDecision, allowed: &[Role]) -> Result<Principal, AuthzError> {
    if !decision.valid {
        return Err(AuthzError::InvalidToken);
    }

    let role = decision.role.clone().unwrap_or_else(|| Role::new(""));
    if !allowed.iter().any(|r| r == &role) {
        return Err(AuthzError::Forbidden(role.as_str().to_string()));
    }

    let user_id = decision
        .user_id
        .as_deref()
        .and_then(|raw| loyalty_core::UserId::parse(raw).ok())
        .ok_or(AuthzError::MissingUserId)?;

    Ok(Principal::new(user_id, role))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision(valid: bool, user: Option<&str>, role: Option<&str>) -> AuthDecision {
        AuthDecision {
            valid,
            user_id: user.map(str::to_string),
            role: role.map(|r| Role::new(r.to_string())),
        }
    }

    #[test]
    fn valid_client_is_admitted() {
        let principal = require_role(&decision(true, Some("u-1"), Some("client")), &[Role::CLIENT]).unwrap();
        assert_eq!(principal.user_id.as_str(), "u-1");
        assert_eq!(principal.role, Role::CLIENT);
    }

    #[test]
    fn invalid_token_is_rejected_even_with_matching_role() {
        let err = require_role(&decision(false, Some("u-1"), Some("client")), &[Role::CLIENT]).unwrap_err();
        assert_eq!(err, AuthzError::InvalidToken);
    }

    #[test]
    fn other_roles_are_forbidden() {
        let err = require_role(&decision(true, Some("u-1"), Some("admin")), &[Role::CLIENT]).unwrap_err();
        assert_eq!(err, AuthzError::Forbidden("admin".to_string()));

        let err = require_role(&decision(true, Some("u-1"), None), &[Role::CLIENT]).unwrap_err();
        assert!(matches!(err, AuthzError::Forbidden(_)));
    }

    #[test]
    fn blank_user_id_is_not_a_principal() {
        let err = require_role(&decision(true, Some(" "), Some("client")), &[Role::CLIENT]).unwrap_err();
        assert_eq!(err, AuthzError::MissingUserId);
    }
}
