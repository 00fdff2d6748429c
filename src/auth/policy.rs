//! The authorization predicates. Every handler that gates on role or ownership
//! goes through these two functions, nowhere else.

use uuid::Uuid;

use crate::error::ApiError;

use super::extractors::Session;

pub fn require_admin(session: &Session) -> Result<(), ApiError> {
    if session.is_admin() {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Admin access required".into()))
    }
}

/// Admins always pass; everyone else must own the resource.
pub fn require_owner_or_admin(session: &Session, owner_id: Uuid) -> Result<(), ApiError> {
    if session.is_admin() || session.user_id == owner_id {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "You don't have access to this resource".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::repo::Role;

    fn session(role: Role) -> Session {
        Session {
            user_id: Uuid::new_v4(),
            role,
        }
    }

    #[test]
    fn admin_passes_role_check() {
        assert!(require_admin(&session(Role::Admin)).is_ok());
    }

    #[test]
    fn citizen_fails_role_check() {
        let err = require_admin(&session(Role::Citizen)).unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[test]
    fn owner_passes_ownership_check() {
        let s = session(Role::Citizen);
        assert!(require_owner_or_admin(&s, s.user_id).is_ok());
    }

    #[test]
    fn non_owner_citizen_fails_ownership_check() {
        let s = session(Role::Citizen);
        let err = require_owner_or_admin(&s, Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[test]
    fn admin_passes_ownership_check_for_any_resource() {
        let s = session(Role::Admin);
        assert!(require_owner_or_admin(&s, Uuid::new_v4()).is_ok());
    }
}
