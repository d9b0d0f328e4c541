use thiserror::Error;

use crate::{PrincipalId, Role};

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub principal_id: PrincipalId,
    pub roles: Vec<Role>,
}

impl Principal {
    pub fn new(principal_id: PrincipalId, roles: Vec<Role>) -> Self {
        Self { principal_id, roles }
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(&Role::ADMIN) || self.has_role(&Role::SUPERADMIN)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: admin access required")]
    AdminRequired,
}

/// Queue administration (listing, re-driving jobs, worker control) is
/// restricted to `admin` and `superadmin`.
pub fn authorize_admin(principal: &Principal) -> Result<(), AuthzError> {
    if principal.is_admin() {
        Ok(())
    } else {
        tracing::debug!(principal_id = %principal.principal_id, "admin role missing");
        Err(AuthzError::AdminRequired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_and_superadmin_pass() {
        for role in [Role::ADMIN, Role::SUPERADMIN] {
            let p = Principal::new(PrincipalId::new(), vec![Role::new("viewer"), role]);
            assert_eq!(authorize_admin(&p), Ok(()));
        }
    }

    #[test]
    fn other_roles_are_rejected() {
        let p = Principal::new(PrincipalId::new(), vec![Role::new("coder")]);
        assert_eq!(authorize_admin(&p), Err(AuthzError::AdminRequired));

        let nobody = Principal::new(PrincipalId::new(), Vec::new());
        assert_eq!(authorize_admin(&nobody), Err(AuthzError::AdminRequired));
    }
}
