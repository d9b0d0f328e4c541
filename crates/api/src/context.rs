use mailq_auth::{Principal, PrincipalId, Role};

/// Principal context for a request (authenticated identity + roles).
///
/// Only present when the caller sent a valid bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal_id: PrincipalId,
    roles: Vec<Role>,
}

impl PrincipalContext {
    pub fn new(principal_id: PrincipalId, roles: Vec<Role>) -> Self {
        Self { principal_id, roles }
    }

    pub fn principal_id(&self) -> PrincipalId {
        self.principal_id
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn to_principal(&self) -> Principal {
        Principal::new(self.principal_id, self.roles.clone())
    }
}
