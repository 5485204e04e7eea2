use super::{AuthError, Principal};

/// Staff allow-list. The guild owner is always staff.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    allowed_roles: Vec<u64>,
}

impl AccessPolicy {
    pub fn new(allowed_roles: Vec<u64>) -> Self {
        Self { allowed_roles }
    }

    pub fn allowed_roles(&self) -> &[u64] {
        &self.allowed_roles
    }

    pub fn authorize(&self, principal: &Principal) -> Result<(), AuthError> {
        if principal.is_owner
            || principal
                .roles
                .iter()
                .any(|role| self.allowed_roles.contains(role))
        {
            return Ok(());
        }

        Err(AuthError::AccessDenied {
            user_id: principal.id.clone(),
            roles: principal.roles.clone(),
            is_owner: principal.is_owner,
        })
    }
}
