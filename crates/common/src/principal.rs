use serde::{Deserialize, Serialize};

use crate::{Role, UserId};

/// The authenticated identity behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub role: Role,
}

impl Principal {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn client(user_id: UserId) -> Self {
        Self::new(user_id, Role::Client)
    }

    pub fn admin(user_id: UserId) -> Self {
        Self::new(user_id, Role::Admin)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Returns true if this principal may act on resources owned by `owner`.
    pub fn can_act_for(&self, owner: UserId) -> bool {
        self.is_admin() || self.user_id == owner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_acts_only_for_itself() {
        let principal = Principal::client(UserId::new(7));
        assert!(principal.can_act_for(UserId::new(7)));
        assert!(!principal.can_act_for(UserId::new(8)));
    }

    #[test]
    fn admin_acts_for_anyone() {
        let principal = Principal::admin(UserId::new(1));
        assert!(principal.can_act_for(UserId::new(7)));
        assert!(principal.is_admin());
    }
}
