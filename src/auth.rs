use std::sync::{Arc, RwLock};

use crate::error::{SessionError, SessionResult};

/// The signed-in owner, if any. Sign-in itself happens elsewhere; this only
/// carries the result so writes can be attributed.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    owner: Arc<RwLock<Option<String>>>,
}

impl AuthContext {
    pub fn signed_in(owner_id: impl Into<String>) -> Self {
        let ctx = Self::default();
        ctx.sign_in(owner_id);
        ctx
    }

    pub fn sign_in(&self, owner_id: impl Into<String>) {
        let owner_id = owner_id.into();
        let mut guard = match self.owner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(owner_id).filter(|id| !id.trim().is_empty());
    }

    pub fn sign_out(&self) {
        let mut guard = match self.owner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = None;
    }

    pub fn current_owner(&self) -> Option<String> {
        match self.owner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn require_owner(&self) -> SessionResult<String> {
        self.current_owner().ok_or(SessionError::AuthRequired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_owner_counts_as_signed_out() {
        let ctx = AuthContext::signed_in("  ");
        assert!(matches!(ctx.require_owner(), Err(SessionError::AuthRequired)));

        ctx.sign_in("owner-1");
        assert_eq!(ctx.require_owner().unwrap(), "owner-1");

        let shared = ctx.clone();
        shared.sign_out();
        assert_eq!(ctx.current_owner(), None);
    }
}
