//! User directory boundary: resolves invitee emails to registered
//! users. The user catalog itself is out of scope; unknown (or
//! unresolvable) emails become guest participants.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::catalog::UserId;

/// Email resolution for invitees. Emails compare case-insensitively.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Option<UserId>;
}

/// Fixed in-memory directory for tests and embedded use.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    users: HashMap<String, UserId>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration.
    pub fn with_user(mut self, email: &str, user_id: UserId) -> Self {
        self.users.insert(email.to_ascii_lowercase(), user_id);
        self
    }
}

#[async_trait]
impl UserDirectory for StaticDirectory {
    async fn find_by_email(&self, email: &str) -> Option<UserId> {
        self.users.get(&email.to_ascii_lowercase()).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup_is_case_insensitive() {
        let directory = StaticDirectory::new().with_user("Ana@Example.com", 42);
        assert_eq!(directory.find_by_email("ana@example.com").await, Some(42));
        assert_eq!(directory.find_by_email("ANA@EXAMPLE.COM").await, Some(42));
        assert_eq!(directory.find_by_email("bob@example.com").await, None);
    }
}
