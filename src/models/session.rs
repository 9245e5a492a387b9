//! Session model

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Login session; `id` is the opaque token carried by the `session` cookie
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// A fresh session with a random token, valid for `ttl`
    pub fn new(user_id: i64, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            user_id,
            expires_at: now + ttl,
            created_at: now,
        }
    }

    /// Check if the session has expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_valid() {
        let session = Session::new(7, Duration::days(1));
        assert_eq!(session.user_id, 7);
        assert_eq!(session.id.len(), 32);
        assert!(!session.is_expired());
    }

    #[test]
    fn test_expired_session() {
        let session = Session::new(7, Duration::seconds(-1));
        assert!(session.is_expired());
    }

    #[test]
    fn test_tokens_are_unique() {
        let a = Session::new(1, Duration::days(1));
        let b = Session::new(1, Duration::days(1));
        assert_ne!(a.id, b.id);
    }
}
