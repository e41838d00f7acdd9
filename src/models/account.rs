use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub is_active: bool,
    pub is_superuser: bool,
    pub email_notifications: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Accounts that should hold a confirmed subscription.
    pub fn wants_notifications(&self) -> bool {
        self.is_active
            && !self.is_superuser
            && self.email_notifications
            && !self.email.trim().is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub display_name: String,
    pub is_active: bool,
    pub is_superuser: bool,
    pub email_notifications: bool,
}

impl NewAccount {
    pub fn into_account(self, id: Uuid, now: DateTime<Utc>) -> Account {
        Account {
            id,
            email: self.email,
            display_name: self.display_name,
            is_active: self.is_active,
            is_superuser: self.is_superuser,
            email_notifications: self.email_notifications,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(email: &str) -> Account {
        NewAccount {
            email: email.to_string(),
            display_name: "Amina".to_string(),
            is_active: true,
            is_superuser: false,
            email_notifications: true,
        }
        .into_account(Uuid::new_v4(), Utc::now())
    }

    #[test]
    fn only_regular_opted_in_accounts_want_notifications() {
        assert!(account("amina@example.org").wants_notifications());
        assert!(!account("   ").wants_notifications());

        let mut admin = account("admin@example.org");
        admin.is_superuser = true;
        assert!(!admin.wants_notifications());

        let mut muted = account("muted@example.org");
        muted.email_notifications = false;
        assert!(!muted.wants_notifications());

        let mut disabled = account("gone@example.org");
        disabled.is_active = false;
        assert!(!disabled.wants_notifications());
    }
}
