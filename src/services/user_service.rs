use crate::dto::account_dto::{CreateAccountPayload, UpdateAccountPayload};
use crate::error::{Error, Result};
use crate::models::account::{Account, NewAccount};
use crate::models::subscription::{normalize_email, Subscription};
use crate::repository::{AccountRepository, Repositories, SubscriptionRepository};
use crate::utils::{time::now, token::generate_confirmation_token};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use validator::ValidateEmail;

/// Account write path. Every write reconciles the account's subscription.
#[derive(Clone)]
pub struct AccountService {
    accounts: Arc<dyn AccountRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
}

impl AccountService {
    pub fn new(repositories: &Repositories) -> Self {
        Self {
            accounts: repositories.accounts.clone(),
            subscriptions: repositories.subscriptions.clone(),
        }
    }

    pub async fn list(&self) -> Result<Vec<Account>> {
        self.accounts.list().await
    }

    pub async fn get(&self, id: Uuid) -> Result<Account> {
        self.accounts
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Account {} not found", id)))
    }

    #[tracing::instrument(skip(self, payload))]
    pub async fn create(&self, payload: CreateAccountPayload) -> Result<Account> {
        let account = self
            .accounts
            .insert(NewAccount {
                email: checked_email(&payload.email)?,
                display_name: payload.display_name.trim().to_string(),
                is_active: payload.is_active.unwrap_or(true),
                is_superuser: payload.is_superuser.unwrap_or(false),
                email_notifications: payload.email_notifications.unwrap_or(true),
            })
            .await?;
        info!(account_id = %account.id, "Account created");
        self.reconcile_logged(&account).await;
        Ok(account)
    }

    #[tracing::instrument(skip(self, payload))]
    pub async fn update(&self, id: Uuid, payload: UpdateAccountPayload) -> Result<Account> {
        let mut account = self.get(id).await?;
        if let Some(email) = payload.email {
            account.email = checked_email(&email)?;
        }
        if let Some(display_name) = payload.display_name {
            account.display_name = display_name.trim().to_string();
        }
        if let Some(is_active) = payload.is_active {
            account.is_active = is_active;
        }
        if let Some(is_superuser) = payload.is_superuser {
            account.is_superuser = is_superuser;
        }
        if let Some(email_notifications) = payload.email_notifications {
            account.email_notifications = email_notifications;
        }
        let account = self.accounts.save(&account).await?;
        self.reconcile_logged(&account).await;
        Ok(account)
    }

    /// Gives an opted-in account a confirmed subscription. Other accounts are left alone.
    pub async fn reconcile(&self, account: &Account) -> Result<Option<Subscription>> {
        if !account.wants_notifications() {
            return Ok(None);
        }
        let subscription = self
            .subscriptions
            .ensure_confirmed(
                &normalize_email(&account.email),
                generate_confirmation_token(),
                now(),
            )
            .await?;
        Ok(Some(subscription))
    }

    /// Reconciles every account. Returns how many hold a confirmed subscription.
    pub async fn reconcile_all(&self) -> Result<usize> {
        let mut reconciled = 0;
        for account in self.accounts.list().await? {
            if self.reconcile(&account).await?.is_some() {
                reconciled += 1;
            }
        }
        Ok(reconciled)
    }

    async fn reconcile_logged(&self, account: &Account) {
        if let Err(e) = self.reconcile(account).await {
            warn!(account_id = %account.id, error = %e, "Subscription reconciliation failed");
        }
    }
}

fn checked_email(raw: &str) -> Result<String> {
    let email = normalize_email(raw);
    if !email.validate_email() {
        return Err(Error::invalid_field("email", "must be a valid email address"));
    }
    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::subscription::SubscriptionState;
    use claims::assert_none;

    fn payload(email: &str) -> CreateAccountPayload {
        CreateAccountPayload {
            email: email.to_string(),
            display_name: "Amina".to_string(),
            is_active: None,
            is_superuser: None,
            email_notifications: None,
        }
    }

    fn no_changes() -> UpdateAccountPayload {
        UpdateAccountPayload {
            email: None,
            display_name: None,
            is_active: None,
            is_superuser: None,
            email_notifications: None,
        }
    }

    #[tokio::test]
    async fn creating_an_account_confirms_its_subscription() {
        let repositories = Repositories::memory();
        let service = AccountService::new(&repositories);

        let account = service.create(payload(" Amina@Example.org ")).await.unwrap();
        assert_eq!(account.email, "amina@example.org");

        let active = repositories.subscriptions.active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].email, "amina@example.org");
        assert_eq!(active[0].state(), SubscriptionState::Confirmed);
    }

    #[tokio::test]
    async fn superusers_are_not_subscribed() {
        let repositories = Repositories::memory();
        let service = AccountService::new(&repositories);

        let mut admin = payload("admin@example.org");
        admin.is_superuser = Some(true);
        let account = service.create(admin).await.unwrap();

        assert_none!(service.reconcile(&account).await.unwrap());
        assert!(repositories.subscriptions.active().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn opting_in_later_creates_a_confirmed_subscription() {
        let repositories = Repositories::memory();
        let service = AccountService::new(&repositories);

        let mut muted = payload("amina@example.org");
        muted.email_notifications = Some(false);
        let account = service.create(muted).await.unwrap();
        assert!(repositories.subscriptions.active().await.unwrap().is_empty());

        let update = UpdateAccountPayload {
            email_notifications: Some(true),
            ..no_changes()
        };
        service.update(account.id, update).await.unwrap();

        let active = repositories.subscriptions.active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert!(active[0].confirmed_at.is_some());
    }

    #[tokio::test]
    async fn invalid_email_is_rejected() {
        let service = AccountService::new(&Repositories::memory());
        let result = service.create(payload("not-an-email")).await;
        assert!(matches!(result, Err(Error::InvalidField { field, .. }) if field == "email"));
    }

    #[tokio::test]
    async fn updating_a_missing_account_is_not_found() {
        let service = AccountService::new(&Repositories::memory());
        let result = service.update(Uuid::new_v4(), no_changes()).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
