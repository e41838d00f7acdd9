use crate::error::{Error, Result};
use crate::models::subscription::{
    normalize_email, SubscribeOutcome, Subscription, Transition, TransitionOutcome,
};
use crate::repository::{Repositories, SubscriptionRepository};
use crate::services::dispatch::{Job, JobDispatcher};
use crate::utils::{time::now, token::generate_confirmation_token};
use std::sync::Arc;
use tracing::{error, info};
use validator::ValidateEmail;

#[derive(Clone)]
pub struct SubscriptionService {
    subscriptions: Arc<dyn SubscriptionRepository>,
    dispatcher: Arc<dyn JobDispatcher>,
}

impl SubscriptionService {
    pub fn new(repositories: &Repositories, dispatcher: Arc<dyn JobDispatcher>) -> Self {
        Self {
            subscriptions: repositories.subscriptions.clone(),
            dispatcher,
        }
    }

    #[tracing::instrument(skip(self, raw_email))]
    pub async fn subscribe(&self, raw_email: &str) -> Result<(Subscription, SubscribeOutcome)> {
        let email = normalize_email(raw_email);
        if !email.validate_email() {
            return Err(Error::invalid_field("email", "Enter a valid email address."));
        }

        let (subscription, outcome) = self
            .subscriptions
            .subscribe(&email, generate_confirmation_token(), now())
            .await?;
        info!(subscription_id = %subscription.id, status = outcome.status(), "Subscribe request");

        if outcome.sends_confirmation() {
            if let Err(e) = self
                .dispatcher
                .dispatch(Job::SendConfirmation(subscription.id))
                .await
            {
                error!(subscription_id = %subscription.id, error = %e, "Failed to send confirmation email");
            }
        }
        Ok((subscription, outcome))
    }

    pub async fn confirm(&self, token: &str) -> Result<TransitionOutcome> {
        self.transition(token, Transition::Confirm).await
    }

    pub async fn unsubscribe(&self, token: &str) -> Result<TransitionOutcome> {
        self.transition(token, Transition::Unsubscribe).await
    }

    async fn transition(&self, token: &str, transition: Transition) -> Result<TransitionOutcome> {
        let token = token.trim();
        if token.is_empty() {
            return Err(Error::NotFound("Invalid token".to_string()));
        }
        let (subscription, outcome) = self
            .subscriptions
            .transition(token, transition, now())
            .await?
            .ok_or_else(|| Error::NotFound("Invalid token".to_string()))?;
        if outcome.changed() {
            info!(subscription_id = %subscription.id, status = outcome.status(), "Subscription updated");
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingDispatcher {
        jobs: Mutex<Vec<Job>>,
    }

    #[async_trait]
    impl JobDispatcher for RecordingDispatcher {
        async fn dispatch(&self, job: Job) -> Result<()> {
            self.jobs.lock().unwrap().push(job);
            Ok(())
        }
    }

    fn setup() -> (SubscriptionService, Arc<RecordingDispatcher>) {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let service = SubscriptionService::new(&Repositories::memory(), dispatcher.clone());
        (service, dispatcher)
    }

    #[tokio::test]
    async fn full_lifecycle() {
        let (service, dispatcher) = setup();

        let (created, outcome) = service.subscribe("  Amina@Example.ORG ").await.unwrap();
        assert_eq!(outcome, SubscribeOutcome::Created);
        assert_eq!(created.email, "amina@example.org");

        let (resent, outcome) = service.subscribe("amina@example.org").await.unwrap();
        assert_eq!(outcome, SubscribeOutcome::Resent);
        assert_ne!(resent.confirmation_token, created.confirmation_token);
        assert!(matches!(
            service.confirm(&created.confirmation_token).await,
            Err(Error::NotFound(_))
        ));

        let token = resent.confirmation_token;
        assert_eq!(service.confirm(&token).await.unwrap(), TransitionOutcome::Confirmed);
        assert_eq!(
            service.confirm(&token).await.unwrap(),
            TransitionOutcome::AlreadyConfirmed
        );

        let (_, outcome) = service.subscribe("amina@example.org").await.unwrap();
        assert_eq!(outcome, SubscribeOutcome::AlreadySubscribed);

        assert_eq!(
            service.unsubscribe(&token).await.unwrap(),
            TransitionOutcome::Unsubscribed
        );
        assert_eq!(
            service.unsubscribe(&token).await.unwrap(),
            TransitionOutcome::AlreadyUnsubscribed
        );

        assert_eq!(
            *dispatcher.jobs.lock().unwrap(),
            vec![
                Job::SendConfirmation(created.id),
                Job::SendConfirmation(created.id)
            ]
        );
    }

    #[tokio::test]
    async fn invalid_emails_are_rejected() {
        let (service, dispatcher) = setup();
        let result = service.subscribe("not an email").await;
        assert!(matches!(result, Err(Error::InvalidField { field, .. }) if field == "email"));
        assert!(dispatcher.jobs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_tokens_are_not_found() {
        let (service, _) = setup();
        assert!(matches!(service.confirm("nope").await, Err(Error::NotFound(_))));
        assert!(matches!(service.unsubscribe("").await, Err(Error::NotFound(_))));
    }
}
