//! New-listing notifications and subscription confirmation mail.
//!
//! Digests use a per-subscriber watermark (`last_notified_at`). Each subscriber's
//! window is closed at a `now` captured for that subscriber, and the watermark is
//! advanced to exactly that instant, so a listing created during the run is picked up
//! by the next one rather than skipped.

use crate::error::Result;
use crate::models::listing::Listing;
use crate::models::subscription::Subscription;
use crate::repository::{CreatedWindow, ListingRepository, Repositories, SubscriptionRepository};
use crate::services::dispatch::Job;
use crate::services::email_client::{Email, Mailer};
use crate::services::user_service::AccountService;
use crate::utils::time::now;
use chrono::Duration;
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Lookback for subscribers that have never received a digest.
pub const FIRST_DIGEST_LOOKBACK_HOURS: i64 = 24;

pub const CONFIRMATION_SUBJECT: &str = "Confirm Your Subscription to BYN-K Opportunities";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DigestReport {
    pub subscribers: usize,
    pub digests_sent: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FanOutReport {
    pub sent: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct NotificationService {
    listings: Arc<dyn ListingRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    accounts: AccountService,
    mailer: Arc<dyn Mailer>,
    frontend_url: String,
    disclaimer: String,
}

impl NotificationService {
    pub fn new(
        repositories: &Repositories,
        accounts: AccountService,
        mailer: Arc<dyn Mailer>,
        frontend_url: &str,
        disclaimer: &str,
    ) -> Self {
        Self {
            listings: repositories.listings.clone(),
            subscriptions: repositories.subscriptions.clone(),
            accounts,
            mailer,
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
            disclaimer: disclaimer.to_string(),
        }
    }

    pub async fn run(&self, job: Job) -> Result<()> {
        match job {
            Job::SendConfirmation(id) => {
                self.send_confirmation(id).await?;
            }
            Job::NotifyListing(id) => {
                self.notify_one(id).await?;
            }
            Job::NotifyDue => {
                self.notify_all_due().await?;
            }
        }
        Ok(())
    }

    /// Mails the current confirmation link. Skipped once the subscription is active.
    #[tracing::instrument(skip(self))]
    pub async fn send_confirmation(&self, subscription_id: Uuid) -> Result<bool> {
        let Some(subscription) = self.subscriptions.get(subscription_id).await? else {
            warn!("Subscription vanished before its confirmation was sent");
            return Ok(false);
        };
        if subscription.is_active {
            return Ok(false);
        }

        let link = format!(
            "{}/confirm-subscription?token={}",
            self.frontend_url, subscription.confirmation_token
        );
        let body = format!(
            "Hello,\n\n\
             Thank you for subscribing to opportunity alerts from BYN-K Platform.\n\n\
             Please confirm your subscription by opening the link below:\n{}\n\n\
             If you did not request this, you can ignore this email.\n\n{}\n",
            link, self.disclaimer
        );
        self.mailer
            .send(Email {
                recipient: subscription.email,
                subject: CONFIRMATION_SUBJECT.to_string(),
                text_body: body,
            })
            .await?;
        info!("Confirmation email sent");
        Ok(true)
    }

    /// Sends each active subscriber one digest of the listings created since their watermark.
    /// A mail failure stops the run; subscribers already handled keep their new watermark.
    #[tracing::instrument(skip(self))]
    pub async fn notify_all_due(&self) -> Result<DigestReport> {
        self.reconcile().await?;

        let mut report = DigestReport::default();
        for subscription in self.subscriptions.active().await? {
            let now = now();
            let window = match subscription.last_notified_at {
                Some(watermark) => CreatedWindow {
                    start: watermark,
                    start_inclusive: false,
                    end: now,
                },
                None => CreatedWindow {
                    start: now - Duration::hours(FIRST_DIGEST_LOOKBACK_HOURS),
                    start_inclusive: true,
                    end: now,
                },
            };

            let listings = self.listings.created_in(window).await?;
            if !listings.is_empty() {
                self.mailer
                    .send(self.digest_email(&subscription, &listings))
                    .await?;
                report.digests_sent += 1;
            }
            self.subscriptions
                .advance_watermark(subscription.id, now)
                .await?;
            report.subscribers += 1;
        }

        info!(
            subscribers = report.subscribers,
            digests_sent = report.digests_sent,
            "Digest run finished"
        );
        Ok(report)
    }

    /// Announces one listing to every active subscriber. Failures are counted, not raised.
    #[tracing::instrument(skip(self))]
    pub async fn notify_one(&self, listing_id: i64) -> Result<FanOutReport> {
        self.reconcile().await?;

        let mut report = FanOutReport::default();
        let listing = match self.listings.get(listing_id).await? {
            Some(listing) if listing.is_active => listing,
            _ => {
                info!("Listing is missing or inactive; nothing to announce");
                return Ok(report);
            }
        };

        for subscription in self.subscriptions.active().await? {
            let email = self.listing_email(&subscription, &listing);
            match self.mailer.send(email).await {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    warn!(subscriber = %subscription.email, error = %e, "New listing email failed");
                    report.failed += 1;
                }
            }
        }

        info!(sent = report.sent, failed = report.failed, "New listing announced");
        Ok(report)
    }

    async fn reconcile(&self) -> Result<()> {
        let reconciled = self.accounts.reconcile_all().await?;
        if reconciled > 0 {
            info!(reconciled, "Account subscriptions reconciled");
        }
        Ok(())
    }

    fn listing_url(&self, listing: &Listing) -> String {
        format!("{}/opportunities/{}", self.frontend_url, listing.slug)
    }

    fn unsubscribe_url(&self, subscription: &Subscription) -> String {
        format!(
            "{}/unsubscribe?token={}",
            self.frontend_url, subscription.confirmation_token
        )
    }

    fn digest_email(&self, subscription: &Subscription, listings: &[Listing]) -> Email {
        let mut body = format!(
            "Hello,\n\n{} new opportunities were posted on BYN-K Platform:\n\n",
            listings.len()
        );
        for listing in listings {
            let _ = writeln!(
                body,
                "* {} at {} ({})",
                listing.title,
                listing.organization_name,
                listing.category.label()
            );
            if let Some(deadline) = listing.deadline {
                let _ = writeln!(body, "  Deadline: {}", deadline.format("%Y-%m-%d"));
            }
            let _ = writeln!(body, "  {}\n", self.listing_url(listing));
        }
        let _ = write!(
            body,
            "Browse all opportunities: {}/opportunities\n\n\
             To stop receiving these emails, unsubscribe here: {}\n\n{}\n",
            self.frontend_url,
            self.unsubscribe_url(subscription),
            self.disclaimer
        );

        Email {
            recipient: subscription.email.clone(),
            subject: format!(
                "New Opportunities on BYN-K Platform ({} new)",
                listings.len()
            ),
            text_body: body,
        }
    }

    fn listing_email(&self, subscription: &Subscription, listing: &Listing) -> Email {
        let mut body = format!(
            "Hello,\n\nA new opportunity was posted on BYN-K Platform:\n\n{}\n{}\n",
            listing.title, listing.organization_name
        );
        if let Some(deadline) = listing.deadline {
            let _ = writeln!(body, "Deadline: {}", deadline.format("%Y-%m-%d"));
        }
        let _ = write!(
            body,
            "\nView details and apply: {}\n\n\
             To stop receiving these emails, unsubscribe here: {}\n\n{}\n",
            self.listing_url(listing),
            self.unsubscribe_url(subscription),
            self.disclaimer
        );

        Email {
            recipient: subscription.email.clone(),
            subject: format!(
                "New Opportunity: {} at {}",
                listing.title, listing.organization_name
            ),
            text_body: body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::models::listing::fixtures::new_listing;
    use crate::models::subscription::Transition;
    use crate::services::email_client::MockMailer;

    fn service(repositories: &Repositories, mailer: MockMailer) -> NotificationService {
        NotificationService::new(
            repositories,
            AccountService::new(repositories),
            Arc::new(mailer),
            "https://byn-k.org/",
            "Verify before applying.",
        )
    }

    async fn confirmed(repositories: &Repositories, email: &str) -> Subscription {
        repositories
            .subscriptions
            .ensure_confirmed(email, format!("tok-{}", email), now())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn digest_is_sent_once_per_new_batch() {
        let repositories = Repositories::memory();
        let subscriber = confirmed(&repositories, "amina@example.org").await;
        repositories
            .listings
            .insert(new_listing("Field Officer"))
            .await
            .unwrap();
        repositories
            .listings
            .insert(new_listing("Data Clerk"))
            .await
            .unwrap();

        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .withf(|email: &Email| {
                email.recipient == "amina@example.org"
                    && email.subject == "New Opportunities on BYN-K Platform (2 new)"
                    && email.text_body.contains("https://byn-k.org/opportunities/field-officer")
                    && email
                        .text_body
                        .contains("https://byn-k.org/unsubscribe?token=tok-amina@example.org")
            })
            .times(1)
            .returning(|_| Ok(()));
        let service = service(&repositories, mailer);

        let first = service.notify_all_due().await.unwrap();
        assert_eq!(first, DigestReport { subscribers: 1, digests_sent: 1 });

        let second = service.notify_all_due().await.unwrap();
        assert_eq!(second, DigestReport { subscribers: 1, digests_sent: 0 });

        let stored = repositories
            .subscriptions
            .get(subscriber.id)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.last_notified_at.is_some());
    }

    #[tokio::test]
    async fn watermark_advances_even_without_new_listings() {
        let repositories = Repositories::memory();
        let subscriber = confirmed(&repositories, "amina@example.org").await;

        let mut mailer = MockMailer::new();
        mailer.expect_send().never();
        let report = service(&repositories, mailer).notify_all_due().await.unwrap();

        assert_eq!(report.digests_sent, 0);
        let stored = repositories
            .subscriptions
            .get(subscriber.id)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.last_notified_at.is_some());
    }

    #[tokio::test]
    async fn digest_mail_errors_propagate() {
        let repositories = Repositories::memory();
        let subscriber = confirmed(&repositories, "amina@example.org").await;
        repositories
            .listings
            .insert(new_listing("Field Officer"))
            .await
            .unwrap();

        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .returning(|_| Err(Error::Mail("connection reset".into())));
        let result = service(&repositories, mailer).notify_all_due().await;

        assert!(matches!(result, Err(Error::Mail(_))));
        let stored = repositories
            .subscriptions
            .get(subscriber.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.last_notified_at, None);
    }

    #[tokio::test]
    async fn notify_one_counts_failures_without_raising() {
        let repositories = Repositories::memory();
        confirmed(&repositories, "amina@example.org").await;
        confirmed(&repositories, "bad@example.org").await;
        let listing = repositories
            .listings
            .insert(new_listing("Field Officer"))
            .await
            .unwrap();

        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .withf(|email: &Email| email.subject == "New Opportunity: Field Officer at UNHCR")
            .times(2)
            .returning(|email| {
                if email.recipient.starts_with("bad") {
                    Err(Error::Mail("mailbox unavailable".into()))
                } else {
                    Ok(())
                }
            });
        let report = service(&repositories, mailer)
            .notify_one(listing.id)
            .await
            .unwrap();

        assert_eq!(report, FanOutReport { sent: 1, failed: 1 });
    }

    #[tokio::test]
    async fn notify_one_skips_inactive_listings() {
        let repositories = Repositories::memory();
        confirmed(&repositories, "amina@example.org").await;
        let mut draft = new_listing("Field Officer");
        draft.is_active = false;
        let listing = repositories.listings.insert(draft).await.unwrap();

        let mut mailer = MockMailer::new();
        mailer.expect_send().never();
        let report = service(&repositories, mailer)
            .notify_one(listing.id)
            .await
            .unwrap();
        assert_eq!(report, FanOutReport::default());
    }

    #[tokio::test]
    async fn confirmation_is_not_sent_to_active_subscribers() {
        let repositories = Repositories::memory();
        let (pending, _) = repositories
            .subscriptions
            .subscribe("amina@example.org", "tok-1".to_string(), now())
            .await
            .unwrap();

        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .withf(|email: &Email| {
                email.subject == CONFIRMATION_SUBJECT
                    && email
                        .text_body
                        .contains("https://byn-k.org/confirm-subscription?token=tok-1")
            })
            .times(1)
            .returning(|_| Ok(()));
        let service = service(&repositories, mailer);

        assert!(service.send_confirmation(pending.id).await.unwrap());
        repositories
            .subscriptions
            .transition("tok-1", Transition::Confirm, now())
            .await
            .unwrap();
        assert!(!service.send_confirmation(pending.id).await.unwrap());
    }
}
