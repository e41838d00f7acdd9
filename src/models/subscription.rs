//! Subscriber lifecycle.
//!
//! A subscription is PENDING until its confirmation token is used, CONFIRMED while
//! active, and UNSUBSCRIBED once deactivated after a confirmation. Every storage
//! backend applies the rules below inside its own atomic read-modify-write.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub email: String,
    pub is_active: bool,
    #[serde(skip_serializing)]
    pub confirmation_token: String,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub last_notified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionState {
    Pending,
    Confirmed,
    Unsubscribed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    Created,
    AlreadySubscribed,
    Resent,
}

impl SubscribeOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            SubscribeOutcome::Created | SubscribeOutcome::Resent => "pending_confirmation",
            SubscribeOutcome::AlreadySubscribed => "already_subscribed",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            SubscribeOutcome::Created | SubscribeOutcome::Resent => {
                "Please check your email to confirm your subscription."
            }
            SubscribeOutcome::AlreadySubscribed => "You are already subscribed!",
        }
    }

    pub fn sends_confirmation(&self) -> bool {
        !matches!(self, SubscribeOutcome::AlreadySubscribed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Confirm,
    Unsubscribe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Confirmed,
    AlreadyConfirmed,
    Unsubscribed,
    AlreadyUnsubscribed,
}

impl TransitionOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            TransitionOutcome::Confirmed => "confirmed",
            TransitionOutcome::AlreadyConfirmed => "already_confirmed",
            TransitionOutcome::Unsubscribed => "unsubscribed",
            TransitionOutcome::AlreadyUnsubscribed => "already_unsubscribed",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            TransitionOutcome::Confirmed => {
                "Your subscription has been confirmed! You will now receive opportunity alerts."
            }
            TransitionOutcome::AlreadyConfirmed => "Your subscription is already confirmed!",
            TransitionOutcome::Unsubscribed => "You have been successfully unsubscribed.",
            TransitionOutcome::AlreadyUnsubscribed => "You are already unsubscribed.",
        }
    }

    /// True when the transition wrote to the record.
    pub fn changed(&self) -> bool {
        matches!(
            self,
            TransitionOutcome::Confirmed | TransitionOutcome::Unsubscribed
        )
    }
}

impl Transition {
    pub fn apply(self, subscription: &mut Subscription, now: DateTime<Utc>) -> TransitionOutcome {
        match self {
            Transition::Confirm if subscription.is_active => TransitionOutcome::AlreadyConfirmed,
            Transition::Confirm => {
                subscription.is_active = true;
                subscription.confirmed_at = Some(now);
                TransitionOutcome::Confirmed
            }
            Transition::Unsubscribe if !subscription.is_active => {
                TransitionOutcome::AlreadyUnsubscribed
            }
            Transition::Unsubscribe => {
                subscription.is_active = false;
                TransitionOutcome::Unsubscribed
            }
        }
    }
}

impl Subscription {
    pub fn pending(email: String, token: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email,
            is_active: false,
            confirmation_token: token,
            created_at: now,
            confirmed_at: None,
            last_notified_at: None,
        }
    }

    pub fn state(&self) -> SubscriptionState {
        match (self.is_active, self.confirmed_at) {
            (true, _) => SubscriptionState::Confirmed,
            (false, None) => SubscriptionState::Pending,
            (false, Some(_)) => SubscriptionState::Unsubscribed,
        }
    }

    /// Subscribe request against an existing record. Inactive records get a new token.
    pub fn resubscribe(&mut self, fresh_token: String) -> SubscribeOutcome {
        if self.is_active {
            return SubscribeOutcome::AlreadySubscribed;
        }
        self.confirmation_token = fresh_token;
        SubscribeOutcome::Resent
    }

    /// Account reconciliation: force the record into CONFIRMED. Returns whether it changed.
    pub fn ensure_confirmed(&mut self, now: DateTime<Utc>) -> bool {
        let mut changed = false;
        if !self.is_active {
            self.is_active = true;
            changed = true;
        }
        if self.confirmed_at.is_none() {
            self.confirmed_at = Some(now);
            changed = true;
        }
        changed
    }
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> Subscription {
        Subscription::pending("a@x.com".into(), "tok-1".into(), Utc::now())
    }

    #[test]
    fn confirm_then_unsubscribe_walks_all_states() {
        let now = Utc::now();
        let mut sub = pending();
        assert_eq!(sub.state(), SubscriptionState::Pending);

        assert_eq!(Transition::Confirm.apply(&mut sub, now), TransitionOutcome::Confirmed);
        assert_eq!(sub.state(), SubscriptionState::Confirmed);
        assert_eq!(sub.confirmed_at, Some(now));

        assert_eq!(
            Transition::Confirm.apply(&mut sub, now),
            TransitionOutcome::AlreadyConfirmed
        );

        assert_eq!(
            Transition::Unsubscribe.apply(&mut sub, now),
            TransitionOutcome::Unsubscribed
        );
        assert_eq!(sub.state(), SubscriptionState::Unsubscribed);
        assert_eq!(sub.confirmed_at, Some(now));

        assert_eq!(
            Transition::Unsubscribe.apply(&mut sub, now),
            TransitionOutcome::AlreadyUnsubscribed
        );
    }

    #[test]
    fn repeated_confirmation_keeps_the_first_timestamp() {
        let first = Utc::now();
        let later = first + chrono::Duration::hours(3);
        let mut sub = pending();

        assert_eq!(Transition::Confirm.apply(&mut sub, first), TransitionOutcome::Confirmed);
        let outcome = Transition::Confirm.apply(&mut sub, later);
        assert_eq!(outcome, TransitionOutcome::AlreadyConfirmed);
        assert!(!outcome.changed());
        assert_eq!(sub.confirmed_at, Some(first));
        assert_eq!(sub.confirmation_token, "tok-1");
    }

    #[test]
    fn unsubscribing_a_pending_record_is_a_noop() {
        let mut sub = pending();
        let outcome = Transition::Unsubscribe.apply(&mut sub, Utc::now());
        assert_eq!(outcome, TransitionOutcome::AlreadyUnsubscribed);
        assert!(!outcome.changed());
        assert_eq!(sub.state(), SubscriptionState::Pending);
    }

    #[test]
    fn resubscribe_rotates_token_only_when_inactive() {
        let mut sub = pending();
        assert_eq!(sub.resubscribe("tok-2".into()), SubscribeOutcome::Resent);
        assert_eq!(sub.confirmation_token, "tok-2");

        Transition::Confirm.apply(&mut sub, Utc::now());
        assert_eq!(
            sub.resubscribe("tok-3".into()),
            SubscribeOutcome::AlreadySubscribed
        );
        assert_eq!(sub.confirmation_token, "tok-2");
    }

    #[test]
    fn ensure_confirmed_keeps_existing_confirmation_time() {
        let earlier = Utc::now() - chrono::Duration::days(10);
        let mut sub = pending();
        Transition::Confirm.apply(&mut sub, earlier);
        Transition::Unsubscribe.apply(&mut sub, earlier);

        assert!(sub.ensure_confirmed(Utc::now()));
        assert!(sub.is_active);
        assert_eq!(sub.confirmed_at, Some(earlier));
        assert!(!sub.ensure_confirmed(Utc::now()));
    }

    #[test]
    fn outcome_status_tokens() {
        assert_eq!(SubscribeOutcome::Created.status(), "pending_confirmation");
        assert_eq!(SubscribeOutcome::Resent.status(), "pending_confirmation");
        assert_eq!(SubscribeOutcome::AlreadySubscribed.status(), "already_subscribed");
        assert!(!SubscribeOutcome::AlreadySubscribed.sends_confirmation());
        assert_eq!(normalize_email("  A@X.Com "), "a@x.com");
    }
}
