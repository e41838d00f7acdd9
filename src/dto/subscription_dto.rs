use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::subscription::{SubscribeOutcome, TransitionOutcome};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubscribePayload {
    #[validate(length(min = 1, max = 254))]
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionResponse {
    pub success: bool,
    pub status: &'static str,
    pub message: &'static str,
}

impl From<SubscribeOutcome> for SubscriptionResponse {
    fn from(outcome: SubscribeOutcome) -> Self {
        Self {
            success: true,
            status: outcome.status(),
            message: outcome.message(),
        }
    }
}

impl From<TransitionOutcome> for SubscriptionResponse {
    fn from(outcome: TransitionOutcome) -> Self {
        Self {
            success: true,
            status: outcome.status(),
            message: outcome.message(),
        }
    }
}
