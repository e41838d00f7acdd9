use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateAccountPayload {
    #[validate(length(min = 3, max = 254))]
    pub email: String,
    #[validate(length(min = 1, max = 150))]
    pub display_name: String,
    pub is_active: Option<bool>,
    pub is_superuser: Option<bool>,
    pub email_notifications: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateAccountPayload {
    #[validate(length(min = 3, max = 254))]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 150))]
    pub display_name: Option<String>,
    pub is_active: Option<bool>,
    pub is_superuser: Option<bool>,
    pub email_notifications: Option<bool>,
}
