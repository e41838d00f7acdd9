use crate::config::{MailBackend, MailConfig};
use crate::error::{Error, Result};
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const POSTMARK_TOKEN_HEADER: &str = "X-Postmark-Server-Token";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub recipient: String,
    pub subject: String,
    pub text_body: String,
}

/// Outbound mail transport.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<()>;
}

/// Builds the transport selected by `MAIL_BACKEND`.
pub fn from_config(config: &MailConfig) -> Result<Arc<dyn Mailer>> {
    match config.backend {
        MailBackend::Log => Ok(Arc::new(LogMailer)),
        MailBackend::Api => {
            let base_url = config
                .api_base_url
                .as_deref()
                .ok_or_else(|| Error::Config("MAIL_API_BASE_URL is not set".to_string()))?;
            let token = config
                .api_token
                .clone()
                .ok_or_else(|| Error::Config("MAIL_API_TOKEN is not set".to_string()))?;
            let base_url = Url::parse(base_url)
                .map_err(|e| Error::Config(format!("Invalid MAIL_API_BASE_URL: {}", e)))?;
            let client = EmailClient::new(config.sender.clone(), config.timeout, base_url, token)?;
            Ok(Arc::new(client))
        }
    }
}

/// Postmark-compatible JSON mail API client.
#[derive(Debug)]
pub struct EmailClient {
    client: Client,
    sender: String,
    api_send_email_url: Url,
    api_auth_token: Secret<String>,
}

impl EmailClient {
    pub fn new(
        sender: String,
        api_timeout: Duration,
        api_base_url: Url,
        api_auth_token: Secret<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(api_timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build mail client: {}", e)))?;
        let api_send_email_url = api_base_url
            .join("email")
            .map_err(|e| Error::Config(format!("Invalid MAIL_API_BASE_URL: {}", e)))?;

        Ok(Self {
            client,
            sender,
            api_send_email_url,
            api_auth_token,
        })
    }
}

#[async_trait::async_trait]
impl Mailer for EmailClient {
    #[tracing::instrument(name = "Send an email via API", skip(self, email), fields(to = %email.recipient))]
    async fn send(&self, email: Email) -> Result<()> {
        let body = SendEmailRequest {
            to: &email.recipient,
            from: &self.sender,
            subject: &email.subject,
            text_body: &email.text_body,
        };

        self.client
            .post(self.api_send_email_url.clone())
            .header(POSTMARK_TOKEN_HEADER, self.api_auth_token.expose_secret())
            .json(&body)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| Error::Mail(e.to_string()))?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendEmailRequest<'a> {
    to: &'a str,
    from: &'a str,
    subject: &'a str,
    text_body: &'a str,
}

/// Development transport: logs the message instead of delivering it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait::async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> Result<()> {
        info!(
            to = %email.recipient,
            subject = %email.subject,
            "Mail backend is `log`; message not delivered"
        );
        debug!(body = %email.text_body, "Undelivered message body");
        Ok(())
    }
}
