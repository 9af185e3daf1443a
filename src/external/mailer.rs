use crate::config::MailConfig;
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct SendMailRequest<'a> {
    pub from: &'a str,
    pub to: &'a str,
    pub subject: &'a str,
    pub text: &'a str,
}

/// Outbound notifications. Callers treat failures as non-fatal: they log the
/// error and carry on with the business operation.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> AppResult<()>;
}

pub type SharedNotifier = Arc<dyn Notifier>;

#[derive(Clone)]
pub struct Mailer {
    client: Client,
    config: MailConfig,
}

impl Mailer {
    pub fn new(config: MailConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn shared(self) -> SharedNotifier {
        Arc::new(self)
    }
}

#[async_trait]
impl Notifier for Mailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> AppResult<()> {
        let Some(url) = self.config.api_url.as_deref() else {
            log::info!("Mail API not configured, skipping mail to {to}: {subject}");
            return Ok(());
        };

        let payload = SendMailRequest {
            from: &self.config.from,
            to,
            subject,
            text: body,
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await?;

        if response.status().is_success() {
            log::info!("Mail sent to {to}: {subject}");
            Ok(())
        } else {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            Err(AppError::ExternalApiError(format!(
                "Mail sending failed with {status}: {error_text}"
            )))
        }
    }
}
