use crate::config::toml_config::{EmailSection, SmsSection};
use crate::domain::ports::{Delivery, Notifier};
use crate::utils::error::{PlatformError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

const BRAND: &str = "StraySafe";

fn service_error(service: &str, status: reqwest::StatusCode, body: String) -> PlatformError {
    PlatformError::ServiceError {
        service: service.to_string(),
        message: format!("status {}: {}", status, body),
    }
}

/// SendGrid v3 mail API.
pub struct SendGridMailer {
    client: Client,
    endpoint: String,
    api_key: String,
    from_email: String,
}

impl SendGridMailer {
    pub fn new(config: &EmailSection) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(Duration::from_secs(15)).build()?,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            from_email: config.from_email.clone(),
        })
    }

    pub async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()> {
        let body = json!({
            "personalizations": [{ "to": [{ "email": to }] }],
            "from": { "email": self.from_email },
            "subject": format!("{} - {}", BRAND, subject),
            "content": [{ "type": "text/html", "value": html }],
        });

        let response = self
            .client
            .post(format!("{}/v3/mail/send", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(service_error("sendgrid", status, text));
        }
        tracing::debug!("Email accepted for {} ({})", to, status);
        Ok(())
    }
}

/// Twilio programmable SMS.
pub struct TwilioSms {
    client: Client,
    endpoint: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
}

impl TwilioSms {
    pub fn new(config: &SmsSection) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(Duration::from_secs(15)).build()?,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            account_sid: config.account_sid.clone(),
            auth_token: config.auth_token.clone(),
            from_number: config.from_number.clone(),
        })
    }

    pub async fn send(&self, to: &str, body: &str) -> Result<()> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.endpoint, self.account_sid
        );
        let text = format!("{}: {}", BRAND, body);
        let form = [
            ("To", to),
            ("From", self.from_number.as_str()),
            ("Body", text.as_str()),
        ];

        let response = self
            .client
            .post(url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(service_error("twilio", status, text));
        }
        tracing::debug!("SMS queued for {}", to);
        Ok(())
    }
}

/// Routes each channel to its provider; a missing provider means demo mode
/// for that channel.
#[derive(Default)]
pub struct CompositeNotifier {
    mailer: Option<SendGridMailer>,
    sms: Option<TwilioSms>,
}

impl CompositeNotifier {
    pub fn new(mailer: Option<SendGridMailer>, sms: Option<TwilioSms>) -> Self {
        Self { mailer, sms }
    }

    pub fn from_config(
        email: Option<&EmailSection>,
        sms: Option<&SmsSection>,
    ) -> Result<Self> {
        let mailer = email.map(SendGridMailer::new).transpose()?;
        let sms = sms.map(TwilioSms::new).transpose()?;
        if mailer.is_none() {
            tracing::info!("Email not configured, alerts will be logged only");
        }
        if sms.is_none() {
            tracing::info!("SMS not configured, alerts will be logged only");
        }
        Ok(Self { mailer, sms })
    }
}

#[async_trait]
impl Notifier for CompositeNotifier {
    async fn send_email(&self, to: &str, subject: &str, html: &str) -> Result<Delivery> {
        match &self.mailer {
            Some(mailer) => {
                mailer.send(to, subject, html).await?;
                Ok(Delivery::Sent)
            }
            None => {
                tracing::info!("EMAIL (demo mode) to={} subject={}", to, subject);
                Ok(Delivery::Skipped)
            }
        }
    }

    async fn send_sms(&self, to: &str, body: &str) -> Result<Delivery> {
        match &self.sms {
            Some(sms) => {
                sms.send(to, body).await?;
                Ok(Delivery::Sent)
            }
            None => {
                tracing::info!("SMS (demo mode) to={} body={}", to, body);
                Ok(Delivery::Skipped)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_channels_are_skipped() {
        let notifier = CompositeNotifier::default();
        let email = notifier
            .send_email("vet@clinic.in", "EMERGENCY", "<p>hi</p>")
            .await
            .unwrap();
        let sms = notifier.send_sms("+919840277042", "hi").await.unwrap();
        assert_eq!(email, Delivery::Skipped);
        assert_eq!(sms, Delivery::Skipped);
    }
}
