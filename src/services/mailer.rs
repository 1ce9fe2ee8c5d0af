use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::errors::{AppError, Result};

/// Out-of-band channel delivering a one-time code to its owner.
#[async_trait]
pub trait OtpMailer: Send + Sync {
    async fn send_otp(&self, email: &str, code: &str) -> Result<()>;
}

fn otp_message(code: &str, ttl_minutes: i64) -> String {
    format!(
        "Your password reset code is: {}. Valid for {} minutes.",
        code, ttl_minutes
    )
}

/// Records the code in the service log instead of sending it.
#[derive(Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl OtpMailer for LogMailer {
    async fn send_otp(&self, email: &str, code: &str) -> Result<()> {
        tracing::info!("OTP code for {}: {}", email, code);
        Ok(())
    }
}

/// Transactional email provider reached over HTTPS with a bearer key.
#[derive(Clone)]
pub struct HttpMailer {
    api_url: String,
    api_key: String,
    from: String,
    ttl_minutes: i64,
    client: Client,
}

impl HttpMailer {
    pub fn new(api_url: String, api_key: String, from: String, ttl_minutes: i64) -> Self {
        Self {
            api_url,
            api_key,
            from,
            ttl_minutes,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl OtpMailer for HttpMailer {
    async fn send_otp(&self, email: &str, code: &str) -> Result<()> {
        let message = otp_message(code, self.ttl_minutes);

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .json(&json!({
                "from": self.from,
                "to": email,
                "subject": "Password reset code",
                "text": message,
            }))
            .send()
            .await
            .map_err(|e| AppError::external_api(format!("Email API error: {}", e)))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(AppError::external_api(format!(
                "Email sending failed with status: {}",
                response.status()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_carries_code_and_lifetime() {
        let message = otp_message("123456", 5);
        assert!(message.contains("123456"));
        assert!(message.contains("5 minutes"));
    }

    #[tokio::test]
    async fn log_mailer_always_succeeds() {
        LogMailer.send_otp("a@x.com", "123456").await.unwrap();
    }
}
