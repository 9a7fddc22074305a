use anyhow::Context;
use lettre::{
    message::{header::ContentType, Message},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Tokio1Executor,
};
use tracing::{info, warn};

use crate::config::SmtpConfig;

/// Outbound SMTP mailer. Without SMTP configuration it degrades to a no-op
/// that only logs, so local development does not need a mail server.
#[derive(Clone)]
pub struct Mailer {
    config: Option<SmtpConfig>,
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl Mailer {
    pub fn new(config: Option<SmtpConfig>) -> anyhow::Result<Self> {
        let transport = match config {
            Some(ref smtp) => {
                let creds = Credentials::new(smtp.username.clone(), smtp.password.clone());
                Some(
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)
                        .context("smtp transport setup")?
                        .port(smtp.port)
                        .credentials(creds)
                        .build(),
                )
            }
            None => None,
        };
        Ok(Self { config, transport })
    }

    pub fn disabled() -> Self {
        Self {
            config: None,
            transport: None,
        }
    }

    /// Sends the 6-digit verification code. A delivery failure propagates to
    /// the caller; an unconfigured transport logs and succeeds.
    pub async fn send_verification_code(&self, to: &str, code: &str) -> anyhow::Result<()> {
        let (Some(config), Some(transport)) = (&self.config, &self.transport) else {
            warn!(%to, "email not configured, skipping verification email");
            return Ok(());
        };

        let body = format!(
            "<h1>Email Verification</h1>\
             <p>Your verification code is: <strong>{}</strong></p>\
             <p>This code will expire in 15 minutes.</p>",
            code
        );

        let email = Message::builder()
            .from(config.from_address.parse().context("invalid from address")?)
            .to(to.parse().context("invalid recipient address")?)
            .subject("Verify Your Email")
            .header(ContentType::TEXT_HTML)
            .body(body)
            .context("build verification email")?;

        transport
            .send(email)
            .await
            .context("send verification email")?;

        info!(%to, "verification email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_mailer_skips_sending() {
        let mailer = Mailer::disabled();
        mailer
            .send_verification_code("someone@example.com", "123456")
            .await
            .expect("disabled mailer should be a no-op");
    }

    #[test]
    fn new_without_config_builds_no_transport() {
        let mailer = Mailer::new(None).expect("mailer without config");
        assert!(mailer.transport.is_none());
    }
}
