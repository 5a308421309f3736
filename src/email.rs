use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    Message, Transport,
    message::header::ContentType,
    transport::smtp::{SmtpTransport, authentication::Credentials},
};
use tracing::{debug, info};

use crate::config::EmailConfig;
use crate::{CloudburstError, Result};

/// Outgoing plaintext email
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<()>;
}

/// SMTP delivery with STARTTLS and login credentials
pub struct SmtpMailer {
    transport: SmtpTransport,
    from_address: String,
    from_name: String,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let (Some(username), Some(password)) = (&config.username, &config.password) else {
            return Err(CloudburstError::config(
                "SMTP username and password are required to send alerts",
            ));
        };

        let credentials = Credentials::new(username.clone(), password.clone());

        let transport = SmtpTransport::starttls_relay(&config.smtp_host)
            .map_err(|e| CloudburstError::config(format!("Invalid SMTP relay: {e}")))?
            .port(config.smtp_port)
            .credentials(credentials)
            .timeout(Some(Duration::from_secs(config.timeout_seconds.into())))
            .build();

        Ok(Self {
            transport,
            from_address: username.clone(),
            from_name: config.from_name.clone(),
        })
    }

    fn build_message(&self, recipient: &str, subject: &str, body: &str) -> Result<Message> {
        let from = format!("{} <{}>", self.from_name, self.from_address)
            .parse()
            .map_err(|e| CloudburstError::config(format!("Failed to parse from address: {e}")))?;
        let to = recipient
            .parse()
            .map_err(|e| CloudburstError::validation(format!("Failed to parse to address: {e}")))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| CloudburstError::transport(format!("Failed to build email: {e}")))
    }
}

/// Authentication rejections (SMTP 535) are reported separately from other failures
fn classify_smtp_error(err: lettre::transport::smtp::Error) -> CloudburstError {
    let rejected_login = err
        .status()
        .is_some_and(|code| code.to_string() == "535")
        || err.to_string().to_lowercase().contains("authentication");
    if rejected_login {
        CloudburstError::auth(err.to_string())
    } else {
        CloudburstError::transport(err.to_string())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<()> {
        let email = self.build_message(recipient, subject, body)?;
        debug!("Sending email to {} with subject '{}'", recipient, subject);

        let transport = self.transport.clone();
        tokio::task::spawn_blocking(move || transport.send(&email))
            .await
            .map_err(|e| CloudburstError::transport(format!("Email task failed: {e}")))?
            .map_err(classify_smtp_error)?;

        info!("Sent alert email to {}", recipient);
        Ok(())
    }
}
