use anyhow::{Context, Result};
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};
use tracing::info;

use crate::config::EmailConfig;

/// Delivers the rendered brief over SMTP (STARTTLS).
pub struct EmailSender {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailSender {
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let from: Mailbox = config
            .sender
            .parse()
            .with_context(|| format!("invalid sender address: {}", config.sender))?;
        let to: Mailbox = config
            .recipient
            .parse()
            .with_context(|| format!("invalid recipient address: {}", config.recipient))?;

        let creds = Credentials::new(config.sender.clone(), config.password.clone());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .with_context(|| format!("invalid SMTP host: {}", config.smtp_host))?
            .port(config.smtp_port)
            .credentials(creds)
            .build();

        Ok(Self { mailer, from, to })
    }

    pub async fn send_html(&self, subject: &str, html: String) -> Result<()> {
        let msg = compose(&self.from, &self.to, subject, html)?;
        self.mailer.send(msg).await.context("send email")?;
        info!(to = %self.to, "brief sent");
        Ok(())
    }
}

fn compose(from: &Mailbox, to: &Mailbox, subject: &str, html: String) -> Result<Message> {
    Message::builder()
        .from(from.clone())
        .to(to.clone())
        .subject(subject)
        .header(header::ContentType::TEXT_HTML)
        .body(html)
        .context("build email")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(sender: &str) -> EmailConfig {
        EmailConfig {
            sender: sender.to_string(),
            password: "app-password".to_string(),
            recipient: "team@example.com".to_string(),
            smtp_host: "smtp.example.com".to_string(),
            smtp_port: 587,
        }
    }

    #[test]
    fn composes_html_message() {
        let from: Mailbox = "brief@example.com".parse().unwrap();
        let to: Mailbox = "team@example.com".parse().unwrap();
        let msg = compose(&from, &to, "[News Brief] test", "<p>hello</p>".to_string()).unwrap();

        let raw = String::from_utf8(msg.formatted()).unwrap();
        assert!(raw.contains("Content-Type: text/html"));
        assert!(raw.contains("To: team@example.com"));
    }

    #[test]
    fn bad_sender_address_is_an_error() {
        assert!(EmailSender::new(&config("not an address")).is_err());
    }
}
