//! SMTP recipient probe: `MAIL FROM` / `RCPT TO`, then `QUIT`. No message
//! is ever sent.

use std::time::Duration;

use async_trait::async_trait;
use lettre::transport::smtp::client::SmtpConnection;
use lettre::transport::smtp::commands::{Mail, Rcpt};
use lettre::transport::smtp::extension::ClientId;
use lettre::Address;

use crate::config::EmailConfig;

const SMTP_PORT: u16 = 25;

/// Outcome of a recipient probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpVerdict {
    Accepted,
    /// Permanent (5xx) rejection of the recipient.
    Rejected,
    /// Connection failure, greylisting, or any other non-answer.
    Inconclusive,
}

#[async_trait]
pub trait SmtpProbe: Send + Sync {
    async fn check(&self, mail_server: &str, email: &str) -> SmtpVerdict;
}

/// [`SmtpProbe`] over lettre's blocking SMTP connection, run on the
/// blocking thread pool.
#[derive(Debug, Clone)]
pub struct LettreSmtpProbe {
    sender: String,
    helo_name: String,
    timeout: Duration,
}

impl LettreSmtpProbe {
    pub fn new(config: &EmailConfig) -> Self {
        Self {
            sender: config.smtp_sender.clone(),
            helo_name: config.helo_name.clone(),
            timeout: Duration::from_secs(config.smtp_timeout_secs),
        }
    }

    fn probe_blocking(&self, mail_server: &str, email: &str) -> SmtpVerdict {
        let (Ok(sender), Ok(recipient)) = (self.sender.parse::<Address>(), email.parse::<Address>())
        else {
            return SmtpVerdict::Inconclusive;
        };
        let helo = ClientId::Domain(self.helo_name.clone());
        let mut conn = match SmtpConnection::connect(
            (mail_server, SMTP_PORT),
            Some(self.timeout),
            &helo,
            None,
            None,
        ) {
            Ok(conn) => conn,
            Err(err) => {
                tracing::debug!(mail_server, error = %err, "SMTP connect failed");
                return SmtpVerdict::Inconclusive;
            }
        };

        let verdict = match conn.command(Mail::new(Some(sender), vec![])) {
            Err(err) => {
                tracing::debug!(mail_server, error = %err, "MAIL FROM refused");
                SmtpVerdict::Inconclusive
            }
            Ok(_) => match conn.command(Rcpt::new(recipient, vec![])) {
                Ok(_) => SmtpVerdict::Accepted,
                Err(err) if err.is_permanent() => {
                    tracing::debug!(mail_server, email, error = %err, "recipient rejected");
                    SmtpVerdict::Rejected
                }
                Err(err) => {
                    tracing::debug!(mail_server, email, error = %err, "recipient check inconclusive");
                    SmtpVerdict::Inconclusive
                }
            },
        };
        if let Err(err) = conn.quit() {
            tracing::trace!(mail_server, error = %err, "SMTP QUIT failed");
        }
        verdict
    }
}

#[async_trait]
impl SmtpProbe for LettreSmtpProbe {
    async fn check(&self, mail_server: &str, email: &str) -> SmtpVerdict {
        let probe = self.clone();
        let mail_server = mail_server.to_owned();
        let email = email.to_owned();
        match tokio::task::spawn_blocking(move || probe.probe_blocking(&mail_server, &email)).await {
            Ok(verdict) => verdict,
            Err(err) => {
                tracing::warn!(error = %err, "SMTP probe task failed");
                SmtpVerdict::Inconclusive
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unparseable_recipient_is_inconclusive() {
        let probe = LettreSmtpProbe::new(&EmailConfig::default());
        assert_eq!(
            probe.check("mx.invalid", "not an address").await,
            SmtpVerdict::Inconclusive
        );
    }
}
