//! Email verification and confidence scoring.
//!
//! Confidence is the sum of independent signals, each of which can only
//! raise it:
//!
//! | signal                         | weight |
//! |--------------------------------|--------|
//! | valid syntax                   | 0.2    |
//! | domain publishes MX records    | 0.3    |
//! | SMTP accepts the recipient     | 0.3    |
//! | SMTP inconclusive or disabled  | 0.1    |
//! | found on a live page           | 0.2    |
//!
//! Ceilings then apply: guessed addresses never exceed 0.2, domains without
//! MX records never exceed 0.15, and an SMTP rejection marks the address
//! invalid with at most 0.1.

use std::sync::Arc;

use lettre::Address;

use super::mx::MailExchangeLookup;
use super::smtp::{SmtpProbe, SmtpVerdict};

const SYNTAX_WEIGHT: f64 = 0.2;
const MX_WEIGHT: f64 = 0.3;
const SMTP_ACCEPTED_WEIGHT: f64 = 0.3;
const SMTP_UNKNOWN_WEIGHT: f64 = 0.1;
const ON_PAGE_WEIGHT: f64 = 0.2;

/// Highest confidence an address that was never seen on a page can reach.
pub const GUESSED_CEILING: f64 = 0.2;
/// Highest confidence for a domain with no mail exchangers.
pub const NO_MX_CEILING: f64 = 0.15;
/// Highest confidence after the mail server rejected the recipient.
pub const REJECTED_CEILING: f64 = 0.1;

const DISPOSABLE_DOMAINS: &[&str] = &[
    "mailinator.com",
    "guerrillamail.com",
    "10minutemail.com",
    "tempmail.com",
    "temp-mail.org",
    "yopmail.com",
    "trashmail.com",
    "sharklasers.com",
    "getnada.com",
    "dispostable.com",
    "throwawaymail.com",
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verification {
    pub valid: bool,
    /// In `[0, 1]`, rounded to two decimals.
    pub confidence: f64,
}

impl Verification {
    fn invalid() -> Self {
        Self {
            valid: false,
            confidence: 0.0,
        }
    }
}

pub struct EmailVerifier {
    mx: Arc<dyn MailExchangeLookup>,
    smtp: Option<Arc<dyn SmtpProbe>>,
}

impl EmailVerifier {
    /// `smtp` is `None` when recipient probing is disabled.
    pub fn new(mx: Arc<dyn MailExchangeLookup>, smtp: Option<Arc<dyn SmtpProbe>>) -> Self {
        Self { mx, smtp }
    }

    pub async fn verify(&self, email: &str, discovered_on_page: bool) -> Verification {
        let email = email.trim().to_lowercase();
        if email.parse::<Address>().is_err() {
            return Verification::invalid();
        }
        let Some((_, domain)) = email.rsplit_once('@') else {
            return Verification::invalid();
        };
        if !domain.contains('.') || DISPOSABLE_DOMAINS.contains(&domain) {
            return Verification::invalid();
        }

        let exchangers = self.mx.mail_exchangers(domain).await;
        let has_mx = !exchangers.is_empty();

        let smtp = match (&self.smtp, exchangers.first()) {
            (Some(probe), Some(server)) => Some(probe.check(server, &email).await),
            _ => None,
        };

        let verification = score(has_mx, smtp, discovered_on_page);
        tracing::debug!(
            email,
            has_mx,
            smtp = ?smtp,
            on_page = discovered_on_page,
            confidence = verification.confidence,
            "email verified"
        );
        verification
    }
}

/// Combine signals for a syntactically valid, non-disposable address.
/// `smtp` is `None` when no probe ran.
pub fn score(has_mx: bool, smtp: Option<SmtpVerdict>, on_page: bool) -> Verification {
    let mut confidence = SYNTAX_WEIGHT;
    if has_mx {
        confidence += MX_WEIGHT;
    }
    confidence += match smtp {
        Some(SmtpVerdict::Accepted) => SMTP_ACCEPTED_WEIGHT,
        Some(SmtpVerdict::Rejected) => 0.0,
        Some(SmtpVerdict::Inconclusive) | None => SMTP_UNKNOWN_WEIGHT,
    };
    if on_page {
        confidence += ON_PAGE_WEIGHT;
    }

    if !on_page {
        confidence = confidence.min(GUESSED_CEILING);
    }
    if !has_mx {
        confidence = confidence.min(NO_MX_CEILING);
    }
    let valid = smtp != Some(SmtpVerdict::Rejected);
    if !valid {
        confidence = confidence.min(REJECTED_CEILING);
    }

    Verification {
        valid,
        confidence: round2(confidence.clamp(0.0, 1.0)),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
