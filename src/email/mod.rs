//! Email discovery and verification for resolved company domains.

pub mod discover;
pub mod mx;
pub mod smtp;
pub mod verify;

use std::cmp::Ordering;

use scout_search::SearchError;
use tokio_util::sync::CancellationToken;

pub use discover::{DiscoveredEmail, EmailDiscoverer};
pub use mx::{DnsMailExchangeLookup, MailExchangeLookup};
pub use smtp::{LettreSmtpProbe, SmtpProbe, SmtpVerdict};
pub use verify::{EmailVerifier, Verification};

use crate::model::EmailOrigin;

/// A discovered address that passed verification.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedEmail {
    pub email: String,
    pub origin: EmailOrigin,
    pub confidence: f64,
}

/// Discovery plus verification for one domain.
pub struct ContactFinder {
    discoverer: EmailDiscoverer,
    verifier: EmailVerifier,
    max_contacts: usize,
    cancel: CancellationToken,
}

impl ContactFinder {
    pub fn new(discoverer: EmailDiscoverer, verifier: EmailVerifier, max_contacts: usize) -> Self {
        Self {
            discoverer,
            verifier,
            max_contacts,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop discovery and verification once `cancel` fires.
    pub fn with_cancel(self, cancel: CancellationToken) -> Self {
        Self {
            discoverer: self.discoverer.with_cancel(cancel.clone()),
            cancel,
            ..self
        }
    }

    /// Valid addresses for `domain`, highest confidence first, at most
    /// `max_contacts`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Cancelled`] if the run is cancelled before
    /// every address was verified. Partial results are discarded.
    pub async fn find(&self, domain: &str) -> scout_search::Result<Vec<VerifiedEmail>> {
        let mut verified = Vec::new();
        for found in self.discoverer.discover(domain).await? {
            if self.cancel.is_cancelled() {
                return Err(SearchError::Cancelled);
            }
            let result = self
                .verifier
                .verify(&found.email, found.origin.on_page())
                .await;
            if result.valid {
                verified.push(VerifiedEmail {
                    email: found.email,
                    origin: found.origin,
                    confidence: result.confidence,
                });
            }
        }
        sort_by_confidence(&mut verified);
        verified.truncate(self.max_contacts);
        Ok(verified)
    }
}

/// Descending confidence, ties broken by address.
pub fn sort_by_confidence(emails: &mut [VerifiedEmail]) {
    emails.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.email.cmp(&b.email))
    });
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::config::EmailConfig;
    use crate::strategies::testing::FixtureFetcher;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct AlwaysMx;

    #[async_trait]
    impl MailExchangeLookup for AlwaysMx {
        async fn mail_exchangers(&self, domain: &str) -> Vec<String> {
            vec![format!("mx.{domain}")]
        }
    }

    struct AcceptInfoOnly;

    #[async_trait]
    impl SmtpProbe for AcceptInfoOnly {
        async fn check(&self, _server: &str, email: &str) -> SmtpVerdict {
            if email.starts_with("info@") {
                SmtpVerdict::Accepted
            } else {
                SmtpVerdict::Rejected
            }
        }
    }

    fn finder(fetcher: FixtureFetcher, max_contacts: usize) -> ContactFinder {
        let discoverer =
            EmailDiscoverer::new(Arc::new(fetcher), &EmailConfig::default()).expect("discoverer");
        let verifier = EmailVerifier::new(Arc::new(AlwaysMx), Some(Arc::new(AcceptInfoOnly)));
        ContactFinder::new(discoverer, verifier, max_contacts)
    }

    #[tokio::test]
    async fn rejected_addresses_are_dropped_and_order_is_by_confidence() {
        let fetcher = FixtureFetcher::default().with(
            "https://retailerx.com/contact",
            "<p>ghost@retailerx.com info@retailerx.com</p>",
        );
        let found = finder(fetcher, 5).find("retailerx.com").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].email, "info@retailerx.com");
        assert!((found[0].confidence - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn guesses_are_low_confidence_and_capped_in_number() {
        let found = finder(FixtureFetcher::default(), 1).find("retailerx.com").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].email, "info@retailerx.com");
        assert_eq!(found[0].origin, EmailOrigin::Guessed);
        assert!(found[0].confidence <= verify::GUESSED_CEILING);
    }

    #[tokio::test]
    async fn cancelled_finder_verifies_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let finder = finder(FixtureFetcher::default(), 5).with_cancel(cancel);
        assert!(matches!(
            finder.find("retailerx.com").await,
            Err(SearchError::Cancelled)
        ));
    }
}
