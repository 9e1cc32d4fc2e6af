//! Mail exchanger lookup.

use std::sync::Arc;

use async_trait::async_trait;
use trust_dns_resolver::TokioAsyncResolver;

/// Resolves a domain's mail exchangers.
#[async_trait]
pub trait MailExchangeLookup: Send + Sync {
    /// Exchanger host names, most preferred first. Empty when the domain
    /// publishes no MX records or the lookup fails.
    async fn mail_exchangers(&self, domain: &str) -> Vec<String>;
}

/// [`MailExchangeLookup`] over the system DNS configuration.
pub struct DnsMailExchangeLookup {
    dns: Arc<TokioAsyncResolver>,
}

impl DnsMailExchangeLookup {
    pub fn new(dns: Arc<TokioAsyncResolver>) -> Self {
        Self { dns }
    }
}

#[async_trait]
impl MailExchangeLookup for DnsMailExchangeLookup {
    async fn mail_exchangers(&self, domain: &str) -> Vec<String> {
        match self.dns.mx_lookup(domain).await {
            Ok(lookup) => {
                let mut records: Vec<(u16, String)> = lookup
                    .iter()
                    .map(|mx| {
                        let host = mx.exchange().to_utf8();
                        (mx.preference(), host.trim_end_matches('.').to_owned())
                    })
                    .filter(|(_, host)| !host.is_empty())
                    .collect();
                records.sort();
                tracing::trace!(domain, count = records.len(), "MX records found");
                records.into_iter().map(|(_, host)| host).collect()
            }
            Err(err) => {
                tracing::debug!(domain, error = %err, "MX lookup failed");
                Vec::new()
            }
        }
    }
}
