//! Run-scoped network resources.
//!
//! Every run gets its own transport, fetcher, resolver handles and probes,
//! built from the run's cancellation token and dropped with the run. Tests
//! swap in fixtures through [`ResourceProvider`].

use std::sync::Arc;

use scout_search::{HttpFetcher, PageFetcher, Searcher, Transport};
use tokio_util::sync::CancellationToken;
use trust_dns_resolver::TokioAsyncResolver;
use trust_dns_resolver::config::{ResolverConfig as DnsConfig, ResolverOpts};

use crate::config::ScoutConfig;
use crate::email::{DnsMailExchangeLookup, LettreSmtpProbe, MailExchangeLookup, SmtpProbe};
use crate::error::Result;
use crate::gateway::{SearchGateway, WebSearchGateway};
use crate::resolver::{HostProbe, NetworkProbe};

/// Handles injected into every strategy, resolver and verifier call of one
/// run.
#[derive(Clone)]
pub struct RunResources {
    pub gateway: Arc<dyn SearchGateway>,
    pub fetcher: Arc<dyn PageFetcher>,
    pub probe: Arc<dyn HostProbe>,
    pub mx: Arc<dyn MailExchangeLookup>,
    /// `None` when SMTP recipient probing is disabled.
    pub smtp: Option<Arc<dyn SmtpProbe>>,
}

pub trait ResourceProvider: Send + Sync {
    /// # Errors
    ///
    /// Fails when the configuration cannot produce working clients.
    fn provide(&self, config: &ScoutConfig, cancel: CancellationToken) -> Result<RunResources>;
}

/// The real network stack. All HTTP traffic of a run shares one
/// [`Transport`], so global and per-host limits span strategies, resolver
/// and email discovery alike.
#[derive(Debug, Default, Clone, Copy)]
pub struct NetworkResources;

impl ResourceProvider for NetworkResources {
    fn provide(&self, config: &ScoutConfig, cancel: CancellationToken) -> Result<RunResources> {
        let transport = Transport::new(
            &config.network,
            config.search.user_agent.as_deref(),
            cancel,
        )?;
        let searcher = Searcher::new(config.search.clone())?;
        let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpFetcher::new(transport.clone()));
        let gateway = Arc::new(WebSearchGateway::new(searcher, transport));

        let dns = Arc::new(TokioAsyncResolver::tokio(
            DnsConfig::default(),
            ResolverOpts::default(),
        ));
        let probe = Arc::new(NetworkProbe::new(dns.clone(), fetcher.clone()));
        let mx = Arc::new(DnsMailExchangeLookup::new(dns));
        let smtp = config
            .email
            .smtp_probe
            .then(|| Arc::new(LettreSmtpProbe::new(&config.email)) as Arc<dyn SmtpProbe>);

        tracing::debug!(
            engines = ?config.search.engines,
            smtp_probe = config.email.smtp_probe,
            "run resources built"
        );
        Ok(RunResources {
            gateway,
            fetcher,
            probe,
            mx,
            smtp,
        })
    }
}
