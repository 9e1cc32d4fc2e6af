//! In-memory stand-ins for every network seam of a run.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use brandscout::config::ScoutConfig;
use brandscout::email::{MailExchangeLookup, SmtpProbe, SmtpVerdict};
use brandscout::gateway::{SearchGateway, SearchHit};
use brandscout::pipeline::{ResourceProvider, RunResources};
use brandscout::resolver::HostProbe;
use brandscout::DiscoveryService;
use scout_search::{FetchedPage, PageFetcher, SearchError};
use tokio_util::sync::CancellationToken;

#[derive(Default)]
pub struct Gateway {
    results: HashMap<String, Vec<SearchHit>>,
    /// Queries that never answer.
    hanging: HashSet<String>,
    latency: Option<Duration>,
    pub queries: Mutex<Vec<String>>,
}

impl Gateway {
    pub fn with(mut self, query: &str, hits: Vec<SearchHit>) -> Self {
        self.results.insert(query.to_owned(), hits);
        self
    }

    pub fn hanging(mut self, query: &str) -> Self {
        self.hanging.insert(query.to_owned());
        self
    }

    /// Every answer takes `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn issued(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchGateway for Gateway {
    async fn search(&self, query: &str, _max: usize) -> Result<Vec<SearchHit>, SearchError> {
        self.queries.lock().unwrap().push(query.to_owned());
        if self.hanging.contains(query) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        Ok(self.results.get(query).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
pub struct Pages {
    pages: HashMap<String, String>,
}

impl Pages {
    pub fn with(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_owned(), body.to_owned());
        self
    }
}

#[async_trait]
impl PageFetcher for Pages {
    async fn fetch(&self, url: &str) -> scout_search::Result<FetchedPage> {
        match self.pages.get(url) {
            Some(body) => Ok(FetchedPage {
                url: url.to_owned(),
                final_url: url.to_owned(),
                status: 200,
                body: body.clone(),
            }),
            None => Err(SearchError::Permanent {
                host: "fixture".into(),
                status: Some(404),
                reason: "not found".into(),
            }),
        }
    }

    async fn probe(&self, url: &str) -> scout_search::Result<bool> {
        Ok(self.pages.contains_key(url))
    }
}

/// DNS, MX and SMTP answers.
#[derive(Default)]
pub struct Mail {
    pub live_domains: HashSet<String>,
    pub mx_domains: HashSet<String>,
    pub accepted: HashSet<String>,
}

impl Mail {
    pub fn mx(mut self, domain: &str) -> Self {
        self.mx_domains.insert(domain.to_owned());
        self
    }

    pub fn accepts(mut self, email: &str) -> Self {
        self.accepted.insert(email.to_owned());
        self
    }
}

#[async_trait]
impl HostProbe for Mail {
    async fn resolves(&self, domain: &str) -> bool {
        self.live_domains.contains(domain)
    }

    async fn reachable(&self, domain: &str) -> bool {
        self.live_domains.contains(domain)
    }
}

#[async_trait]
impl MailExchangeLookup for Mail {
    async fn mail_exchangers(&self, domain: &str) -> Vec<String> {
        if self.mx_domains.contains(domain) {
            vec![format!("mx.{domain}")]
        } else {
            Vec::new()
        }
    }
}

#[async_trait]
impl SmtpProbe for Mail {
    async fn check(&self, _server: &str, email: &str) -> SmtpVerdict {
        if self.accepted.contains(email) {
            SmtpVerdict::Accepted
        } else {
            SmtpVerdict::Inconclusive
        }
    }
}

pub struct Fixtures {
    pub gateway: Arc<Gateway>,
    pub pages: Arc<Pages>,
    pub mail: Arc<Mail>,
}

impl Fixtures {
    pub fn new(gateway: Gateway, pages: Pages, mail: Mail) -> Self {
        Self {
            gateway: Arc::new(gateway),
            pages: Arc::new(pages),
            mail: Arc::new(mail),
        }
    }
}

impl ResourceProvider for Fixtures {
    fn provide(
        &self,
        _config: &ScoutConfig,
        _cancel: CancellationToken,
    ) -> brandscout::Result<RunResources> {
        Ok(RunResources {
            gateway: self.gateway.clone(),
            fetcher: self.pages.clone(),
            probe: self.mail.clone(),
            mx: self.mail.clone(),
            smtp: Some(self.mail.clone()),
        })
    }
}

/// Config with only the named strategies switched on.
pub fn config_with(brand_site: bool, ebay: bool, overlap: bool) -> ScoutConfig {
    let mut config = ScoutConfig::default();
    config.strategies.brand_site = brand_site;
    config.strategies.marketplaces = if ebay {
        vec![brandscout::Marketplace::Ebay]
    } else {
        Vec::new()
    };
    config.strategies.convention = false;
    config.strategies.overlap = overlap;
    config.strategies.overlap_categories = vec!["vinyl figure".into()];
    config.pipeline.cancel_grace_ms = 100;
    config
}

/// Returns the service and a handle on the gateway for query inspection.
pub fn service(config: ScoutConfig, fixtures: Fixtures) -> (DiscoveryService, Arc<Gateway>) {
    let gateway = fixtures.gateway.clone();
    let service = DiscoveryService::with_provider(config, Arc::new(fixtures))
        .expect("valid config");
    (service, gateway)
}

/// Funko's site lists RetailerX, which publishes info@ on /contact.
pub fn funko_world() -> (Gateway, Pages, Mail) {
    let gateway = Gateway::default().with(
        "Funko official site",
        vec![SearchHit::new("https://funko.com/", "Funko | Official Site", "")],
    );
    let pages = Pages::default()
        .with(
            "https://funko.com/where-to-buy",
            r#"<ul class="retailer-list">
                 <li><a href="https://www.retailerx.com/">RetailerX</a></li>
               </ul>"#,
        )
        .with(
            "https://retailerx.com/contact",
            "<p>Questions? Email info@retailerx.com</p>",
        );
    let mail = Mail::default()
        .mx("retailerx.com")
        .accepts("info@retailerx.com");
    (gateway, pages, mail)
}
