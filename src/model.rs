//! Discovery data model: candidates, companies, contacts.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::normalize::{country_from_domain, normalize_domain, normalize_name, region_from_country};

/// Marketplaces searched by the marketplace strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Marketplace {
    Ebay,
    Amazon,
    Etsy,
    Walmart,
    MercadoLibre,
    Shopee,
    Lazada,
    AliExpress,
}

impl Marketplace {
    pub fn all() -> &'static [Marketplace] {
        &[
            Self::Ebay,
            Self::Amazon,
            Self::Etsy,
            Self::Walmart,
            Self::MercadoLibre,
            Self::Shopee,
            Self::Lazada,
            Self::AliExpress,
        ]
    }

    pub fn slug(&self) -> &'static str {
        match self {
            Self::Ebay => "ebay",
            Self::Amazon => "amazon",
            Self::Etsy => "etsy",
            Self::Walmart => "walmart",
            Self::MercadoLibre => "mercadolibre",
            Self::Shopee => "shopee",
            Self::Lazada => "lazada",
            Self::AliExpress => "aliexpress",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Ebay => "eBay",
            Self::Amazon => "Amazon",
            Self::Etsy => "Etsy",
            Self::Walmart => "Walmart",
            Self::MercadoLibre => "MercadoLibre",
            Self::Shopee => "Shopee",
            Self::Lazada => "Lazada",
            Self::AliExpress => "AliExpress",
        }
    }

    /// Site restriction used in the search query.
    pub fn site(&self) -> &'static str {
        match self {
            Self::Ebay => "ebay.com",
            Self::Amazon => "amazon.com",
            Self::Etsy => "etsy.com",
            Self::Walmart => "walmart.com",
            Self::MercadoLibre => "mercadolibre.com",
            Self::Shopee => "shopee.com",
            Self::Lazada => "lazada.com",
            Self::AliExpress => "aliexpress.com",
        }
    }

    /// Marketplace-specific query for sellers carrying `brand`.
    pub fn query(&self, brand: &str) -> String {
        let suffix = match self {
            Self::Ebay => "sellers",
            Self::Amazon => "sellers stores",
            Self::Etsy => "shop",
            Self::Walmart => "marketplace sellers",
            Self::MercadoLibre => "tienda",
            Self::Shopee => "shop",
            Self::Lazada => "shop",
            Self::AliExpress => "store",
        };
        format!("{brand} site:{} {suffix}", self.site())
    }

    /// URL path segments that introduce a seller or store identifier.
    pub fn seller_markers(&self) -> &'static [&'static str] {
        match self {
            Self::Ebay => &["/usr/", "/str/"],
            Self::Amazon => &["/stores/", "/gp/seller/", "/sp?seller="],
            Self::Etsy => &["/shop/"],
            Self::Walmart => &["/seller/"],
            Self::MercadoLibre => &["/tienda/", "/perfil/"],
            Self::Shopee => &["/shop/"],
            Self::Lazada => &["/shop/", "/seller/"],
            Self::AliExpress => &["/store/"],
        }
    }

    /// Trading region for regional marketplaces.
    pub fn region(&self) -> Option<&'static str> {
        match self {
            Self::MercadoLibre => Some("LATAM"),
            Self::Shopee | Self::Lazada => Some("SEA"),
            _ => None,
        }
    }

    /// Whether `domain` belongs to this marketplace (any country site).
    pub fn owns_domain(&self, domain: &str) -> bool {
        let root = self.site().trim_end_matches(".com");
        domain
            .split('.')
            .any(|label| label == root || (root == "mercadolibre" && label == "mercadolivre"))
    }

    /// The marketplace owning `domain`, if any.
    pub fn for_domain(domain: &str) -> Option<Marketplace> {
        Self::all().iter().copied().find(|m| m.owns_domain(domain))
    }
}

impl fmt::Display for Marketplace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Which strategy produced a candidate. Variant order is precedence order:
/// when records merge, the smallest tag is kept as the record's source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum SourceTag {
    BrandSite,
    Marketplace(Marketplace),
    Convention,
    Overlap,
}

impl SourceTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BrandSite => "brand_site",
            Self::Marketplace(Marketplace::Ebay) => "marketplace_ebay",
            Self::Marketplace(Marketplace::Amazon) => "marketplace_amazon",
            Self::Marketplace(Marketplace::Etsy) => "marketplace_etsy",
            Self::Marketplace(Marketplace::Walmart) => "marketplace_walmart",
            Self::Marketplace(Marketplace::MercadoLibre) => "marketplace_mercadolibre",
            Self::Marketplace(Marketplace::Shopee) => "marketplace_shopee",
            Self::Marketplace(Marketplace::Lazada) => "marketplace_lazada",
            Self::Marketplace(Marketplace::AliExpress) => "marketplace_aliexpress",
            Self::Convention => "convention",
            Self::Overlap => "overlap",
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "brand_site" => Ok(Self::BrandSite),
            "convention" => Ok(Self::Convention),
            "overlap" => Ok(Self::Overlap),
            other => other
                .strip_prefix("marketplace_")
                .and_then(|slug| Marketplace::all().iter().find(|m| m.slug() == slug))
                .map(|m| Self::Marketplace(*m))
                .ok_or_else(|| format!("unknown source tag: {other}")),
        }
    }
}

impl From<SourceTag> for String {
    fn from(tag: SourceTag) -> Self {
        tag.as_str().to_owned()
    }
}

impl TryFrom<String> for SourceTag {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A raw, unverified discovery result from one strategy.
///
/// Built with the `with_*` methods before emission and never mutated after.
/// An empty `brand_tags` set marks a provisional candidate whose brands must
/// be confirmed by relevance validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub source: SourceTag,
    pub raw_name: String,
    /// Page where the candidate was found.
    pub url: String,
    pub domain: Option<String>,
    pub brand_tags: BTreeSet<String>,
    pub country_hint: Option<String>,
}

impl Candidate {
    pub fn new(source: SourceTag, raw_name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            source,
            raw_name: raw_name.into().trim().to_owned(),
            url: url.into(),
            domain: None,
            brand_tags: BTreeSet::new(),
            country_hint: None,
        }
    }

    /// Sets the company domain; invalid input leaves it unset.
    pub fn with_domain(mut self, domain: &str) -> Self {
        self.domain = normalize_domain(domain);
        self
    }

    pub fn with_brand(mut self, brand: &str) -> Self {
        self.brand_tags.insert(brand.to_owned());
        self
    }

    pub fn with_country(mut self, country: Option<String>) -> Self {
        self.country_hint = country;
        self
    }

    pub fn is_provisional(&self) -> bool {
        self.brand_tags.is_empty()
    }
}

/// Lifecycle status of a company lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanyStatus {
    /// Discovered, no usable contact yet.
    New,
    /// At least one verified contact attached.
    Enriched,
}

/// A canonical, deduplicated company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyRecord {
    pub canonical_name: String,
    pub domain: Option<String>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub source: SourceTag,
    pub brand_focus: Option<String>,
    pub product_overlap: BTreeSet<String>,
    pub status: CompanyStatus,
}

impl CompanyRecord {
    /// Build a record from a candidate and the domain resolved for it.
    ///
    /// The country falls back to the domain's ccTLD. The region comes from
    /// a regional marketplace, else from the country.
    pub fn from_candidate(candidate: &Candidate, domain: Option<String>) -> Self {
        let domain = domain.or_else(|| candidate.domain.clone());
        let country = candidate
            .country_hint
            .clone()
            .or_else(|| domain.as_deref().and_then(country_from_domain));
        let marketplace_region = match candidate.source {
            SourceTag::Marketplace(m) => m.region(),
            _ => None,
        };
        let region = marketplace_region
            .or_else(|| country.as_deref().and_then(region_from_country))
            .map(str::to_owned);
        Self {
            canonical_name: candidate.raw_name.clone(),
            domain,
            country,
            region,
            source: candidate.source,
            brand_focus: candidate.brand_tags.iter().next().cloned(),
            product_overlap: candidate.brand_tags.clone(),
            status: CompanyStatus::New,
        }
    }

    /// Dedup and persistence key: domain when present, otherwise the
    /// normalised name combined with the country hint.
    pub fn key(&self) -> String {
        company_key(
            self.domain.as_deref(),
            &self.canonical_name,
            self.country.as_deref(),
        )
    }
}

/// Key shared by the deduplicator and persistence gateways.
pub fn company_key(domain: Option<&str>, name: &str, country: Option<&str>) -> String {
    match domain {
        Some(domain) => format!("domain:{domain}"),
        None => format!(
            "name:{}|{}",
            normalize_name(name),
            country.unwrap_or_default().to_ascii_lowercase()
        ),
    }
}

/// Where an email address came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EmailOrigin {
    /// Found on a live page at `path`.
    Page { path: String },
    /// Generated from a common mailbox pattern, never seen on a page.
    Guessed,
}

impl EmailOrigin {
    pub fn on_page(&self) -> bool {
        matches!(self, Self::Page { .. })
    }
}

/// A verified email contact owned by one company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactRecord {
    /// [`CompanyRecord::key`] of the owning company.
    pub company_ref: String,
    pub email: String,
    pub confidence_score: f64,
    pub name: Option<String>,
    pub title: Option<String>,
    pub origin: EmailOrigin,
    pub last_validated: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_tags_round_trip_through_strings() {
        let mut tags = vec![SourceTag::BrandSite, SourceTag::Convention, SourceTag::Overlap];
        tags.extend(Marketplace::all().iter().map(|m| SourceTag::Marketplace(*m)));
        for tag in tags {
            assert_eq!(tag.as_str().parse::<SourceTag>(), Ok(tag));
        }
        assert_eq!(
            SourceTag::Marketplace(Marketplace::Ebay).as_str(),
            "marketplace_ebay"
        );
        assert!("marketplace_gumroad".parse::<SourceTag>().is_err());
    }

    #[test]
    fn source_tag_serialises_as_plain_string() {
        let json = serde_json::to_string(&SourceTag::BrandSite).expect("serialize");
        assert_eq!(json, "\"brand_site\"");
        let tag: SourceTag = serde_json::from_str("\"marketplace_shopee\"").expect("deserialize");
        assert_eq!(tag, SourceTag::Marketplace(Marketplace::Shopee));
    }

    #[test]
    fn precedence_follows_variant_order() {
        assert!(SourceTag::BrandSite < SourceTag::Marketplace(Marketplace::Ebay));
        assert!(SourceTag::Marketplace(Marketplace::AliExpress) < SourceTag::Convention);
        assert!(SourceTag::Convention < SourceTag::Overlap);
    }

    #[test]
    fn marketplace_queries_and_domains() {
        assert_eq!(
            Marketplace::Ebay.query("Funko"),
            "Funko site:ebay.com sellers"
        );
        assert_eq!(
            Marketplace::Amazon.query("Funko"),
            "Funko site:amazon.com sellers stores"
        );
        assert!(Marketplace::Ebay.owns_domain("ebay.co.uk"));
        assert!(Marketplace::MercadoLibre.owns_domain("mercadolivre.com.br"));
        assert_eq!(
            Marketplace::for_domain("shopee.sg"),
            Some(Marketplace::Shopee)
        );
        assert_eq!(Marketplace::for_domain("retailerx.com"), None);
    }

    #[test]
    fn candidate_builder_normalises_domain() {
        let c = Candidate::new(SourceTag::BrandSite, " RetailerX ", "https://funko.com/where-to-buy")
            .with_domain("https://www.RetailerX.com/shop")
            .with_brand("Funko");
        assert_eq!(c.raw_name, "RetailerX");
        assert_eq!(c.domain.as_deref(), Some("retailerx.com"));
        assert!(!c.is_provisional());
    }

    #[test]
    fn company_key_prefers_domain() {
        assert_eq!(
            company_key(Some("retailerx.com"), "RetailerX", None),
            "domain:retailerx.com"
        );
        assert_eq!(
            company_key(None, "Collectibles Shop, LLC", Some("US")),
            "name:collectibles shop|us"
        );
    }

    #[test]
    fn company_from_marketplace_candidate_carries_region() {
        let c = Candidate::new(
            SourceTag::Marketplace(Marketplace::Lazada),
            "ToyHaven",
            "https://www.lazada.sg/shop/toyhaven",
        )
        .with_brand("Funko");
        let record = CompanyRecord::from_candidate(&c, None);
        assert_eq!(record.region.as_deref(), Some("SEA"));
        assert_eq!(record.brand_focus.as_deref(), Some("Funko"));
        assert!(record.domain.is_none());
        assert_eq!(record.status, CompanyStatus::New);
    }

    #[test]
    fn company_region_follows_country() {
        let hinted = Candidate::new(SourceTag::BrandSite, "Toy Haven", "https://funko.com/stockists")
            .with_domain("toyhaven.co.uk")
            .with_country(Some("GB".to_owned()));
        let record = CompanyRecord::from_candidate(&hinted, None);
        assert_eq!(record.region.as_deref(), Some("EMEA"));

        let resolved = Candidate::new(SourceTag::Overlap, "Kaiju", "https://s");
        let record = CompanyRecord::from_candidate(&resolved, Some("kaiju.com.au".into()));
        assert_eq!(record.country.as_deref(), Some("AU"));
        assert_eq!(record.region.as_deref(), Some("APAC"));

        let plain = Candidate::new(SourceTag::Convention, "Shop", "https://s").with_domain("shop.com");
        assert_eq!(CompanyRecord::from_candidate(&plain, None).region, None);
    }
}
