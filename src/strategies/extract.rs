//! HTML extraction shared by the strategies: retailer links, map markers,
//! list entries and vendor rows.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::normalize::{infer_name_from_domain, normalize_domain};

/// Selectors for links inside retailer/stockist listings.
const RETAILER_LINK_SELECTORS: &[&str] = &[
    "a[href*=retailer]",
    "a[href*=store]",
    "a[href*=dealer]",
    "a[href*=stockist]",
    "a[href*=distributor]",
    "a[href*=partner]",
    ".retailer a",
    ".store-list a",
    "[class*=retailer] a",
    "[class*=stockist] a",
    "[class*=vendor] a",
    "table a",
    "ul.retailer-list a",
    "div.retailer-grid a",
];

/// Selectors for listing entries that name a shop without linking to it.
const LIST_ENTRY_SELECTORS: &[&str] = &[
    "[class*=retailer] li",
    "[class*=stockist] li",
    ".store-list li",
    "div.retailer-grid > div",
];

/// Selectors for vendor/exhibitor entries on convention pages.
const VENDOR_SELECTORS: &[&str] = &[
    ".vendor",
    ".exhibitor",
    "[class*=vendor]",
    "[class*=exhibitor]",
    "table tr",
    "ul li",
];

const MAP_HOSTS: &[&str] = &["maps.google", "google.com/maps", "openstreetmap", "goo.gl/maps"];

/// Social networks and link hubs; never a company's own site.
const SOCIAL_DOMAINS: &[&str] = &[
    "facebook.com",
    "instagram.com",
    "twitter.com",
    "x.com",
    "youtube.com",
    "tiktok.com",
    "pinterest.com",
    "linkedin.com",
    "reddit.com",
    "linktr.ee",
    "discord.gg",
    "twitch.tv",
];

/// Directories, review sites and marketplaces.
const DIRECTORY_DOMAINS: &[&str] = &[
    "yelp.com",
    "yellowpages.com",
    "bbb.org",
    "tripadvisor.com",
    "wikipedia.org",
    "google.com",
    "bing.com",
    "duckduckgo.com",
    "mapquest.com",
    "foursquare.com",
    "amazon.com",
    "ebay.com",
    "etsy.com",
    "walmart.com",
    "aliexpress.com",
    "mercadolibre.com",
    "shopee.com",
    "lazada.com",
    "apple.com",
    "play.google.com",
];

/// Anchor texts that say nothing about the shop's name.
const GENERIC_ANCHORS: &[&str] = &[
    "website",
    "visit website",
    "visit site",
    "visit",
    "shop now",
    "buy now",
    "here",
    "click here",
    "more",
    "learn more",
    "view",
    "link",
    "find us",
    "map",
    "view map",
    "directions",
    "get directions",
];

/// A shop found on a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub name: String,
    /// Absolute URL of the shop's own site, if the listing links to one.
    pub url: Option<String>,
    pub domain: Option<String>,
}

/// `true` when `domain` is `root` or one of its subdomains.
pub fn domain_matches(domain: &str, root: &str) -> bool {
    domain == root
        || domain
            .strip_suffix(root)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// Social networks, link hubs, directories, review sites and marketplaces.
pub fn is_aggregator(domain: &str) -> bool {
    is_social(domain)
        || DIRECTORY_DOMAINS
            .iter()
            .any(|root| domain_matches(domain, root))
        || crate::model::Marketplace::for_domain(domain).is_some()
}

pub fn is_social(domain: &str) -> bool {
    SOCIAL_DOMAINS.iter().any(|root| domain_matches(domain, root))
}

fn is_map_link(href: &str) -> bool {
    let lower = href.to_ascii_lowercase();
    MAP_HOSTS.iter().any(|host| lower.contains(host))
}

fn selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(sel) => Some(sel),
        Err(err) => {
            tracing::error!(css, error = %err, "invalid selector");
            None
        }
    }
}

fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolve `href` against `base`, keeping only http(s) URLs.
pub fn absolutize(base: &str, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let url = match Url::parse(href) {
        Ok(url) => url,
        Err(_) => Url::parse(base).ok()?.join(href).ok()?,
    };
    matches!(url.scheme(), "http" | "https").then_some(url)
}

/// Name for a listing: the anchor text unless it is empty, generic, or
/// just a URL, otherwise inferred from the domain.
fn listing_name(text: &str, domain: Option<&str>) -> Option<String> {
    let trimmed = text.trim();
    let lower = trimmed.to_lowercase();
    let usable = !trimmed.is_empty()
        && trimmed.chars().count() <= 80
        && !GENERIC_ANCHORS.contains(&lower.as_str())
        && !lower.starts_with("http")
        && !lower.starts_with("www.");
    if usable {
        Some(trimmed.to_owned())
    } else {
        domain.map(infer_name_from_domain).filter(|n| !n.is_empty())
    }
}

/// Shops listed on a brand's retailer page.
///
/// Links pointing back to `own_domain`, to social networks, directories or
/// marketplaces are skipped. Map markers and unlinked list entries become
/// listings without a domain.
pub fn retailer_listings(html: &str, page_url: &str, own_domain: &str) -> Vec<Listing> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    let mut push = |listing: Listing, out: &mut Vec<Listing>| {
        let key = listing
            .domain
            .clone()
            .unwrap_or_else(|| listing.name.to_lowercase());
        if seen.insert(key) {
            out.push(listing);
        }
    };

    for css in RETAILER_LINK_SELECTORS {
        let Some(sel) = selector(css) else { continue };
        for anchor in document.select(&sel) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            if is_map_link(href) {
                continue;
            }
            let Some(url) = absolutize(page_url, href) else {
                continue;
            };
            let Some(domain) = url.host_str().and_then(normalize_domain) else {
                continue;
            };
            if domain_matches(&domain, own_domain) || is_aggregator(&domain) {
                continue;
            }
            let Some(name) = listing_name(&element_text(&anchor), Some(&domain)) else {
                continue;
            };
            push(
                Listing {
                    name,
                    url: Some(url.to_string()),
                    domain: Some(domain),
                },
                &mut out,
            );
        }
    }

    for listing in map_markers(&document) {
        push(listing, &mut out);
    }

    for css in LIST_ENTRY_SELECTORS {
        let Some(sel) = selector(css) else { continue };
        let Some(link_sel) = selector("a[href]") else { continue };
        for entry in document.select(&sel) {
            if entry.select(&link_sel).next().is_some() {
                continue;
            }
            let text = element_text(&entry);
            if let Some(name) = listing_name(&text, None) {
                push(
                    Listing {
                        name,
                        url: None,
                        domain: None,
                    },
                    &mut out,
                );
            }
        }
    }

    out
}

/// Store-locator markers: `data-name` elements (with optional
/// `data-url`/`data-website`) and links into map services.
fn map_markers(document: &Html) -> Vec<Listing> {
    let mut out = Vec::new();
    if let Some(sel) = selector("[data-lat][data-name], [data-name][data-url], [data-name][data-website]") {
        for marker in document.select(&sel) {
            let value = marker.value();
            let Some(name) = value.attr("data-name").map(str::trim).filter(|n| !n.is_empty()) else {
                continue;
            };
            let site = value.attr("data-url").or_else(|| value.attr("data-website"));
            let domain = site
                .and_then(normalize_domain)
                .filter(|d| !is_aggregator(d));
            out.push(Listing {
                name: name.to_owned(),
                url: domain.as_ref().and(site.map(str::to_owned)),
                domain,
            });
        }
    }
    if let Some(sel) = selector("a[href]") {
        for anchor in document.select(&sel) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            if !is_map_link(href) {
                continue;
            }
            let name = element_text(&anchor);
            let name = if name.is_empty() || GENERIC_ANCHORS.contains(&name.to_lowercase().as_str()) {
                map_query_name(href)
            } else {
                Some(name)
            };
            if let Some(name) = name {
                out.push(Listing {
                    name,
                    url: None,
                    domain: None,
                });
            }
        }
    }
    out
}

/// Place name from a map link's `q`/`query` parameter.
fn map_query_name(href: &str) -> Option<String> {
    let url = Url::parse(href).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == "q" || k == "query")
        .map(|(_, v)| v.split(',').next().unwrap_or_default().trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// Vendor entries on a convention page. Each entry's name is its heading,
/// first cell, or text; its site is the first external link.
pub fn vendor_listings(html: &str, page_url: &str) -> Vec<Listing> {
    let document = Html::parse_document(html);
    let page_domain = Url::parse(page_url)
        .ok()
        .and_then(|u| u.host_str().and_then(normalize_domain));
    let (Some(link_sel), Some(name_sel)) = (
        selector("a[href]"),
        selector("h2, h3, h4, strong, td, .name, [class*=name]"),
    ) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for css in VENDOR_SELECTORS {
        let Some(sel) = selector(css) else { continue };
        for entry in document.select(&sel) {
            let link = entry.select(&link_sel).find_map(|a| {
                let url = absolutize(page_url, a.value().attr("href")?)?;
                let domain = url.host_str().and_then(normalize_domain)?;
                let external = page_domain
                    .as_deref()
                    .is_none_or(|own| !domain_matches(&domain, own));
                (external && !is_aggregator(&domain)).then(|| (url.to_string(), domain))
            });
            let heading = entry
                .select(&name_sel)
                .map(|e| element_text(&e))
                .find(|t| !t.is_empty());
            let text = heading.unwrap_or_else(|| element_text(&entry));
            let domain = link.as_ref().map(|(_, d)| d.as_str());
            let Some(name) = listing_name(&text, domain) else {
                continue;
            };
            let key = domain.map_or_else(|| name.to_lowercase(), str::to_owned);
            if !seen.insert(key) {
                continue;
            }
            let (url, domain) = match link {
                Some((url, domain)) => (Some(url), Some(domain)),
                None => (None, None),
            };
            out.push(Listing { name, url, domain });
        }
    }
    out
}

/// First http(s) URL in free text whose domain is not an aggregator.
pub fn external_url_in_text(text: &str) -> Option<(String, String)> {
    text.split_whitespace().find_map(|token| {
        let token = token.trim_matches(|c: char| matches!(c, '(' | ')' | ',' | ';' | '"' | '\'' | '<' | '>'));
        let token = token.trim_end_matches('.');
        let candidate = if token.starts_with("http://") || token.starts_with("https://") {
            token.to_owned()
        } else if token.starts_with("www.") {
            format!("https://{token}")
        } else {
            return None;
        };
        let url = Url::parse(&candidate).ok()?;
        let domain = url.host_str().and_then(normalize_domain)?;
        (!is_aggregator(&domain)).then(|| (url.to_string(), domain))
    })
}

/// Shop name from a result title: the segment before the first `|`, ` - `
/// or ` – ` separator.
pub fn title_name(title: &str) -> Option<String> {
    let head = title
        .split(['|', '–', '—'])
        .next()
        .unwrap_or_default()
        .split(" - ")
        .next()
        .unwrap_or_default()
        .trim();
    (!head.is_empty()).then(|| head.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHERE_TO_BUY: &str = r#"
        <html><body>
          <div class="retailer-grid">
            <div><a href="https://www.retailerx.com/">RetailerX</a></div>
            <div><a href="https://toy-haven.co.uk/shop">Visit website</a></div>
            <div><a href="/about">About Funko</a></div>
            <div><a href="https://www.facebook.com/funko">Facebook</a></div>
            <div>Corner Comics</div>
          </div>
          <div class="map" data-lat="51.5" data-lng="-0.1" data-name="London Pop Shop"
               data-url="https://londonpop.example.org"></div>
          <a href="https://maps.google.com/?q=Mega+Toys,+Paris">Find us</a>
        </body></html>"#;

    #[test]
    fn retailer_page_yields_external_shops() {
        let listings = retailer_listings(WHERE_TO_BUY, "https://funko.com/where-to-buy", "funko.com");
        let retailerx = listings
            .iter()
            .find(|l| l.name == "RetailerX")
            .expect("RetailerX listed");
        assert_eq!(retailerx.domain.as_deref(), Some("retailerx.com"));

        let haven = listings
            .iter()
            .find(|l| l.domain.as_deref() == Some("toy-haven.co.uk"))
            .expect("toy haven listed");
        assert_eq!(haven.name, "Toy Haven");

        assert!(listings.iter().all(|l| l.domain.as_deref() != Some("funko.com")));
        assert!(listings.iter().all(|l| l.domain.as_deref() != Some("facebook.com")));
        assert!(listings.iter().any(|l| l.name == "Corner Comics" && l.domain.is_none()));
        assert!(listings
            .iter()
            .any(|l| l.name == "London Pop Shop" && l.domain.as_deref() == Some("londonpop.example.org")));
        assert!(listings.iter().any(|l| l.name == "Mega Toys" && l.domain.is_none()));
    }

    #[test]
    fn vendor_rows_pair_names_with_sites() {
        let html = r#"
            <table>
              <tr><td>Kaiju Collectibles</td><td><a href="https://kaijucollect.com">site</a></td></tr>
              <tr><td>Booth Only Crafts</td><td>Booth 12</td></tr>
            </table>"#;
        let listings = vendor_listings(html, "https://comiccon.example.com/vendors");
        let kaiju = listings
            .iter()
            .find(|l| l.domain.as_deref() == Some("kaijucollect.com"))
            .expect("kaiju");
        assert_eq!(kaiju.name, "Kaiju Collectibles");
        assert!(listings.iter().any(|l| l.name == "Booth Only Crafts" && l.domain.is_none()));
    }

    #[test]
    fn external_url_skips_marketplaces() {
        let text = "Shop on ebay.com too. Visit https://www.ebay.com/usr/x or www.collectiblesshop.com.";
        let (_, domain) = external_url_in_text(text).expect("external url");
        assert_eq!(domain, "collectiblesshop.com");
        assert!(external_url_in_text("only https://www.amazon.com/stores/x").is_none());
    }

    #[test]
    fn title_segment_before_separator() {
        assert_eq!(title_name("Toy Haven | Vinyl Figures").as_deref(), Some("Toy Haven"));
        assert_eq!(title_name("Pop Palace - Funko Retailer").as_deref(), Some("Pop Palace"));
        assert_eq!(title_name("  "), None);
    }

    #[test]
    fn domain_matching_respects_label_boundaries() {
        assert!(domain_matches("shop.funko.com", "funko.com"));
        assert!(domain_matches("funko.com", "funko.com"));
        assert!(!domain_matches("notfunko.com", "funko.com"));
        assert!(is_aggregator("m.facebook.com"));
        assert!(is_aggregator("ebay.co.uk"));
        assert!(!is_aggregator("retailerx.com"));
    }
}
