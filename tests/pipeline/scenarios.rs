use brandscout::gateway::SearchHit;
use brandscout::model::{CompanyStatus, EmailOrigin, SourceTag};
use brandscout::pipeline::RunState;
use brandscout::{save_result, InMemoryStore, PersistenceGateway};

use crate::fixtures::*;

fn brands(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| (*s).to_owned()).collect()
}

#[tokio::test]
async fn brand_site_retailer_is_found_and_enriched() {
    let (gateway, pages, mail) = funko_world();
    let (service, _) = service(
        config_with(true, false, false),
        Fixtures::new(gateway, pages, mail),
    );
    let handle = service.run_discovery(&brands(&["Funko"])).await.unwrap();
    let result = service.wait(handle.run_id).await.unwrap();

    assert_eq!(result.run.state, RunState::Completed);
    assert_eq!(result.companies.len(), 1);
    let retailer = &result.companies[0];
    assert_eq!(retailer.canonical_name, "RetailerX");
    assert_eq!(retailer.domain.as_deref(), Some("retailerx.com"));
    assert_eq!(retailer.source, SourceTag::BrandSite);
    assert_eq!(retailer.brand_focus.as_deref(), Some("Funko"));
    assert_eq!(retailer.status, CompanyStatus::Enriched);

    assert_eq!(result.contacts.len(), 1);
    let contact = &result.contacts[0];
    assert_eq!(contact.email, "info@retailerx.com");
    assert_eq!(contact.company_ref, retailer.key());
    assert_eq!(
        contact.origin,
        EmailOrigin::Page {
            path: "/contact".into()
        }
    );
    assert!((contact.confidence_score - 1.0).abs() < 1e-9);
    assert_eq!(result.stats.per_strategy["brand_site"], 1);
}

#[tokio::test]
async fn marketplace_seller_without_site_is_still_persisted() {
    let gateway = Gateway::default().with(
        "Funko site:ebay.com sellers",
        vec![SearchHit::new(
            "https://www.ebay.com/usr/CollectiblesShop",
            "CollectiblesShop | eBay",
            "Funko Pop specialists.",
        )],
    );
    let (service, gateway) = service(
        config_with(false, true, false),
        Fixtures::new(gateway, Pages::default(), Mail::default()),
    );
    let handle = service.run_discovery(&brands(&["Funko"])).await.unwrap();
    let result = service.wait(handle.run_id).await.unwrap();

    // The resolver tried a web search for the seller before giving up.
    assert!(gateway.issued().iter().any(|q| q == "CollectiblesShop"));
    assert_eq!(result.stats.unresolved_domains, 1);
    assert_eq!(result.companies.len(), 1);
    let shop = &result.companies[0];
    assert_eq!(shop.domain, None);
    assert_eq!(shop.source.as_str(), "marketplace_ebay");
    assert!(result.contacts.is_empty());

    let store = InMemoryStore::new();
    let saved = save_result(&store, &result);
    assert_eq!(saved.companies_saved, 1);
    assert_eq!(saved.errors, 0);
    // Saving the same run again only updates.
    let again = save_result(&store, &result);
    assert_eq!(again.companies_saved, 0);
    assert_eq!(again.companies_updated, 1);
    assert_eq!(store.data().companies.len(), 1);
    assert!(store.upsert_company(shop).is_ok());
}

#[tokio::test]
async fn two_brands_listing_one_retailer_merge_into_one_company() {
    let (gateway, pages, mail) = funko_world();
    let gateway = gateway.with(
        "Tubbz official site",
        vec![SearchHit::new("https://tubbz.com/", "TUBBZ cosplaying ducks", "")],
    );
    let pages = pages.with(
        "https://tubbz.com/stockists",
        r#"<ul class="retailer-list"><li><a href="https://retailerx.com/">RetailerX Ltd</a></li></ul>"#,
    );
    let (service, _) = service(
        config_with(true, false, false),
        Fixtures::new(gateway, pages, mail),
    );
    let handle = service
        .run_discovery(&brands(&["Funko", "Tubbz"]))
        .await
        .unwrap();
    let result = service.wait(handle.run_id).await.unwrap();

    assert_eq!(result.stats.companies_before_dedup, 2);
    assert_eq!(result.stats.companies_after_dedup, 1);
    let company = &result.companies[0];
    assert_eq!(company.domain.as_deref(), Some("retailerx.com"));
    let overlap: Vec<&str> = company.product_overlap.iter().map(String::as_str).collect();
    assert_eq!(overlap, vec!["Funko", "Tubbz"]);
    // Emails are looked up once per domain and not duplicated by the merge.
    assert_eq!(result.contacts.len(), 1);
}

#[tokio::test]
async fn guessed_addresses_stay_low_confidence() {
    let (gateway, pages, _) = funko_world();
    let pages = pages.with("https://funko.com/stockists", r#"<ul class="retailer-list"><li><a href="https://quietshop.com/">Quiet Shop</a></li></ul>"#);
    let mail = Mail::default()
        .mx("retailerx.com")
        .mx("quietshop.com")
        .accepts("info@retailerx.com")
        .accepts("sales@quietshop.com");
    let (service, _) = service(
        config_with(true, false, false),
        Fixtures::new(gateway, pages, mail),
    );
    let handle = service.run_discovery(&brands(&["Funko"])).await.unwrap();
    let result = service.wait(handle.run_id).await.unwrap();

    let quiet: Vec<_> = result
        .contacts
        .iter()
        .filter(|c| c.email.ends_with("@quietshop.com"))
        .collect();
    assert_eq!(quiet.len(), 3);
    for contact in quiet {
        assert_eq!(contact.origin, EmailOrigin::Guessed);
        assert!(contact.confidence_score <= 0.2, "{contact:?}");
    }
}

#[tokio::test]
async fn domain_without_mx_scores_below_guess_ceiling() {
    let (gateway, pages, _) = funko_world();
    let (service, _) = service(
        config_with(true, false, false),
        Fixtures::new(gateway, pages, Mail::default()),
    );
    let handle = service.run_discovery(&brands(&["Funko"])).await.unwrap();
    let result = service.wait(handle.run_id).await.unwrap();

    assert!(!result.contacts.is_empty());
    for contact in &result.contacts {
        assert!(contact.confidence_score < 0.2, "{contact:?}");
        assert!((0.0..=1.0).contains(&contact.confidence_score));
    }
}

#[tokio::test]
async fn overlap_candidates_are_tagged_only_with_brands_on_their_site() {
    let gateway = Gateway::default().with(
        "vinyl figure collectibles store",
        vec![
            SearchHit::new("https://www.toyhaven.com/", "Toy Haven | Vinyl Figures", ""),
            SearchHit::new("https://gardenworld.com/", "Garden World | Figures for your lawn", ""),
        ],
    );
    let pages = Pages::default()
        .with(
            "https://toyhaven.com/",
            "<title>Toy Haven</title><p>We stock Funko Pop! and Kidrobot.</p>",
        )
        .with(
            "https://gardenworld.com/",
            "<title>Garden World</title><p>Gnomes and flamingos.</p>",
        );
    let (service, _) = service(
        config_with(false, false, true),
        Fixtures::new(gateway, pages, Mail::default()),
    );
    let handle = service
        .run_discovery(&brands(&["Funko", "Tubbz"]))
        .await
        .unwrap();
    let result = service.wait(handle.run_id).await.unwrap();

    assert_eq!(result.stats.rejected, 1);
    assert_eq!(result.companies.len(), 1);
    let haven = &result.companies[0];
    assert_eq!(haven.domain.as_deref(), Some("toyhaven.com"));
    assert_eq!(haven.source, SourceTag::Overlap);
    let overlap: Vec<&str> = haven.product_overlap.iter().map(String::as_str).collect();
    assert_eq!(overlap, vec!["Funko"]);
}
