use std::time::Duration;

use brandscout::gateway::SearchHit;
use brandscout::pipeline::{LogKind, RunResult, RunState};
use brandscout::ScoutError;
use futures_util::StreamExt;

use crate::fixtures::*;

fn two_sources() -> Fixtures {
    let (gateway, pages, mail) = funko_world();
    let gateway = gateway.with(
        "Funko site:ebay.com sellers",
        vec![SearchHit::new(
            "https://www.ebay.com/usr/CollectiblesShop",
            "CollectiblesShop | eBay",
            "",
        )],
    );
    Fixtures::new(gateway, pages, mail)
}

fn company_keys(result: &RunResult) -> Vec<String> {
    result.companies.iter().map(|c| c.key()).collect()
}

#[tokio::test]
async fn paused_then_resumed_run_matches_uninterrupted_run() {
    let (baseline, _) = service(config_with(true, true, false), two_sources());
    let straight = baseline.run_discovery(&["Funko".into()]).await.unwrap();
    let straight = baseline.wait(straight.run_id).await.unwrap();

    let (service, gateway) = service(config_with(true, true, false), two_sources());
    let handle = service.run_discovery(&["Funko".into()]).await.unwrap();
    service.pause(handle.run_id).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(service.snapshot(handle.run_id).await.unwrap().state, RunState::Paused);
    assert!(gateway.issued().is_empty(), "no requests while paused");
    assert!(service.get_result(handle.run_id).await.unwrap().is_none());

    service.resume(handle.run_id).await.unwrap();
    let resumed = service.wait(handle.run_id).await.unwrap();

    assert_eq!(resumed.run.state, RunState::Completed);
    assert_eq!(company_keys(&resumed), company_keys(&straight));
    assert_eq!(resumed.stats.per_strategy, straight.stats.per_strategy);
    assert_eq!(resumed.contacts.len(), straight.contacts.len());

    let kinds: Vec<LogKind> = service
        .subscribe_log(handle.run_id)
        .await
        .unwrap()
        .map(|e| e.kind)
        .collect()
        .await;
    let state_changes = kinds.iter().filter(|k| **k == LogKind::StateChanged).count();
    // pending->running, running->paused, paused->running, running->completed
    assert_eq!(state_changes, 4);
}

#[tokio::test]
async fn pause_mid_run_freezes_requests_until_resumed() {
    let slow_sources = || {
        let (gateway, pages, mail) = funko_world();
        let gateway = gateway
            .with(
                "Funko site:ebay.com sellers",
                vec![SearchHit::new(
                    "https://www.ebay.com/usr/CollectiblesShop",
                    "CollectiblesShop | eBay",
                    "",
                )],
            )
            .with_latency(Duration::from_millis(20));
        Fixtures::new(gateway, pages, mail)
    };
    let (baseline, _) = service(config_with(true, true, false), slow_sources());
    let straight = baseline.run_discovery(&["Funko".into()]).await.unwrap();
    let straight = baseline.wait(straight.run_id).await.unwrap();

    let (service, gateway) = service(config_with(true, true, false), slow_sources());
    let handle = service.run_discovery(&["Funko".into()]).await.unwrap();
    let mut log = service.subscribe_log(handle.run_id).await.unwrap();
    while let Some(event) = log.next().await {
        if event.kind == LogKind::CandidateAccepted {
            break;
        }
    }
    service.pause(handle.run_id).await.unwrap();
    // Requests already past a safe point may still land.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let issued_while_paused = gateway.issued().len();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(service.snapshot(handle.run_id).await.unwrap().state, RunState::Paused);
    assert_eq!(gateway.issued().len(), issued_while_paused);
    assert!(service.get_result(handle.run_id).await.unwrap().is_none());

    service.resume(handle.run_id).await.unwrap();
    let resumed = tokio::time::timeout(Duration::from_secs(5), service.wait(handle.run_id))
        .await
        .expect("resumed run finishes")
        .unwrap();

    assert_eq!(resumed.run.state, RunState::Completed);
    assert_eq!(company_keys(&resumed), company_keys(&straight));
    assert_eq!(resumed.stats.per_strategy, straight.stats.per_strategy);
}

#[tokio::test]
async fn cancelled_run_returns_partial_result_with_exact_counts() {
    let (_, pages, mail) = funko_world();
    let gateway = Gateway::default()
        .with(
            "Funko site:ebay.com sellers",
            vec![SearchHit::new(
                "https://www.ebay.com/usr/CollectiblesShop",
                "CollectiblesShop | eBay",
                "",
            )],
        )
        .hanging("Funko official site");
    let (service, gateway) = service(
        config_with(true, true, false),
        Fixtures::new(gateway, pages, mail),
    );
    let handle = service.run_discovery(&["Funko".into()]).await.unwrap();

    let mut log = service.subscribe_log(handle.run_id).await.unwrap();
    while let Some(event) = log.next().await {
        if event.kind == LogKind::CandidateAccepted {
            break;
        }
    }
    service.cancel(handle.run_id).await.unwrap();
    // Repeated cancel is harmless while the run winds down.
    service.cancel(handle.run_id).await.unwrap();
    let issued_at_cancel = gateway.issued().len();

    let result = tokio::time::timeout(Duration::from_secs(5), service.wait(handle.run_id))
        .await
        .expect("run ends within the grace period")
        .unwrap();

    assert_eq!(result.run.state, RunState::Cancelled);
    assert_eq!(gateway.issued().len(), issued_at_cancel);
    assert_eq!(result.stats.per_strategy["marketplace_ebay"], 1);
    assert_eq!(result.stats.per_strategy["brand_site"], 0);
    let summed: usize = result.stats.per_strategy.values().sum();
    assert_eq!(summed, result.stats.candidates_total);
    assert_eq!(result.companies.len(), 1);
    assert_eq!(result.run.per_strategy_counts, result.stats.per_strategy);

    assert!(matches!(
        service.resume(handle.run_id).await,
        Err(ScoutError::InvalidTransition { .. })
    ));
}
