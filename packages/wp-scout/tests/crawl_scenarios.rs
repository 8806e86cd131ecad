//! End-to-end crawl scenarios against a mock transport and a real CSV store.
//!
//! Each test drives the full loop:
//! 1. Search for the name
//! 2. Expand candidates into probe targets
//! 3. Probe until the first match
//! 4. Append the match to the result file

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::tempdir;
use wp_scout::{
    testing::MockTransport, CandidateExpander, CrawlCoordinator, CsvMissLog, CsvResultStore,
    DelayConfig, Hostname, OrganizationName, ProbePath, ScoutConfig, TrafficClass,
};

const SEARCH_HOST: &str = "search.test";

/// Config pointed at the mock search host, with no delays.
fn test_config() -> ScoutConfig {
    ScoutConfig::new()
        .with_search_url(format!("https://{SEARCH_HOST}/search"))
        .with_delays(DelayConfig::none(), DelayConfig::none())
        .with_prefixes(["blog."])
        .with_paths([ProbePath::content("/"), ProbePath::exists("/wp-login.php")])
}

fn names(list: &[&str]) -> Vec<OrganizationName> {
    list.iter().filter_map(|n| OrganizationName::new(n)).collect()
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

#[tokio::test]
async fn test_scenario_a_first_match_is_recorded_and_probing_stops() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("results.csv");

    let mock = Arc::new(
        MockTransport::new()
            .with_search_results(SEARCH_HOST, &["https://acme.org/about-us"])
            .with_html(
                "https://acme.org/",
                r#"<html><head><link rel="stylesheet" href="https://acme.org/wp-content/themes/acme/style.css"></head></html>"#,
            )
            .with_html("https://blog.acme.org/", "/wp-content/"),
    );
    let store = CsvResultStore::open(&output).await.unwrap();
    let config = test_config();
    let coordinator = CrawlCoordinator::from_config(&config, mock.clone(), store).unwrap();

    let summary = coordinator.run(names(&["Acme Health"])).await.unwrap();

    assert_eq!(summary.found, 1);
    assert_eq!(read(&output), "name,domain\nAcme Health,acme.org\n");
    // one search, one probe
    assert_eq!(mock.call_count(), 2);
    assert!(!mock.requested("https://blog.acme.org/"));

    // blog.acme.org was in the sequence, just never reached
    let targets = CandidateExpander::from_config(&config).expand(&[Hostname::parse("acme.org").unwrap()]);
    assert!(targets.iter().any(|t| t.host.as_str() == "blog.acme.org"));
}

#[tokio::test]
async fn test_scenario_b_no_candidates_writes_nothing() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("results.csv");

    let mock = Arc::new(MockTransport::new().with_search_results(SEARCH_HOST, &[]));
    let store = CsvResultStore::open(&output).await.unwrap();
    let coordinator = CrawlCoordinator::from_config(&test_config(), mock.clone(), store).unwrap();

    let summary = coordinator.run(names(&["Nowhere Org"])).await.unwrap();

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.exhausted, 1);
    assert_eq!(summary.found, 0);
    assert_eq!(read(&output), "name,domain\n");
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_scenario_c_throttled_probe_escalates_and_continues() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("results.csv");

    let mock = Arc::new(
        MockTransport::new()
            .with_search_results(SEARCH_HOST, &["https://acme.org/"])
            .with_status("https://acme.org/", 429)
            .with_html("http://acme.org/", "<meta name=\"generator\" content=\"WordPress 6.5\">"),
    );
    let config = test_config().with_delays(DelayConfig::none(), DelayConfig::new(10, 100));
    let store = CsvResultStore::open(&output).await.unwrap();
    let coordinator = CrawlCoordinator::from_config(&config, mock.clone(), store).unwrap();

    let start = tokio::time::Instant::now();
    let summary = coordinator.run(names(&["Acme Health"])).await.unwrap();

    assert_eq!(summary.found, 1);
    assert_eq!(
        mock.requested_urls(),
        vec![
            format!("https://{SEARCH_HOST}/search?q=Acme+Health+official+website&count=3"),
            "https://acme.org/".to_string(),
            "http://acme.org/".to_string(),
        ]
    );
    assert_eq!(
        coordinator.rate().current_delay(TrafficClass::Fetch),
        Duration::from_millis(100)
    );
    // second probe waited the escalated delay
    assert!(start.elapsed() >= Duration::from_millis(110));
    assert_eq!(read(&output), "name,domain\nAcme Health,acme.org\n");
}

#[tokio::test]
async fn test_restart_does_not_duplicate_rows() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("results.csv");
    let mock = Arc::new(
        MockTransport::new()
            .with_search_results(SEARCH_HOST, &["https://acme.org/"])
            .with_html("https://acme.org/", "/wp-content/"),
    );

    let store = CsvResultStore::open(&output).await.unwrap();
    let first = CrawlCoordinator::from_config(&test_config(), mock.clone(), store).unwrap();
    first.run(names(&["Acme Health"])).await.unwrap();
    drop(first);
    let calls_after_first = mock.call_count();

    let store = CsvResultStore::open(&output).await.unwrap();
    let second = CrawlCoordinator::from_config(&test_config(), mock.clone(), store).unwrap();
    let summary = second
        .run(names(&["Acme Health", "Acme Health", "Beacon Care"]))
        .await
        .unwrap();

    assert_eq!(summary.total_input, 2);
    assert_eq!(summary.already_done, 1);
    assert_eq!(summary.found, 1);
    assert_eq!(
        read(&output),
        "name,domain\nAcme Health,acme.org\nBeacon Care,acme.org\n"
    );
    // only Beacon Care was searched and probed
    assert_eq!(mock.call_count(), calls_after_first + 2);
}

#[tokio::test]
async fn test_miss_log_skips_exhausted_names_on_restart() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("results.csv");
    let misses = dir.path().join("misses.csv");
    let mock = Arc::new(
        MockTransport::new()
            .with_search_results(SEARCH_HOST, &["https://plain.org/"])
            .with_html("https://plain.org/", "<html>static site</html>"),
    );

    for _ in 0..2 {
        let store = CsvResultStore::open(&output).await.unwrap();
        let coordinator = CrawlCoordinator::from_config(&test_config(), mock.clone(), store)
            .unwrap()
            .with_miss_log(CsvMissLog::open(&misses).await.unwrap());
        coordinator.run(names(&["Plain Org"])).await.unwrap();
    }

    assert_eq!(read(&output), "name,domain\n");
    assert_eq!(read(&misses), "name,reason\nPlain Org,exhausted\n");

    // search + 2 hosts x 2 paths x 2 schemes, once
    assert_eq!(mock.call_count(), 1 + 8);
}

#[tokio::test]
async fn test_throttled_search_is_retried_on_restart() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("results.csv");
    let misses = dir.path().join("misses.csv");

    let throttled = Arc::new(MockTransport::new().with_host_status(SEARCH_HOST, 429));
    let store = CsvResultStore::open(&output).await.unwrap();
    let first = CrawlCoordinator::from_config(&test_config(), throttled, store)
        .unwrap()
        .with_miss_log(CsvMissLog::open(&misses).await.unwrap());
    first.run(names(&["Acme Health"])).await.unwrap();
    drop(first);
    assert_eq!(read(&misses), "name,reason\n");

    let healthy = Arc::new(
        MockTransport::new()
            .with_search_results(SEARCH_HOST, &["https://acme.org/"])
            .with_html("https://acme.org/", "/wp-content/"),
    );
    let store = CsvResultStore::open(&output).await.unwrap();
    let second = CrawlCoordinator::from_config(&test_config(), healthy.clone(), store)
        .unwrap()
        .with_miss_log(CsvMissLog::open(&misses).await.unwrap());
    let summary = second.run(names(&["Acme Health"])).await.unwrap();

    assert_eq!(summary.already_done, 0);
    assert_eq!(summary.found, 1);
    assert_eq!(healthy.call_count(), 2);
    assert_eq!(read(&output), "name,domain\nAcme Health,acme.org\n");
}

#[tokio::test]
async fn test_exhausted_name_is_retried_without_miss_log() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("results.csv");
    let mock = Arc::new(MockTransport::new().with_search_results(SEARCH_HOST, &[]));

    for _ in 0..2 {
        let store = CsvResultStore::open(&output).await.unwrap();
        let coordinator =
            CrawlCoordinator::from_config(&test_config(), mock.clone(), store).unwrap();
        coordinator.run(names(&["Quiet Org"])).await.unwrap();
    }

    assert_eq!(mock.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_per_host_cap_holds_with_parallel_workers() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("results.csv");
    let mock = Arc::new(
        MockTransport::new()
            .with_search_results(SEARCH_HOST, &["https://shared.org/"])
            .with_html("https://shared.org/", "/wp-includes/")
            .with_latency(Duration::from_millis(50)),
    );
    let config = test_config().with_parallelism(4).with_per_host_limit(1);
    let store = CsvResultStore::open(&output).await.unwrap();
    let coordinator = CrawlCoordinator::from_config(&config, mock.clone(), store).unwrap();

    let summary = coordinator
        .run(names(&["Alpha", "Bravo", "Charlie", "Delta"]))
        .await
        .unwrap();

    assert_eq!(summary.found, 4);
    // one request at a time per host: search.test and shared.org
    assert!(mock.max_in_flight() <= 2);
    assert_eq!(read(&output).lines().count(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_stop_mid_run_leaves_remaining_names_for_restart() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("results.csv");
    let mock = Arc::new(
        MockTransport::new()
            .with_search_results(SEARCH_HOST, &["https://acme.org/"])
            .with_html("https://acme.org/", "/wp-content/"),
    );
    let config = test_config().with_delays(DelayConfig::new(1_000, 1_000), DelayConfig::none());
    let store = CsvResultStore::open(&output).await.unwrap();
    let coordinator = CrawlCoordinator::from_config(&config, mock.clone(), store).unwrap();

    let handle = coordinator.handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        handle.stop();
    });

    let summary = coordinator
        .run(names(&["Alpha", "Bravo", "Charlie"]))
        .await
        .unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.found, 1);
    assert_eq!(read(&output), "name,domain\nAlpha,acme.org\n");
    assert!(!coordinator.handle().is_running());
}
