//! End-to-end harvests of a mock shop over HTTP
//!
//! These tests use wiremock to serve a small site and drive `run_harvest`
//! with the keyword classifier and a SQLite database in a temp directory.

use product_harvester::config::parse_config;
use product_harvester::harvest::run_harvest;
use product_harvester::output::load_statistics;
use product_harvester::storage::{HarvestArchive, RunStatus, SqliteStorage};
use product_harvester::{normalize_url, Lifecycle, StopReason};
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FILLER: &str = "Our workshop has been making furniture and lighting by hand for \
three generations. Every piece is built to order from sustainably sourced timber and \
finished with natural oils, so no two items are quite the same.";

async fn page(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=utf-8"))
        .mount(server)
        .await;
}

/// Home page linking to two products, a duplicate-titled product and an
/// about page
async fn mock_shop() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /cart"))
        .mount(&server)
        .await;

    page(
        &server,
        "/",
        format!(
            r#"<html><head><title>Example Shop</title></head><body>
            <p>{}</p>
            <a href="/product/lamp">Lamp</a>
            <a href="/product/lamp?utm_source=home">Lamp again</a>
            <a href="/product/lamp-brass">Lamp in brass</a>
            <a href="/product/chair">Chair</a>
            <a href="/about">About</a>
            <a href="/cart">Cart</a>
            </body></html>"#,
            FILLER
        ),
    )
    .await;

    page(
        &server,
        "/product/lamp",
        r#"<html><head><title>Brass Lamp</title>
        <script type="application/ld+json">
        {"@context": "https://schema.org", "@type": "Product", "name": "Brass Lamp",
         "sku": "LMP-1",
         "offers": {"@type": "Offer", "price": "49.50", "priceCurrency": "EUR",
                    "availability": "https://schema.org/InStock"}}
        </script></head><body><h1>Brass Lamp</h1></body></html>"#
            .to_string(),
    )
    .await;

    page(
        &server,
        "/product/lamp-brass",
        "<html><head><title>  Brass   Lamp </title></head><body><h1>Brass Lamp</h1></body></html>"
            .to_string(),
    )
    .await;

    page(
        &server,
        "/product/chair",
        r#"<html><head><title>Oak Chair</title>
        <meta property="og:title" content="Oak Chair">
        <meta property="product:price:amount" content="120">
        <meta property="product:price:currency" content="EUR">
        </head><body></body></html>"#
            .to_string(),
    )
    .await;

    page(
        &server,
        "/about",
        "<html><head><title>About us</title></head><body><a href=\"/\">Home</a></body></html>"
            .to_string(),
    )
    .await;

    server
}

fn lifecycle(server: &MockServer, dir: &Path, target: usize) -> Lifecycle {
    let toml = format!(
        r#"
[harvest]
root-url = "{root}"
target-products = {target}
batch-size = 3
concurrent-requests = 2
classifier-batch-size = 10

[crawler]
request-delay = 0
request-timeout = 5

[user-agent]
crawler-name = "TestHarvester"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[classifier]
kind = "keywords"
keywords = ["/product/"]

[output]
database-path = "{db}"
results-dir = "{results}"
"#,
        root = server.uri(),
        target = target,
        db = dir.join("harvest.db").display(),
        results = dir.join("results").display(),
    );

    let config = parse_config(&toml).unwrap();
    Lifecycle::new(config, "test-hash".to_string(), None).unwrap()
}

#[tokio::test]
async fn test_harvest_stores_unique_products_and_exports_json() {
    let server = mock_shop().await;
    let dir = TempDir::new().unwrap();
    let lifecycle = lifecycle(&server, dir.path(), 10);

    let report = run_harvest(&lifecycle).await.unwrap();

    assert_eq!(report.summary.stop_reason, StopReason::FrontierExhausted);
    assert_eq!(report.summary.execution_number, 1);
    assert_eq!(report.summary.accepted, 2);
    assert_eq!(report.exported, 2);
    assert!(report
        .results_path
        .to_string_lossy()
        .ends_with("127.0.0.1_1.json"));

    let exported: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report.results_path).unwrap()).unwrap();
    let products = exported.as_array().unwrap();
    let mut titles: Vec<_> = products
        .iter()
        .map(|p| p["title"].as_str().unwrap().to_string())
        .collect();
    titles.sort();
    assert_eq!(titles, vec!["Brass Lamp", "Oak Chair"]);

    let lamp = products.iter().find(|p| p["title"] == "Brass Lamp").unwrap();
    assert_eq!(lamp["price"], "49.50");
    assert_eq!(lamp["availability"], "InStock");
    let chair = products.iter().find(|p| p["title"] == "Oak Chair").unwrap();
    assert_eq!(chair["price"], "120");

    let storage = SqliteStorage::new(&dir.path().join("harvest.db")).unwrap();
    let execution = storage
        .latest_execution(&report.root_url)
        .unwrap()
        .unwrap();
    assert_eq!(execution.status, RunStatus::Completed);
    assert_eq!(execution.products_found, 2);
    assert_eq!(execution.config_hash, "test-hash");
    assert!(execution.finished_at.is_some());
}

#[tokio::test]
async fn test_second_execution_skips_known_titles() {
    let server = mock_shop().await;
    let dir = TempDir::new().unwrap();

    let first = run_harvest(&lifecycle(&server, dir.path(), 10)).await.unwrap();
    let second = run_harvest(&lifecycle(&server, dir.path(), 10)).await.unwrap();

    assert_eq!(first.summary.accepted, 2);
    assert_eq!(second.summary.execution_number, 2);
    assert_eq!(second.summary.accepted, 0);
    assert_eq!(second.exported, 0);

    let storage = SqliteStorage::new(&dir.path().join("harvest.db")).unwrap();
    let root = normalize_url(&server.uri()).unwrap();
    let stats = load_statistics(&storage, root.as_str()).unwrap();
    assert_eq!(stats.executions.len(), 2);
    assert_eq!(stats.total_products, 2);
    assert_eq!(stats.count_with_status(RunStatus::Completed), 2);
}

#[tokio::test]
async fn test_target_stops_harvest_early() {
    let server = mock_shop().await;
    let dir = TempDir::new().unwrap();

    let report = run_harvest(&lifecycle(&server, dir.path(), 1)).await.unwrap();

    assert_eq!(report.summary.stop_reason, StopReason::TargetReached);
    assert!(report.summary.accepted >= 1);
}

#[tokio::test]
async fn test_interrupted_before_start_records_interrupted_execution() {
    let server = mock_shop().await;
    let dir = TempDir::new().unwrap();
    let lifecycle = lifecycle(&server, dir.path(), 10);
    lifecycle.shutdown().cancel();

    let report = run_harvest(&lifecycle).await.unwrap();

    assert_eq!(report.summary.stop_reason, StopReason::Interrupted);
    assert_eq!(report.summary.accepted, 0);

    let storage = SqliteStorage::new(&dir.path().join("harvest.db")).unwrap();
    let execution = storage
        .find_execution(&report.root_url, 1)
        .unwrap()
        .unwrap();
    assert_eq!(execution.status, RunStatus::Interrupted);
    assert_eq!(storage.count_products(execution.id).unwrap(), 0);
}
