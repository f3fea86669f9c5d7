//! Integration tests for the scraper
//!
//! These tests use wiremock to create mock HTTP servers and drive the real
//! reqwest transport through complete scrape runs.

use cardeals::config::{Config, HttpConfig, SelectorConfig, SiteConfig, SiteKind};
use cardeals::crawler::{scrape, Coordinator, Fetcher};
use cardeals::sites::MobileBg;
use cardeals::storage::{CarStatus, SqliteStorage, Storage};
use cardeals::{FilterConfig, ScrapeError, StopReason};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// HTTP settings for tests: plain HTTP allowed, no waiting between retries
fn test_http_config() -> HttpConfig {
    HttpConfig {
        timeout_secs: 5,
        connect_timeout_secs: 2,
        max_retries: 2,
        base_delay_ms: 0,
        max_delay_ms: 0,
        jitter: false,
        https_only: false,
        ..HttpConfig::default()
    }
}

/// Creates a configurable-site configuration pointing at the mock server
fn create_test_config(base_url: &str) -> Config {
    let mut config = Config::default();
    config.http = test_http_config();
    config.scrape.site = SiteKind::Configurable;
    config.scrape.page_delay_ms = 0;
    config.site = Some(SiteConfig {
        name: "mock-autos".to_string(),
        base_url: base_url.to_string(),
        search_path: "/search".to_string(),
        page_param: "page".to_string(),
        per_page: Some(20),
        currency: "EUR".to_string(),
        selectors: SelectorConfig::default(),
    });
    config
}

fn listing(id: &str) -> String {
    format!(
        r#"<div class="listing">
  <a href="/cars/{id}"><h2 class="listing-title">Mercedes GLC {id}</h2></a>
  <span class="listing-price">€ 28,900</span>
  <span class="listing-year">2020</span>
  <span class="listing-mileage">64,000 km</span>
</div>"#
    )
}

/// A results page with `count` listings and an optional next link
fn results_page(prefix: &str, count: usize, next: bool) -> String {
    let listings: String = (0..count)
        .map(|i| listing(&format!("{}-{}", prefix, i)))
        .collect();
    let next_link = if next {
        r#"<a rel="next" href="?page=next">Next</a>"#
    } else {
        ""
    };
    format!(
        r#"<html><body><div class="listings">{}</div><nav class="pagination"><a href="?page=1">1</a>{}</nav></body></html>"#,
        listings, next_link
    )
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "text/html; charset=utf-8")
}

fn filters(max_pages: u32) -> FilterConfig {
    let mut filters = FilterConfig::new("Mercedes", "GLC");
    filters.max_pages = max_pages;
    filters
}

async fn request_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .map(|requests| requests.len())
        .unwrap_or(0)
}

#[tokio::test]
async fn test_page_cap_stops_pagination() {
    let mock_server = MockServer::start().await;

    // Page-specific mocks are mounted before the page 1 fallback
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("page", "2"))
        .respond_with(html(results_page("p2", 5, true)))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("brand", "Mercedes"))
        .and(query_param("model", "GLC"))
        .respond_with(html(results_page("p1", 20, true)))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri());
    let outcome = scrape(&config, &filters(2), CancellationToken::new())
        .await
        .expect("scrape should succeed");

    assert_eq!(outcome.records.len(), 25);
    assert_eq!(outcome.pages_fetched, 2);
    assert_eq!(outcome.stop_reason, StopReason::PageCap);
    assert_eq!(request_count(&mock_server).await, 2);

    let expected = format!("{}/cars/p1-0", mock_server.uri());
    assert!(outcome.records.iter().any(|r| r.url == expected));
    assert!(outcome
        .records
        .iter()
        .all(|r| r.source_site.as_deref() == Some("mock-autos")));
}

#[tokio::test]
async fn test_later_page_failure_returns_partial_results() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("page", "2"))
        .respond_with(html(results_page("p2", 4, true)))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(html(results_page("p1", 4, true)))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri());
    let outcome = scrape(&config, &filters(5), CancellationToken::new())
        .await
        .expect("a failure after page 1 is not fatal");

    assert_eq!(outcome.records.len(), 8);
    assert_eq!(outcome.pages_fetched, 2);
    assert!(outcome.is_partial());
    assert!(matches!(
        outcome.stop_reason,
        StopReason::PageFailed { page: 3, .. }
    ));
    // Pages 1 and 2, then page 3 with two retries
    assert_eq!(request_count(&mock_server).await, 5);
}

#[tokio::test]
async fn test_first_page_not_found_is_fatal() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri());
    let result = scrape(&config, &filters(5), CancellationToken::new()).await;

    assert!(matches!(result, Err(ScrapeError::PageNotFound { .. })));
    assert_eq!(request_count(&mock_server).await, 1);
}

#[tokio::test]
async fn test_transient_error_is_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(html(results_page("p1", 3, false)))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri());
    let outcome = scrape(&config, &filters(5), CancellationToken::new())
        .await
        .expect("a single 503 should be retried");

    assert_eq!(outcome.records.len(), 3);
    assert_eq!(outcome.stop_reason, StopReason::Exhausted);
    assert_eq!(request_count(&mock_server).await, 2);
}

#[tokio::test]
async fn test_interstitial_first_page_is_fatal() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(html(
            "<html><body><h1>Please verify you are human</h1></body></html>".to_string(),
        ))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri());
    let result = scrape(&config, &filters(5), CancellationToken::new()).await;
    assert!(matches!(result, Err(ScrapeError::Parse { .. })));
}

const MOBILE_BG_SEARCH: &str = "/obiavi/avtomobili-dzhipove/bmw/x5/namira-se-v-balgariya";

fn mobile_bg_item(id: u32, km: u32) -> String {
    format!(
        r#"<div class="item">
  <a class="title" href="/obiava-{id}/bmw-x5">BMW X5 xDrive30d</a>
  <div class="price"><div>55 000 лв.</div></div>
  <div class="params"><span>март 2018 г.</span><span>{km} км</span><span>Дизелов</span></div>
  <div class="seller"><div class="location">гр. Пловдив</div></div>
</div>"#
    )
}

async fn mount_mobile_bg(mock_server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(format!("{}/p-2", MOBILE_BG_SEARCH)))
        .respond_with(html(format!(
            r#"<html><body>{}{}<div class="pagination"><a href="/p-1">1</a><a href="/p-2">2</a></div></body></html>"#,
            mobile_bg_item(3, 90_000),
            // Also listed on page 1
            mobile_bg_item(1, 45_000),
        )))
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(MOBILE_BG_SEARCH))
        .respond_with(html(format!(
            r#"<html><body><div class="resultsInfoBox">3 обяви</div>{}{}<div class="pagination"><a href="/p-1">1</a><a href="/p-2">Напред</a></div></body></html>"#,
            mobile_bg_item(1, 45_000),
            mobile_bg_item(2, 210_000),
        )))
        .mount(mock_server)
        .await;
}

fn mobile_bg_coordinator(base_url: &str) -> Coordinator {
    let marketplace = MobileBg::with_base_url(base_url).expect("mock server URL is valid");
    let fetcher = Fetcher::from_config(&test_http_config()).expect("client builds");
    Coordinator::new(Box::new(marketplace), fetcher)
}

#[tokio::test]
async fn test_mobile_bg_paging_and_local_filters() {
    let mock_server = MockServer::start().await;
    mount_mobile_bg(&mock_server).await;

    let mut filters = FilterConfig::new("BMW", "X5");
    filters.km_max = Some(150_000);

    let outcome = mobile_bg_coordinator(&mock_server.uri())
        .run(&filters)
        .await
        .expect("scrape should succeed");

    assert_eq!(outcome.pages_fetched, 2);
    assert_eq!(outcome.stop_reason, StopReason::Exhausted);

    // Listing 2 exceeds km_max; listing 1 appears twice but is kept once
    let mut urls: Vec<String> = outcome.records.iter().map(|r| r.url.clone()).collect();
    urls.sort();
    assert_eq!(
        urls,
        vec![
            format!("{}/obiava-1/bmw-x5", mock_server.uri()),
            format!("{}/obiava-3/bmw-x5", mock_server.uri()),
        ]
    );

    let first = outcome
        .records
        .iter()
        .find(|r| r.url.ends_with("/obiava-1/bmw-x5"))
        .expect("listing 1 present");
    assert_eq!(first.mileage_km, Some(45_000));
    assert_eq!(first.year, Some(2018));
    assert_eq!(first.raw_location.as_deref(), Some("гр. Пловдив"));
}

#[tokio::test]
async fn test_exhausted_run_marks_vanished_cars_removed() {
    let mock_server = MockServer::start().await;
    mount_mobile_bg(&mock_server).await;

    let dir = tempfile::tempdir().expect("temp dir");
    let mut storage = SqliteStorage::new(&dir.path().join("cardeals.db")).expect("db opens");

    let filters = FilterConfig::new("BMW", "X5");
    let query = filters.query_key();

    // A listing from an earlier run that is no longer on the site
    let earlier = storage.create_run("", &query).expect("run created");
    let gone = cardeals::CarRecord::new("BMW X5 (sold)", "https://www.mobile.bg/obiava-99");
    storage.upsert_car(&gone, &query, earlier).expect("stored");

    let run_id = storage.create_run("", &query).expect("run created");
    let outcome = mobile_bg_coordinator(&mock_server.uri())
        .run(&filters)
        .await
        .expect("scrape should succeed");
    assert_eq!(outcome.stop_reason, StopReason::Exhausted);
    assert_eq!(outcome.records.len(), 3);

    let new_cars = storage
        .upsert_cars(&outcome.records, &query, run_id)
        .expect("stored");
    assert_eq!(new_cars, 3);
    assert_eq!(storage.mark_removed(&query, run_id).expect("marked"), 1);

    assert_eq!(storage.count_cars_by_status(CarStatus::Active).unwrap(), 3);
    assert_eq!(storage.count_cars_by_status(CarStatus::Removed).unwrap(), 1);
}
