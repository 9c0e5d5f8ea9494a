//! Integration tests for the HetrixTools exporter.
//!
//! A fake HetrixTools API is served with axum on an ephemeral port; the
//! exporter is pointed at it and driven end to end.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use parking_lot::Mutex;
use tokio::sync::watch;

use hetrixtools_exporter::config::ApiConfig;
use hetrixtools_exporter::{ClientError, HetrixClient, HttpServer, MonitorCollector};

const API_KEY: &str = "test-key";
const MONITORS_PATH: &str = "/v3/uptime-monitors";

/// How the fake upstream answers.
#[derive(Clone)]
enum Upstream {
    /// Serve the given page bodies; page N is `pages[N - 1]`.
    Pages(Vec<String>),
    /// Respond with a fixed status and body.
    Fixed(StatusCode, String),
    /// 429 with a `Retry-After` header.
    RateLimited(u64),
    /// Sleep before answering.
    Slow(Duration),
}

struct FakeApi {
    upstream: Upstream,
    requests: Mutex<Vec<HashMap<String, String>>>,
}

async fn monitors_handler(
    State(api): State<Arc<FakeApi>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    api.requests.lock().push(query.clone());

    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {}", API_KEY));
    if !authorized {
        return (StatusCode::UNAUTHORIZED, r#"{"error":"unauthorized"}"#).into_response();
    }

    match &api.upstream {
        Upstream::Pages(pages) => {
            let page: usize = query.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
            match pages.get(page.saturating_sub(1)) {
                Some(body) => (StatusCode::OK, body.clone()).into_response(),
                None => (StatusCode::NOT_FOUND, "no such page").into_response(),
            }
        }
        Upstream::Fixed(status, body) => (*status, body.clone()).into_response(),
        Upstream::RateLimited(secs) => (
            StatusCode::TOO_MANY_REQUESTS,
            [("retry-after", secs.to_string())],
            "slow down",
        )
            .into_response(),
        Upstream::Slow(delay) => {
            tokio::time::sleep(*delay).await;
            (StatusCode::OK, page_body(&[], None)).into_response()
        }
    }
}

/// Start the fake API and return its state and base URL.
async fn start_fake_api(upstream: Upstream) -> (Arc<FakeApi>, String) {
    let api = Arc::new(FakeApi {
        upstream,
        requests: Mutex::new(Vec::new()),
    });
    let router = Router::new()
        .route(MONITORS_PATH, get(monitors_handler))
        .with_state(api.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    (api, format!("http://{}{}", addr, MONITORS_PATH))
}

fn api_config(base_url: &str) -> ApiConfig {
    ApiConfig {
        api_key: API_KEY.to_string(),
        base_url: base_url.to_string(),
        ..Default::default()
    }
}

fn monitor_json(id: &str, locations: &[(&str, &str, u64)]) -> String {
    let locations: Vec<String> = locations
        .iter()
        .map(|(loc, status, ms)| {
            format!(
                r#""{}": {{ "uptime_status": "{}", "response_time": {}, "last_check": 1700000000 }}"#,
                loc, status, ms
            )
        })
        .collect();

    format!(
        r#"{{
            "id": "{id}",
            "name": "Monitor {id}",
            "type": "website",
            "target": "https://{id}.example.com",
            "timeout": 10,
            "uptime_status": "up",
            "ssl_expiration_date": null,
            "port": null,
            "locations": {{ {} }}
        }}"#,
        locations.join(",")
    )
}

fn page_body(monitors: &[String], next: Option<u32>) -> String {
    let next = next.map_or("null".to_string(), |n| n.to_string());
    format!(
        r#"{{
            "monitors": [{}],
            "meta": {{
                "total": {},
                "total_filtered": {},
                "returned": {},
                "pagination": {{ "current": 1, "last": 1, "previous": null, "next": {} }}
            }}
        }}"#,
        monitors.join(","),
        monitors.len(),
        monitors.len(),
        monitors.len(),
        next
    )
}

fn sample_lines<'a>(output: &'a str, name: &str) -> Vec<&'a str> {
    let prefix = format!("{}{{", name);
    output
        .lines()
        .filter(|line| line.starts_with(&prefix))
        .collect()
}

const STATUS: &str = "hetrixtools_uptime_monitor_status";
const RESPONSE_TIME: &str = "hetrixtools_uptime_monitor_response_time_seconds";

#[tokio::test]
async fn test_collect_emits_one_pair_per_location() {
    let body = page_body(
        &[
            monitor_json("a", &[("nyc", "up", 120), ("ams", "down", 3000)]),
            monitor_json("b", &[("sfo", "up", 80)]),
        ],
        None,
    );
    let (api, base_url) = start_fake_api(Upstream::Pages(vec![body])).await;
    let collector = MonitorCollector::new(&api_config(&base_url)).unwrap();

    let output = collector.render().await.unwrap();

    assert_eq!(sample_lines(&output, STATUS).len(), 3);
    assert_eq!(sample_lines(&output, RESPONSE_TIME).len(), 3);
    assert!(output.contains("location=\"ams\""));
    assert!(output.contains("status_text=\"down\""));

    let requests = api.requests.lock();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].get("per_page").map(String::as_str), Some("200"));
    assert_eq!(requests[0].get("page").map(String::as_str), Some("1"));

    let stats = collector.stats();
    assert_eq!(stats.scrapes_total, 1);
    assert_eq!(stats.scrapes_failed, 0);
    assert_eq!(stats.last_monitor_count, 2);
    assert_eq!(stats.last_sample_pairs, 3);
}

#[tokio::test]
async fn test_each_scrape_fetches_fresh_data() {
    let body = page_body(&[monitor_json("a", &[("nyc", "up", 1)])], None);
    let (api, base_url) = start_fake_api(Upstream::Pages(vec![body])).await;
    let collector = MonitorCollector::new(&api_config(&base_url)).unwrap();

    collector.render().await.unwrap();
    collector.render().await.unwrap();

    assert_eq!(api.requests.lock().len(), 2);
    assert_eq!(collector.stats().scrapes_total, 2);
}

#[tokio::test]
async fn test_malformed_json_yields_no_samples() {
    let (_api, base_url) = start_fake_api(Upstream::Fixed(
        StatusCode::OK,
        r#"{"monitors": [ {"id": "a", "#.to_string(),
    ))
    .await;
    let collector = MonitorCollector::new(&api_config(&base_url)).unwrap();

    let output = collector.render().await.unwrap();

    assert!(sample_lines(&output, STATUS).is_empty());
    assert!(sample_lines(&output, RESPONSE_TIME).is_empty());
    assert_eq!(collector.stats().scrapes_failed, 1);
}

#[tokio::test]
async fn test_server_error_yields_no_samples() {
    let (_api, base_url) = start_fake_api(Upstream::Fixed(
        StatusCode::INTERNAL_SERVER_ERROR,
        "boom".to_string(),
    ))
    .await;
    let collector = MonitorCollector::new(&api_config(&base_url)).unwrap();

    let output = collector.render().await.unwrap();

    assert!(sample_lines(&output, STATUS).is_empty());
    assert_eq!(collector.stats().scrapes_failed, 1);
}

#[tokio::test]
async fn test_client_status_error() {
    let (_api, base_url) = start_fake_api(Upstream::Fixed(
        StatusCode::INTERNAL_SERVER_ERROR,
        "boom".to_string(),
    ))
    .await;
    let client = HetrixClient::new(&api_config(&base_url)).unwrap();

    match client.fetch_monitors().await {
        Err(ClientError::Status { status, body }) => {
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR.as_u16());
            assert_eq!(body, "boom");
        }
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_client_wrong_api_key() {
    let body = page_body(&[], None);
    let (_api, base_url) = start_fake_api(Upstream::Pages(vec![body])).await;
    let config = ApiConfig {
        api_key: "wrong".to_string(),
        ..api_config(&base_url)
    };
    let client = HetrixClient::new(&config).unwrap();

    match client.fetch_monitors().await {
        Err(ClientError::Status { status, .. }) => {
            assert_eq!(status, StatusCode::UNAUTHORIZED.as_u16());
        }
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_client_rate_limited() {
    let (_api, base_url) = start_fake_api(Upstream::RateLimited(17)).await;
    let client = HetrixClient::new(&api_config(&base_url)).unwrap();

    match client.fetch_monitors().await {
        Err(ClientError::RateLimited { retry_after }) => assert_eq!(retry_after, Some(17)),
        other => panic!("expected rate limit error, got {:?}", other),
    }

    let collector = MonitorCollector::new(&api_config(&base_url)).unwrap();
    let output = collector.render().await.unwrap();
    assert!(sample_lines(&output, STATUS).is_empty());
    assert_eq!(collector.stats().scrapes_rate_limited, 1);
}

#[tokio::test]
async fn test_client_timeout() {
    let (_api, base_url) = start_fake_api(Upstream::Slow(Duration::from_secs(3))).await;
    let config = ApiConfig {
        timeout_secs: 1,
        ..api_config(&base_url)
    };
    let client = HetrixClient::new(&config).unwrap();

    match client.fetch_monitors().await {
        Err(ClientError::Request(e)) => assert!(e.is_timeout()),
        other => panic!("expected timeout, got {:?}", other),
    }
}

#[tokio::test]
async fn test_pagination_stops_at_first_page_by_default() {
    let pages = vec![
        page_body(&[monitor_json("a", &[("nyc", "up", 1)])], Some(2)),
        page_body(&[monitor_json("b", &[("nyc", "up", 1)])], None),
    ];
    let (api, base_url) = start_fake_api(Upstream::Pages(pages)).await;
    let client = HetrixClient::new(&api_config(&base_url)).unwrap();

    let monitors = client.fetch_monitors().await.unwrap();

    assert_eq!(monitors.len(), 1);
    assert_eq!(monitors[0].id, "a");
    assert_eq!(api.requests.lock().len(), 1);
}

#[tokio::test]
async fn test_pagination_follows_next() {
    let pages = vec![
        page_body(&[monitor_json("a", &[("nyc", "up", 1)])], Some(2)),
        page_body(&[monitor_json("b", &[("nyc", "up", 1)])], Some(3)),
        page_body(&[monitor_json("c", &[("nyc", "up", 1)])], None),
    ];
    let (api, base_url) = start_fake_api(Upstream::Pages(pages)).await;
    let config = ApiConfig {
        max_pages: 10,
        ..api_config(&base_url)
    };
    let client = HetrixClient::new(&config).unwrap();

    let monitors = client.fetch_monitors().await.unwrap();

    let ids: Vec<&str> = monitors.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);

    let pages: Vec<String> = api
        .requests
        .lock()
        .iter()
        .filter_map(|q| q.get("page").cloned())
        .collect();
    assert_eq!(pages, vec!["1", "2", "3"]);
}

#[tokio::test]
async fn test_pagination_respects_max_pages() {
    let pages = vec![
        page_body(&[monitor_json("a", &[])], Some(2)),
        page_body(&[monitor_json("b", &[])], Some(3)),
        page_body(&[monitor_json("c", &[])], None),
    ];
    let (api, base_url) = start_fake_api(Upstream::Pages(pages)).await;
    let config = ApiConfig {
        max_pages: 2,
        ..api_config(&base_url)
    };
    let client = HetrixClient::new(&config).unwrap();

    let monitors = client.fetch_monitors().await.unwrap();

    assert_eq!(monitors.len(), 2);
    assert_eq!(api.requests.lock().len(), 2);
}

#[tokio::test]
async fn test_monitor_repeated_across_pages_counted_once() {
    let pages = vec![
        page_body(&[monitor_json("a", &[("nyc", "up", 10)])], Some(2)),
        page_body(
            &[
                monitor_json("a", &[("nyc", "up", 10)]),
                monitor_json("b", &[("nyc", "down", 0)]),
            ],
            None,
        ),
    ];
    let (_api, base_url) = start_fake_api(Upstream::Pages(pages)).await;
    let config = ApiConfig {
        max_pages: 2,
        ..api_config(&base_url)
    };
    let collector = MonitorCollector::new(&config).unwrap();

    let output = collector.render().await.unwrap();

    assert_eq!(sample_lines(&output, STATUS).len(), 2);
    assert_eq!(sample_lines(&output, RESPONSE_TIME).len(), 2);
    assert_eq!(collector.stats().last_sample_pairs, 2);
}

#[tokio::test]
async fn test_quoted_monitor_name_end_to_end() {
    let monitor = monitor_json("a", &[("nyc", "up", 10)])
        .replace(r#""name": "Monitor a""#, r#""name": "My \"prod\" site\nnext""#);
    let (_api, base_url) = start_fake_api(Upstream::Pages(vec![page_body(&[monitor], None)])).await;
    let collector = MonitorCollector::new(&api_config(&base_url)).unwrap();

    let output = collector.render().await.unwrap();

    let status = sample_lines(&output, STATUS);
    assert_eq!(status.len(), 1);
    assert!(status[0].contains(r#"name="My \"prod\" site\nnext""#), "got: {}", output);
}

#[tokio::test]
async fn test_http_server_end_to_end() {
    let body = page_body(&[monitor_json("a", &[("nyc", "up", 250)])], None);
    let (_api, base_url) = start_fake_api(Upstream::Pages(vec![body])).await;
    let collector = Arc::new(MonitorCollector::new(&api_config(&base_url)).unwrap());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let server = HttpServer::new(collector.clone(), addr, "/metrics".to_string());
    let server_handle = tokio::spawn(async move { server.serve(listener, shutdown_rx).await });

    let client = reqwest::Client::new();

    let ready = client
        .get(format!("http://{}/ready", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(ready.status(), StatusCode::SERVICE_UNAVAILABLE.as_u16());

    let response = client
        .get(format!("http://{}/metrics", addr))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let body = response.text().await.unwrap();

    let status = sample_lines(&body, STATUS);
    assert_eq!(status.len(), 1);
    assert!(status[0].contains("status_text=\"up\""));

    let response_time = sample_lines(&body, RESPONSE_TIME);
    assert_eq!(response_time.len(), 1);
    let value: f64 = response_time[0].rsplit(' ').next().unwrap().parse().unwrap();
    assert_eq!(value, 0.25);

    let ready = client
        .get(format!("http://{}/ready", addr))
        .send()
        .await
        .unwrap();
    assert!(ready.status().is_success());

    let _ = shutdown_tx.send(true);
    let result = tokio::time::timeout(Duration::from_secs(5), server_handle).await;
    assert!(matches!(result, Ok(Ok(Ok(())))));
}
