use super::*;
use serde_json::{Value, json};
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FEED_PATH: &str = "/feeds/posts/default";

fn entry_json(n: usize, year: i32) -> Value {
    json!({
        "title": {"type": "text", "$t": format!("Post {n}")},
        "published": {"$t": format!("{year}-06-01T12:00:00.000Z")},
        "updated": {"$t": format!("{year}-06-02T12:00:00.000Z")},
        "author": [{"name": {"$t": "Author"}}],
        "content": {"type": "html", "$t": format!("<p>Body {n}</p>")},
        "link": [{"rel": "alternate", "href": format!("https://test.blogspot.com/p/{n}.html")}]
    })
}

fn page_json(range: std::ops::Range<usize>, total: Option<usize>) -> Value {
    let entries: Vec<Value> = range.map(|n| entry_json(n, 2020)).collect();
    let mut feed = json!({ "entry": entries });
    if let Some(total) = total {
        feed["openSearch$totalResults"] = json!({ "$t": total.to_string() });
    }
    json!({ "version": "1.0", "feed": feed })
}

fn client_with(page_size: usize, strict: bool) -> FeedClient {
    let config = FeedConfig {
        page_size,
        strict_pagination: strict,
        request_timeout: Duration::from_millis(300),
        ..Default::default()
    };
    FeedClient::new(&config).unwrap()
}

async fn mount_page(server: &MockServer, start_index: usize, body: Value) {
    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .and(query_param("alt", "json"))
        .and(query_param("start-index", start_index.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

fn base_url(server: &MockServer) -> String {
    format!("{}{}", server.uri(), FEED_PATH)
}

#[test]
fn page_url_carries_pagination_parameters() {
    let client = client_with(500, false);
    let url = client
        .page_url("https://myblog.blogspot.com/feeds/posts/default", 501)
        .unwrap();
    assert_eq!(
        url,
        "https://myblog.blogspot.com/feeds/posts/default?alt=json&start-index=501&max-results=500"
    );
}

#[test]
fn page_url_rejects_garbage_base() {
    let client = client_with(500, false);
    assert!(matches!(
        client.page_url("not a url", 1),
        Err(Error::InvalidUrl { .. })
    ));
}

#[test]
fn progress_is_clamped_below_completion() {
    assert_eq!(progress_for(1, 500, 500, Some(1000)).percent, 50);
    assert_eq!(progress_for(501, 500, 1000, Some(1000)).percent, 99);
    // feed under-reports its total
    assert_eq!(progress_for(1, 10, 10, Some(5)).percent, 99);
}

#[test]
fn progress_falls_back_to_accumulated_count() {
    let progress = progress_for(1, 7, 7, None);
    assert_eq!(progress.estimated_total, 7);
    assert_eq!(progress.percent, 99);
    assert!(progress.message.contains('7'));

    assert_eq!(progress_for(1, 7, 7, Some(0)).estimated_total, 7);
}

#[tokio::test]
async fn fetches_two_full_pages_then_stops_on_empty_page() {
    let server = MockServer::start().await;
    mount_page(&server, 1, page_json(0..500, Some(1000))).await;
    mount_page(&server, 501, page_json(500..1000, Some(1000))).await;
    mount_page(&server, 1001, page_json(0..0, Some(1000))).await;

    let client = client_with(500, false);
    let cancel = CancellationToken::new();
    let mut reports = Vec::new();

    let outcome = client
        .fetch_all(&base_url(&server), &cancel, |p| reports.push(p.clone()))
        .await
        .unwrap();

    assert_eq!(outcome.entries.len(), 1000);
    assert!(outcome.halted.is_none());
    assert_eq!(outcome.entries[0].title, "Post 0");
    assert_eq!(outcome.entries[999].title, "Post 999");

    let percents: Vec<u8> = reports.iter().map(|p| p.percent).collect();
    assert_eq!(percents, vec![50, 99]);
    assert_eq!(reports[1].start_index, 501);
    assert_eq!(reports[1].fetched, 1000);
}

#[tokio::test]
async fn empty_first_page_yields_no_entries() {
    let server = MockServer::start().await;
    mount_page(&server, 1, json!({"feed": {"openSearch$totalResults": {"$t": "0"}}})).await;

    let client = client_with(500, false);
    let outcome = client
        .fetch_all(&base_url(&server), &CancellationToken::new(), |_| {})
        .await
        .unwrap();

    assert!(outcome.entries.is_empty());
    assert!(outcome.halted.is_none());
}

#[tokio::test]
async fn http_error_is_a_fetch_error_with_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client_with(500, false);
    let result = client
        .fetch_all(&base_url(&server), &CancellationToken::new(), |_| {})
        .await;

    match result {
        Err(Error::Fetch { status, url }) => {
            assert_eq!(status, 404);
            assert!(url.contains("start-index=1"));
        }
        other => panic!("expected Fetch error, got {other:?}"),
    }
}

#[tokio::test]
async fn http_error_on_later_page_fails_the_fetch() {
    let server = MockServer::start().await;
    mount_page(&server, 1, page_json(0..2, Some(4))).await;
    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .and(query_param("start-index", "3"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client_with(2, false);
    let result = client
        .fetch_all(&base_url(&server), &CancellationToken::new(), |_| {})
        .await;

    assert!(matches!(result, Err(Error::Fetch { status: 500, .. })));
}

#[tokio::test]
async fn malformed_page_ends_pagination_leniently() {
    let server = MockServer::start().await;
    mount_page(&server, 1, page_json(0..2, Some(4))).await;
    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .and(query_param("start-index", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let client = client_with(2, false);
    let outcome = client
        .fetch_all(&base_url(&server), &CancellationToken::new(), |_| {})
        .await
        .unwrap();

    assert_eq!(outcome.entries.len(), 2);
    let halt = outcome.halted.expect("halt should be reported");
    assert_eq!(halt.start_index, 3);
    assert!(halt.reason.contains("serialization"));
}

#[tokio::test]
async fn malformed_page_fails_in_strict_mode() {
    let server = MockServer::start().await;
    mount_page(&server, 1, page_json(0..2, Some(4))).await;
    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .and(query_param("start-index", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .mount(&server)
        .await;

    let client = client_with(2, true);
    let result = client
        .fetch_all(&base_url(&server), &CancellationToken::new(), |_| {})
        .await;

    assert!(matches!(result, Err(Error::Serialization(_))));
}

#[tokio::test]
async fn timeout_ends_pagination_leniently() {
    let server = MockServer::start().await;
    mount_page(&server, 1, page_json(0..2, None)).await;
    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .and(query_param("start-index", "3"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(page_json(2..4, None))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let client = client_with(2, false);
    let outcome = client
        .fetch_all(&base_url(&server), &CancellationToken::new(), |_| {})
        .await
        .unwrap();

    assert_eq!(outcome.entries.len(), 2);
    assert!(outcome.halted.is_some());
}

#[tokio::test]
async fn cancellation_after_first_page_stops_before_second() {
    let server = MockServer::start().await;
    mount_page(&server, 1, page_json(0..2, Some(4))).await;
    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .and(query_param("start-index", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(2..4, Some(4))))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_with(2, false);
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let result = client
        .fetch_all(&base_url(&server), &cancel, move |_| token.cancel())
        .await;

    assert!(matches!(result, Err(Error::Cancelled)));
}

#[tokio::test]
async fn cancellation_discards_in_flight_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(page_json(0..2, None))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let config = FeedConfig {
        request_timeout: Duration::from_secs(30),
        ..Default::default()
    };
    let client = FeedClient::new(&config).unwrap();
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        client.fetch_all(&base_url(&server), &cancel, |_| {}),
    )
    .await
    .expect("cancellation should not wait for the response");

    assert!(matches!(result, Err(Error::Cancelled)));
}

#[tokio::test]
async fn already_cancelled_token_sends_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_with(500, false);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = client.fetch_all(&base_url(&server), &cancel, |_| {}).await;
    assert!(matches!(result, Err(Error::Cancelled)));
}
