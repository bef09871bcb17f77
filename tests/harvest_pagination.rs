//! Harvester integration tests against a mocked forms API.

use fieldwork::harvester::client::FormsClient;
use fieldwork::harvester::store::ResponseStore;
use fieldwork::harvester::{ops, HarvestError};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn record(id: &str, token: &str, name: &str) -> serde_json::Value {
    json!({
        "response_id": id,
        "submitted_at": "2025-06-01T09:30:00Z",
        "token": token,
        "answers": [
            {"field": {"id": "q_name", "type": "short_text"}, "type": "text", "text": name}
        ]
    })
}

fn page(total: u64, items: Vec<serde_json::Value>) -> serde_json::Value {
    json!({ "total_items": total, "items": items })
}

#[tokio::test]
async fn paginated_fetch_dedupes_across_pages() {
    let server = MockServer::start().await;

    // Page 1 (no cursor): two full records, cursor continues from t2.
    Mock::given(method("GET"))
        .and(path("/forms/FORM1/responses"))
        .and(header("authorization", "Bearer tok"))
        .and(query_param("page_size", "2"))
        .and(query_param_is_missing("before"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            5,
            vec![record("r1", "t1", "Alex"), record("r2", "t2", "Sam")],
        )))
        .mount(&server)
        .await;

    // Page 2: overlaps with page 1 (r2 appears again), cursor t3.
    Mock::given(method("GET"))
        .and(path("/forms/FORM1/responses"))
        .and(query_param("before", "t2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            5,
            vec![record("r2", "t2", "Sam"), record("r3", "t3", "Kim")],
        )))
        .mount(&server)
        .await;

    // Page 3: short page ends the walk.
    Mock::given(method("GET"))
        .and(path("/forms/FORM1/responses"))
        .and(query_param("before", "t3"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(page(5, vec![record("r4", "t4", "Ravi")])),
        )
        .mount(&server)
        .await;

    let client = FormsClient::new(&server.uri(), "FORM1", "tok", 2);
    let records = client.fetch_all().await.expect("fetch failed");

    let ids: Vec<&str> = records.iter().map(|r| r.response_id.as_str()).collect();
    assert_eq!(ids, vec!["r1", "r2", "r3", "r4"]);
}

#[tokio::test]
async fn fetch_latest_builds_all_tables() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/forms/FORM1/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            2,
            vec![
                record("r1", "t1", "Alex"),
                json!({
                    "response_id": "r2",
                    "submitted_at": "2025-06-02T10:00:00Z",
                    "token": "t2",
                    "answers": []
                }),
            ],
        )))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut store = ResponseStore::open(&dir.path().join("responses.db")).unwrap();
    let client = FormsClient::new(&server.uri(), "FORM1", "tok", 10);

    let report = ops::fetch_latest(&client, &mut store)
        .await
        .expect("fetch_latest failed");

    assert_eq!(report.fetched, 2);
    assert_eq!(report.appended, 2);
    assert_eq!(report.summary.total, 2);
    assert_eq!(report.summary.completed, 1);
    assert_eq!(report.summary.partial, 1);
    assert_eq!(store.raw_count().unwrap(), 2);
    assert_eq!(store.log_count().unwrap(), 2);
    assert_eq!(store.read_summary().unwrap().unwrap().total, 2);

    // Reports are a separate action, with data now present.
    let reports = ops::generate_reports(&mut store).expect("reports failed");
    let name = reports.iter().find(|r| r.field_id == "q_name").unwrap();
    assert_eq!((name.answered, name.blank), (1, 1));
}

#[tokio::test]
async fn cumulative_log_outlives_shrinking_refetch() {
    let server = MockServer::start().await;

    // First fetch sees two responses, the second only one. The latest
    // tables follow the upstream, the log keeps everything ever seen.
    Mock::given(method("GET"))
        .and(path("/forms/FORM1/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            2,
            vec![record("r1", "t1", "Alex"), record("r2", "t2", "Sam")],
        )))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/forms/FORM1/responses"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(page(1, vec![record("r2", "t2", "Sam")])),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut store = ResponseStore::open(&dir.path().join("responses.db")).unwrap();
    let client = FormsClient::new(&server.uri(), "FORM1", "tok", 10);

    let first = ops::fetch_latest(&client, &mut store).await.unwrap();
    assert_eq!((first.fetched, first.appended), (2, 2));

    let second = ops::fetch_latest(&client, &mut store).await.unwrap();
    assert_eq!((second.fetched, second.appended), (1, 0));

    assert_eq!(store.raw_count().unwrap(), 1);
    assert_eq!(store.log_count().unwrap(), 2);
}

#[tokio::test]
async fn api_failure_surfaces_and_store_stays_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/forms/FORM1/responses"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut store = ResponseStore::open(&dir.path().join("responses.db")).unwrap();
    let client = FormsClient::new(&server.uri(), "FORM1", "tok", 10).with_max_retries(0);

    let err = ops::fetch_latest(&client, &mut store).await.unwrap_err();
    match err {
        HarvestError::Api { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "upstream exploded");
        }
        other => panic!("expected Api error, got {other}"),
    }
    assert_eq!(store.raw_count().unwrap(), 0);
    assert_eq!(store.log_count().unwrap(), 0);
    assert!(store.read_summary().unwrap().is_none());
}

#[tokio::test]
async fn unauthorized_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/forms/FORM1/responses"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid token"))
        .expect(1)
        .mount(&server)
        .await;

    let client = FormsClient::new(&server.uri(), "FORM1", "tok", 10);
    let err = client.fetch_all().await.unwrap_err();
    assert!(matches!(err, HarvestError::Api { status: 401, .. }));
}

#[tokio::test]
async fn rate_limit_retries_after_backoff() {
    let server = MockServer::start().await;

    // First request is throttled, the retry succeeds.
    Mock::given(method("GET"))
        .and(path("/forms/FORM1/responses"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/forms/FORM1/responses"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(page(1, vec![record("r1", "t1", "Alex")])),
        )
        .mount(&server)
        .await;

    let client = FormsClient::new(&server.uri(), "FORM1", "tok", 10);
    let records = client.fetch_all().await.expect("fetch failed");
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn probe_reports_total_without_walking_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/forms/FORM1/responses"))
        .and(query_param("page_size", "1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(page(37, vec![record("r1", "t1", "Alex")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = FormsClient::new(&server.uri(), "FORM1", "tok", 200);
    let total = ops::test_connection(&client).await.expect("probe failed");
    assert_eq!(total, 37);
}
