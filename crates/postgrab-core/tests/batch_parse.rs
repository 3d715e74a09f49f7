use postgrab_core::{
    BatchError, BatchOptions, BatchParser, BatchProgress, FileStore, Item, MemoryStore,
    ParserClient, RequestError, Store,
};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const POST_A: &str = "https://www.xiaohongshu.com/explore/a1";
const POST_B: &str = "https://xhslink.com/b2";

fn urls(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn event_stream(events: &[serde_json::Value]) -> String {
    events
        .iter()
        .map(|event| format!("data: {}\n\n", event))
        .collect()
}

fn done_body() -> String {
    event_stream(&[
        json!({"type": "progress", "current": 1, "total": 2}),
        json!({"type": "progress", "current": 2, "total": 2}),
        json!({
            "type": "done",
            "notes": [{
                "url": POST_A,
                "title": "Weekend brunch",
                "content": "Two eggs, one pan",
                "tags": ["food"],
                "images": ["https://img.example/1.jpg", "https://img.example/2.jpg"]
            }],
            "failed": [{"url": POST_B, "error": "note removed"}]
        }),
    ])
}

async fn mount_stream(server: &MockServer, body: String) {
    Mock::given(method("POST"))
        .and(path("/api/batch_parse_stream"))
        .and(body_json(json!({"urls": [POST_A, POST_B]})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn streamed_batch_stores_parsed_items() {
    let server = MockServer::start().await;
    mount_stream(&server, done_body()).await;

    let parser = BatchParser::new(ParserClient::new(&server.uri()).unwrap());
    let progress = parser.subscribe_progress();
    let mut store = Store::load(MemoryStore::new()).unwrap();

    let report = parser
        .run(&mut store, &urls(&[POST_A, POST_B, POST_A]), BatchOptions::default())
        .await
        .expect("batch ok");

    assert_eq!(report.added.len(), 1);
    assert_eq!(report.added[0].title, "Weekend brunch");
    assert_eq!(report.added[0].id, Item::derive_id(POST_A));
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].error, "note removed");

    assert_eq!(store.active().len(), 1);
    assert!(store.trash().is_empty());
    assert_eq!(store.history(), urls(&[POST_A, POST_B]).as_slice());
    assert_eq!(*progress.borrow(), BatchProgress { current: 2, total: 2 });
}

#[tokio::test]
async fn reparsing_keeps_first_content() {
    let server = MockServer::start().await;
    mount_stream(&server, done_body()).await;

    let parser = BatchParser::new(ParserClient::new(&server.uri()).unwrap());
    let mut store = Store::load(MemoryStore::new()).unwrap();
    let batch = urls(&[POST_A, POST_B]);

    parser
        .run(&mut store, &batch, BatchOptions::default())
        .await
        .unwrap();
    let created = store.active()[0].created_at;

    let report = parser
        .run(&mut store, &batch, BatchOptions::default())
        .await
        .unwrap();

    assert!(report.added.is_empty());
    assert_eq!(report.duplicates, 1);
    assert_eq!(store.active().len(), 1);
    assert_eq!(store.active()[0].created_at, created);
}

#[tokio::test]
async fn todo_batch_marks_only_successes() {
    let server = MockServer::start().await;
    mount_stream(&server, done_body()).await;

    let parser = BatchParser::new(ParserClient::new(&server.uri()).unwrap());
    let mut store = Store::load(MemoryStore::new()).unwrap();
    store.todo_add(&urls(&[POST_A, POST_B])).unwrap();

    let queued = store.unparsed();
    parser
        .run(
            &mut store,
            &queued,
            BatchOptions {
                mark_as_parsed: true,
            },
        )
        .await
        .unwrap();

    assert_eq!(store.unparsed(), urls(&[POST_B]));
    assert!(store.todo()[0].parsed);
}

#[tokio::test]
async fn stream_without_result_is_empty_batch() {
    let server = MockServer::start().await;
    mount_stream(
        &server,
        event_stream(&[json!({"type": "progress", "current": 1, "total": 2})]),
    )
    .await;

    let parser = BatchParser::new(ParserClient::new(&server.uri()).unwrap());
    let mut store = Store::load(MemoryStore::new()).unwrap();

    let report = parser
        .run(&mut store, &urls(&[POST_A, POST_B]), BatchOptions::default())
        .await
        .unwrap();

    assert!(report.added.is_empty());
    assert!(report.failed.is_empty());
    assert!(store.active().is_empty());
    assert_eq!(store.history().len(), 2);
}

#[tokio::test]
async fn error_status_aborts_without_writes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/batch_parse_stream"))
        .respond_with(
            ResponseTemplate::new(502).set_body_json(json!({"message": "parser offline"})),
        )
        .mount(&server)
        .await;

    let parser = BatchParser::new(ParserClient::new(&server.uri()).unwrap());
    let mut store = Store::load(MemoryStore::new()).unwrap();

    let err = parser
        .run(&mut store, &urls(&[POST_A]), BatchOptions::default())
        .await
        .unwrap_err();

    match err {
        BatchError::Request(RequestError::Status { status, message }) => {
            assert_eq!(status.as_u16(), 502);
            assert_eq!(message, "parser offline");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(store.history().is_empty());
    assert!(store.backend().is_empty());
}

#[tokio::test]
async fn unreachable_service_is_connect_error() {
    // Nothing listens on the discard port
    let parser = BatchParser::new(ParserClient::new("http://127.0.0.1:9").unwrap());
    let mut store = Store::load(MemoryStore::new()).unwrap();

    let err = parser
        .run(&mut store, &urls(&[POST_A]), BatchOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, BatchError::Request(RequestError::Connect(_))));
}

#[tokio::test]
async fn single_response_mode_uses_batch_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/batch_parse"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "notes": [{"url": POST_B, "title": "Trail map"}],
            "failed": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let parser =
        BatchParser::new(ParserClient::new(&server.uri()).unwrap()).with_streaming(false);
    let mut store = Store::load(MemoryStore::new()).unwrap();

    let report = parser
        .run(&mut store, &urls(&[POST_B]), BatchOptions::default())
        .await
        .unwrap();

    assert_eq!(report.added.len(), 1);
    assert_eq!(store.active()[0].title, "Trail map");
    assert_eq!(parser.progress(), BatchProgress { current: 1, total: 1 });
}

#[tokio::test]
async fn single_response_rejects_invalid_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/batch_parse"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let parser =
        BatchParser::new(ParserClient::new(&server.uri()).unwrap()).with_streaming(false);
    let mut store = Store::load(MemoryStore::new()).unwrap();

    let err = parser
        .run(&mut store, &urls(&[POST_B]), BatchOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BatchError::Request(RequestError::InvalidResponse(_))
    ));
}

#[tokio::test]
async fn file_store_survives_reload() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    mount_stream(&server, done_body()).await;

    let parser = BatchParser::new(ParserClient::new(&server.uri()).unwrap());
    {
        let mut store = Store::load(FileStore::new(temp_dir.path())).unwrap();
        parser
            .run(&mut store, &urls(&[POST_A, POST_B]), BatchOptions::default())
            .await
            .unwrap();
        let id = store.active()[0].id.clone();
        store.trash_items(&[id]).unwrap();
    }

    let store = Store::load(FileStore::new(temp_dir.path())).unwrap();
    assert!(store.active().is_empty());
    assert_eq!(store.trash().len(), 1);
    assert!(store.trash()[0].is_deleted);
    assert_eq!(store.trash()[0].tags, vec!["food".to_string()]);
    assert_eq!(store.history().len(), 2);
}
