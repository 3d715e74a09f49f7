use postgrab_core::{Item, ParserClient, RequestError};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn item() -> Item {
    let mut item = Item::new("https://www.xiaohongshu.com/explore/zip1").with_title("Cafe: list");
    item.content = "best flat whites".to_string();
    item.tags = vec!["coffee".to_string()];
    item.images = vec![
        "https://img.example/a.jpg".to_string(),
        "https://img.example/b.jpg".to_string(),
        "https://img.example/c.jpg".to_string(),
    ];
    item
}

fn request_body(selected: serde_json::Value) -> serde_json::Value {
    let item = item();
    json!({
        "note_data": {
            "title": item.title,
            "content": item.content,
            "tags": item.tags,
            "images": item.images,
            "origin_url": item.url,
        },
        "selected_image_indices": selected,
    })
}

#[tokio::test]
async fn archive_uses_disposition_filename() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/download_zip"))
        .and(body_json(request_body(json!([0, 2]))))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-disposition", "attachment; filename=\"cafe/list.zip\"")
                .set_body_raw(b"PK\x03\x04".to_vec(), "application/zip"),
        )
        .mount(&server)
        .await;

    let client = ParserClient::new(&server.uri()).unwrap();
    let archive = client
        .download_archive(&item(), Some(&[0, 2]))
        .await
        .expect("download ok");

    assert_eq!(archive.filename, "cafe_list.zip");
    assert_eq!(archive.bytes, b"PK\x03\x04");
}

#[tokio::test]
async fn full_selection_requests_all_images() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/download_zip"))
        .and(body_json(request_body(serde_json::Value::Null)))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"zip".to_vec(), "application/zip"))
        .expect(1)
        .mount(&server)
        .await;

    let client = ParserClient::new(&server.uri()).unwrap();
    let archive = client
        .download_archive(&item(), Some(&[0, 1, 2]))
        .await
        .unwrap();

    // No header: the title names the file
    assert_eq!(archive.filename, "Cafe_ list.zip");
}

#[tokio::test]
async fn archive_error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/download_zip"))
        .respond_with(ResponseTemplate::new(500).set_body_string("image fetch failed"))
        .mount(&server)
        .await;

    let client = ParserClient::new(&server.uri()).unwrap();
    let err = client.download_archive(&item(), None).await.unwrap_err();

    match err {
        RequestError::Status { status, message } => {
            assert_eq!(status.as_u16(), 500);
            assert_eq!(message, "image fetch failed");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
