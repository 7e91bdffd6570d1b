use ipalink::{GithubStore, IpaLinkError, ObjectStore, PublisherConfig};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FILE_PATH: &str = "/repos/owner/store/contents/iPA/abc.ipa";

fn create_test_store(mock_server: &MockServer) -> GithubStore {
    let api_base = mock_server.uri();
    let config = PublisherConfig::from_lookup(|key| match key {
        "GITHUB_TOKEN" => Some("test-token".to_string()),
        "GITHUB_REPO" => Some("owner/store".to_string()),
        "GITHUB_API_URL" => Some(api_base.clone()),
        _ => None,
    })
    .expect("valid config");
    GithubStore::new(config).expect("failed to create store")
}

/// The store is blocking; keep it off the runtime serving the mocks.
async fn blocking<T, F>(f: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.expect("blocking task panicked")
}

fn file_entry(name: &str, path: &str, sha: &str) -> serde_json::Value {
    json!({ "name": name, "path": path, "sha": sha, "size": 2, "type": "file" })
}

#[tokio::test]
async fn test_put_new_file() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(FILE_PATH))
        .and(query_param("ref", "main"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("PUT"))
        .and(path(FILE_PATH))
        .and(header("authorization", "Bearer test-token"))
        .and(body_partial_json(json!({
            "message": "Upload iPA/abc.ipa",
            "content": "aGk=",
            "branch": "main"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = create_test_store(&mock_server);
    let url = blocking(move || store.put("iPA/abc.ipa", b"hi", "Upload iPA/abc.ipa"))
        .await
        .expect("put failed");
    assert_eq!(
        url,
        "https://raw.githubusercontent.com/owner/store/main/iPA/abc.ipa"
    );

    let requests = mock_server.received_requests().await.expect("recording enabled");
    let put = requests
        .iter()
        .find(|r| r.method.as_str() == "PUT")
        .expect("no PUT sent");
    let body: serde_json::Value = serde_json::from_slice(&put.body).unwrap();
    assert!(body.get("sha").is_none(), "new file must not send a sha");
}

#[tokio::test]
async fn test_put_overwrite_sends_sha() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(FILE_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(file_entry("abc.ipa", "iPA/abc.ipa", "deadbeef")),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("PUT"))
        .and(path(FILE_PATH))
        .and(body_partial_json(json!({ "sha": "deadbeef", "branch": "main" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = create_test_store(&mock_server);
    blocking(move || store.put("iPA/abc.ipa", b"hi", "Upload iPA/abc.ipa"))
        .await
        .expect("overwrite failed");
}

#[tokio::test]
async fn test_put_rejected() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(FILE_PATH))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    Mock::given(method("PUT"))
        .and(path(FILE_PATH))
        .respond_with(ResponseTemplate::new(422).set_body_string("sha wasn't supplied"))
        .mount(&mock_server)
        .await;

    let store = create_test_store(&mock_server);
    let result = blocking(move || store.put("iPA/abc.ipa", b"hi", "m")).await;

    match result {
        Err(IpaLinkError::Upload(msg)) => assert!(msg.contains("422"), "got {}", msg),
        other => panic!("expected upload error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_list_missing_folder() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/owner/store/contents/Plist"))
        .and(query_param("ref", "main"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let store = create_test_store(&mock_server);
    let files = blocking(move || store.list("Plist")).await.expect("list failed");
    assert!(files.is_empty());
}

#[tokio::test]
async fn test_list_skips_directories() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/owner/store/contents/iPA"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            file_entry("abc.ipa", "iPA/abc.ipa", "1"),
            { "name": "old", "path": "iPA/old", "sha": "2", "size": 0, "type": "dir" },
            file_entry("def.ipa", "iPA/def.ipa", "3")
        ])))
        .mount(&mock_server)
        .await;

    let store = create_test_store(&mock_server);
    let files = blocking(move || store.list("iPA")).await.expect("list failed");

    let names = files.iter().map(|f| f.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, ["abc.ipa", "def.ipa"]);
    assert_eq!(files[0].path, "iPA/abc.ipa");
    assert_eq!(files[0].size, 2);
}

#[tokio::test]
async fn test_delete_missing_file() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(FILE_PATH))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let store = create_test_store(&mock_server);
    let deleted = blocking(move || store.delete("iPA/abc.ipa")).await.expect("delete failed");
    assert!(!deleted);
}

#[tokio::test]
async fn test_delete_existing_file() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(FILE_PATH))
        .and(query_param("ref", "main"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(file_entry("abc.ipa", "iPA/abc.ipa", "cafe")),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path(FILE_PATH))
        .and(header("authorization", "Bearer test-token"))
        .and(body_partial_json(json!({ "sha": "cafe", "branch": "main" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = create_test_store(&mock_server);
    let deleted = blocking(move || store.delete("iPA/abc.ipa")).await.expect("delete failed");
    assert!(deleted);
}

#[tokio::test]
async fn test_names_are_percent_encoded() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/owner/store/contents/iPA/a%20b%231.ipa"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = create_test_store(&mock_server);
    let deleted = blocking(move || store.delete("iPA/a b#1.ipa")).await.expect("delete failed");
    assert!(!deleted);
}
