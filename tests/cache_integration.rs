//! Integration tests for the response cache using wiremock

use sigsurvey::cache::{FetchMode, ResponseCache};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn open_cache(dir: &std::path::Path, mode: FetchMode) -> ResponseCache {
    ResponseCache::open(&dir.join("pages.db"), mode).expect("cache store must open")
}

#[tokio::test]
async fn bypass_mode_issues_at_most_one_network_call() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/listing/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html>page</html>")
                .insert_header("etag", "\"v1\""),
        )
        .expect(1)
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let cache = open_cache(tmp.path(), FetchMode::Bypass);
    let uri = format!("{}/listing/", server.uri());

    let first = cache.get(&uri).await.unwrap();
    let second = cache.get(&uri).await.unwrap();

    assert_eq!(first, "<html>page</html>");
    assert_eq!(first, second);
}

#[tokio::test]
async fn responses_without_validator_are_never_stored() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/no-etag/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>fresh</html>"))
        .expect(2)
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let cache = open_cache(tmp.path(), FetchMode::Bypass);
    let uri = format!("{}/no-etag/", server.uri());

    // Two calls, two fetches: no record was written the first time.
    assert_eq!(cache.get(&uri).await.unwrap(), "<html>fresh</html>");
    assert_eq!(cache.get(&uri).await.unwrap(), "<html>fresh</html>");
}

#[tokio::test]
async fn verify_mode_returns_cached_body_on_not_modified() {
    let server = MockServer::start().await;

    // First call: full response with a validator.
    Mock::given(method("GET"))
        .and(path("/page/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html>original</html>")
                .insert_header("etag", "\"v1\""),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    // Second call: conditional GET carrying the stored validator.
    Mock::given(method("GET"))
        .and(path("/page/"))
        .and(header("if-none-match", "\"v1\""))
        .respond_with(ResponseTemplate::new(304))
        .expect(1)
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let cache = open_cache(tmp.path(), FetchMode::Verify);
    let uri = format!("{}/page/", server.uri());

    assert_eq!(cache.get(&uri).await.unwrap(), "<html>original</html>");
    assert_eq!(cache.get(&uri).await.unwrap(), "<html>original</html>");
}

#[tokio::test]
async fn verify_mode_replaces_record_when_resource_changed() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/page/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html>v1</html>")
                .insert_header("etag", "\"v1\""),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;

    // Revalidation of v1 discovers a changed resource.
    Mock::given(method("GET"))
        .and(path("/page/"))
        .and(header("if-none-match", "\"v1\""))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html>v2</html>")
                .insert_header("etag", "\"v2\""),
        )
        .expect(1)
        .mount(&server)
        .await;

    // Revalidation of v2 finds it unchanged: the record was updated in place.
    Mock::given(method("GET"))
        .and(path("/page/"))
        .and(header("if-none-match", "\"v2\""))
        .respond_with(ResponseTemplate::new(304))
        .expect(1)
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let cache = open_cache(tmp.path(), FetchMode::Verify);
    let uri = format!("{}/page/", server.uri());

    assert_eq!(cache.get(&uri).await.unwrap(), "<html>v1</html>");
    assert_eq!(cache.get(&uri).await.unwrap(), "<html>v2</html>");
    assert_eq!(cache.get(&uri).await.unwrap(), "<html>v2</html>");
}

#[tokio::test]
async fn unexpected_status_fails_the_fetch_with_details() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/gone/"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let cache = open_cache(tmp.path(), FetchMode::Bypass);
    let uri = format!("{}/gone/", server.uri());

    let err = cache.get(&uri).await.unwrap_err();
    let message = format!("{err:#}");
    assert!(message.contains("500"), "error should carry the status: {message}");
    assert!(message.contains("boom"), "error should carry the body: {message}");
}

#[tokio::test]
async fn bypass_mode_survives_cache_reopen() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/durable/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html>kept</html>")
                .insert_header("etag", "\"v1\""),
        )
        .expect(1)
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let uri = format!("{}/durable/", server.uri());

    {
        let cache = open_cache(tmp.path(), FetchMode::Bypass);
        assert_eq!(cache.get(&uri).await.unwrap(), "<html>kept</html>");
    }

    // A fresh handle over the same store sees the record; no second fetch.
    let cache = open_cache(tmp.path(), FetchMode::Bypass);
    assert_eq!(cache.get(&uri).await.unwrap(), "<html>kept</html>");
}
