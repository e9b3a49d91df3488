//! ParseStore against a mocked Parse server.

#![cfg(feature = "parse")]

use std::time::Duration;

use mockito::{Matcher, Server};
use serde_json::json;
use sporttag::store::{Fields, Filter};
use sporttag::{
    BusinessKey, Child, DocumentStore, ParseStore, SquadAssignment, StoreError, WriteOutcome,
};

fn store(url: &str) -> ParseStore {
    ParseStore::new(url, "app-id", "js-key", Duration::from_secs(2)).unwrap()
}

fn anna() -> BusinessKey {
    BusinessKey::new("Anna", "Muster", 2015, "f")
}

fn paid() -> Fields {
    json!({ "paid": true }).as_object().cloned().unwrap()
}

#[tokio::test]
async fn find_sends_where_clause_and_credentials() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/classes/Child")
        .match_header("X-Parse-Application-Id", "app-id")
        .match_header("X-Parse-Javascript-Key", "js-key")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded(
                "where".into(),
                r#"{"birthYear":2015,"firstName":"Anna","gender":"f","lastName":"Muster"}"#.into(),
            ),
            Matcher::UrlEncoded("order".into(), "createdAt,objectId".into()),
            Matcher::UrlEncoded("limit".into(), "1000".into()),
            Matcher::UrlEncoded("skip".into(), "0".into()),
        ]))
        .with_status(200)
        .with_body(
            json!({
                "results": [{
                    "objectId": "xYz1",
                    "firstName": "Anna",
                    "lastName": "Muster",
                    "birthYear": 2015,
                    "gender": "f",
                    "paid": false,
                    "version": 3,
                    "createdAt": "2026-06-01T08:00:00.000Z",
                    "updatedAt": "2026-06-02T08:00:00.000Z"
                }]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let found = store(&server.url())
        .find::<Child>(&anna().filter())
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, "xYz1");
    assert_eq!(found[0].version, 3);
    assert_eq!(found[0].data.key, anna());
    assert!(found[0].data.attributes.is_empty());
}

fn child_document(id: &str, first_name: &str) -> serde_json::Value {
    json!({
        "objectId": id,
        "firstName": first_name,
        "lastName": "Muster",
        "birthYear": 2015,
        "gender": "f",
        "paid": false,
        "version": 1
    })
}

#[tokio::test]
async fn find_pages_past_the_server_limit() {
    let mut server = Server::new_async().await;
    let first = server
        .mock("GET", "/classes/Child")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("limit".into(), "2".into()),
            Matcher::UrlEncoded("skip".into(), "0".into()),
        ]))
        .with_status(200)
        .with_body(
            json!({ "results": [child_document("a", "Anna"), child_document("b", "Berta")] })
                .to_string(),
        )
        .create_async()
        .await;
    let second = server
        .mock("GET", "/classes/Child")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("limit".into(), "2".into()),
            Matcher::UrlEncoded("skip".into(), "2".into()),
        ]))
        .with_status(200)
        .with_body(json!({ "results": [child_document("c", "Clara")] }).to_string())
        .create_async()
        .await;

    let found = store(&server.url())
        .with_page_size(2)
        .find::<Child>(&Filter::new())
        .await
        .unwrap();

    first.assert_async().await;
    second.assert_async().await;
    let ids: Vec<_> = found.iter().map(|doc| doc.id.as_str()).collect();
    assert_eq!(ids, ["a", "b", "c"]);
}

#[tokio::test]
async fn update_returns_the_server_version() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("PUT", "/classes/SquadAssignment/as1")
        .match_body(Matcher::Json(json!({
            "position": 2,
            "version": { "__op": "Increment", "amount": 1 }
        })))
        .with_status(200)
        .with_body(r#"{"updatedAt":"2026-06-02T08:00:00.000Z","version":7}"#)
        .create_async()
        .await;
    server
        .mock("PUT", "/classes/SquadAssignment/gone")
        .with_status(404)
        .with_body(r#"{"code":101,"error":"Object not found."}"#)
        .create_async()
        .await;

    let store = store(&server.url());
    let position = json!({ "position": 2 }).as_object().cloned().unwrap();
    assert_eq!(
        store
            .update::<SquadAssignment>("as1", &position)
            .await
            .unwrap(),
        WriteOutcome::Applied { version: 7 }
    );
    mock.assert_async().await;
    assert_eq!(
        store
            .update::<SquadAssignment>("gone", &position)
            .await
            .unwrap(),
        WriteOutcome::NotApplied
    );
}

#[tokio::test]
async fn insert_starts_at_version_one() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/classes/Child")
        .match_body(Matcher::PartialJson(json!({
            "firstName": "Anna",
            "paid": false,
            "version": 1
        })))
        .with_status(201)
        .with_body(r#"{"objectId":"new1","createdAt":"2026-06-01T08:00:00.000Z"}"#)
        .create_async()
        .await;

    let saved = store(&server.url())
        .insert(&Child::new(anna(), Fields::new()))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(saved.id, "new1");
    assert_eq!(saved.version, 1);
}

#[tokio::test]
async fn conditional_update_applies_with_increment() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("PUT", "/classes/Child/xYz1")
        .match_query(Matcher::UrlEncoded(
            "where".into(),
            r#"{"objectId":"xYz1","version":3}"#.into(),
        ))
        .match_body(Matcher::Json(json!({
            "paid": true,
            "version": { "__op": "Increment", "amount": 1 }
        })))
        .with_status(200)
        .with_body(r#"{"updatedAt":"2026-06-02T08:00:00.000Z","version":4}"#)
        .create_async()
        .await;

    let outcome = store(&server.url())
        .conditional_update::<Child>("xYz1", 3, &paid())
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(outcome, WriteOutcome::Applied { version: 4 });
}

#[tokio::test]
async fn failed_predicate_is_not_applied() {
    let mut server = Server::new_async().await;
    server
        .mock("PUT", "/classes/Child/xYz1")
        .match_query(Matcher::Any)
        .with_status(404)
        .with_body(r#"{"code":101,"error":"Object not found."}"#)
        .create_async()
        .await;

    let outcome = store(&server.url())
        .conditional_update::<Child>("xYz1", 3, &paid())
        .await
        .unwrap();
    assert_eq!(outcome, WriteOutcome::NotApplied);
}

#[tokio::test]
async fn object_not_found_code_with_bad_request_status_is_not_applied() {
    let mut server = Server::new_async().await;
    server
        .mock("PUT", "/classes/Child/xYz1")
        .match_query(Matcher::Any)
        .with_status(400)
        .with_body(r#"{"code":101,"error":"Object not found."}"#)
        .create_async()
        .await;

    let outcome = store(&server.url())
        .conditional_update::<Child>("xYz1", 3, &paid())
        .await
        .unwrap();
    assert_eq!(outcome, WriteOutcome::NotApplied);
}

#[tokio::test]
async fn server_error_is_rejected() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/classes/Child")
        .match_query(Matcher::Any)
        .with_status(500)
        .with_body(r#"{"code":1,"error":"Internal server error."}"#)
        .create_async()
        .await;

    let err = store(&server.url())
        .find::<Child>(&anna().filter())
        .await
        .unwrap_err();
    match err {
        StoreError::Rejected { status, message } => {
            assert_eq!(status, 500);
            assert!(message.contains("Internal server error"), "{message}");
        }
        other => panic!("expected Rejected, got {other:?}"),
    }
}

#[tokio::test]
async fn unparsable_answer_is_invalid_response() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/classes/Child")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("<html>maintenance</html>")
        .create_async()
        .await;

    let err = store(&server.url())
        .find::<Child>(&anna().filter())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidResponse(_)), "{err}");
}

#[tokio::test]
async fn delete_reports_missing_object() {
    let mut server = Server::new_async().await;
    server
        .mock("DELETE", "/classes/Child/gone")
        .with_status(404)
        .with_body(r#"{"code":101,"error":"Object not found."}"#)
        .create_async()
        .await;
    server
        .mock("DELETE", "/classes/Child/here")
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let store = store(&server.url());
    assert!(!store.delete::<Child>("gone").await.unwrap());
    assert!(store.delete::<Child>("here").await.unwrap());
}

#[tokio::test]
async fn unreachable_server_is_unavailable() {
    // Grab a free port, then close it so nothing is listening.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let err = store(&url)
        .find::<Child>(&anna().filter())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Unavailable(_)), "{err}");
}
