use std::time::Duration;

use httpmock::prelude::*;
use serde_json::json;

use emotecopy_core::{
    domain::{EmoteId, EmoteRef, EmoteSetId},
    errors::{EmoteFailure, FetchError, RateLimited},
    ports::{EmoteSetReader, EmoteSetWriter, WriteResponse},
    token::AuthToken,
};
use emotecopy_seventv::SevenTvClient;

fn client_for(server: &MockServer) -> SevenTvClient {
    SevenTvClient::new(
        server.url("/gql"),
        AuthToken::new("test-token").unwrap(),
        Duration::from_secs(5),
    )
    .unwrap()
}

#[tokio::test]
async fn read_emotes_sends_bearer_token_and_keeps_order() {
    let server = MockServer::start_async().await;
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/gql")
            .header("authorization", "Bearer test-token");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "data": { "emoteSets": { "emoteSet": {
                    "id": "src",
                    "name": "Source",
                    "capacity": 1000,
                    "emotes": {
                        "items": [
                            { "id": "b", "alias": "Second", "emote": { "flags": { "private": false } } },
                            { "id": "a", "alias": "First", "emote": { "flags": { "private": false } } }
                        ],
                        "totalCount": 2
                    },
                    "owner": { "id": "u1", "editors": [] }
                }}}
            }));
    });

    let emotes = client_for(&server)
        .read_emotes(&EmoteSetId("src".to_string()))
        .await
        .expect("listing should succeed");

    mock.assert();
    assert_eq!(
        emotes,
        vec![EmoteRef::new("b", "Second"), EmoteRef::new("a", "First")]
    );
}

#[tokio::test]
async fn empty_set_is_not_an_error() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(POST).path("/gql");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "data": { "emoteSets": { "emoteSet": {
                    "id": "src",
                    "name": "Empty",
                    "capacity": 600,
                    "emotes": { "items": [], "totalCount": 0 },
                    "owner": { "id": "u1", "editors": [] }
                }}}
            }));
    });

    let emotes = client_for(&server)
        .read_emotes(&EmoteSetId("src".to_string()))
        .await
        .expect("listing should succeed");
    assert!(emotes.is_empty());
}

#[tokio::test]
async fn missing_set_is_not_found() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(POST).path("/gql");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({ "data": { "emoteSets": { "emoteSet": null } } }));
    });

    let err = client_for(&server)
        .fetch_emote_set(&EmoteSetId("nope".to_string()))
        .await
        .expect_err("missing set");
    assert_eq!(err, FetchError::NotFound(EmoteSetId("nope".to_string())));
}

#[tokio::test]
async fn add_emote_success() {
    let server = MockServer::start_async().await;
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/gql")
            .header("authorization", "Bearer test-token");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "data": { "emoteSets": { "emoteSet": { "addEmote": { "id": "dest" } } } }
            }));
    });

    let resp = client_for(&server)
        .add_emote(&EmoteSetId("dest".to_string()), &EmoteRef::new("e1", "KEKW"))
        .await;

    mock.assert();
    assert_eq!(resp, WriteResponse::Done);
}

#[tokio::test]
async fn add_emote_http_429_reads_retry_after() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(POST).path("/gql");
        then.status(429).header("retry-after", "4");
    });

    let resp = client_for(&server)
        .add_emote(&EmoteSetId("dest".to_string()), &EmoteRef::new("e1", "KEKW"))
        .await;

    assert_eq!(
        resp,
        WriteResponse::RateLimited(RateLimited {
            retry_after: Some(Duration::from_secs(4))
        })
    );
}

#[tokio::test]
async fn remove_emote_not_found() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(POST).path("/gql");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "data": null,
                "errors": [ { "message": "Emote not found" } ]
            }));
    });

    let resp = client_for(&server)
        .remove_emote(&EmoteSetId("dest".to_string()), &EmoteId("e1".to_string()))
        .await;

    assert_eq!(resp, WriteResponse::Rejected(EmoteFailure::EmoteNotFound));
}

#[tokio::test]
async fn unreachable_endpoint_is_a_network_failure() {
    // Nothing listens on port 9 (discard) in test environments.
    let client = SevenTvClient::new(
        "http://127.0.0.1:9/gql",
        AuthToken::new("t").unwrap(),
        Duration::from_secs(2),
    )
    .unwrap();

    let resp = client
        .add_emote(&EmoteSetId("dest".to_string()), &EmoteRef::new("e1", "KEKW"))
        .await;
    assert!(matches!(
        resp,
        WriteResponse::Rejected(EmoteFailure::Network(_))
    ));

    let err = client
        .fetch_emote_set(&EmoteSetId("src".to_string()))
        .await
        .expect_err("unreachable");
    assert!(matches!(err, FetchError::Network(_)));
}
