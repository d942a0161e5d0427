mod common;

use std::time::Duration;

use accountable_http::{ApiResponse, HttpMethod};
use futures_util::future::{join, join3};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{client, signed_in_store};

#[tokio::test]
async fn three_identical_gets_in_one_tick_hit_the_server_once() {
    let server = MockServer::start().await;
    let contracts = json!([
        {"id": 1, "title": "Run 5k every morning", "role": "CONTRACTOR"},
        {"id": 2, "title": "No sugar for 30 days", "role": "CONTRACTOR"}
    ]);

    Mock::given(method("GET"))
        .and(path("/contracts"))
        .and(query_param("role", "CONTRACTOR"))
        .and(header("Authorization", "Bearer access-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(contracts.clone())
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server.uri(), signed_in_store());
    let query = [("role", "CONTRACTOR")];
    let (a, b, c) = join3(
        client.get("/contracts", &query),
        client.get("contracts", &query),
        client.get("/contracts", &query),
    )
    .await;

    let expected = ApiResponse::Json(contracts);
    assert_eq!(a.expect("first caller"), expected);
    assert_eq!(b.expect("second caller"), expected);
    assert_eq!(c.expect("third caller"), expected);
}

#[tokio::test]
async fn bodies_that_differ_are_sent_separately() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/proofs"))
        .and(body_json(json!({"contractId": 7, "day": 1})))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({"id": 100}))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/proofs"))
        .and(body_json(json!({"contractId": 7, "day": 2})))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({"id": 101}))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server.uri(), signed_in_store());
    let (a, b) = join(
        client.post("/proofs", &json!({"contractId": 7, "day": 1})),
        client.post("/proofs", &json!({"contractId": 7, "day": 2})),
    )
    .await;

    assert_eq!(a.unwrap(), ApiResponse::Json(json!({"id": 100})));
    assert_eq!(b.unwrap(), ApiResponse::Json(json!({"id": 101})));
}

#[tokio::test]
async fn sequential_identical_calls_each_reach_the_server() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/notifications"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(2)
        .mount(&server)
        .await;

    let client = client(&server.uri(), signed_in_store());
    client.get("/notifications", &[]).await.unwrap();
    client.get("/notifications", &[]).await.unwrap();
    assert_eq!(client.context().coordinator().in_flight(), 0);
}

#[tokio::test]
async fn transport_failure_reaches_every_waiter() {
    // Nothing listens on port 9; the connection is refused.
    let client = client("http://127.0.0.1:9", signed_in_store());

    let (a, b) = join(
        client.send::<serde_json::Value>(HttpMethod::Get, "/contracts", None, &[]),
        client.send::<serde_json::Value>(HttpMethod::Get, "/contracts", None, &[]),
    )
    .await;

    let (a, b) = (a.unwrap_err(), b.unwrap_err());
    assert!(matches!(a, accountable_http::Error::Transport(_)), "got {:?}", a);
    assert_eq!(a.to_string(), b.to_string());
}
