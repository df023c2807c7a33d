//! Composition of independently declared API groups into one client,
//! exercised over real HTTP against a mock server.

use declarest::{Api, Auth, BackendKind, Client, Error, HttpError, Operation, ResponseValue};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api_one() -> Api {
    Api::builder("api_one")
        .operation(
            Operation::get("get_stuff", "stuff/{what}")
                .on(200, |r| Ok(ResponseValue::Json(r.json_value()?))),
        )
        .build()
        .unwrap()
}

fn api_two() -> Api {
    Api::builder("api_two")
        .operation(Operation::put("put_stuff", "stuff/{what}").body("payload"))
        .build()
        .unwrap()
}

fn api_three() -> Api {
    Api::builder("api_three")
        .operation(
            Operation::patch("patch_stuff", "stuff/{what}")
                .body("payload")
                .on(204, |_| Ok(ResponseValue::Json(json!(true))))
                .on(declarest::StatusRule::Any, |_| {
                    Ok(ResponseValue::Json(json!(false)))
                }),
        )
        .build()
        .unwrap()
}

fn composed(endpoint: &str) -> Api {
    Api::builder("inherited")
        .accept("application/json")
        .header("x-auth-key", "ABCD")
        .endpoint(endpoint)
        .backend(BackendKind::Reqwest)
        .inherit(&api_one())
        .inherit(&api_two())
        .inherit(&api_three())
        .build()
        .unwrap()
}

#[tokio::test]
async fn inherited_operations_share_group_defaults() {
    let server = MockServer::start().await;
    let expected = json!({"id": 1, "name": "thing1"});

    Mock::given(method("GET"))
        .and(path("/stuff/thing1"))
        .and(header("x-auth-key", "ABCD"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&expected))
        .mount(&server)
        .await;

    let client = Client::new(&composed(&server.uri()));
    let value = client
        .invoke("get_stuff")
        .arg("what", "thing1")
        .send_async()
        .await
        .unwrap();
    assert_eq!(value.as_json().unwrap(), &expected);
}

#[tokio::test]
async fn client_endpoint_override_redirects_all_groups() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/stuff/thing1"))
        .and(body_json(json!({"id": 1, "name": "thing2"})))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    // The composed group declares some unreachable endpoint; the client
    // instance overrides it.
    let client = Client::builder()
        .api(&composed("https://unreachable.example.com"))
        .endpoint(server.uri())
        .build()
        .unwrap();

    let value = client
        .invoke("patch_stuff")
        .arg("what", "thing1")
        .arg("payload", json!({"id": 1, "name": "thing2"}))
        .send_async()
        .await
        .unwrap();
    assert_eq!(value.as_json().unwrap(), &json!(true));
}

#[tokio::test]
async fn any_handler_catches_unexpected_statuses() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/stuff/thing1"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = Client::new(&composed(&server.uri()));
    let value = client
        .invoke("patch_stuff")
        .arg("what", "thing1")
        .arg("payload", json!({"id": 1}))
        .send_async()
        .await
        .unwrap();
    assert_eq!(value.as_json().unwrap(), &json!(false));
}

#[tokio::test]
async fn body_binding_serializes_json_payload() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/stuff/thing1"))
        .and(body_json(json!({"id": 9})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let client = Client::new(&composed(&server.uri()));
    let value = client
        .invoke("put_stuff")
        .arg("what", "thing1")
        .arg("payload", json!({"id": 9}))
        .send_async()
        .await
        .unwrap();
    assert_eq!(value.as_json().unwrap()["ok"], true);
}

#[tokio::test]
async fn unhandled_error_status_surfaces_wrapped_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/stuff/broken"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    // get_stuff only handles 200, and no Any handler is inherited for it.
    let client = Client::new(&composed(&server.uri()));
    let err = client
        .invoke("get_stuff")
        .arg("what", "broken")
        .send_async()
        .await
        .unwrap_err();

    match err {
        Error::Http(http) => {
            assert_eq!(http.status(), Some(500));
            let response = http.response().unwrap();
            assert_eq!(response.text(), "boom");
            assert!(matches!(http, HttpError::Status { .. }));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn per_group_endpoints_fan_out_to_different_hosts() {
    let server_a = MockServer::start().await;
    let server_b = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/a/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["from-a"])))
        .mount(&server_a)
        .await;
    Mock::given(method("GET"))
        .and(path("/b/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["from-b"])))
        .mount(&server_b)
        .await;

    let group_a = Api::builder("group_a")
        .endpoint(server_a.uri())
        .backend(BackendKind::Reqwest)
        .operation(Operation::get("list_a", "a/items"))
        .build()
        .unwrap();
    let group_b = Api::builder("group_b")
        .endpoint(server_b.uri())
        .operation(Operation::get("list_b", "b/items"))
        .build()
        .unwrap();

    // One federated client, two hosts; each operation keeps the endpoint
    // of its defining group.
    let client = Client::builder()
        .api(&group_a)
        .api(&group_b)
        .backend(BackendKind::Reqwest)
        .build()
        .unwrap();

    let a = client.invoke("list_a").send_async().await.unwrap();
    assert_eq!(a.as_json().unwrap(), &json!(["from-a"]));

    let b = client.invoke("list_b").send_async().await.unwrap();
    assert_eq!(b.as_json().unwrap(), &json!(["from-b"]));
}

#[tokio::test]
async fn instance_auth_applies_to_inherited_operations() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/stuff/secret"))
        .and(header("authorization", "Bearer token-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let client = Client::builder()
        .api(&composed(&server.uri()))
        .auth(Auth::bearer("token-123"))
        .build()
        .unwrap();

    let value = client
        .invoke("get_stuff")
        .arg("what", "secret")
        .send_async()
        .await
        .unwrap();
    assert_eq!(value.as_json().unwrap()["ok"], true);
}
