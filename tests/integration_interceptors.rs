use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures_core::future::BoxFuture;
use http::{Method, StatusCode};
use serde_json::json;

use echox::prelude::{
    Echo, EchoConfig, EchoError, EchoErrorCode, EchoRequest, EchoResponse, Interceptor, RawBody,
    RawResponse, Recovery, ResponseData, Transport, TransportErrorKind, TransportFailure,
};

struct MockTransport {
    responses: Mutex<VecDeque<Result<RawResponse, TransportFailure>>>,
    requests: Mutex<Vec<EchoRequest>>,
}

impl MockTransport {
    fn new(responses: Vec<Result<RawResponse, TransportFailure>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn captured(&self) -> Vec<EchoRequest> {
        self.requests.lock().expect("lock captured requests").clone()
    }
}

impl Transport for MockTransport {
    fn perform(
        &self,
        request: EchoRequest,
    ) -> BoxFuture<'static, Result<RawResponse, TransportFailure>> {
        self.requests
            .lock()
            .expect("lock captured requests")
            .push(request);
        let next = self
            .responses
            .lock()
            .expect("lock mock responses")
            .pop_front();
        Box::pin(async move {
            match next {
                Some(result) => result,
                None => Err(TransportFailure::new(
                    TransportErrorKind::Other,
                    "mock transport exhausted",
                )),
            }
        })
    }
}

fn json_raw(status: u16, body: &str) -> RawResponse {
    let status = StatusCode::from_u16(status).expect("valid status code");
    RawResponse {
        status,
        status_text: status.canonical_reason().unwrap_or("").to_owned(),
        headers: [("content-type".to_owned(), "application/json".to_owned())]
            .into_iter()
            .collect(),
        body: RawBody::Buffered(Bytes::from(body.to_owned())),
    }
}

fn client_with(mock: &Arc<MockTransport>) -> Echo {
    Echo::builder()
        .base_url("https://api.test")
        .transport_arc(Arc::clone(mock) as Arc<dyn Transport>)
        .try_build()
        .expect("build client")
}

fn fabricated_response(config: EchoConfig, request: EchoRequest) -> EchoResponse {
    EchoResponse {
        data: ResponseData::Json(json!({"fallback": true})),
        status: StatusCode::OK,
        status_text: "OK".to_owned(),
        headers: BTreeMap::new(),
        config,
        request,
    }
}

fn blank_request() -> EchoRequest {
    EchoRequest {
        method: Method::GET,
        url: "https://api.test/fallback".to_owned(),
        headers: BTreeMap::new(),
        body: None,
        response_type: None,
        timeout: None,
    }
}

#[tokio::test]
async fn clients_do_not_share_interceptor_state() {
    let mock_a = MockTransport::new(vec![]);
    let mock_b = MockTransport::new(vec![]);
    let client_a = client_with(&mock_a);
    let client_b = client_with(&mock_b);

    client_a.interceptors().request().use_interceptor(
        "marker",
        Interceptor::new().on_fulfilled(|config: EchoConfig| async move { Ok(config) }),
    );

    assert_eq!(client_a.interceptors().request().len(), 1);
    assert!(client_b.interceptors().request().is_empty());
}

#[tokio::test]
async fn request_hooks_run_in_registration_order() {
    let mock = MockTransport::new(vec![Ok(json_raw(200, r#"{"ok":true}"#))]);
    let client = client_with(&mock);
    let calls = Arc::new(Mutex::new(Vec::new()));

    let log = Arc::clone(&calls);
    client.interceptors().request().use_interceptor(
        "first",
        Interceptor::new().on_fulfilled(move |config: EchoConfig| {
            let log = Arc::clone(&log);
            async move {
                log.lock().expect("lock call log").push("first");
                Ok(config.header("X-First", "1"))
            }
        }),
    );
    let log = Arc::clone(&calls);
    client.interceptors().request().use_interceptor(
        "second",
        Interceptor::new().on_fulfilled(move |config: EchoConfig| {
            let log = Arc::clone(&log);
            async move {
                log.lock().expect("lock call log").push("second");
                Ok(config.header("X-Second", "2"))
            }
        }),
    );

    client
        .get("/test", EchoConfig::default())
        .await
        .expect("request should succeed");

    assert_eq!(*calls.lock().expect("lock call log"), vec!["first", "second"]);
    let captured = mock.captured();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].headers.get("X-First").map(String::as_str), Some("1"));
    assert_eq!(captured[0].headers.get("X-Second").map(String::as_str), Some("2"));
}

#[tokio::test]
async fn re_registering_a_key_replaces_the_hook_in_place() {
    let mock = MockTransport::new(vec![Ok(json_raw(200, r#"{"ok":true}"#))]);
    let client = client_with(&mock);
    let calls = Arc::new(Mutex::new(Vec::new()));

    let log = Arc::clone(&calls);
    client.interceptors().request().use_interceptor(
        "a",
        Interceptor::new().on_fulfilled(move |config: EchoConfig| {
            let log = Arc::clone(&log);
            async move {
                log.lock().expect("lock call log").push("a-old");
                Ok(config)
            }
        }),
    );
    let log = Arc::clone(&calls);
    client.interceptors().request().use_interceptor(
        "b",
        Interceptor::new().on_fulfilled(move |config: EchoConfig| {
            let log = Arc::clone(&log);
            async move {
                log.lock().expect("lock call log").push("b");
                Ok(config)
            }
        }),
    );
    let log = Arc::clone(&calls);
    client.interceptors().request().use_interceptor(
        "a",
        Interceptor::new().on_fulfilled(move |config: EchoConfig| {
            let log = Arc::clone(&log);
            async move {
                log.lock().expect("lock call log").push("a-new");
                Ok(config)
            }
        }),
    );

    client
        .get("/test", EchoConfig::default())
        .await
        .expect("request should succeed");

    // The replaced hook keeps its original position and the old handler is
    // never invoked again.
    assert_eq!(*calls.lock().expect("lock call log"), vec!["a-new", "b"]);
}

#[tokio::test]
async fn ejected_and_cleared_hooks_never_run() {
    let mock = MockTransport::new(vec![
        Ok(json_raw(200, r#"{"ok":true}"#)),
        Ok(json_raw(200, r#"{"ok":true}"#)),
    ]);
    let client = client_with(&mock);
    let calls = Arc::new(Mutex::new(Vec::new()));

    let log = Arc::clone(&calls);
    client.interceptors().request().use_interceptor(
        "gone",
        Interceptor::new().on_fulfilled(move |config: EchoConfig| {
            let log = Arc::clone(&log);
            async move {
                log.lock().expect("lock call log").push("gone");
                Ok(config)
            }
        }),
    );
    client.interceptors().request().eject("gone");
    client.interceptors().request().eject("never-registered");

    client
        .get("/test", EchoConfig::default())
        .await
        .expect("request should succeed");
    assert!(calls.lock().expect("lock call log").is_empty());

    let log = Arc::clone(&calls);
    client.interceptors().response().use_interceptor(
        "cleared",
        Interceptor::new().on_fulfilled(move |response: EchoResponse| {
            let log = Arc::clone(&log);
            async move {
                log.lock().expect("lock call log").push("cleared");
                Ok(response)
            }
        }),
    );
    client.interceptors().response().clear();
    assert!(client.interceptors().response().is_empty());

    client
        .get("/test", EchoConfig::default())
        .await
        .expect("request should succeed");
    assert!(calls.lock().expect("lock call log").is_empty());
}

#[tokio::test]
async fn request_fulfillment_error_recovers_through_request_rejection() {
    let mock = MockTransport::new(vec![Ok(json_raw(200, r#"{"ok":true}"#))]);
    let client = client_with(&mock);

    client.interceptors().request().use_interceptor(
        "failing",
        Interceptor::new().on_fulfilled(|_config: EchoConfig| async move {
            Err(EchoError::interceptor("bad config"))
        }),
    );
    client.interceptors().request().use_interceptor(
        "recovery",
        Interceptor::new().on_rejected(|_error: EchoError| async move {
            Ok(Recovery::Recovered(
                EchoConfig::new("/recovered").base_url("https://api.test"),
            ))
        }),
    );

    client
        .get("/test", EchoConfig::default())
        .await
        .expect("recovered request should succeed");

    let captured = mock.captured();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].url, "https://api.test/recovered");
}

#[tokio::test]
async fn unrecovered_request_rejection_never_reaches_the_transport() {
    let mock = MockTransport::new(vec![Ok(json_raw(200, r#"{"ok":true}"#))]);
    let client = client_with(&mock);

    client.interceptors().request().use_interceptor(
        "failing",
        Interceptor::new().on_fulfilled(|_config: EchoConfig| async move {
            Err(EchoError::interceptor("bad config"))
        }),
    );
    client.interceptors().request().use_interceptor(
        "observer",
        Interceptor::new()
            .on_rejected(|error: EchoError| async move { Ok(Recovery::Passthrough(error)) }),
    );

    let error = client
        .get("/test", EchoConfig::default())
        .await
        .expect_err("request should fail");
    assert_eq!(error.code(), EchoErrorCode::Interceptor);
    assert_eq!(error.to_string(), "bad config");
    assert!(mock.captured().is_empty());
}

#[tokio::test]
async fn passthrough_hands_the_transformed_error_to_the_next_hook() {
    let mock = MockTransport::new(vec![Ok(json_raw(200, r#"{"ok":true}"#))]);
    let client = client_with(&mock);

    client.interceptors().request().use_interceptor(
        "failing",
        Interceptor::new().on_fulfilled(|_config: EchoConfig| async move {
            Err(EchoError::interceptor("original"))
        }),
    );
    client.interceptors().request().use_interceptor(
        "transform",
        Interceptor::new().on_rejected(|_error: EchoError| async move {
            Ok(Recovery::Passthrough(EchoError::interceptor("transformed")))
        }),
    );
    client.interceptors().request().use_interceptor(
        "recover",
        Interceptor::new().on_rejected(|error: EchoError| async move {
            assert_eq!(error.to_string(), "transformed");
            Ok(Recovery::Recovered(
                EchoConfig::new("/recovered").base_url("https://api.test"),
            ))
        }),
    );

    client
        .get("/test", EchoConfig::default())
        .await
        .expect("recovered request should succeed");
    assert_eq!(mock.captured().len(), 1);
}

#[tokio::test]
async fn response_fulfillment_hooks_replace_the_response() {
    let mock = MockTransport::new(vec![Ok(json_raw(200, r#"{"ok":true}"#))]);
    let client = client_with(&mock);

    client.interceptors().response().use_interceptor(
        "wrap",
        Interceptor::new().on_fulfilled(|mut response: EchoResponse| async move {
            response.data = ResponseData::Json(json!({"wrapped": true}));
            Ok(response)
        }),
    );

    let response = client
        .get("/test", EchoConfig::default())
        .await
        .expect("request should succeed");
    assert_eq!(response.data.as_json(), Some(&json!({"wrapped": true})));
}

#[tokio::test]
async fn response_rejection_short_circuits_on_first_recovery() {
    let mock = MockTransport::new(vec![Ok(json_raw(404, r#"{"error":"Not Found"}"#))]);
    let client = client_with(&mock);
    let calls = Arc::new(Mutex::new(Vec::new()));

    let log = Arc::clone(&calls);
    client.interceptors().response().use_interceptor(
        "first",
        Interceptor::new().on_rejected(move |error: EchoError| {
            let log = Arc::clone(&log);
            async move {
                log.lock().expect("lock call log").push("first");
                Ok(Recovery::Passthrough(error))
            }
        }),
    );
    let log = Arc::clone(&calls);
    client.interceptors().response().use_interceptor(
        "second",
        Interceptor::new().on_rejected(move |error: EchoError| {
            let log = Arc::clone(&log);
            async move {
                log.lock().expect("lock call log").push("second");
                let mut response = error.into_response().expect("http error carries response");
                response.status = StatusCode::OK;
                response.data = ResponseData::Json(json!({"recovered": true}));
                Ok(Recovery::Recovered(response))
            }
        }),
    );
    let log = Arc::clone(&calls);
    client.interceptors().response().use_interceptor(
        "third",
        Interceptor::new().on_rejected(move |error: EchoError| {
            let log = Arc::clone(&log);
            async move {
                log.lock().expect("lock call log").push("third");
                Ok(Recovery::Passthrough(error))
            }
        }),
    );

    let response = client
        .get("/missing", EchoConfig::default())
        .await
        .expect("recovered response should resolve the call");

    assert_eq!(response.data.as_json(), Some(&json!({"recovered": true})));
    // The third hook is skipped: the first recovery wins.
    assert_eq!(*calls.lock().expect("lock call log"), vec!["first", "second"]);
}

#[tokio::test]
async fn exhausted_response_rejection_rethrows_the_original_error() {
    let mock = MockTransport::new(vec![Ok(json_raw(404, r#"{"error":"Not Found"}"#))]);
    let client = client_with(&mock);

    client.interceptors().response().use_interceptor(
        "observer",
        Interceptor::new()
            .on_rejected(|error: EchoError| async move { Ok(Recovery::Passthrough(error)) }),
    );

    let error = client
        .get("/missing", EchoConfig::default())
        .await
        .expect_err("request should fail");
    assert_eq!(error.code(), EchoErrorCode::HttpStatus);
    let response = error.response().expect("response should be attached");
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.data.as_json(), Some(&json!({"error": "Not Found"})));
}

#[tokio::test]
async fn rejection_hook_error_aborts_the_chain() {
    let mock = MockTransport::new(vec![Ok(json_raw(500, r#"{"error":true}"#))]);
    let client = client_with(&mock);
    let calls = Arc::new(Mutex::new(Vec::new()));

    client.interceptors().response().use_interceptor(
        "aborting",
        Interceptor::new().on_rejected(|_error: EchoError| async move {
            Err(EchoError::interceptor("abort"))
        }),
    );
    let log = Arc::clone(&calls);
    client.interceptors().response().use_interceptor(
        "unreached",
        Interceptor::new().on_rejected(move |error: EchoError| {
            let log = Arc::clone(&log);
            async move {
                log.lock().expect("lock call log").push("unreached");
                Ok(Recovery::Passthrough(error))
            }
        }),
    );

    let error = client
        .get("/broken", EchoConfig::default())
        .await
        .expect_err("request should fail");
    assert_eq!(error.to_string(), "abort");
    assert!(calls.lock().expect("lock call log").is_empty());
}

#[tokio::test]
async fn transport_failure_recovers_through_the_response_rejection_chain() {
    let mock = MockTransport::new(vec![Err(TransportFailure::new(
        TransportErrorKind::Connect,
        "connection refused",
    ))]);
    let client = client_with(&mock);
    let request_rejections = Arc::new(Mutex::new(0usize));

    let counter = Arc::clone(&request_rejections);
    client.interceptors().request().use_interceptor(
        "request-observer",
        Interceptor::new().on_rejected(move |error: EchoError| {
            let counter = Arc::clone(&counter);
            async move {
                *counter.lock().expect("lock counter") += 1;
                Ok(Recovery::Passthrough(error))
            }
        }),
    );
    client.interceptors().response().use_interceptor(
        "fallback",
        Interceptor::new().on_rejected(|error: EchoError| async move {
            assert_eq!(error.code(), EchoErrorCode::Transport);
            let config = error.config().cloned().expect("config should be attached");
            let request = error.request().cloned().expect("request should be attached");
            Ok(Recovery::Recovered(fabricated_response(config, request)))
        }),
    );

    let response = client
        .get("/unreachable", EchoConfig::default())
        .await
        .expect("recovered response should resolve the call");
    assert_eq!(response.data.as_json(), Some(&json!({"fallback": true})));
    // Transport failures are routed to the response chain, not the request
    // chain.
    assert_eq!(*request_rejections.lock().expect("lock counter"), 0);
}

#[tokio::test]
async fn unrecovered_transport_failure_carries_no_response() {
    let mock = MockTransport::new(vec![Err(TransportFailure::new(
        TransportErrorKind::Connect,
        "connection refused",
    ))]);
    let client = client_with(&mock);

    let error = client
        .get("/unreachable", EchoConfig::default())
        .await
        .expect_err("request should fail");
    assert_eq!(error.code(), EchoErrorCode::Transport);
    assert_eq!(error.to_string(), "connection refused");
    assert!(error.response().is_none());
    assert!(error.request().is_some());
}

#[tokio::test]
async fn response_fulfillment_error_feeds_the_response_rejection_chain() {
    let mock = MockTransport::new(vec![Ok(json_raw(200, r#"{"ok":true}"#))]);
    let client = client_with(&mock);

    client.interceptors().response().use_interceptor(
        "failing",
        Interceptor::new().on_fulfilled(|_response: EchoResponse| async move {
            Err(EchoError::interceptor("post-processing failed"))
        }),
    );
    client.interceptors().response().use_interceptor(
        "recovery",
        Interceptor::new().on_rejected(|error: EchoError| async move {
            assert_eq!(error.to_string(), "post-processing failed");
            Ok(Recovery::Recovered(fabricated_response(
                EchoConfig::default(),
                blank_request(),
            )))
        }),
    );

    let response = client
        .get("/test", EchoConfig::default())
        .await
        .expect("recovered response should resolve the call");
    assert_eq!(response.data.as_json(), Some(&json!({"fallback": true})));
}

#[tokio::test]
async fn rejection_hook_can_retry_by_reentering_the_pipeline() {
    let mock = MockTransport::new(vec![
        Ok(json_raw(401, r#"{"error":"expired"}"#)),
        Ok(json_raw(200, r#"{"ok":true}"#)),
    ]);
    let client = client_with(&mock);

    let retry_client = client.clone();
    client.interceptors().response().use_interceptor(
        "refresh",
        Interceptor::new().on_rejected(move |error: EchoError| {
            let client = retry_client.clone();
            async move {
                if error.status() == Some(StatusCode::UNAUTHORIZED) {
                    let retried = client
                        .request(
                            EchoConfig::new("/data").header("Authorization", "Bearer fresh"),
                        )
                        .await?;
                    return Ok(Recovery::Recovered(retried));
                }
                Ok(Recovery::Passthrough(error))
            }
        }),
    );

    let response = client
        .get("/data", EchoConfig::default())
        .await
        .expect("retried request should succeed");
    assert_eq!(response.data.as_json(), Some(&json!({"ok": true})));

    let captured = mock.captured();
    assert_eq!(captured.len(), 2);
    assert!(captured[0].headers.get("Authorization").is_none());
    assert_eq!(
        captured[1].headers.get("Authorization").map(String::as_str),
        Some("Bearer fresh")
    );
}

#[tokio::test]
async fn unsupported_response_type_is_observed_but_never_downgraded() {
    let mock = MockTransport::new(vec![Ok(json_raw(200, r#"{"ok":true}"#))]);
    let client = client_with(&mock);
    let observed = Arc::new(Mutex::new(0usize));

    let counter = Arc::clone(&observed);
    client.interceptors().response().use_interceptor(
        "observer",
        Interceptor::new().on_rejected(move |error: EchoError| {
            let counter = Arc::clone(&counter);
            async move {
                *counter.lock().expect("lock counter") += 1;
                Ok(Recovery::Passthrough(error))
            }
        }),
    );

    let error = client
        .get("/test", EchoConfig::default().response_type("unknown"))
        .await
        .expect_err("unsupported tag should fail");
    assert_eq!(error.code(), EchoErrorCode::ResponseType);
    assert_eq!(error.to_string(), "Unsupported responseType: unknown");
    assert_eq!(*observed.lock().expect("lock counter"), 1);
}

#[tokio::test]
async fn verb_shims_fill_in_method_and_body() {
    let mock = MockTransport::new(vec![
        Ok(json_raw(200, r#"{"ok":true}"#)),
        Ok(json_raw(200, r#"{"ok":true}"#)),
        Ok(json_raw(200, r#"{"ok":true}"#)),
    ]);
    let client = client_with(&mock);

    client
        .get("/items", EchoConfig::default())
        .await
        .expect("get should succeed");
    client
        .post(
            "/items",
            Some(json!({"name": "demo"}).into()),
            EchoConfig::default(),
        )
        .await
        .expect("post should succeed");
    client
        .delete("/items/1", EchoConfig::default())
        .await
        .expect("delete should succeed");

    let captured = mock.captured();
    assert_eq!(captured[0].method, Method::GET);
    assert_eq!(captured[1].method, Method::POST);
    match &captured[1].body {
        Some(echox::RequestBody::Buffered(bytes)) => {
            assert_eq!(bytes.as_ref(), br#"{"name":"demo"}"#);
        }
        other => panic!("unexpected body: {other:?}"),
    }
    assert_eq!(captured[2].method, Method::DELETE);
}

#[tokio::test]
async fn base_configuration_merges_under_per_call_options() {
    let mock = MockTransport::new(vec![Ok(json_raw(200, r#"{"ok":true}"#))]);
    let client = Echo::builder()
        .base_url("https://api.test/api")
        .default_header("X-Base", "base")
        .default_header("X-Shared", "base")
        .transport_arc(Arc::clone(&mock) as Arc<dyn Transport>)
        .try_build()
        .expect("build client");

    client
        .get(
            "/test",
            EchoConfig::default().header("X-Shared", "override"),
        )
        .await
        .expect("request should succeed");

    let captured = mock.captured();
    assert_eq!(captured[0].url, "https://api.test/api/test");
    assert_eq!(captured[0].headers.get("X-Base").map(String::as_str), Some("base"));
    assert_eq!(
        captured[0].headers.get("X-Shared").map(String::as_str),
        Some("override")
    );
}
