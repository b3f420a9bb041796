//! Tests for `ApiClient`.

use super::{
    ApiClient, ApiSettings, ErrorKind, HttpClient, HttpError, HttpRequest, HttpResponse,
    RequestConfig, RequestError, RequestOptions, ResponseBody, RetryPolicy,
};
use crate::time::Sleeper;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What the mock transport does for one call.
enum Reply {
    Respond(Result<HttpResponse, HttpError>),
    /// Never completes; sets the flag when the future is dropped.
    Hang(Arc<AtomicBool>),
}

/// Mock HTTP client that replays a scripted sequence of replies.
struct MockClient {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<HttpRequest>>,
    call_count: AtomicUsize,
}

impl MockClient {
    fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        })
    }

    fn statuses(statuses: &[u16]) -> Arc<Self> {
        Self::new(
            statuses
                .iter()
                .map(|&code| Reply::Respond(Ok(json_response(code, "{}"))))
                .collect(),
        )
    }

    fn calls(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    fn captured_requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

/// Sets its flag when dropped.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl HttpClient for Arc<MockClient> {
    async fn request(&self, req: HttpRequest) -> Result<HttpResponse, HttpError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(req);
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("mock ran out of replies");

        match reply {
            Reply::Respond(result) => result,
            Reply::Hang(dropped) => {
                let _guard = DropFlag(dropped);
                std::future::pending().await
            }
        }
    }
}

/// Sleeper that records requested delays and returns immediately.
#[derive(Default, Clone)]
struct RecordingSleeper {
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

fn response(code: u16, content_type: Option<&str>, body: &str) -> HttpResponse {
    let mut headers = http::HeaderMap::new();
    if let Some(ct) = content_type {
        headers.insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_str(ct).unwrap(),
        );
    }
    HttpResponse::new(
        http::StatusCode::from_u16(code).unwrap(),
        headers,
        body.as_bytes().to_vec(),
    )
}

fn json_response(code: u16, body: &str) -> HttpResponse {
    response(code, Some("application/json"), body)
}

fn settings() -> ApiSettings {
    ApiSettings::new("https://grafana.example.com").with_api_key("secret-token")
}

fn client_for(
    mock: &Arc<MockClient>,
    settings: ApiSettings,
) -> (ApiClient<Arc<MockClient>, RecordingSleeper>, RecordingSleeper) {
    let sleeper = RecordingSleeper::default();
    let client = ApiClient::new(Arc::clone(mock), settings).with_sleeper(sleeper.clone());
    (client, sleeper)
}

fn options(max_retries: u32, base_delay_ms: u64) -> RequestOptions {
    RequestOptions::new().with_config(
        RequestConfig::new().with_retry(
            RetryPolicy::new()
                .with_max_retries(max_retries)
                .with_base_delay(Duration::from_millis(base_delay_ms)),
        ),
    )
}

mod url_building {
    use super::*;

    async fn requested_url(base: &str, endpoint: &str) -> String {
        let mock = MockClient::statuses(&[200]);
        let (client, _) = client_for(&mock, ApiSettings::new(base).with_api_key("t"));

        client.execute(endpoint, options(0, 0)).await.unwrap();

        mock.captured_requests()[0].url.to_string()
    }

    #[tokio::test]
    async fn leading_slash_on_endpoint_does_not_change_url() {
        let with = requested_url("https://grafana.example.com", "/api/search").await;
        let without = requested_url("https://grafana.example.com", "api/search").await;

        assert_eq!(with, without);
        assert_eq!(with, "https://grafana.example.com/api/search");
    }

    #[tokio::test]
    async fn trailing_slash_on_base_url_does_not_change_url() {
        let with = requested_url("https://grafana.example.com/grafana/", "api/health").await;
        let without = requested_url("https://grafana.example.com/grafana", "api/health").await;

        assert_eq!(with, without);
        assert_eq!(with, "https://grafana.example.com/grafana/api/health");
    }

    #[tokio::test]
    async fn repeated_slashes_collapse_to_one_at_the_join() {
        let url = requested_url("https://grafana.example.com//", "//api/health").await;

        assert_eq!(url, "https://grafana.example.com/api/health");
    }

    #[tokio::test]
    async fn query_string_is_preserved() {
        let url = requested_url("https://grafana.example.com", "/api/search?query=cpu").await;

        assert_eq!(url, "https://grafana.example.com/api/search?query=cpu");
    }
}

mod headers {
    use super::*;

    #[tokio::test]
    async fn sends_bearer_and_json_headers() {
        let mock = MockClient::statuses(&[200]);
        let (client, _) = client_for(&mock, settings());

        client.execute("api/health", options(0, 0)).await.unwrap();

        let request = &mock.captured_requests()[0];
        assert_eq!(
            request.headers.get(http::header::AUTHORIZATION).unwrap(),
            "Bearer secret-token"
        );
        assert_eq!(
            request.headers.get(http::header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(
            request.headers.get(http::header::ACCEPT).unwrap(),
            "application/json"
        );
    }

    #[tokio::test]
    async fn sends_basic_auth_when_no_token() {
        let mock = MockClient::statuses(&[200]);
        let settings =
            ApiSettings::new("https://grafana.example.com").with_basic_auth("admin", "admin");
        let (client, _) = client_for(&mock, settings);

        client.execute("api/health", options(0, 0)).await.unwrap();

        assert_eq!(
            mock.captured_requests()[0]
                .headers
                .get(http::header::AUTHORIZATION)
                .unwrap(),
            "Basic YWRtaW46YWRtaW4="
        );
    }

    #[tokio::test]
    async fn caller_cannot_override_authorization() {
        let mock = MockClient::statuses(&[200]);
        let (client, _) = client_for(&mock, settings());
        let options = options(0, 0).with_header(
            http::header::AUTHORIZATION,
            http::HeaderValue::from_static("Bearer forged"),
        );

        client.execute("api/health", options).await.unwrap();

        let request = &mock.captured_requests()[0];
        let values: Vec<_> = request
            .headers
            .get_all(http::header::AUTHORIZATION)
            .iter()
            .collect();
        assert_eq!(values, vec!["Bearer secret-token"]);
    }

    #[tokio::test]
    async fn non_colliding_caller_headers_are_kept() {
        let mock = MockClient::statuses(&[200]);
        let (client, _) = client_for(&mock, settings());
        let options = options(0, 0).with_header(
            http::HeaderName::from_static("x-grafana-org-id"),
            http::HeaderValue::from_static("2"),
        );

        client.execute("api/health", options).await.unwrap();

        assert_eq!(
            mock.captured_requests()[0]
                .headers
                .get("x-grafana-org-id")
                .unwrap(),
            "2"
        );
    }

    #[tokio::test]
    async fn sends_method_and_body() {
        let mock = MockClient::statuses(&[200]);
        let (client, _) = client_for(&mock, settings());
        let options = options(0, 0)
            .with_method(http::Method::POST)
            .with_body(r#"{"queries":[]}"#);

        client.execute("api/ds/query", options).await.unwrap();

        let request = &mock.captured_requests()[0];
        assert_eq!(request.method, http::Method::POST);
        assert_eq!(request.body.as_deref(), Some(br#"{"queries":[]}"#.as_slice()));
    }
}

mod retries {
    use super::*;

    #[tokio::test]
    async fn server_errors_are_retried_with_doubling_delays() {
        let mock = MockClient::statuses(&[500, 500, 200]);
        let (client, sleeper) = client_for(&mock, settings());

        let result = client.execute("api/search", options(2, 100)).await;

        assert!(result.is_ok());
        assert_eq!(mock.calls(), 3);
        assert_eq!(
            sleeper.delays(),
            vec![Duration::from_millis(100), Duration::from_millis(200)]
        );
    }

    #[tokio::test]
    async fn bad_request_fails_after_one_call() {
        let mock = MockClient::statuses(&[400, 200]);
        let (client, sleeper) = client_for(&mock, settings());

        let err = client
            .execute("api/search", options(3, 100))
            .await
            .unwrap_err();

        assert_eq!(mock.calls(), 1);
        assert!(sleeper.delays().is_empty());
        assert_eq!(err.kind(), Some(ErrorKind::Validation));
        assert_eq!(err.as_api().unwrap().status(), 400);
    }

    #[tokio::test]
    async fn rate_limit_is_retried_despite_unknown_kind() {
        let mock = MockClient::statuses(&[429, 200]);
        let (client, _) = client_for(&mock, settings());

        let result = client.execute("api/search", options(1, 10)).await;

        assert!(result.is_ok());
        assert_eq!(mock.calls(), 2);
    }

    #[tokio::test]
    async fn zero_retries_surfaces_first_server_error() {
        let mock = MockClient::statuses(&[500, 200]);
        let (client, _) = client_for(&mock, settings());

        let err = client
            .execute("api/search", options(0, 10))
            .await
            .unwrap_err();

        assert_eq!(mock.calls(), 1);
        let api = err.as_api().unwrap();
        assert_eq!(api.status(), 500);
        assert_eq!(api.kind(), ErrorKind::Server);
        assert_eq!(api.endpoint(), "api/search");
    }

    #[tokio::test]
    async fn exhausted_retries_surface_last_error() {
        let mock = MockClient::statuses(&[500, 502, 503]);
        let (client, _) = client_for(&mock, settings());

        let err = client
            .execute("api/search", options(2, 10))
            .await
            .unwrap_err();

        assert_eq!(mock.calls(), 3);
        assert_eq!(err.as_api().unwrap().status(), 503);
    }

    #[tokio::test]
    async fn not_found_is_not_retried() {
        let mock = MockClient::statuses(&[404]);
        let (client, _) = client_for(&mock, settings());

        let err = client
            .execute("api/dashboards/uid/nope", options(3, 10))
            .await
            .unwrap_err();

        assert_eq!(mock.calls(), 1);
        assert_eq!(err.kind(), Some(ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn connection_errors_are_retried_as_network() {
        let mock = MockClient::new(vec![
            Reply::Respond(Err(HttpError::Connection("connection refused".into()))),
            Reply::Respond(Err(HttpError::Connection("connection refused".into()))),
        ]);
        let (client, _) = client_for(&mock, settings());

        let err = client
            .execute("api/health", options(1, 10))
            .await
            .unwrap_err();

        assert_eq!(mock.calls(), 2);
        let api = err.as_api().unwrap();
        assert_eq!(api.kind(), ErrorKind::Network);
        assert_eq!(api.status(), 0);
    }

    #[tokio::test]
    async fn unrecognized_transport_errors_are_not_retried() {
        let mock = MockClient::new(vec![Reply::Respond(Err(HttpError::Other(
            "certificate verify failed".into(),
        )))]);
        let (client, _) = client_for(&mock, settings());

        let err = client
            .execute("api/health", options(3, 10))
            .await
            .unwrap_err();

        assert_eq!(mock.calls(), 1);
        assert_eq!(err.kind(), Some(ErrorKind::Unknown));
    }

    #[tokio::test]
    async fn transport_timeout_is_retried() {
        let mock = MockClient::new(vec![
            Reply::Respond(Err(HttpError::Timeout)),
            Reply::Respond(Ok(json_response(200, "{}"))),
        ]);
        let (client, _) = client_for(&mock, settings());

        let result = client.execute("api/health", options(1, 10)).await;

        assert!(result.is_ok());
        assert_eq!(mock.calls(), 2);
    }
}

mod timeouts {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn hung_request_times_out_and_is_aborted() {
        let dropped = Arc::new(AtomicBool::new(false));
        let mock = MockClient::new(vec![Reply::Hang(Arc::clone(&dropped))]);
        let (client, _) = client_for(&mock, settings());
        let options = RequestOptions::new().with_config(
            RequestConfig::new()
                .with_timeout(Duration::from_millis(1000))
                .with_retry(RetryPolicy::none()),
        );
        let start = tokio::time::Instant::now();

        let err = client.execute("api/ds/query", options).await.unwrap_err();

        assert!(start.elapsed() >= Duration::from_millis(1000));
        let api = err.as_api().unwrap();
        assert_eq!(api.kind(), ErrorKind::Timeout);
        assert_eq!(api.status(), 408);
        assert!(api.message().contains("1000ms"));
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn each_attempt_gets_a_full_timeout_window() {
        let first = Arc::new(AtomicBool::new(false));
        let mock = MockClient::new(vec![
            Reply::Hang(Arc::clone(&first)),
            Reply::Respond(Ok(json_response(200, r#"{"ok":true}"#))),
        ]);
        let (client, _) = client_for(&mock, settings());
        let options = RequestOptions::new().with_config(
            RequestConfig::new()
                .with_timeout(Duration::from_millis(500))
                .with_retry(RetryPolicy::new().with_max_retries(1)),
        );

        let body = client.execute("api/health", options).await.unwrap();

        assert_eq!(mock.calls(), 2);
        assert!(first.load(Ordering::SeqCst));
        assert_eq!(body, ResponseBody::Json(serde_json::json!({"ok": true})));
    }
}

mod preconditions {
    use super::*;

    #[tokio::test]
    async fn empty_endpoint_fails_before_anything_else() {
        let mock = MockClient::statuses(&[200]);
        // Missing credentials would also fail; the endpoint check comes first.
        let (client, _) = client_for(&mock, ApiSettings::new(""));

        let err = client.execute("", options(3, 10)).await.unwrap_err();

        assert!(matches!(err, RequestError::InvalidEndpoint));
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn whitespace_endpoint_is_rejected() {
        let mock = MockClient::statuses(&[200]);
        let (client, _) = client_for(&mock, settings());

        let err = client.execute(" \t ", options(3, 10)).await.unwrap_err();

        assert!(matches!(err, RequestError::InvalidEndpoint));
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn missing_credentials_fail_before_transport() {
        let mock = MockClient::statuses(&[200]);
        let (client, sleeper) = client_for(&mock, ApiSettings::new("https://grafana.example.com"));

        let err = client
            .execute("api/health", options(3, 10))
            .await
            .unwrap_err();

        assert_eq!(mock.calls(), 0);
        assert!(sleeper.delays().is_empty());
        let api = err.as_api().unwrap();
        assert_eq!(api.status(), 401);
        assert_eq!(api.kind(), ErrorKind::Authentication);
        assert_eq!(api.endpoint(), "authentication");
    }

    #[tokio::test]
    async fn missing_base_url_is_a_plain_error() {
        let mock = MockClient::statuses(&[200]);
        let (client, _) = client_for(&mock, ApiSettings::new("  ").with_api_key("t"));

        let err = client
            .execute("api/health", options(3, 10))
            .await
            .unwrap_err();

        assert!(matches!(err, RequestError::MissingBaseUrl));
        assert!(err.kind().is_none());
        assert_eq!(mock.calls(), 0);
    }
}

mod decoding {
    use super::*;

    #[tokio::test]
    async fn plain_text_is_returned_as_text() {
        let mock = MockClient::new(vec![Reply::Respond(Ok(response(
            200,
            Some("text/plain"),
            "ok",
        )))]);
        let (client, _) = client_for(&mock, settings());

        let body = client.execute("api/health", options(0, 0)).await.unwrap();

        assert_eq!(body, ResponseBody::Text("ok".to_string()));
    }

    #[tokio::test]
    async fn json_is_parsed() {
        let mock = MockClient::new(vec![Reply::Respond(Ok(json_response(200, r#"{"a":1}"#)))]);
        let (client, _) = client_for(&mock, settings());

        let body = client.execute("api/health", options(0, 0)).await.unwrap();

        let json = body.as_json().unwrap();
        assert_eq!(json["a"], serde_json::json!(1));
    }

    #[tokio::test]
    async fn malformed_json_is_not_retried() {
        let mock = MockClient::new(vec![
            Reply::Respond(Ok(json_response(200, "{not json"))),
            Reply::Respond(Ok(json_response(200, "{}"))),
        ]);
        let (client, _) = client_for(&mock, settings());

        let err = client
            .execute("api/health", options(3, 10))
            .await
            .unwrap_err();

        assert!(matches!(err, RequestError::Decode { .. }));
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn error_body_is_included_in_message() {
        let mock = MockClient::new(vec![Reply::Respond(Ok(json_response(
            403,
            r#"{"message":"Permission denied"}"#,
        )))]);
        let (client, _) = client_for(&mock, settings());

        let err = client
            .execute("api/datasources", options(0, 0))
            .await
            .unwrap_err();

        let api = err.as_api().unwrap();
        assert_eq!(api.kind(), ErrorKind::Authorization);
        assert!(api.message().contains("Permission denied"));
    }
}

mod convenience {
    use super::*;

    #[tokio::test]
    async fn get_uses_client_defaults() {
        let mock = MockClient::statuses(&[503, 200]);
        let sleeper = RecordingSleeper::default();
        let client = ApiClient::new(Arc::clone(&mock), settings())
            .with_sleeper(sleeper.clone())
            .with_defaults(
                RequestConfig::new().with_retry(
                    RetryPolicy::new()
                        .with_max_retries(1)
                        .with_base_delay(Duration::from_millis(250)),
                ),
            );

        client.get("api/health").await.unwrap();

        assert_eq!(mock.calls(), 2);
        assert_eq!(sleeper.delays(), vec![Duration::from_millis(250)]);
    }

    #[tokio::test]
    async fn post_json_serializes_body() {
        let mock = MockClient::statuses(&[200]);
        let (client, _) = client_for(&mock, settings());

        client
            .post_json("api/ds/query", &serde_json::json!({"from": "now-1h"}))
            .await
            .unwrap();

        let request = &mock.captured_requests()[0];
        assert_eq!(request.method, http::Method::POST);
        let body: serde_json::Value =
            serde_json::from_slice(request.body.as_ref().unwrap()).unwrap();
        assert_eq!(body["from"], "now-1h");
    }

    #[test]
    fn default_config_matches_documented_values() {
        let config = RequestConfig::default();

        assert_eq!(config.timeout, Duration::from_millis(30_000));
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.base_delay, Duration::from_millis(1000));
        assert!(!config.log_requests);
        assert_eq!(RequestOptions::new().method, http::Method::GET);
    }
}

mod logging {
    use super::super::{REDACTED, redacted_headers};
    use super::*;

    #[test]
    fn authorization_value_is_redacted() {
        let mut headers = http::HeaderMap::new();
        headers.insert(
            http::header::AUTHORIZATION,
            http::HeaderValue::from_static("Bearer secret-token"),
        );
        headers.insert(
            http::header::ACCEPT,
            http::HeaderValue::from_static("application/json"),
        );

        let rendered = redacted_headers(&headers);

        assert!(rendered.contains(&("authorization".to_string(), REDACTED.to_string())));
        assert!(rendered.contains(&("accept".to_string(), "application/json".to_string())));
        assert!(!format!("{rendered:?}").contains("secret-token"));
    }

    /// In-memory sink for a `tracing_subscriber::fmt` subscriber.
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Runs a request that fails once then succeeds, returning what was logged.
    async fn captured_logs(log_requests: bool) -> String {
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let mock = MockClient::statuses(&[503, 200]);
        let (client, _) = client_for(&mock, settings());
        let options = RequestOptions::new().with_config(
            RequestConfig::new()
                .with_logging(log_requests)
                .with_retry(RetryPolicy::new().with_max_retries(1)),
        );

        client.execute("api/health", options).await.unwrap();
        assert_eq!(mock.calls(), 2);

        buffer.contents()
    }

    #[tokio::test]
    async fn logged_attempts_never_contain_the_token() {
        let logs = captured_logs(true).await;

        assert!(logs.contains("Sending API request"));
        assert!(logs.contains(REDACTED));
        assert!(!logs.contains("secret-token"));
    }

    #[tokio::test]
    async fn nothing_is_logged_when_disabled() {
        let logs = captured_logs(false).await;

        assert!(logs.is_empty(), "unexpected log output: {logs}");
    }

    #[tokio::test]
    async fn logging_enabled_does_not_change_outcome() {
        let mock = MockClient::statuses(&[500, 200]);
        let (client, _) = client_for(&mock, settings());
        let options = RequestOptions::new().with_config(
            RequestConfig::new()
                .with_logging(true)
                .with_retry(RetryPolicy::new().with_max_retries(1)),
        );

        let result = client.execute("api/health", options).await;

        assert!(result.is_ok());
        assert_eq!(mock.calls(), 2);
    }
}
