use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::functions::error::FunctionsResult;

#[derive(Clone, Debug)]
pub struct CallableRequest {
    /// Sanitized operation name, used by in-process transports for dispatch.
    pub name: String,
    pub url: String,
    pub payload: JsonValue,
    pub timeout: Duration,
    pub headers: HashMap<String, String>,
}

impl CallableRequest {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        payload: JsonValue,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            payload,
            timeout,
            headers: HashMap::new(),
        }
    }
}

/// Delivers a callable request and returns the raw response body.
///
/// Implementations report every failure (connectivity, remote rejection, decoding) as a
/// `FunctionsError`; enforcing the request timeout is their responsibility too.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait CallableTransport: Send + Sync {
    async fn invoke(&self, request: CallableRequest) -> FunctionsResult<JsonValue>;
}

/// Callable protocol over HTTPS, backed by `reqwest`.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> FunctionsResult<Self> {
        let client = reqwest::Client::builder().build().map_err(|err| {
            crate::functions::error::internal_error(format!(
                "Failed to construct HTTP client: {err}"
            ))
        })?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl CallableTransport for HttpTransport {
    async fn invoke(&self, request: CallableRequest) -> FunctionsResult<JsonValue> {
        http::invoke(&self.client, request).await
    }
}

mod http {
    use super::{CallableRequest, JsonValue};
    use crate::functions::error::{
        deadline_exceeded, error_for_http_response, internal_error, invalid_argument, unavailable,
        FunctionsError, FunctionsErrorCode, FunctionsResult,
    };
    use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
    use reqwest::{Client, Response};
    use std::collections::HashMap;

    pub(super) fn build_headers(headers: &HashMap<String, String>) -> FunctionsResult<HeaderMap> {
        let mut map = HeaderMap::new();
        for (key, value) in headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|err| invalid_argument(format!("invalid header name `{key}`: {err}")))?;
            let header_value = HeaderValue::from_str(value).map_err(|err| {
                invalid_argument(format!("invalid header value for `{key}`: {err}"))
            })?;
            map.insert(name, header_value);
        }
        Ok(map)
    }

    fn map_reqwest_error(err: reqwest::Error) -> FunctionsError {
        if err.is_timeout() {
            return deadline_exceeded(format!("callable request timed out: {err}"));
        }
        #[cfg(not(target_arch = "wasm32"))]
        if err.is_connect() {
            return unavailable(format!("failed to connect to callable endpoint: {err}"));
        }
        if err.is_decode() {
            return internal_error(format!("unable to decode callable response: {err}"));
        }
        if err.is_request() {
            return invalid_argument(format!("malformed callable request: {err}"));
        }
        FunctionsError::new(
            FunctionsErrorCode::Unknown,
            format!("callable request failed: {err}"),
        )
    }

    pub(super) async fn invoke(client: &Client, request: CallableRequest) -> FunctionsResult<JsonValue> {
        let CallableRequest {
            name,
            url,
            payload,
            timeout,
            headers,
        } = request;

        log::debug!("invoking callable `{name}` at {url}");
        let header_map = build_headers(&headers)?;
        let builder = client.post(url).headers(header_map).json(&payload);
        #[cfg(not(target_arch = "wasm32"))]
        let builder = builder.timeout(timeout);
        #[cfg(target_arch = "wasm32")]
        let _ = timeout;

        let response = builder.send().await.map_err(map_reqwest_error)?;
        handle_response(response).await
    }

    async fn handle_response(response: Response) -> FunctionsResult<JsonValue> {
        let status = response.status();
        let bytes = response.bytes().await.map_err(|err| {
            internal_error(format!("failed to read callable response body: {err}"))
        })?;

        let parsed = (!bytes.is_empty()).then(|| serde_json::from_slice::<JsonValue>(&bytes));
        let body = parsed.as_ref().and_then(|parsed| parsed.as_ref().ok());
        if let Some(error) = error_for_http_response(status.as_u16(), body) {
            log::debug!("callable responded with {status}: {error}");
            return Err(error);
        }

        match parsed {
            Some(Ok(body)) => Ok(body),
            Some(Err(err)) => Err(internal_error(format!(
                "callable response is not valid JSON: {err}"
            ))),
            None => Err(internal_error(format!(
                "callable response (HTTP {status}) has no body"
            ))),
        }
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use crate::functions::error::FunctionsErrorCode;
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use serde_json::json;
    use std::panic;

    fn request(url: String) -> CallableRequest {
        CallableRequest::new(
            "ping",
            url,
            json!({ "data": { "n": 1 } }),
            Duration::from_secs(5),
        )
    }

    #[tokio::test(flavor = "current_thread")]
    async fn returns_response_body_on_success() {
        let server = match panic::catch_unwind(|| MockServer::start()) {
            Ok(server) => server,
            Err(_) => {
                eprintln!("Skipping returns_response_body_on_success: unable to bind mock server");
                return;
            }
        };
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/ping")
                .header("x-custom", "yes")
                .json_body(json!({ "data": { "n": 1 } }));
            then.status(200).json_body(json!({ "result": { "n": 2 } }));
        });

        let transport = HttpTransport::new().unwrap();
        let mut req = request(server.url("/ping"));
        req.headers.insert("X-Custom".into(), "yes".into());
        let body = transport.invoke(req).await.unwrap();

        assert_eq!(body, json!({ "result": { "n": 2 } }));
        mock.assert();
    }

    #[tokio::test(flavor = "current_thread")]
    async fn maps_error_payload() {
        let server = match panic::catch_unwind(|| MockServer::start()) {
            Ok(server) => server,
            Err(_) => {
                eprintln!("Skipping maps_error_payload: unable to bind mock server");
                return;
            }
        };
        server.mock(|when, then| {
            when.method(POST).path("/ping");
            then.status(400).json_body(json!({
                "error": {
                    "status": "FAILED_PRECONDITION",
                    "message": "quota not configured",
                    "details": ["quota"]
                }
            }));
        });

        let transport = HttpTransport::new().unwrap();
        let err = transport.invoke(request(server.url("/ping"))).await.unwrap_err();

        assert_eq!(err.code, FunctionsErrorCode::FailedPrecondition);
        assert_eq!(err.message(), "quota not configured");
        assert_eq!(err.details(), Some(&json!(["quota"])));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn rejects_non_json_success_body() {
        let server = match panic::catch_unwind(|| MockServer::start()) {
            Ok(server) => server,
            Err(_) => {
                eprintln!("Skipping rejects_non_json_success_body: unable to bind mock server");
                return;
            }
        };
        server.mock(|when, then| {
            when.method(POST).path("/ping");
            then.status(200).body("<html>not json</html>");
        });

        let transport = HttpTransport::new().unwrap();
        let err = transport.invoke(request(server.url("/ping"))).await.unwrap_err();
        assert_eq!(err.code, FunctionsErrorCode::Internal);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn rejects_empty_success_body() {
        let server = match panic::catch_unwind(|| MockServer::start()) {
            Ok(server) => server,
            Err(_) => {
                eprintln!("Skipping rejects_empty_success_body: unable to bind mock server");
                return;
            }
        };
        server.mock(|when, then| {
            when.method(POST).path("/ping");
            then.status(204);
        });

        let transport = HttpTransport::new().unwrap();
        let err = transport.invoke(request(server.url("/ping"))).await.unwrap_err();
        assert_eq!(err.code, FunctionsErrorCode::Internal);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn unreachable_endpoint_is_unavailable() {
        let transport = HttpTransport::new().unwrap();
        // Port 9 (discard) on localhost is not expected to accept connections.
        let err = transport
            .invoke(request("http://127.0.0.1:9/ping".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(
            err.code,
            FunctionsErrorCode::Unavailable | FunctionsErrorCode::DeadlineExceeded
        ));
    }

    #[test]
    fn invalid_header_name_is_rejected() {
        let mut headers = HashMap::new();
        headers.insert("bad header".to_string(), "v".to_string());
        let err = http::build_headers(&headers).unwrap_err();
        assert_eq!(err.code, FunctionsErrorCode::InvalidArgument);
    }
}
