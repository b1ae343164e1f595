use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value as JsonValue};
use url::Url;

use crate::app::FirebaseApp;
use crate::functions::context::{ContextProvider, StaticContextProvider};
use crate::functions::error::{internal_error, invalid_argument, FunctionsResult};
use crate::functions::transport::{CallableRequest, CallableTransport, HttpTransport};

const DEFAULT_REGION: &str = "us-central1";
const DEFAULT_TIMEOUT_MS: u64 = 70_000;

/// Per-service configuration for [`Functions`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FunctionsSettings {
    /// Either a region (`"europe-west1"`) or a full origin such as
    /// `"https://functions.example.com"`.
    pub region_or_domain: Option<String>,
    /// Upper bound for a single call. Defaults to 70 seconds.
    pub timeout: Option<Duration>,
    /// Request single-use App Check tokens instead of the cached one.
    pub limited_use_app_check_tokens: bool,
}

/// Client for a deployed set of HTTPS callable Functions.
///
/// A `Functions` value is the explicit context shared by every caller: it owns the app
/// handle, the endpoint configuration, the credential source and the transport. Create it
/// once at start-up and hand clones to whatever needs to make calls.
#[derive(Clone)]
pub struct Functions {
    inner: Arc<FunctionsInner>,
}

struct FunctionsInner {
    app: FirebaseApp,
    endpoint: Endpoint,
    timeout: Duration,
    limited_use_app_check_tokens: bool,
    context: Arc<dyn ContextProvider>,
    transport: Arc<dyn CallableTransport>,
}

impl Debug for Functions {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Functions")
            .field("app", &self.inner.app.name())
            .field("endpoint", &self.inner.endpoint)
            .field("timeout", &self.inner.timeout)
            .finish()
    }
}

impl Functions {
    pub fn builder(app: FirebaseApp) -> FunctionsBuilder {
        FunctionsBuilder {
            app,
            settings: FunctionsSettings::default(),
            context: None,
            transport: None,
        }
    }

    pub fn app(&self) -> &FirebaseApp {
        &self.inner.app
    }

    pub fn region(&self) -> &str {
        self.inner.endpoint.region()
    }

    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// Routes every subsequent call to a local Functions emulator.
    pub fn connect_emulator(&self, host: &str, port: u16) {
        let origin = format!("http://{}:{}", host.trim_end_matches('/'), port);
        *self.inner.endpoint.emulator_origin.lock().unwrap() = Some(origin);
    }

    /// Resolves the URL a callable with the given name is served from.
    pub fn callable_url(&self, name: &str) -> FunctionsResult<String> {
        let name = sanitize_name(name)?;
        let project_id = self.inner.app.options().project_id.clone();
        self.inner.endpoint.callable_url(project_id.as_deref(), &name)
    }

    /// Sends `payload` to the Function `name` and returns its decoded `data` field.
    ///
    /// The request and response serialization mirrors the callable protocol: payloads are
    /// wrapped as `{ "data": ... }` and the reply carries the value under `data` or `result`.
    pub async fn invoke(&self, name: &str, payload: JsonValue) -> FunctionsResult<JsonValue> {
        let name = sanitize_name(name)?;
        let project_id = self.inner.app.options().project_id.clone();
        let url = self.inner.endpoint.callable_url(project_id.as_deref(), &name)?;

        let body = json!({ "data": payload });
        let mut request = CallableRequest::new(name, url, body, self.inner.timeout);
        request
            .headers
            .insert("Content-Type".to_string(), "application/json".to_string());

        let context = self
            .inner
            .context
            .get_context(self.inner.limited_use_app_check_tokens)
            .await;
        for (header, value) in context.into_headers() {
            request.headers.insert(header.to_string(), value);
        }

        let response_body = self.inner.transport.invoke(request).await?;
        extract_data(response_body)
    }
}

pub struct FunctionsBuilder {
    app: FirebaseApp,
    settings: FunctionsSettings,
    context: Option<Arc<dyn ContextProvider>>,
    transport: Option<Arc<dyn CallableTransport>>,
}

impl FunctionsBuilder {
    pub fn settings(mut self, settings: FunctionsSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn region_or_domain(mut self, identifier: impl Into<String>) -> Self {
        self.settings.region_or_domain = Some(identifier.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.settings.timeout = Some(timeout);
        self
    }

    pub fn context_provider(mut self, provider: Arc<dyn ContextProvider>) -> Self {
        self.context = Some(provider);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn CallableTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Builds the service, falling back to [`HttpTransport`] and an empty call context.
    pub fn build(self) -> FunctionsResult<Functions> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new()?),
        };
        let context = self
            .context
            .unwrap_or_else(|| Arc::new(StaticContextProvider::default()));
        let timeout = self
            .settings
            .timeout
            .unwrap_or_else(|| Duration::from_millis(DEFAULT_TIMEOUT_MS));
        if timeout.is_zero() {
            return Err(invalid_argument("Functions timeout must be greater than zero"));
        }

        Ok(Functions {
            inner: Arc::new(FunctionsInner {
                app: self.app,
                endpoint: Endpoint::new(self.settings.region_or_domain),
                timeout,
                limited_use_app_check_tokens: self.settings.limited_use_app_check_tokens,
                context,
                transport,
            }),
        })
    }
}

/// Creates a `Functions` client for `app` that talks HTTPS to the given region or domain.
pub fn get_functions(app: &FirebaseApp, region_or_domain: Option<&str>) -> FunctionsResult<Functions> {
    let mut builder = Functions::builder(app.clone());
    if let Some(identifier) = region_or_domain {
        builder = builder.region_or_domain(identifier);
    }
    builder.build()
}

fn sanitize_name(name: &str) -> FunctionsResult<String> {
    let sanitized = name.trim().trim_matches('/');
    if sanitized.is_empty() {
        return Err(invalid_argument("Function name must not be empty"));
    }
    Ok(sanitized.to_string())
}

fn extract_data(body: JsonValue) -> FunctionsResult<JsonValue> {
    match body {
        JsonValue::Object(mut map) => map
            .remove("data")
            .or_else(|| map.remove("result"))
            .ok_or_else(|| internal_error("Callable response JSON is missing a data field")),
        JsonValue::Null => Err(internal_error(
            "Callable response did not contain a JSON payload",
        )),
        other => Err(internal_error(format!(
            "Unexpected callable response shape: expected object, got {other}"
        ))),
    }
}

#[derive(Clone, Debug)]
struct Endpoint {
    region: String,
    custom_domain: Option<String>,
    emulator_origin: Arc<Mutex<Option<String>>>,
}

impl Endpoint {
    fn new(identifier: Option<String>) -> Self {
        match identifier.and_then(|value| {
            let trimmed = value.trim().to_string();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed)
            }
        }) {
            Some(raw) => match Url::parse(&raw) {
                Ok(url) if url.has_host() => {
                    let mut normalized = url.origin().ascii_serialization();
                    let path = url.path();
                    if path != "/" {
                        normalized.push_str(path.trim_end_matches('/'));
                    }
                    Self {
                        custom_domain: Some(normalized),
                        ..Self::default()
                    }
                }
                _ => Self {
                    region: raw,
                    ..Self::default()
                },
            },
            None => Self::default(),
        }
    }

    fn region(&self) -> &str {
        &self.region
    }

    fn callable_url(&self, project_id: Option<&str>, name: &str) -> FunctionsResult<String> {
        let require_project = || {
            project_id.ok_or_else(|| {
                invalid_argument("FirebaseOptions.project_id is required to call Functions")
            })
        };

        if let Some(origin) = self.emulator_origin.lock().unwrap().clone() {
            let project_id = require_project()?;
            return Ok(format!("{origin}/{project_id}/{}/{}", self.region, name));
        }

        if let Some(domain) = &self.custom_domain {
            return Ok(format!("{}/{}", domain.trim_end_matches('/'), name));
        }

        let project_id = require_project()?;
        Ok(format!(
            "https://{}-{}.cloudfunctions.net/{}",
            self.region, project_id, name
        ))
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            custom_domain: None,
            emulator_origin: Arc::new(Mutex::new(None)),
        }
    }
}
