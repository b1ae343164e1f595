use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{json, Value as JsonValue};

use crate::functions::error::{internal_error, invalid_argument, not_found, FunctionsResult};
use crate::functions::registry::Operation;
use crate::functions::transport::{CallableRequest, CallableTransport};

type BoxedHandler = Arc<dyn Fn(JsonValue) -> BoxFuture<'static, FunctionsResult<JsonValue>> + Send + Sync>;

/// Server-side table mapping operation names to their handlers.
///
/// Built once through [`HandlerRegistry::builder`] and immutable afterwards, so it can be
/// shared freely between concurrent dispatches.
pub struct HandlerRegistry {
    handlers: HashMap<String, BoxedHandler>,
}

impl Debug for HandlerRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("operations", &self.names())
            .finish()
    }
}

impl HandlerRegistry {
    pub fn builder() -> HandlerRegistryBuilder {
        HandlerRegistryBuilder::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered operation names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Runs the handler registered under `name` with the raw JSON payload.
    pub async fn dispatch(&self, name: &str, payload: JsonValue) -> FunctionsResult<JsonValue> {
        let handler = self
            .handlers
            .get(name)
            .cloned()
            .ok_or_else(|| not_found(format!("No handler registered for `{name}`")))?;
        handler(payload).await
    }
}

#[derive(Default)]
pub struct HandlerRegistryBuilder {
    handlers: HashMap<String, BoxedHandler>,
}

impl HandlerRegistryBuilder {
    /// Registers `handler` for `Op`.
    ///
    /// The handler only ever sees a payload that decoded into `Op::Input`; anything else is
    /// rejected with `invalid-argument` before it runs. Registering the same name twice
    /// replaces the earlier handler.
    pub fn register<Op, F, Fut>(mut self, handler: F) -> Self
    where
        Op: Operation,
        F: Fn(Op::Input) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FunctionsResult<Op::Output>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let boxed: BoxedHandler = Arc::new(move |payload: JsonValue| {
            let handler = Arc::clone(&handler);
            async move {
                let input: Op::Input = serde_json::from_value(payload).map_err(|err| {
                    invalid_argument(format!("Invalid payload for `{}`: {err}", Op::NAME))
                })?;
                let output = handler(input).await?;
                serde_json::to_value(output).map_err(|err| {
                    internal_error(format!(
                        "Failed to serialize result of `{}`: {err}",
                        Op::NAME
                    ))
                })
            }
            .boxed()
        });

        if self.handlers.insert(Op::NAME.to_string(), boxed).is_some() {
            log::warn!("handler for `{}` registered twice; keeping the latest", Op::NAME);
        }
        self
    }

    pub fn build(self) -> HandlerRegistry {
        HandlerRegistry {
            handlers: self.handlers,
        }
    }
}

/// Transport that dispatches callable requests to an in-process [`HandlerRegistry`].
///
/// Speaks the same envelope as the HTTPS protocol (`{"data": ...}` in, `{"result": ...}` out),
/// which makes it a drop-in stand-in for a deployed backend.
#[derive(Clone, Debug)]
pub struct LocalTransport {
    registry: Arc<HandlerRegistry>,
}

impl LocalTransport {
    pub fn new(registry: HandlerRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl CallableTransport for LocalTransport {
    async fn invoke(&self, request: CallableRequest) -> FunctionsResult<JsonValue> {
        let data = match request.payload {
            JsonValue::Object(mut envelope) => envelope.remove("data").unwrap_or(JsonValue::Null),
            other => other,
        };
        let result = self.registry.dispatch(&request.name, data).await?;
        Ok(json!({ "result": result }))
    }
}
