use std::any::Any;
use std::future::Future;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use serde_json::Value as JsonValue;

use crate::functions::api::Functions;
use crate::functions::error::{internal_error, not_found, FunctionsError, FunctionsResult};
use crate::functions::registry::{Operation, Registers, Registry};

/// Outcome of a single call: `Ok` with the decoded output or `Err` with the failure as
/// reported by the transport or the remote handler.
pub type CallResult<T> = FunctionsResult<T>;

/// Invokes the operations of registry `R` and turns every outcome into a [`CallResult`].
///
/// `call` only accepts operations that `R` registers, so a payload or result of the wrong
/// shape is a compile error rather than a runtime surprise. Failures of any kind,
/// including a panic while marshaling or inside the transport, come back as `Err`;
/// nothing is rethrown.
///
/// The caller keeps no state between calls: it never caches, retries or logs, and any
/// number of calls may be in flight at once.
///
/// # Examples
/// ```
/// # use firebase_typed_caller::app::{initialize_app, FirebaseOptions};
/// # use firebase_typed_caller::functions::{
/// #     Functions, HandlerRegistry, LocalTransport, TypedCaller,
/// # };
/// # use firebase_typed_caller::functions::error::FunctionsResult;
/// # use std::sync::Arc;
/// firebase_typed_caller::operation_registry! {
///     pub struct MathFunctions {
///         Double("double"): i64 => i64,
///     }
/// }
///
/// async fn double(n: i64) -> FunctionsResult<i64> {
///     Ok(n * 2)
/// }
///
/// # futures::executor::block_on(async {
/// let app = initialize_app(
///     FirebaseOptions {
///         project_id: Some("demo-project".into()),
///         ..Default::default()
///     },
///     None,
/// )
/// .unwrap();
/// let handlers = HandlerRegistry::builder()
///     .register::<Double, _, _>(double)
///     .build();
/// let functions = Functions::builder(app)
///     .transport(Arc::new(LocalTransport::new(handlers)))
///     .build()
///     .unwrap();
///
/// let caller = TypedCaller::<MathFunctions>::new(functions);
/// match caller.call::<Double>(&21).await {
///     Ok(value) => assert_eq!(value, 42),
///     Err(error) => panic!("unexpected failure: {error}"),
/// }
/// # });
/// ```
pub struct TypedCaller<R> {
    functions: Functions,
    _registry: PhantomData<fn() -> R>,
}

impl<R> Clone for TypedCaller<R> {
    fn clone(&self) -> Self {
        Self {
            functions: self.functions.clone(),
            _registry: PhantomData,
        }
    }
}

impl<R> std::fmt::Debug for TypedCaller<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedCaller")
            .field("registry", &std::any::type_name::<R>())
            .field("functions", &self.functions)
            .finish()
    }
}

impl<R: Registry> TypedCaller<R> {
    pub fn new(functions: Functions) -> Self {
        Self {
            functions,
            _registry: PhantomData,
        }
    }

    pub fn functions(&self) -> &Functions {
        &self.functions
    }

    /// Calls `Op` with `payload`.
    ///
    /// The response is decoded into `Op::Output` without further validation; a body that
    /// does not match the declared shape is reported as an `internal` error.
    pub async fn call<Op>(&self, payload: &Op::Input) -> CallResult<Op::Output>
    where
        Op: Operation,
        R: Registers<Op>,
    {
        guarded(Op::NAME, self.marshal_and_invoke::<Op>(payload)).await
    }

    async fn marshal_and_invoke<Op: Operation>(&self, payload: &Op::Input) -> CallResult<Op::Output> {
        let payload = serde_json::to_value(payload).map_err(|err| {
            internal_error(format!(
                "Failed to serialize payload for `{}`: {err}",
                Op::NAME
            ))
        })?;
        let value = self.functions.invoke(Op::NAME, payload).await?;
        serde_json::from_value(value).map_err(|err| {
            internal_error(format!(
                "Failed to deserialize response of `{}`: {err}",
                Op::NAME
            ))
        })
    }

    /// Calls an operation chosen at runtime.
    ///
    /// Names outside the registry are rejected with `not-found` before anything is sent.
    pub async fn call_by_name(&self, name: &str, payload: JsonValue) -> CallResult<JsonValue> {
        let trimmed = name.trim().trim_matches('/');
        if !R::contains(trimmed) {
            return Err(not_found(format!(
                "`{trimmed}` is not a registered operation"
            )));
        }
        guarded(trimmed, self.functions.invoke(trimmed, payload)).await
    }
}

/// Runs a whole call, marshaling included, and turns a panic anywhere inside it into `Err`.
async fn guarded<T, F>(name: &str, attempt: F) -> CallResult<T>
where
    F: Future<Output = CallResult<T>>,
{
    match AssertUnwindSafe(attempt).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(panicked(name, panic)),
    }
}

fn panicked(name: &str, panic: Box<dyn Any + Send>) -> FunctionsError {
    let reason = panic
        .downcast_ref::<&str>()
        .map(|text| text.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    internal_error(format!("Call to `{name}` panicked: {reason}"))
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use crate::app::{initialize_app, FirebaseOptions};
    use crate::functions::error::FunctionsErrorCode;
    use crate::functions::handler::{HandlerRegistry, LocalTransport};
    use crate::functions::transport::{CallableRequest, CallableTransport};
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug, Serialize, Deserialize)]
    struct Tally {
        amount: u32,
    }

    #[derive(Debug, Deserialize)]
    struct Brittle;

    impl Serialize for Brittle {
        fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            panic!("cannot encode brittle payload")
        }
    }

    #[derive(Debug, Serialize)]
    struct Picky;

    impl<'de> Deserialize<'de> for Picky {
        fn deserialize<D: serde::Deserializer<'de>>(_deserializer: D) -> Result<Self, D::Error> {
            panic!("cannot decode picky result")
        }
    }

    crate::operation_registry! {
        struct Counter {
            Add("add"): Tally => u32,
            Explode("explode"): () => (),
            Encode("encode"): Brittle => u32,
            Decode("decode"): () => Picky,
        }
    }

    fn functions_with(transport: Arc<dyn CallableTransport>) -> Functions {
        let app = initialize_app(
            FirebaseOptions {
                project_id: Some("caller-tests".into()),
                ..Default::default()
            },
            None,
        )
        .unwrap();
        Functions::builder(app).transport(transport).build().unwrap()
    }

    async fn explode(_: ()) -> FunctionsResult<()> {
        panic!("handler blew up")
    }

    fn counting_caller(hits: Arc<AtomicUsize>) -> TypedCaller<Counter> {
        let registry = HandlerRegistry::builder()
            .register::<Add, _, _>(move |tally: Tally| {
                let hits = hits.clone();
                async move {
                    let seen = hits.fetch_add(1, Ordering::SeqCst) as u32;
                    Ok::<_, FunctionsError>(seen + tally.amount)
                }
            })
            .register::<Explode, _, _>(explode)
            .build();
        TypedCaller::new(functions_with(Arc::new(LocalTransport::new(registry))))
    }

    #[tokio::test(flavor = "current_thread")]
    async fn repeated_calls_are_not_cached() {
        let hits = Arc::new(AtomicUsize::new(0));
        let caller = counting_caller(hits.clone());

        let first = caller.call::<Add>(&Tally { amount: 10 }).await.unwrap();
        let second = caller.call::<Add>(&Tally { amount: 10 }).await.unwrap();

        assert_eq!(first, 10);
        assert_eq!(second, 11);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn panicking_handler_becomes_internal_error() {
        let caller = counting_caller(Arc::new(AtomicUsize::new(0)));
        let err = caller.call::<Explode>(&()).await.unwrap_err();
        assert_eq!(err.code, FunctionsErrorCode::Internal);
        assert!(err.message().contains("handler blew up"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn call_by_name_rejects_unregistered_operation() {
        let hits = Arc::new(AtomicUsize::new(0));
        let caller = counting_caller(hits.clone());

        let err = caller
            .call_by_name("deleteEverything", json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.code, FunctionsErrorCode::NotFound);
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        let value = caller
            .call_by_name("/add", json!({ "amount": 3 }))
            .await
            .unwrap();
        assert_eq!(value, json!(3));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn panicking_payload_serializer_becomes_internal_error() {
        let hits = Arc::new(AtomicUsize::new(0));
        let caller = counting_caller(hits.clone());

        let outcome = AssertUnwindSafe(caller.call::<Encode>(&Brittle))
            .catch_unwind()
            .await;

        let err = outcome.expect("call must not unwind").unwrap_err();
        assert_eq!(err.code, FunctionsErrorCode::Internal);
        assert!(err.message().contains("cannot encode brittle payload"));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn panicking_result_deserializer_becomes_internal_error() {
        let caller = TypedCaller::<Counter>::new(functions_with(Arc::new(MismatchedTransport)));

        let outcome = AssertUnwindSafe(caller.call::<Decode>(&()))
            .catch_unwind()
            .await;

        let err = outcome.expect("call must not unwind").unwrap_err();
        assert_eq!(err.code, FunctionsErrorCode::Internal);
        assert!(err.message().contains("cannot decode picky result"));
    }

    struct MismatchedTransport;

    #[async_trait]
    impl CallableTransport for MismatchedTransport {
        async fn invoke(&self, _request: CallableRequest) -> FunctionsResult<JsonValue> {
            Ok(json!({ "data": "not a number" }))
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn mismatched_response_shape_is_internal_error() {
        let caller = TypedCaller::<Counter>::new(functions_with(Arc::new(MismatchedTransport)));
        let err = caller.call::<Add>(&Tally { amount: 1 }).await.unwrap_err();
        assert_eq!(err.code, FunctionsErrorCode::Internal);
    }
}
