//! Typed request/response example, served in-process.
//! The same operation registry drives both the handler table and the caller, so payload and
//! result shapes are checked by the compiler on both sides.

use std::sync::Arc;

use firebase_typed_caller::app::{initialize_app, FirebaseOptions};
use firebase_typed_caller::functions::error::{invalid_argument, FunctionsResult};
use firebase_typed_caller::functions::{
    Functions, HandlerRegistry, LocalTransport, Operation, TypedCaller,
};
use firebase_typed_caller::util::log_call_error;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
struct AddRequest {
    a: i64,
    b: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct AddResponse {
    sum: i64,
}

firebase_typed_caller::operation_registry! {
    struct MathFunctions {
        AddNumbers("addNumbers"): AddRequest => AddResponse,
    }
}

async fn add_numbers(request: AddRequest) -> FunctionsResult<AddResponse> {
    let sum = request
        .a
        .checked_add(request.b)
        .ok_or_else(|| invalid_argument("sum overflows i64"))?;
    Ok(AddResponse { sum })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let app = initialize_app(
        FirebaseOptions {
            project_id: Some("local-project".into()),
            ..Default::default()
        },
        None,
    )?;

    let handlers = HandlerRegistry::builder()
        .register::<AddNumbers, _, _>(add_numbers)
        .build();
    let functions = Functions::builder(app)
        .transport(Arc::new(LocalTransport::new(handlers)))
        .build()?;
    let caller = TypedCaller::<MathFunctions>::new(functions);

    let response = caller.call::<AddNumbers>(&AddRequest { a: 5, b: 7 }).await?;
    println!("5 + 7 = {}", response.sum);

    let overflow = caller
        .call::<AddNumbers>(&AddRequest { a: i64::MAX, b: 1 })
        .await;
    let _ = log_call_error(AddNumbers::NAME, overflow);

    Ok(())
}
