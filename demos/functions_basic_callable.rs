//! Minimal callable invocation through a typed registry.
//! Replace the project id with yours before running against a deployed backend.

use firebase_typed_caller::app::{initialize_app, FirebaseAppSettings, FirebaseOptions};
use firebase_typed_caller::functions::{get_functions, TypedCaller};
use serde_json::{json, Value};

firebase_typed_caller::operation_registry! {
    struct DemoFunctions {
        HelloWorld("helloWorld"): Value => Value,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let app = initialize_app(
        FirebaseOptions {
            project_id: Some("your-project-id".into()),
            ..Default::default()
        },
        Some(FirebaseAppSettings::default()),
    )?;

    let functions = get_functions(&app, None)?;
    let caller = TypedCaller::<DemoFunctions>::new(functions);

    match caller.call::<HelloWorld>(&json!({ "text": "hi" })).await {
        Ok(response) => println!("Callable response: {response}"),
        Err(error) => eprintln!("helloWorld failed: {error}"),
    }

    Ok(())
}
