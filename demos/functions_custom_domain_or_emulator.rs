//! Target a callable through a custom domain or the local emulator.
//! Pass a full origin (and optional path) as the region to use a custom domain, or call
//! `connect_emulator` to route every call to a local emulator.

use firebase_typed_caller::app::{initialize_app, FirebaseAppSettings, FirebaseOptions};
use firebase_typed_caller::functions::{get_functions, TypedCaller};
use serde_json::{json, Value};

firebase_typed_caller::operation_registry! {
    struct DemoFunctions {
        Ping("ping"): Value => Value,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let app = initialize_app(
        FirebaseOptions {
            project_id: Some("my-project".into()),
            ..Default::default()
        },
        Some(FirebaseAppSettings::default()),
    )?;

    let functions = match std::env::var("FUNCTIONS_ORIGIN") {
        // The identifier is interpreted as a domain when it parses as a URL.
        Ok(origin) => get_functions(&app, Some(&origin))?,
        Err(_) => {
            let functions = get_functions(&app, Some("us-central1"))?;
            functions.connect_emulator("127.0.0.1", 5001);
            functions
        }
    };

    let caller = TypedCaller::<DemoFunctions>::new(functions);
    match caller.call::<Ping>(&json!({ "from": "custom-domain" })).await {
        Ok(response) => println!("Callable response: {response}"),
        Err(error) => eprintln!("ping failed with {}: {error}", error.code_str()),
    }

    Ok(())
}
