#![doc = include_str!("README.md")]
mod api;
mod constants;
mod errors;
mod types;

#[doc(inline)]
pub use api::initialize_app;

#[doc(inline)]
pub use constants::DEFAULT_ENTRY_NAME;

#[doc(inline)]
pub use errors::{AppError, AppResult};

#[doc(inline)]
pub use types::{FirebaseApp, FirebaseAppSettings, FirebaseOptions};
