#![doc = include_str!("README.md")]
mod api;
mod caller;
mod context;
pub mod error;
mod handler;
mod registry;
mod transport;

pub use api::{get_functions, Functions, FunctionsBuilder, FunctionsSettings};
pub use caller::{CallResult, TypedCaller};
pub use context::{CallContext, ContextProvider, StaticContextProvider};
pub use handler::{HandlerRegistry, HandlerRegistryBuilder, LocalTransport};
pub use registry::{Operation, Registers, Registry};
#[doc(hidden)]
pub use registry::names_are_unique;
pub use transport::{CallableRequest, CallableTransport, HttpTransport};
