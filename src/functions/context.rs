use std::fmt::{Debug, Formatter};
use std::sync::Mutex;

use async_trait::async_trait;

/// Metadata that may be attached to callable Function requests.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallContext {
    pub auth_token: Option<String>,
    pub messaging_token: Option<String>,
    pub app_check_token: Option<String>,
    pub app_check_heartbeat: Option<String>,
}

impl CallContext {
    /// Request headers for the tokens that are present; empty tokens are skipped.
    pub(crate) fn into_headers(self) -> Vec<(&'static str, String)> {
        let bearer = self.auth_token.filter(|token| !token.is_empty());
        [
            ("Authorization", bearer.map(|token| format!("Bearer {token}"))),
            ("Firebase-Instance-ID-Token", self.messaging_token),
            ("X-Firebase-AppCheck", self.app_check_token),
            ("X-Firebase-Client", self.app_check_heartbeat),
        ]
        .into_iter()
        .filter_map(|(header, value)| value.filter(|value| !value.is_empty()).map(|value| (header, value)))
        .collect()
    }
}

/// Source of the credentials sent alongside each callable request.
///
/// Implementations typically wrap an auth client or an App Check token cache. They are
/// asked once per call and must not fail: a missing token is simply omitted.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait ContextProvider: Send + Sync {
    async fn get_context(&self, limited_use_app_check_tokens: bool) -> CallContext;
}

/// Provider returning a fixed context that can be swapped at runtime.
#[derive(Default)]
pub struct StaticContextProvider {
    context: Mutex<CallContext>,
}

impl Debug for StaticContextProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let context = self.context.lock().unwrap();
        f.debug_struct("StaticContextProvider")
            .field("has_auth_token", &context.auth_token.is_some())
            .field("has_messaging_token", &context.messaging_token.is_some())
            .field("has_app_check_token", &context.app_check_token.is_some())
            .finish()
    }
}

impl StaticContextProvider {
    pub fn new(context: CallContext) -> Self {
        Self {
            context: Mutex::new(context),
        }
    }

    pub fn set_context(&self, context: CallContext) {
        *self.context.lock().unwrap() = context;
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl ContextProvider for StaticContextProvider {
    async fn get_context(&self, _limited_use_app_check_tokens: bool) -> CallContext {
        self.context.lock().unwrap().clone()
    }
}
