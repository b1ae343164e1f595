use std::sync::Arc;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FirebaseOptions {
    pub api_key: Option<String>,
    pub auth_domain: Option<String>,
    pub database_url: Option<String>,
    pub project_id: Option<String>,
    pub storage_bucket: Option<String>,
    pub messaging_sender_id: Option<String>,
    pub app_id: Option<String>,
    pub measurement_id: Option<String>,
}

impl FirebaseOptions {
    pub(crate) fn is_empty(&self) -> bool {
        self == &FirebaseOptions::default()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FirebaseAppSettings {
    pub name: Option<String>,
    pub automatic_data_collection_enabled: Option<bool>,
}

/// Handle to an initialized app. Cheap to clone; all clones share the same configuration.
#[derive(Clone)]
pub struct FirebaseApp {
    inner: Arc<FirebaseAppInner>,
}

struct FirebaseAppInner {
    name: String,
    options: FirebaseOptions,
    automatic_data_collection_enabled: bool,
}

impl FirebaseApp {
    pub(crate) fn new(name: String, options: FirebaseOptions, automatic_data_collection_enabled: bool) -> Self {
        Self {
            inner: Arc::new(FirebaseAppInner {
                name,
                options,
                automatic_data_collection_enabled,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn options(&self) -> &FirebaseOptions {
        &self.inner.options
    }

    pub fn automatic_data_collection_enabled(&self) -> bool {
        self.inner.automatic_data_collection_enabled
    }
}

impl std::fmt::Debug for FirebaseApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseApp")
            .field("name", &self.name())
            .field("project_id", &self.inner.options.project_id)
            .finish()
    }
}
