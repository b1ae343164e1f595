use crate::app::constants::DEFAULT_ENTRY_NAME;
use crate::app::errors::{AppError, AppResult};
use crate::app::types::{FirebaseApp, FirebaseAppSettings, FirebaseOptions};

/// Creates an app handle from the project options.
///
/// The returned value is the only reference to the app; nothing is stored globally, so
/// initializing two apps with the same name is allowed and yields two independent handles.
///
/// # Examples
/// ```
/// use firebase_typed_caller::app::{initialize_app, FirebaseAppSettings, FirebaseOptions};
///
/// let app = initialize_app(
///     FirebaseOptions {
///         project_id: Some("demo-project".into()),
///         ..Default::default()
///     },
///     Some(FirebaseAppSettings {
///         name: Some("secondary".into()),
///         ..Default::default()
///     }),
/// )
/// .unwrap();
/// assert_eq!(app.name(), "secondary");
/// ```
pub fn initialize_app(
    options: FirebaseOptions,
    settings: Option<FirebaseAppSettings>,
) -> AppResult<FirebaseApp> {
    let settings = settings.unwrap_or_default();
    let name = settings
        .name
        .unwrap_or_else(|| DEFAULT_ENTRY_NAME.to_string());

    if name.trim().is_empty() {
        return Err(AppError::BadAppName { app_name: name });
    }

    if options.is_empty() {
        return Err(AppError::NoOptions);
    }

    let automatic = settings.automatic_data_collection_enabled.unwrap_or(true);
    Ok(FirebaseApp::new(name, options, automatic))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> FirebaseOptions {
        FirebaseOptions {
            project_id: Some("demo-project".into()),
            ..Default::default()
        }
    }

    #[test]
    fn default_name_is_used_without_settings() {
        let app = initialize_app(options(), None).unwrap();
        assert_eq!(app.name(), DEFAULT_ENTRY_NAME);
        assert!(app.automatic_data_collection_enabled());
        assert_eq!(app.options().project_id.as_deref(), Some("demo-project"));
    }

    #[test]
    fn blank_name_is_rejected() {
        let settings = FirebaseAppSettings {
            name: Some("  ".into()),
            ..Default::default()
        };
        let err = initialize_app(options(), Some(settings)).unwrap_err();
        assert!(matches!(err, AppError::BadAppName { .. }));
    }

    #[test]
    fn empty_options_are_rejected() {
        let err = initialize_app(FirebaseOptions::default(), None).unwrap_err();
        assert_eq!(err, AppError::NoOptions);
    }

    #[test]
    fn clones_share_configuration() {
        let app = initialize_app(options(), None).unwrap();
        let clone = app.clone();
        assert_eq!(clone.options(), app.options());
        assert_eq!(clone.name(), app.name());
    }
}
