use std::fmt::{Display, Formatter};

use serde::Deserialize;
use serde_json::Value as JsonValue;

/// Canonical status codes used by the callable Functions protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FunctionsErrorCode {
    Ok,
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    DataLoss,
    Unauthenticated,
}

impl FunctionsErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FunctionsErrorCode::Ok => "functions/ok",
            FunctionsErrorCode::Cancelled => "functions/cancelled",
            FunctionsErrorCode::Unknown => "functions/unknown",
            FunctionsErrorCode::InvalidArgument => "functions/invalid-argument",
            FunctionsErrorCode::DeadlineExceeded => "functions/deadline-exceeded",
            FunctionsErrorCode::NotFound => "functions/not-found",
            FunctionsErrorCode::AlreadyExists => "functions/already-exists",
            FunctionsErrorCode::PermissionDenied => "functions/permission-denied",
            FunctionsErrorCode::ResourceExhausted => "functions/resource-exhausted",
            FunctionsErrorCode::FailedPrecondition => "functions/failed-precondition",
            FunctionsErrorCode::Aborted => "functions/aborted",
            FunctionsErrorCode::OutOfRange => "functions/out-of-range",
            FunctionsErrorCode::Unimplemented => "functions/unimplemented",
            FunctionsErrorCode::Internal => "functions/internal",
            FunctionsErrorCode::Unavailable => "functions/unavailable",
            FunctionsErrorCode::DataLoss => "functions/data-loss",
            FunctionsErrorCode::Unauthenticated => "functions/unauthenticated",
        }
    }

    /// Parses the `status` string found in callable error payloads
    /// (`"INVALID_ARGUMENT"`, `"NOT_FOUND"`, ...).
    pub fn from_status(status: &str) -> Option<Self> {
        let code = match status {
            "OK" => FunctionsErrorCode::Ok,
            "CANCELLED" => FunctionsErrorCode::Cancelled,
            "UNKNOWN" => FunctionsErrorCode::Unknown,
            "INVALID_ARGUMENT" => FunctionsErrorCode::InvalidArgument,
            "DEADLINE_EXCEEDED" => FunctionsErrorCode::DeadlineExceeded,
            "NOT_FOUND" => FunctionsErrorCode::NotFound,
            "ALREADY_EXISTS" => FunctionsErrorCode::AlreadyExists,
            "PERMISSION_DENIED" => FunctionsErrorCode::PermissionDenied,
            "RESOURCE_EXHAUSTED" => FunctionsErrorCode::ResourceExhausted,
            "FAILED_PRECONDITION" => FunctionsErrorCode::FailedPrecondition,
            "ABORTED" => FunctionsErrorCode::Aborted,
            "OUT_OF_RANGE" => FunctionsErrorCode::OutOfRange,
            "UNIMPLEMENTED" => FunctionsErrorCode::Unimplemented,
            "INTERNAL" => FunctionsErrorCode::Internal,
            "UNAVAILABLE" => FunctionsErrorCode::Unavailable,
            "DATA_LOSS" => FunctionsErrorCode::DataLoss,
            "UNAUTHENTICATED" => FunctionsErrorCode::Unauthenticated,
            _ => return None,
        };
        Some(code)
    }

    /// Maps a non-successful HTTP status to the closest callable code.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            200..=299 => FunctionsErrorCode::Ok,
            400 => FunctionsErrorCode::InvalidArgument,
            401 => FunctionsErrorCode::Unauthenticated,
            403 => FunctionsErrorCode::PermissionDenied,
            404 => FunctionsErrorCode::NotFound,
            409 => FunctionsErrorCode::Aborted,
            429 => FunctionsErrorCode::ResourceExhausted,
            499 => FunctionsErrorCode::Cancelled,
            500 => FunctionsErrorCode::Internal,
            501 => FunctionsErrorCode::Unimplemented,
            503 => FunctionsErrorCode::Unavailable,
            504 => FunctionsErrorCode::DeadlineExceeded,
            _ => FunctionsErrorCode::Unknown,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionsError {
    pub code: FunctionsErrorCode,
    message: String,
    details: Option<JsonValue>,
}

impl FunctionsError {
    pub fn new(code: FunctionsErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: JsonValue) -> Self {
        self.details = Some(details);
        self
    }

    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Extra data attached by the remote handler, passed through untouched.
    pub fn details(&self) -> Option<&JsonValue> {
        self.details.as_ref()
    }
}

impl Display for FunctionsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code_str())
    }
}

impl std::error::Error for FunctionsError {}

pub type FunctionsResult<T> = Result<T, FunctionsError>;

pub fn invalid_argument(message: impl Into<String>) -> FunctionsError {
    FunctionsError::new(FunctionsErrorCode::InvalidArgument, message)
}

pub fn internal_error(message: impl Into<String>) -> FunctionsError {
    FunctionsError::new(FunctionsErrorCode::Internal, message)
}

pub fn not_found(message: impl Into<String>) -> FunctionsError {
    FunctionsError::new(FunctionsErrorCode::NotFound, message)
}

pub fn unavailable(message: impl Into<String>) -> FunctionsError {
    FunctionsError::new(FunctionsErrorCode::Unavailable, message)
}

pub fn deadline_exceeded(message: impl Into<String>) -> FunctionsError {
    FunctionsError::new(FunctionsErrorCode::DeadlineExceeded, message)
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<ErrorPayload>,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<JsonValue>,
}

/// Builds the error described by a callable HTTP response, if any.
///
/// An `error` object in the body takes precedence over the HTTP status. A 2xx
/// response without an `error` object is not an error and yields `None`.
pub fn error_for_http_response(status: u16, body: Option<&JsonValue>) -> Option<FunctionsError> {
    let mut code = FunctionsErrorCode::from_http_status(status);
    let mut message = code_description(code).to_string();
    let mut details = None;

    let payload = body
        .cloned()
        .and_then(|value| serde_json::from_value::<ErrorBody>(value).ok())
        .and_then(|parsed| parsed.error);

    if let Some(payload) = payload {
        if let Some(status) = payload.status.as_deref() {
            match FunctionsErrorCode::from_status(status) {
                Some(parsed) => {
                    code = parsed;
                    message = code_description(code).to_string();
                }
                None => {
                    return Some(internal_error(format!(
                        "Unrecognized callable error status: {status}"
                    )));
                }
            }
        }
        if let Some(text) = payload.message.filter(|text| !text.is_empty()) {
            message = text;
        }
        details = payload.details;
    }

    if code == FunctionsErrorCode::Ok {
        return None;
    }

    let error = FunctionsError::new(code, message);
    Some(match details {
        Some(details) => error.with_details(details),
        None => error,
    })
}

fn code_description(code: FunctionsErrorCode) -> &'static str {
    code.as_str().trim_start_matches("functions/")
}
