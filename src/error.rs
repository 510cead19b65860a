use http::StatusCode;
use serde_json::{Value, json};
use thiserror::Error;

use crate::config::EchoConfig;
use crate::request::EchoRequest;
use crate::response::{EchoResponse, ResponseData};
use crate::util::{UNEXPECTED_ERROR, error_message};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Structural name tag carried by the serialized error form, so that
/// cross-boundary checks work after serialization.
pub(crate) const ERROR_NAME: &str = "EchoError";

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum TransportErrorKind {
    Dns,
    Connect,
    Tls,
    Read,
    Timeout,
    Other,
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Dns => "dns",
            Self::Connect => "connect",
            Self::Tls => "tls",
            Self::Read => "read",
            Self::Timeout => "timeout",
            Self::Other => "other",
        };
        formatter.write_str(text)
    }
}

/// The failure payload of the transport boundary: the call never produced a
/// response.
#[derive(Debug)]
pub struct TransportFailure {
    pub kind: TransportErrorKind,
    pub message: String,
    pub source: Option<BoxError>,
}

impl TransportFailure {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(kind: TransportErrorKind, source: BoxError) -> Self {
        Self {
            kind,
            message: source.to_string(),
            source: Some(source),
        }
    }

    pub fn timeout(timeout_ms: u128) -> Self {
        Self::new(
            TransportErrorKind::Timeout,
            format!("request timed out after {timeout_ms}ms"),
        )
    }
}

impl std::fmt::Display for TransportFailure {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "transport error ({}): {}", self.kind, self.message)
    }
}

impl std::error::Error for TransportFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|source| source as &(dyn std::error::Error + 'static))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EchoErrorCode {
    HttpStatus,
    Transport,
    TransportInit,
    ResponseType,
    Interceptor,
    Deserialize,
}

impl EchoErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HttpStatus => "http_status",
            Self::Transport => "transport",
            Self::TransportInit => "transport_init",
            Self::ResponseType => "unsupported_response_type",
            Self::Interceptor => "interceptor",
            Self::Deserialize => "deserialize",
        }
    }
}

/// The uniform error of this crate. Every variant carries the configuration
/// that produced it and, once one was built, the transport request; only an
/// HTTP-status failure carries a response.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EchoError {
    /// A response was obtained but its status indicates failure.
    #[error("{message}")]
    Http {
        message: String,
        response: Box<EchoResponse>,
    },
    /// The call never reached a server or failed before a response existed.
    #[error("{message}")]
    Transport {
        message: String,
        kind: TransportErrorKind,
        config: Box<EchoConfig>,
        request: Box<EchoRequest>,
        #[source]
        source: Option<BoxError>,
    },
    /// The transport itself could not be constructed.
    #[error("failed to initialize transport: {message}")]
    TransportInit { message: String },
    /// An unrecognized `responseType` tag; never downgraded to
    /// auto-detection.
    #[error("Unsupported responseType: {tag}")]
    ResponseType {
        tag: String,
        config: Box<EchoConfig>,
        request: Box<EchoRequest>,
    },
    /// An interceptor hook aborted the pipeline with its own failure.
    #[error("{message}")]
    Interceptor { message: String },
    #[error("failed to decode response json: {source}")]
    Deserialize {
        #[source]
        source: serde_json::Error,
    },
}

impl EchoError {
    /// Builds the error for a non-2xx response: the message comes from the
    /// decoded body when it is a non-empty string or a record with a string
    /// `message` field, else from the status text, else a fixed fallback.
    pub(crate) fn from_http_failure(response: EchoResponse) -> Self {
        let message = http_failure_message(&response.data, &response.status_text);
        Self::Http {
            message,
            response: Box::new(response),
        }
    }

    pub(crate) fn from_transport_failure(
        config: EchoConfig,
        request: EchoRequest,
        failure: TransportFailure,
    ) -> Self {
        let message = if failure.message.is_empty() {
            UNEXPECTED_ERROR.to_owned()
        } else {
            failure.message.clone()
        };
        Self::Transport {
            message,
            kind: failure.kind,
            config: Box::new(config),
            request: Box::new(request),
            source: failure.source,
        }
    }

    /// Shorthand for hooks that abort a chain with their own failure.
    pub fn interceptor(message: impl Into<String>) -> Self {
        Self::Interceptor {
            message: message.into(),
        }
    }

    pub const fn code(&self) -> EchoErrorCode {
        match self {
            Self::Http { .. } => EchoErrorCode::HttpStatus,
            Self::Transport { .. } => EchoErrorCode::Transport,
            Self::TransportInit { .. } => EchoErrorCode::TransportInit,
            Self::ResponseType { .. } => EchoErrorCode::ResponseType,
            Self::Interceptor { .. } => EchoErrorCode::Interceptor,
            Self::Deserialize { .. } => EchoErrorCode::Deserialize,
        }
    }

    pub fn config(&self) -> Option<&EchoConfig> {
        match self {
            Self::Http { response, .. } => Some(&response.config),
            Self::Transport { config, .. } | Self::ResponseType { config, .. } => Some(config),
            _ => None,
        }
    }

    pub fn request(&self) -> Option<&EchoRequest> {
        match self {
            Self::Http { response, .. } => Some(&response.request),
            Self::Transport { request, .. } | Self::ResponseType { request, .. } => Some(request),
            _ => None,
        }
    }

    /// Present only for HTTP-status failures.
    pub fn response(&self) -> Option<&EchoResponse> {
        match self {
            Self::Http { response, .. } => Some(response),
            _ => None,
        }
    }

    /// Reclaims the response from an HTTP-status failure, e.g. for a
    /// rejection hook that decides to recover with it.
    pub fn into_response(self) -> Option<EchoResponse> {
        match self {
            Self::Http { response, .. } => Some(*response),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.response().map(|response| response.status)
    }

    /// The structural form used for cross-boundary identity checks; see
    /// [`is_echo_error`].
    pub fn to_value(&self) -> Value {
        let mut value = json!({
            "name": ERROR_NAME,
            "code": self.code().as_str(),
            "message": self.to_string(),
        });
        if let Some(status) = self.status() {
            value["status"] = json!(status.as_u16());
        }
        value
    }
}

fn http_failure_message(data: &ResponseData, status_text: &str) -> String {
    match data {
        ResponseData::Text(text) if !text.is_empty() => text.clone(),
        ResponseData::Json(value) if !matches!(value, Value::Null) && value.as_str() != Some("") => {
            error_message(value)
        }
        _ => error_message(&Value::String(status_text.to_owned())),
    }
}

/// Structural "is this our error" test over a serialized value, for checks
/// that cross a process or serialization boundary.
pub fn is_echo_error(value: &Value) -> bool {
    value.get("name").and_then(Value::as_str) == Some(ERROR_NAME)
}
