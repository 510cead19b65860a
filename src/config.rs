use std::collections::BTreeMap;
use std::time::Duration;

use http::Method;
use serde_json::Value;

use crate::body::EchoBody;

/// One request's intent, before it is materialized into a transport request.
///
/// A configuration is built fresh per call by merging a client's base
/// configuration with a call-specific one (see [`crate::merge_configs`]);
/// the merged value aliases neither input.
#[derive(Clone, Debug, Default)]
pub struct EchoConfig {
    /// HTTP method; defaults to `GET` when unset at build time.
    pub method: Option<Method>,
    /// Relative path or absolute URL.
    pub url: String,
    /// Base URL joined with relative paths; ignored for absolute ones.
    pub base_url: Option<String>,
    /// Query parameters: scalar or list-of-scalar values; null and
    /// empty-string entries are dropped at encoding time.
    pub params: Option<BTreeMap<String, Value>>,
    /// Request headers, case-sensitive keys at this layer.
    pub headers: Option<BTreeMap<String, String>>,
    pub body: Option<EchoBody>,
    /// Decoding tag, one of the [`ResponseType`] names; unset means
    /// content-type auto-detection.
    pub response_type: Option<String>,
    /// Per-request timeout, passed through to the transport.
    pub timeout: Option<Duration>,
}

impl EchoConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<EchoBody>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn response_type(mut self, tag: impl Into<String>) -> Self {
        self.response_type = Some(tag.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// The fixed set of response decoding tags. Configurations carry the tag as
/// a string so that an unrecognized value surfaces as a decode-time error
/// instead of disappearing at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseType {
    Json,
    Text,
    ArrayBuffer,
    Blob,
    Bytes,
    FormData,
    Stream,
    Original,
}

impl ResponseType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Text => "text",
            Self::ArrayBuffer => "arrayBuffer",
            Self::Blob => "blob",
            Self::Bytes => "bytes",
            Self::FormData => "formData",
            Self::Stream => "stream",
            Self::Original => "original",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "json" => Some(Self::Json),
            "text" => Some(Self::Text),
            "arrayBuffer" => Some(Self::ArrayBuffer),
            "blob" => Some(Self::Blob),
            "bytes" => Some(Self::Bytes),
            "formData" => Some(Self::FormData),
            "stream" => Some(Self::Stream),
            "original" => Some(Self::Original),
            _ => None,
        }
    }
}

impl std::fmt::Display for ResponseType {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}
