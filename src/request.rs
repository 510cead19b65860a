use std::collections::BTreeMap;
use std::time::Duration;

use http::Method;

use crate::body::{RequestBody, serialize_body};
use crate::config::EchoConfig;
use crate::util::{append_params, build_url};

/// The materialized, transport-ready form of a configuration. Attached to
/// the final response or error for diagnostics.
#[derive(Clone, Debug)]
pub struct EchoRequest {
    pub method: Method,
    /// Fully resolved URL, query string included.
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<RequestBody>,
    pub response_type: Option<String>,
    pub timeout: Option<Duration>,
}

/// Builds a transport request from a merged configuration: resolves the
/// target URL, appends query parameters, serializes the body and strips a
/// caller-set `Content-Type` when the transport must provide its own (blob
/// and multipart bodies). Never fails; malformed input rides through as
/// best-effort strings and surfaces at the transport.
pub(crate) fn build(config: &EchoConfig) -> EchoRequest {
    let url = append_params(
        &build_url(config.base_url.as_deref(), &config.url),
        config.params.as_ref(),
    );
    let mut headers = config.headers.clone().unwrap_or_default();
    let body = config.body.as_ref().map(serialize_body);
    if matches!(body, Some(RequestBody::Blob(_) | RequestBody::Form(_))) {
        headers.retain(|name, _| !name.eq_ignore_ascii_case("content-type"));
    }

    EchoRequest {
        method: config.method.clone().unwrap_or(Method::GET),
        url,
        headers,
        body,
        response_type: config.response_type.clone(),
        timeout: config.timeout,
    }
}
