use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{Bytes, BytesMut};
use futures_core::future::BoxFuture;
use futures_core::stream::BoxStream;
use http::header::CONTENT_TYPE;
use http::{HeaderName, HeaderValue, StatusCode, Uri};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use futures_util::{StreamExt, TryStreamExt};

use crate::EchoResult;
use crate::body::{FormBody, FormValue, RequestBody};
use crate::error::{BoxError, EchoError, TransportErrorKind, TransportFailure};
use crate::request::EchoRequest;

pub type ByteStream = BoxStream<'static, Result<Bytes, BoxError>>;

/// The single network-facing boundary: perform one request, produce one raw
/// response, or fail with a transport-level error that carries no response.
pub trait Transport: Send + Sync {
    fn perform(&self, request: EchoRequest)
    -> BoxFuture<'static, Result<RawResponse, TransportFailure>>;
}

/// A raw transport response, before decoding.
pub struct RawResponse {
    pub status: StatusCode,
    pub status_text: String,
    /// Lower-cased header names; repeated headers joined with `", "`.
    pub headers: BTreeMap<String, String>,
    pub body: RawBody,
}

pub enum RawBody {
    Buffered(Bytes),
    Streaming(ByteStream),
}

impl RawBody {
    pub async fn into_bytes(self) -> Result<Bytes, BoxError> {
        match self {
            Self::Buffered(bytes) => Ok(bytes),
            Self::Streaming(mut stream) => {
                let mut buffer = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    buffer.extend_from_slice(&chunk?);
                }
                Ok(buffer.freeze())
            }
        }
    }

    pub fn into_stream(self) -> ByteStream {
        match self {
            Self::Streaming(stream) => stream,
            Self::Buffered(bytes) => Box::pin(futures_util::stream::once(async move { Ok(bytes) })),
        }
    }
}

impl fmt::Debug for RawBody {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buffered(bytes) => formatter
                .debug_struct("Buffered")
                .field("len", &bytes.len())
                .finish(),
            Self::Streaming(_) => formatter.write_str("Streaming(..)"),
        }
    }
}

impl fmt::Debug for RawResponse {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RawResponse")
            .field("status", &self.status)
            .field("status_text", &self.status_text)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .finish()
    }
}

type HttpsConnector = hyper_rustls::HttpsConnector<HttpConnector>;
type HyperClient = Client<HttpsConnector, Full<Bytes>>;

/// The default transport: a pooled hyper client over rustls (ring provider,
/// webpki roots) speaking HTTP/1.1 and HTTP/2. Owns the runtime duties the
/// request builder leaves open: multipart encoding with a generated
/// boundary, blob content-type stamping, and the per-request timeout.
#[derive(Clone)]
pub struct HyperTransport {
    client: HyperClient,
}

impl HyperTransport {
    pub fn try_new() -> EchoResult<Self> {
        let mut connector = HttpConnector::new();
        connector.enforce_http(false);
        let https = HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(rustls::crypto::ring::default_provider())
            .map_err(|source| EchoError::TransportInit {
                message: source.to_string(),
            })?
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .wrap_connector(connector);
        let client = Client::builder(TokioExecutor::new()).build(https);
        Ok(Self { client })
    }
}

impl Transport for HyperTransport {
    fn perform(
        &self,
        request: EchoRequest,
    ) -> BoxFuture<'static, Result<RawResponse, TransportFailure>> {
        let client = self.client.clone();
        Box::pin(async move {
            let timeout = request.timeout;
            let http_request = build_http_request(&request)?;
            let response_future = client.request(http_request);
            let response = match timeout {
                Some(limit) => match tokio::time::timeout(limit, response_future).await {
                    Ok(result) => result,
                    Err(_) => return Err(TransportFailure::timeout(limit.as_millis())),
                },
                None => response_future.await,
            }
            .map_err(classify_transport_error)?;
            Ok(into_raw_response(response))
        })
    }
}

fn build_http_request(
    request: &EchoRequest,
) -> Result<http::Request<Full<Bytes>>, TransportFailure> {
    let uri: Uri = request.url.parse().map_err(|_| {
        TransportFailure::new(
            TransportErrorKind::Other,
            format!("invalid request uri: {}", request.url),
        )
    })?;

    let mut content_type_override = None;
    let body = match &request.body {
        None => Bytes::new(),
        Some(RequestBody::Buffered(bytes)) => bytes.clone(),
        Some(RequestBody::Blob(blob)) => {
            content_type_override = blob.content_type.clone();
            blob.bytes.clone()
        }
        Some(RequestBody::Form(form)) => {
            let (boundary, encoded) = encode_multipart(form);
            content_type_override = Some(format!("multipart/form-data; boundary={boundary}"));
            encoded
        }
    };

    let mut builder = http::Request::builder()
        .method(request.method.clone())
        .uri(uri);
    for (name, value) in &request.headers {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
            TransportFailure::new(
                TransportErrorKind::Other,
                format!("invalid header name: {name}"),
            )
        })?;
        let value = HeaderValue::from_str(value).map_err(|_| {
            TransportFailure::new(
                TransportErrorKind::Other,
                format!("invalid header value for {name}"),
            )
        })?;
        builder = builder.header(name, value);
    }
    if let Some(content_type) = content_type_override {
        let value = HeaderValue::from_str(&content_type).map_err(|_| {
            TransportFailure::new(
                TransportErrorKind::Other,
                format!("invalid content type: {content_type}"),
            )
        })?;
        builder = builder.header(CONTENT_TYPE, value);
    }

    builder
        .body(Full::new(body))
        .map_err(|source| TransportFailure::new(TransportErrorKind::Other, source.to_string()))
}

fn multipart_boundary() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.subsec_nanos())
        .unwrap_or(0);
    format!("echox-{count:08x}{nanos:08x}")
}

fn encode_multipart(form: &FormBody) -> (String, Bytes) {
    let boundary = multipart_boundary();
    let mut encoded = Vec::new();
    for part in form.parts() {
        encoded.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        match &part.value {
            FormValue::Text(value) => {
                encoded.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", part.name)
                        .as_bytes(),
                );
                encoded.extend_from_slice(value.as_bytes());
            }
            FormValue::File {
                filename,
                content_type,
                bytes,
            } => {
                encoded.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{filename}\"\r\n",
                        part.name
                    )
                    .as_bytes(),
                );
                if let Some(content_type) = content_type {
                    encoded.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
                }
                encoded.extend_from_slice(b"\r\n");
                encoded.extend_from_slice(bytes);
            }
        }
        encoded.extend_from_slice(b"\r\n");
    }
    encoded.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    (boundary, Bytes::from(encoded))
}

fn classify_transport_error(error: hyper_util::client::legacy::Error) -> TransportFailure {
    let text = error.to_string().to_ascii_lowercase();
    let kind = if error.is_connect() {
        if text.contains("dns")
            || text.contains("name or service not known")
            || text.contains("failed to lookup address")
        {
            TransportErrorKind::Dns
        } else if text.contains("tls") || text.contains("certificate") || text.contains("handshake")
        {
            TransportErrorKind::Tls
        } else {
            TransportErrorKind::Connect
        }
    } else if text.contains("read")
        || text.contains("connection reset")
        || text.contains("broken pipe")
        || text.contains("unexpected eof")
    {
        TransportErrorKind::Read
    } else {
        TransportErrorKind::Other
    };
    TransportFailure::with_source(kind, Box::new(error))
}

fn into_raw_response(response: http::Response<Incoming>) -> RawResponse {
    let status = response.status();
    let status_text = status.canonical_reason().unwrap_or("").to_owned();
    let mut headers = BTreeMap::new();
    for (name, value) in response.headers() {
        let Ok(text) = value.to_str() else { continue };
        headers
            .entry(name.as_str().to_owned())
            .and_modify(|existing: &mut String| {
                existing.push_str(", ");
                existing.push_str(text);
            })
            .or_insert_with(|| text.to_owned());
    }
    let stream = response
        .into_body()
        .into_data_stream()
        .map_err(|source| Box::new(source) as BoxError);
    RawResponse {
        status,
        status_text,
        headers,
        body: RawBody::Streaming(Box::pin(stream)),
    }
}
