use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;
use http::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::EchoResult;
use crate::body::Blob;
use crate::config::EchoConfig;
use crate::error::EchoError;
use crate::request::EchoRequest;
use crate::transport::{ByteStream, RawResponse};

/// A completed call: the decoded body plus the response metadata and the
/// configuration/request that produced it. The pipeline never mutates a
/// response after creation; interceptors replace it wholesale.
#[derive(Debug)]
pub struct EchoResponse {
    pub data: ResponseData,
    pub status: StatusCode,
    pub status_text: String,
    /// Response headers, lower-cased names as received from the transport.
    pub headers: BTreeMap<String, String>,
    pub config: EchoConfig,
    pub request: EchoRequest,
}

impl EchoResponse {
    /// Deserializes the decoded body. Works on `Json` data directly and on
    /// `Text` data by parsing it as JSON.
    pub fn json<T>(&self) -> EchoResult<T>
    where
        T: DeserializeOwned,
    {
        let parsed = match &self.data {
            ResponseData::Json(value) => serde_json::from_value(value.clone()),
            ResponseData::Text(text) => serde_json::from_str(text),
            ResponseData::Bytes(bytes) => serde_json::from_slice(bytes),
            other => {
                return Err(EchoError::Deserialize {
                    source: serde::de::Error::custom(format!(
                        "response data is not json-decodable: {other:?}"
                    )),
                });
            }
        };
        parsed.map_err(|source| EchoError::Deserialize { source })
    }

    pub fn text(&self) -> Option<&str> {
        self.data.as_text()
    }
}

/// The decoded body of a response.
pub enum ResponseData {
    /// Empty body (204, zero content length) or a swallowed decode failure.
    Null,
    Json(Value),
    Text(String),
    Bytes(Bytes),
    Blob(Blob),
    /// Form fields decoded from an urlencoded or multipart body.
    Form(Vec<(String, String)>),
    /// The live byte stream, body unread.
    Stream(ByteStream),
    /// The raw transport response, body unread.
    Original(RawResponse),
}

impl ResponseData {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&Blob> {
        match self {
            Self::Blob(blob) => Some(blob),
            _ => None,
        }
    }

    pub fn as_form(&self) -> Option<&[(String, String)]> {
        match self {
            Self::Form(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn into_stream(self) -> Option<ByteStream> {
        match self {
            Self::Stream(stream) => Some(stream),
            _ => None,
        }
    }

    pub fn into_original(self) -> Option<RawResponse> {
        match self {
            Self::Original(raw) => Some(raw),
            _ => None,
        }
    }
}

impl fmt::Debug for ResponseData {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => formatter.write_str("Null"),
            Self::Json(value) => formatter.debug_tuple("Json").field(value).finish(),
            Self::Text(text) => formatter.debug_tuple("Text").field(text).finish(),
            Self::Bytes(bytes) => formatter
                .debug_struct("Bytes")
                .field("len", &bytes.len())
                .finish(),
            Self::Blob(blob) => formatter.debug_tuple("Blob").field(blob).finish(),
            Self::Form(fields) => formatter.debug_tuple("Form").field(fields).finish(),
            Self::Stream(_) => formatter.write_str("Stream(..)"),
            Self::Original(raw) => formatter.debug_tuple("Original").field(raw).finish(),
        }
    }
}
