use bytes::Bytes;
use serde_json::Value;

/// A configuration-level request body.
///
/// Strings and raw buffers pass through serialization unchanged; `Json`
/// values are serialized to JSON text; `Blob` and `Form` bodies are handed
/// to the transport intact so it can stamp the correct content type.
#[derive(Clone, Debug)]
pub enum EchoBody {
    Json(Value),
    Text(String),
    Bytes(Bytes),
    Blob(Blob),
    Form(FormBody),
}

impl From<Value> for EchoBody {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<String> for EchoBody {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for EchoBody {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<Bytes> for EchoBody {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Vec<u8>> for EchoBody {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(bytes))
    }
}

impl From<Blob> for EchoBody {
    fn from(blob: Blob) -> Self {
        Self::Blob(blob)
    }
}

impl From<FormBody> for EchoBody {
    fn from(form: FormBody) -> Self {
        Self::Form(form)
    }
}

/// An opaque binary payload with an optional MIME type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Blob {
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl Blob {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            content_type: None,
            bytes: bytes.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A multipart form container: ordered text and file fields. The transport
/// encodes it as `multipart/form-data` and owns the boundary.
#[derive(Clone, Debug, Default)]
pub struct FormBody {
    parts: Vec<FormPart>,
}

#[derive(Clone, Debug)]
pub struct FormPart {
    pub(crate) name: String,
    pub(crate) value: FormValue,
}

#[derive(Clone, Debug)]
pub(crate) enum FormValue {
    Text(String),
    File {
        filename: String,
        content_type: Option<String>,
        bytes: Bytes,
    },
}

impl FormBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(FormPart {
            name: name.into(),
            value: FormValue::Text(value.into()),
        });
        self
    }

    pub fn file(
        mut self,
        name: impl Into<String>,
        filename: impl Into<String>,
        content_type: Option<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        self.parts.push(FormPart {
            name: name.into(),
            value: FormValue::File {
                filename: filename.into(),
                content_type,
                bytes: bytes.into(),
            },
        });
        self
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub(crate) fn parts(&self) -> &[FormPart] {
        &self.parts
    }
}

/// A serialized, transport-ready request body.
#[derive(Clone, Debug)]
pub enum RequestBody {
    Buffered(Bytes),
    Blob(Blob),
    Form(FormBody),
}

/// Serializes a configuration body. `Json` values become JSON text; plain
/// strings and raw buffers pass through unchanged; `Blob` and `Form` bodies
/// are forwarded for the transport to encode.
pub(crate) fn serialize_body(body: &EchoBody) -> RequestBody {
    match body {
        EchoBody::Json(value) => RequestBody::Buffered(Bytes::from(value.to_string())),
        EchoBody::Text(text) => RequestBody::Buffered(Bytes::from(text.clone())),
        EchoBody::Bytes(bytes) => RequestBody::Buffered(bytes.clone()),
        EchoBody::Blob(blob) => RequestBody::Blob(blob.clone()),
        EchoBody::Form(form) => RequestBody::Form(form.clone()),
    }
}
