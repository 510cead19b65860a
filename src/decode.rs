use std::collections::BTreeMap;

use bytes::Bytes;
use http::StatusCode;
use tracing::warn;

use crate::body::Blob;
use crate::config::{EchoConfig, ResponseType};
use crate::error::EchoError;
use crate::request::EchoRequest;
use crate::response::ResponseData;
use crate::transport::RawResponse;
use crate::util::header_value;

/// Decodes a raw response into typed data.
///
/// With an explicit `responseType` tag the matching extraction runs; an
/// unrecognized tag is the one hard failure here and is never downgraded.
/// Any other explicit-mode extraction failure logs a warning and falls back
/// to content-type auto-detection over the same body; auto-detect failures
/// degrade to `Null`.
pub(crate) async fn decode(
    config: &EchoConfig,
    request: &EchoRequest,
    raw: RawResponse,
) -> Result<ResponseData, EchoError> {
    let Some(tag) = request.response_type.as_deref() else {
        return Ok(auto_detect(raw).await);
    };

    match ResponseType::parse(tag) {
        None => Err(EchoError::ResponseType {
            tag: tag.to_owned(),
            config: Box::new(config.clone()),
            request: Box::new(request.clone()),
        }),
        // The stream and original tags hand the body over unread.
        Some(ResponseType::Stream) => Ok(ResponseData::Stream(raw.body.into_stream())),
        Some(ResponseType::Original) => Ok(ResponseData::Original(raw)),
        Some(parsed) => Ok(explicit(parsed, raw).await),
    }
}

async fn explicit(tag: ResponseType, raw: RawResponse) -> ResponseData {
    let RawResponse {
        status,
        headers,
        body,
        ..
    } = raw;
    let bytes = match body.into_bytes().await {
        Ok(bytes) => bytes,
        Err(error) => {
            warn!(tag = tag.as_str(), %error, "failed to read response body");
            return ResponseData::Null;
        }
    };
    match parse_explicit(tag, &headers, &bytes) {
        Some(data) => data,
        None => {
            warn!(
                tag = tag.as_str(),
                "failed to parse response, falling back to automatic parsing"
            );
            auto_detect_buffered(status, &headers, &bytes)
        }
    }
}

fn parse_explicit(
    tag: ResponseType,
    headers: &BTreeMap<String, String>,
    bytes: &Bytes,
) -> Option<ResponseData> {
    match tag {
        ResponseType::Json => serde_json::from_slice(bytes).ok().map(ResponseData::Json),
        ResponseType::Text => Some(ResponseData::Text(
            String::from_utf8_lossy(bytes).into_owned(),
        )),
        ResponseType::ArrayBuffer | ResponseType::Bytes => {
            Some(ResponseData::Bytes(bytes.clone()))
        }
        ResponseType::Blob => Some(ResponseData::Blob(blob_from(headers, bytes))),
        ResponseType::FormData => parse_form(headers, bytes).map(ResponseData::Form),
        // Handled before the body is buffered.
        ResponseType::Stream | ResponseType::Original => None,
    }
}

async fn auto_detect(raw: RawResponse) -> ResponseData {
    let RawResponse {
        status,
        headers,
        body,
        ..
    } = raw;
    if status == StatusCode::NO_CONTENT || header_value(&headers, "content-length") == Some("0") {
        return ResponseData::Null;
    }
    let bytes = match body.into_bytes().await {
        Ok(bytes) => bytes,
        Err(_) => return ResponseData::Null,
    };
    auto_detect_buffered(status, &headers, &bytes)
}

fn auto_detect_buffered(
    status: StatusCode,
    headers: &BTreeMap<String, String>,
    bytes: &Bytes,
) -> ResponseData {
    if status == StatusCode::NO_CONTENT || header_value(headers, "content-length") == Some("0") {
        return ResponseData::Null;
    }

    let content_type = header_value(headers, "content-type")
        .unwrap_or("")
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    if content_type == "application/json" || content_type.ends_with("+json") {
        return serde_json::from_slice(bytes)
            .map(ResponseData::Json)
            .unwrap_or(ResponseData::Null);
    }
    // XML is handed over as raw text, not parsed.
    if content_type == "application/xml"
        || content_type == "text/xml"
        || content_type == "application/xhtml+xml"
        || content_type.ends_with("+xml")
    {
        return ResponseData::Text(String::from_utf8_lossy(bytes).into_owned());
    }
    if content_type.starts_with("text/") {
        return ResponseData::Text(String::from_utf8_lossy(bytes).into_owned());
    }
    if content_type == "multipart/form-data" || content_type == "application/x-www-form-urlencoded"
    {
        return parse_form(headers, bytes)
            .map(ResponseData::Form)
            .unwrap_or(ResponseData::Null);
    }
    ResponseData::Blob(blob_from(headers, bytes))
}

fn blob_from(headers: &BTreeMap<String, String>, bytes: &Bytes) -> Blob {
    let mut blob = Blob::new(bytes.clone());
    if let Some(content_type) = header_value(headers, "content-type") {
        blob = blob.with_content_type(content_type);
    }
    blob
}

pub(crate) fn parse_form(
    headers: &BTreeMap<String, String>,
    bytes: &Bytes,
) -> Option<Vec<(String, String)>> {
    let content_type = header_value(headers, "content-type").unwrap_or("");
    let media_type = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    if media_type == "multipart/form-data" {
        let boundary = content_type
            .split(';')
            .filter_map(|part| part.trim().strip_prefix("boundary="))
            .next()?;
        return parse_multipart(bytes, boundary.trim_matches('"'));
    }
    serde_urlencoded::from_bytes::<Vec<(String, String)>>(bytes).ok()
}

fn parse_multipart(bytes: &[u8], boundary: &str) -> Option<Vec<(String, String)>> {
    let text = std::str::from_utf8(bytes).ok()?;
    let delimiter = format!("--{boundary}");
    let mut fields = Vec::new();
    for segment in text.split(delimiter.as_str()) {
        let segment = segment.strip_prefix("\r\n").unwrap_or(segment);
        if segment.is_empty() || segment.starts_with("--") {
            continue;
        }
        let (raw_headers, value) = segment.split_once("\r\n\r\n")?;
        let name = raw_headers.lines().find_map(|line| {
            let (header, rest) = line.split_once(':')?;
            if !header.eq_ignore_ascii_case("content-disposition") {
                return None;
            }
            rest.split(';')
                .find_map(|attr| attr.trim().strip_prefix("name="))
                .map(|name| name.trim_matches('"').to_owned())
        })?;
        fields.push((name, value.strip_suffix("\r\n").unwrap_or(value).to_owned()));
    }
    Some(fields)
}
