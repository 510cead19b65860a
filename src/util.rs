use std::collections::BTreeMap;
use std::sync::Mutex;

use serde_json::Value;

pub(crate) const UNEXPECTED_ERROR: &str = "Unexpected error";

pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Returns true when `url` starts with a `scheme://` prefix.
fn has_scheme(url: &str) -> bool {
    let Some((scheme, _)) = url.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '+' | '-' | '.'))
}

/// Resolves the target URL: an absolute `url` is used unchanged, otherwise
/// `base_url` and `url` are joined with exactly one separating slash and a
/// single trailing slash is stripped from the joined result.
pub(crate) fn build_url(base_url: Option<&str>, url: &str) -> String {
    if has_scheme(url) {
        return url.to_owned();
    }
    let Some(base) = base_url.filter(|base| !base.is_empty()) else {
        return url.to_owned();
    };

    let mut joined = match (base.ends_with('/'), url.starts_with('/')) {
        (true, true) => format!("{base}{}", &url[1..]),
        (false, false) => format!("{base}/{url}"),
        _ => format!("{base}{url}"),
    };
    if joined.len() > 1 && joined.ends_with('/') {
        joined.pop();
    }
    joined
}

/// Appends query parameters to `url`, extending any query string it already
/// carries. Scalars become one `key=value` pair, lists repeat the key, and
/// null or empty-string entries are skipped. Encoded spaces are normalized
/// to `%20`.
pub(crate) fn append_params(url: &str, params: Option<&BTreeMap<String, Value>>) -> String {
    let Some(params) = params.filter(|params| !params.is_empty()) else {
        return url.to_owned();
    };

    let (without_fragment, fragment) = match url.split_once('#') {
        Some((left, right)) => (left, Some(right)),
        None => (url, None),
    };
    let (path, existing_query) = match without_fragment.split_once('?') {
        Some((left, right)) => (left, Some(right)),
        None => (without_fragment, None),
    };

    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    if let Some(existing) = existing_query {
        for (name, value) in url::form_urlencoded::parse(existing.as_bytes()) {
            serializer.append_pair(&name, &value);
        }
    }
    for (key, value) in params {
        match value {
            Value::Array(items) => {
                for item in items {
                    if let Some(text) = param_text(item) {
                        serializer.append_pair(key, &text);
                    }
                }
            }
            other => {
                if let Some(text) = param_text(other) {
                    serializer.append_pair(key, &text);
                }
            }
        }
    }

    let query = serializer.finish().replace('+', "%20");
    let mut merged = if query.is_empty() {
        path.to_owned()
    } else {
        format!("{path}?{query}")
    };
    if let Some(fragment) = fragment {
        merged.push('#');
        merged.push_str(fragment);
    }
    merged
}

fn param_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) if text.is_empty() => None,
        Value::String(text) => Some(text.clone()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        other => Some(other.to_string()),
    }
}

/// Message extraction for error values: a non-empty string is used as-is, a
/// record with a non-empty string `message` field contributes that field,
/// anything else falls back to a fixed message.
pub(crate) fn error_message(value: &Value) -> String {
    match value {
        Value::String(text) if !text.is_empty() => text.clone(),
        Value::Object(fields) => match fields.get("message") {
            Some(Value::String(text)) if !text.is_empty() => text.clone(),
            _ => UNEXPECTED_ERROR.to_owned(),
        },
        _ => UNEXPECTED_ERROR.to_owned(),
    }
}

/// Case-insensitive header lookup over the case-preserving header map.
pub(crate) fn header_value<'a>(headers: &'a BTreeMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// Strips query, fragment and userinfo from a URL before it reaches logs.
pub(crate) fn redact_url_for_logs(url_text: &str) -> String {
    let Ok(mut parsed) = url::Url::parse(url_text) else {
        return url_text.split('?').next().unwrap_or(url_text).to_owned();
    };
    let _ = parsed.set_username("");
    let _ = parsed.set_password(None);
    parsed.set_query(None);
    parsed.set_fragment(None);
    parsed.to_string()
}
